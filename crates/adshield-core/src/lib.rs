//! adshield core library
//!
//! This crate provides the matching engine for the adshield content blocker.
//! It holds the rule model, the character-indexed filter trie and the URL
//! matcher that walks it for every outbound request.
//!
//! # Architecture
//!
//! Filter rules are parsed elsewhere (see `adshield-parser`) and inserted
//! into a [`trie::FilterTrie`]. The hot path is [`matcher::UrlMatcher`]: it
//! descends the trie from every suffix position of the request URL, mixing
//! literal edges with the `^` separator placeholder and `*` wildcard edges.
//!
//! # Modules
//!
//! - `types`: shared type definitions (rules, options, results)
//! - `trie`: character-indexed storage for network rules
//! - `matcher`: request matching engine
//! - `cosmetic`: CSS-selector filter tables
//! - `url`: fast URL helpers without allocations

pub mod cosmetic;
pub mod matcher;
pub mod trie;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use cosmetic::CosmeticFilters;
pub use matcher::{RequestContext, UrlMatcher};
pub use trie::{FilterTrie, TrieNode};
pub use types::{
    CheckResult, CosmeticFiltersMode, CosmeticFiltersResult, FilterRule, ResourceType, RuleMatch,
    RuleOptions,
};
