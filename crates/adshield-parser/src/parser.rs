//! Subscription line parsing and trie construction.

use adshield_core::cosmetic::CosmeticFilters;
use adshield_core::trie::FilterTrie;
use adshield_core::types::{CosmeticFiltersMode, FilterRule, RuleMatch, RuleOptions};

/// Parser configuration, supplied by the embedding host.
///
/// The cosmetic mode gates which cosmetic rules are retained at parse time;
/// it is passed explicitly here instead of living in a process-wide global.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserSettings {
    pub cosmetic_filters_mode: CosmeticFiltersMode,
    /// When disabled, rules still containing `*` after edge-stripping are
    /// dropped.
    pub wildcards_enabled: bool,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            cosmetic_filters_mode: CosmeticFiltersMode::AllFilters,
            wildcards_enabled: true,
        }
    }
}

/// The parse product: one trie of network rules plus the cosmetic tables.
#[derive(Debug, Default)]
pub struct FilterSet {
    pub trie: FilterTrie,
    pub cosmetic: CosmeticFilters,
}

/// Streaming parser for the body of a subscription file.
///
/// Feed it every non-header line; bad rule lines are dropped silently and
/// parsing continues.
#[derive(Debug)]
pub struct FilterListParser {
    settings: ParserSettings,
    set: FilterSet,
}

impl FilterListParser {
    pub fn new(settings: ParserSettings) -> Self {
        Self {
            settings,
            set: FilterSet::default(),
        }
    }

    pub fn into_filter_set(self) -> FilterSet {
        self.set
    }

    /// Parse a whole subscription body (without its header line).
    pub fn parse_body(&mut self, text: &str) {
        for line in text.lines() {
            self.parse_line(line.trim_end_matches('\r'));
        }
    }

    /// Classify and parse one line.
    pub fn parse_line(&mut self, rule: &str) {
        if rule.is_empty() || rule.starts_with('!') {
            return;
        }

        if let Some(selector) = rule.strip_prefix("##") {
            if self.settings.cosmetic_filters_mode == CosmeticFiltersMode::AllFilters {
                self.set.cosmetic.add_global_rule(selector);
            }
            return;
        }

        if let Some((domains, selector)) = rule.split_once("##") {
            if self.settings.cosmetic_filters_mode != CosmeticFiltersMode::NoFilters {
                for domain in domains.split(',') {
                    self.set.cosmetic.add_domain_rule(domain, selector);
                }
            }
            return;
        }

        if let Some((domains, selector)) = rule.split_once("#@#") {
            if self.settings.cosmetic_filters_mode != CosmeticFiltersMode::NoFilters {
                for domain in domains.split(',') {
                    self.set.cosmetic.add_domain_exception(domain, selector);
                }
            }
            return;
        }

        self.parse_network_rule(rule);
    }

    fn parse_network_rule(&mut self, raw: &str) {
        let (pattern_part, options_part) = split_rule_options(raw);

        // Leading and trailing wildcards are equivalent to substring match.
        let mut line = pattern_part.trim_matches('*');

        if !self.settings.wildcards_enabled && line.contains('*') {
            return;
        }

        let mut rule = FilterRule::new(raw);

        if let Some(rest) = line.strip_prefix("@@") {
            rule.is_exception = true;
            line = rest;
        }

        if let Some(rest) = line.strip_prefix("||") {
            rule.needs_domain_anchor = true;
            line = rest;
        }

        if let Some(rest) = line.strip_prefix('|') {
            rule.match_mode = RuleMatch::Start;
            line = rest;
        }

        if let Some(rest) = line.strip_suffix('|') {
            rule.match_mode = if rule.match_mode == RuleMatch::Start {
                RuleMatch::Exact
            } else {
                RuleMatch::End
            };
            line = rest;
        }

        if let Some(options_part) = options_part {
            if !apply_options(&mut rule, options_part) {
                return;
            }
        }

        self.set.trie.insert(line, rule);
    }
}

fn split_rule_options(line: &str) -> (&str, Option<&str>) {
    match line.find('$') {
        Some(pos) => (&line[..pos], Some(&line[pos + 1..])),
        None => (line, None),
    }
}

/// Apply a comma-separated `$options` tail to the rule.
///
/// Returns false when an unknown token is seen, which discards the whole
/// line.
fn apply_options(rule: &mut FilterRule, options: &str) -> bool {
    for token in options.split(',').filter(|token| !token.is_empty()) {
        let (negated, name) = match token.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, token),
        };

        if let Some(option) = option_from_name(name) {
            // Hiding switches only make sense on exception rules.
            if (!rule.is_exception || negated)
                && (option == RuleOptions::ELEMHIDE || option == RuleOptions::GENERICHIDE)
            {
                continue;
            }

            if !negated {
                rule.options |= option;
            } else if option != RuleOptions::WEBSOCKET && option != RuleOptions::POPUP {
                rule.exceptions |= option;
            }
        } else if name.starts_with("domain") {
            let values = match token.find('=') {
                Some(pos) => &token[pos + 1..],
                None => "",
            };

            for domain in values.split('|').filter(|domain| !domain.is_empty()) {
                match domain.strip_prefix('~') {
                    Some(allowed) => rule.allowed_domains.push(allowed.to_string()),
                    None => rule.blocked_domains.push(domain.to_string()),
                }
            }
        } else {
            return false;
        }
    }

    true
}

fn option_from_name(name: &str) -> Option<RuleOptions> {
    match name {
        "third-party" => Some(RuleOptions::THIRD_PARTY),
        "stylesheet" => Some(RuleOptions::STYLESHEET),
        "image" => Some(RuleOptions::IMAGE),
        "script" => Some(RuleOptions::SCRIPT),
        "object" => Some(RuleOptions::OBJECT),
        "object-subrequest" | "object_subrequest" => Some(RuleOptions::OBJECT_SUBREQUEST),
        "subdocument" => Some(RuleOptions::SUBDOCUMENT),
        "xmlhttprequest" => Some(RuleOptions::XMLHTTPREQUEST),
        "websocket" => Some(RuleOptions::WEBSOCKET),
        "popup" => Some(RuleOptions::POPUP),
        "elemhide" => Some(RuleOptions::ELEMHIDE),
        "generichide" => Some(RuleOptions::GENERICHIDE),
        _ => None,
    }
}
