//! URL matching engine
//!
//! This is the hot path - every request goes through here. The matcher
//! starts a trie descent at every suffix position of the request URL,
//! which implements substring matching; anchored rule variants prune
//! during rule evaluation.

use crate::trie::{FilterTrie, TrieNode};
use crate::types::{
    CheckResult, CosmeticFiltersMode, FilterRule, ResourceType, RuleMatch, RuleOptions,
    RESOURCE_TYPE_OPTIONS,
};
use crate::url::{extract_host, host_boundary_end, host_suffixes, is_separator_match};

// =============================================================================
// Request Context
// =============================================================================

/// Per-request state precomputed once and shared across the whole walk.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Full request URL.
    pub request_url: String,
    /// Host portion of the request URL.
    pub request_host: String,
    /// Host portion of the page the request originates from; empty for
    /// top-level navigations.
    pub base_host: String,
    /// Suffix list of the request host, most specific first.
    pub request_subdomains: Vec<String>,
    pub resource_type: ResourceType,
}

impl RequestContext {
    pub fn new(base_url: &str, request_url: &str, resource_type: ResourceType) -> Self {
        let request_host = extract_host(request_url).unwrap_or("").to_string();
        let base_host = extract_host(base_url).unwrap_or("").to_string();
        let request_subdomains = host_suffixes(&request_host);

        Self {
            request_url: request_url.to_string(),
            request_host,
            base_host,
            request_subdomains,
            resource_type,
        }
    }
}

// =============================================================================
// Matcher
// =============================================================================

/// Read-only matcher over one filter trie.
pub struct UrlMatcher<'a> {
    trie: &'a FilterTrie,
}

impl<'a> UrlMatcher<'a> {
    pub fn new(trie: &'a FilterTrie) -> Self {
        Self { trie }
    }

    /// Decide the request: walk the trie against every suffix of the URL.
    ///
    /// The first exception observed anywhere wins and is returned
    /// immediately; otherwise the most recent block result survives.
    pub fn check_url(&self, ctx: &RequestContext) -> CheckResult {
        let mut result = CheckResult::default();
        let url = ctx.request_url.as_str();

        for (start, _) in url.char_indices() {
            let current = self.check_substring(self.trie.root(), &url[start..], String::new(), ctx);

            if current.is_exception {
                return current;
            }
            if current.is_blocked {
                result = current;
            }
        }

        result
    }

    /// Descend the trie against one URL slice.
    ///
    /// `matched` accumulates the URL text consumed so far, so it is always a
    /// literal substring of the request URL. Separator edges consume exactly
    /// one boundary character; wildcard edges branch over every split of the
    /// remaining slice.
    fn check_substring(
        &self,
        start_node: &TrieNode,
        tail: &str,
        mut matched: String,
        ctx: &RequestContext,
    ) -> CheckResult {
        let mut result = CheckResult::default();
        let mut node = start_node;
        let mut pos = 0;

        while let Some(c) = tail[pos..].chars().next() {
            let evaluated = evaluate_node_rules(node, &matched, ctx);
            if evaluated.is_exception {
                return evaluated;
            }
            if evaluated.is_blocked {
                result = evaluated;
            }

            let mut next_node = None;

            for child in &node.children {
                if child.value == '*' {
                    let remaining = &tail[pos..];

                    for skip in 0..=remaining.len() {
                        if !remaining.is_char_boundary(skip) {
                            continue;
                        }

                        let mut branch_matched = matched.clone();
                        branch_matched.push_str(&remaining[..skip]);

                        let branch =
                            self.check_substring(child, &remaining[skip..], branch_matched, ctx);
                        if branch.is_exception {
                            return branch;
                        }
                        if branch.is_blocked {
                            result = branch;
                        }
                    }
                }

                if child.value == '^' && is_separator_match(c) {
                    let mut branch_matched = matched.clone();
                    branch_matched.push(c);

                    let branch =
                        self.check_substring(child, &tail[pos + c.len_utf8()..], branch_matched, ctx);
                    if branch.is_exception {
                        return branch;
                    }
                    if branch.is_blocked {
                        result = branch;
                    }
                }

                if child.value == c {
                    next_node = Some(child);
                    break;
                }
            }

            match next_node {
                Some(next) => {
                    node = next;
                    matched.push(c);
                    pos += c.len_utf8();
                }
                None => return result,
            }
        }

        // URL slice fully consumed: evaluate the terminal node, then any
        // immediate separator child (a trailing `^` also matches end-of-URL).
        let evaluated = evaluate_node_rules(node, &matched, ctx);
        if evaluated.is_exception {
            return evaluated;
        }
        if evaluated.is_blocked {
            result = evaluated;
        }

        for child in &node.children {
            if child.value != '^' {
                continue;
            }

            let evaluated = evaluate_node_rules(child, &matched, ctx);
            if evaluated.is_exception {
                return evaluated;
            }
            if evaluated.is_blocked {
                result = evaluated;
            }
        }

        result
    }
}

// =============================================================================
// Rule Evaluation
// =============================================================================

/// Evaluate every rule attached to a node, in insertion order.
fn evaluate_node_rules(node: &TrieNode, matched: &str, ctx: &RequestContext) -> CheckResult {
    let mut result = CheckResult::default();

    for rule in &node.rules {
        let evaluated = check_rule_match(rule, matched, ctx);

        if evaluated.is_exception {
            return evaluated;
        }
        if evaluated.is_blocked {
            result = evaluated;
        }
    }

    result
}

/// Evaluate one rule against the accumulated pattern text.
///
/// The checks run in a fixed order: pattern match by mode, domain anchor,
/// domain scope, third-party polarity, resource-type filtering, exception
/// polarity.
fn check_rule_match(rule: &FilterRule, matched: &str, ctx: &RequestContext) -> CheckResult {
    let pattern_applies = match rule.match_mode {
        RuleMatch::Start => ctx.request_url.starts_with(matched),
        RuleMatch::End => ctx.request_url.ends_with(matched),
        RuleMatch::Exact => ctx.request_url == matched,
        RuleMatch::Contains => ctx.request_url.contains(matched),
    };
    if !pattern_applies {
        return CheckResult::default();
    }

    if rule.needs_domain_anchor {
        let host_part = &matched[..host_boundary_end(matched)];
        if !ctx.request_subdomains.iter().any(|s| s == host_part) {
            return CheckResult::default();
        }
    }

    let has_blocked_domains = !rule.blocked_domains.is_empty();
    let has_allowed_domains = !rule.allowed_domains.is_empty();
    let mut is_blocked = true;

    if has_blocked_domains {
        is_blocked = rule
            .blocked_domains
            .iter()
            .any(|domain| ctx.base_host.contains(domain.as_str()));
        if !is_blocked {
            return CheckResult::default();
        }
    }

    if has_allowed_domains
        && rule
            .allowed_domains
            .iter()
            .any(|domain| ctx.base_host.contains(domain.as_str()))
    {
        is_blocked = false;
    }

    if rule.options.contains(RuleOptions::THIRD_PARTY)
        || rule.exceptions.contains(RuleOptions::THIRD_PARTY)
    {
        let is_first_party = ctx.base_host.is_empty()
            || ctx.request_subdomains.iter().any(|s| s == &ctx.base_host);

        if is_first_party {
            is_blocked = rule.exceptions.contains(RuleOptions::THIRD_PARTY);
        } else if !has_blocked_domains && !has_allowed_domains {
            is_blocked = rule.options.contains(RuleOptions::THIRD_PARTY);
        }
    }

    let type_options = rule.options.intersection(RuleOptions::TYPE_MASK);
    let type_exceptions = rule.exceptions.intersection(RuleOptions::TYPE_MASK);

    if !type_options.is_empty() || !type_exceptions.is_empty() {
        for (resource_type, option) in RESOURCE_TYPE_OPTIONS {
            let supports_negation =
                option != RuleOptions::WEBSOCKET && option != RuleOptions::POPUP;

            if !rule.options.contains(option)
                && !(supports_negation && rule.exceptions.contains(option))
            {
                continue;
            }

            if ctx.resource_type == resource_type {
                is_blocked = is_blocked && rule.options.contains(option);
            } else if supports_negation {
                is_blocked = is_blocked && rule.exceptions.contains(option);
            } else {
                is_blocked = false;
            }
        }
    } else if ctx.resource_type == ResourceType::Popup {
        // Popups must be opted in by an explicit type bit.
        is_blocked = false;
    }

    if !is_blocked {
        return CheckResult::default();
    }

    let mut result = CheckResult {
        rule: Some(rule.raw.clone()),
        ..CheckResult::default()
    };

    if rule.is_exception {
        result.is_exception = true;

        if rule.options.contains(RuleOptions::ELEMHIDE) {
            result.cosmetic_mode_override = Some(CosmeticFiltersMode::NoFilters);
        } else if rule.options.contains(RuleOptions::GENERICHIDE) {
            result.cosmetic_mode_override = Some(CosmeticFiltersMode::DomainOnlyFilters);
        }
    } else {
        result.is_blocked = true;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(pattern: &str) -> (String, FilterRule) {
        (pattern.to_string(), FilterRule::new(pattern))
    }

    fn build(entries: Vec<(String, FilterRule)>) -> FilterTrie {
        let mut trie = FilterTrie::new();
        for (pattern, rule) in entries {
            trie.insert(&pattern, rule);
        }
        trie
    }

    fn check(trie: &FilterTrie, base: &str, url: &str, rtype: ResourceType) -> CheckResult {
        let ctx = RequestContext::new(base, url, rtype);
        UrlMatcher::new(trie).check_url(&ctx)
    }

    #[test]
    fn substring_rule_blocks_any_containing_url() {
        let trie = build(vec![block("banner")]);

        let result = check(
            &trie,
            "http://site.test/",
            "http://cdn.test/img/banner.gif",
            ResourceType::Image,
        );
        assert!(result.is_blocked);
        assert_eq!(result.rule.as_deref(), Some("banner"));

        let result = check(
            &trie,
            "http://site.test/",
            "http://cdn.test/img/logo.gif",
            ResourceType::Image,
        );
        assert!(!result.is_blocked);
    }

    #[test]
    fn separator_matches_boundary_characters_only() {
        let trie = build(vec![block("a^b")]);

        for url in ["http://t/a/b", "http://t/x?a=b", "http://t/a?b"] {
            let result = check(&trie, "", url, ResourceType::Other);
            assert!(result.is_blocked, "expected match for {url}");
        }

        for url in ["http://t/a1b", "http://t/aab", "http://t/a.b", "http://t/a_b"] {
            let result = check(&trie, "", url, ResourceType::Other);
            assert!(!result.is_blocked, "expected no match for {url}");
        }
    }

    #[test]
    fn separator_matches_end_of_url() {
        let mut rule = FilterRule::new("||ads.test^");
        rule.needs_domain_anchor = true;
        let trie = build(vec![("ads.test^".to_string(), rule)]);

        let result = check(&trie, "", "http://ads.test", ResourceType::Other);
        assert!(result.is_blocked);
    }

    #[test]
    fn domain_anchor_requires_host_suffix() {
        let mut rule = FilterRule::new("||ads.example.com^");
        rule.needs_domain_anchor = true;
        let trie = build(vec![("ads.example.com^".to_string(), rule)]);

        let result = check(
            &trie,
            "http://site.test/",
            "http://ads.example.com/banner.gif",
            ResourceType::Image,
        );
        assert!(result.is_blocked);
        assert_eq!(result.rule.as_deref(), Some("||ads.example.com^"));

        // Same pattern text inside the path must not match the anchor.
        let result = check(
            &trie,
            "http://site.test/",
            "http://other.test/ads.example.com/banner.gif",
            ResourceType::Image,
        );
        assert!(!result.is_blocked);
    }

    #[test]
    fn exception_overrides_block_anywhere_in_the_walk() {
        let mut blocked = FilterRule::new("||ads.example.com^");
        blocked.needs_domain_anchor = true;

        let mut allowed = FilterRule::new("@@||ads.example.com/ok^");
        allowed.needs_domain_anchor = true;
        allowed.is_exception = true;

        let trie = build(vec![
            ("ads.example.com^".to_string(), blocked),
            ("ads.example.com/ok^".to_string(), allowed),
        ]);

        let result = check(
            &trie,
            "http://site.test/",
            "http://ads.example.com/ok/pixel",
            ResourceType::Image,
        );
        assert!(result.is_exception);
        assert!(!result.is_blocked);
        assert_eq!(result.rule.as_deref(), Some("@@||ads.example.com/ok^"));

        let result = check(
            &trie,
            "http://site.test/",
            "http://ads.example.com/banner.gif",
            ResourceType::Image,
        );
        assert!(result.is_blocked);
    }

    #[test]
    fn wildcard_explores_every_split() {
        let trie = build(vec![block("trackers/*.js")]);

        let result = check(
            &trie,
            "",
            "http://x.test/trackers/deep/path/lib.js",
            ResourceType::Script,
        );
        assert!(result.is_blocked);

        let result = check(&trie, "", "http://x.test/trackers/lib.css", ResourceType::Script);
        assert!(!result.is_blocked);
    }

    #[test]
    fn start_and_end_anchors_prune_matches() {
        let mut start = FilterRule::new("|http://ads.");
        start.match_mode = RuleMatch::Start;
        let trie = build(vec![("http://ads.".to_string(), start)]);

        assert!(check(&trie, "", "http://ads.test/x", ResourceType::Other).is_blocked);
        assert!(!check(&trie, "", "http://site.test/http://ads.", ResourceType::Other).is_blocked);

        let mut end = FilterRule::new("banner.gif|");
        end.match_mode = RuleMatch::End;
        let trie = build(vec![("banner.gif".to_string(), end)]);

        assert!(check(&trie, "", "http://x/banner.gif", ResourceType::Other).is_blocked);
        assert!(!check(&trie, "", "http://x/banner.gif?r=1", ResourceType::Other).is_blocked);
    }

    #[test]
    fn resource_type_option_restricts_matches() {
        let mut rule = FilterRule::new("/trackers/*$script");
        rule.options = RuleOptions::SCRIPT;
        let trie = build(vec![("/trackers/".to_string(), rule)]);

        let result = check(&trie, "", "http://x.test/trackers/a/b.js", ResourceType::Script);
        assert!(result.is_blocked);

        let result = check(&trie, "", "http://x.test/trackers/a/b.js", ResourceType::Image);
        assert!(!result.is_blocked);
    }

    #[test]
    fn negated_resource_type_suppresses_matches() {
        let mut rule = FilterRule::new("/widget/$~image");
        rule.exceptions = RuleOptions::IMAGE;
        let trie = build(vec![("/widget/".to_string(), rule)]);

        let result = check(&trie, "", "http://x.test/widget/a.png", ResourceType::Image);
        assert!(!result.is_blocked);

        let result = check(&trie, "", "http://x.test/widget/a.js", ResourceType::Script);
        assert!(result.is_blocked);
    }

    #[test]
    fn third_party_option_uses_request_party() {
        let mut rule = FilterRule::new("||cdn.test^$third-party");
        rule.needs_domain_anchor = true;
        rule.options = RuleOptions::THIRD_PARTY;
        let trie = build(vec![("cdn.test^".to_string(), rule)]);

        let result = check(&trie, "http://cdn.test/", "http://cdn.test/a", ResourceType::Other);
        assert!(!result.is_blocked);

        let result = check(&trie, "http://site.test/", "http://cdn.test/a", ResourceType::Other);
        assert!(result.is_blocked);
    }

    #[test]
    fn domain_scope_limits_rule_to_listed_pages() {
        let mut rule = FilterRule::new("/sponsored/$domain=news.test|~blog.news.test");
        rule.blocked_domains = vec!["news.test".to_string()];
        rule.allowed_domains = vec!["blog.news.test".to_string()];
        let trie = build(vec![("/sponsored/".to_string(), rule)]);

        let result = check(&trie, "http://news.test/", "http://x/sponsored/a", ResourceType::Other);
        assert!(result.is_blocked);

        let result = check(&trie, "http://other.test/", "http://x/sponsored/a", ResourceType::Other);
        assert!(!result.is_blocked);

        let result = check(
            &trie,
            "http://blog.news.test/",
            "http://x/sponsored/a",
            ResourceType::Other,
        );
        assert!(!result.is_blocked);
    }

    #[test]
    fn popups_require_explicit_opt_in() {
        let trie = build(vec![block("ads.")]);
        let result = check(&trie, "http://site.test/", "http://ads.test/", ResourceType::Popup);
        assert!(!result.is_blocked);

        let mut rule = FilterRule::new("ads.$popup");
        rule.options = RuleOptions::POPUP;
        let trie = build(vec![("ads.".to_string(), rule)]);
        let result = check(&trie, "http://site.test/", "http://ads.test/", ResourceType::Popup);
        assert!(result.is_blocked);
    }

    #[test]
    fn elemhide_exception_overrides_cosmetic_mode() {
        let mut rule = FilterRule::new("@@||site.test^$elemhide");
        rule.needs_domain_anchor = true;
        rule.is_exception = true;
        rule.options = RuleOptions::ELEMHIDE;
        let trie = build(vec![("site.test^".to_string(), rule)]);

        let result = check(&trie, "http://site.test/", "http://site.test/page", ResourceType::Other);
        assert!(result.is_exception);
        assert_eq!(result.cosmetic_mode_override, Some(CosmeticFiltersMode::NoFilters));
    }

    #[test]
    fn empty_trie_passes_everything() {
        let trie = FilterTrie::new();
        let result = check(&trie, "http://a/", "http://b/c", ResourceType::Script);
        assert_eq!(result, CheckResult::default());
    }
}
