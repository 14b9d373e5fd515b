//! Cosmetic (CSS-selector) filter tables
//!
//! Three containers per profile: a flat list of global selectors (`##` at
//! line start), a multimap from domain to selector for scoped `##` rules
//! and a multimap for scoped `#@#` exceptions. Retrieval is by exact key
//! against the page's host suffixes; no URL pattern matching happens here.

use std::collections::HashMap;

use crate::types::CosmeticFiltersResult;

#[derive(Debug, Default)]
pub struct CosmeticFilters {
    global_rules: Vec<String>,
    domain_rules: HashMap<String, Vec<String>>,
    domain_exceptions: HashMap<String, Vec<String>>,
}

impl CosmeticFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_global_rule(&mut self, selector: impl Into<String>) {
        self.global_rules.push(selector.into());
    }

    pub fn add_domain_rule(&mut self, domain: &str, selector: &str) {
        self.domain_rules
            .entry(domain.to_string())
            .or_default()
            .push(selector.to_string());
    }

    pub fn add_domain_exception(&mut self, domain: &str, selector: &str) {
        self.domain_exceptions
            .entry(domain.to_string())
            .or_default()
            .push(selector.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.global_rules.is_empty()
            && self.domain_rules.is_empty()
            && self.domain_exceptions.is_empty()
    }

    /// Selectors and exceptions applicable to a page, given its host
    /// suffixes. Global selectors are skipped when `domain_only` is set.
    pub fn filters_for(&self, domains: &[String], domain_only: bool) -> CosmeticFiltersResult {
        let mut result = CosmeticFiltersResult::default();

        if !domain_only {
            result.rules = self.global_rules.clone();
        }

        for domain in domains {
            if let Some(selectors) = self.domain_rules.get(domain) {
                result.rules.extend(selectors.iter().cloned());
            }
            if let Some(selectors) = self.domain_exceptions.get(domain) {
                result.exceptions.extend(selectors.iter().cloned());
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains(list: &[&str]) -> Vec<String> {
        list.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn global_rules_are_skipped_when_domain_only() {
        let mut filters = CosmeticFilters::new();
        filters.add_global_rule(".ad-banner");

        let result = filters.filters_for(&domains(&["page.test"]), false);
        assert_eq!(result.rules, vec![".ad-banner"]);

        let result = filters.filters_for(&domains(&["page.test"]), true);
        assert!(result.rules.is_empty());
    }

    #[test]
    fn domain_rules_match_any_listed_suffix() {
        let mut filters = CosmeticFilters::new();
        filters.add_domain_rule("news.test", ".sponsored");
        filters.add_domain_exception("blog.news.test", ".sponsored");

        let result = filters.filters_for(&domains(&["blog.news.test", "news.test", "test"]), false);
        assert_eq!(result.rules, vec![".sponsored"]);
        assert_eq!(result.exceptions, vec![".sponsored"]);

        let result = filters.filters_for(&domains(&["other.test", "test"]), false);
        assert!(result.rules.is_empty());
        assert!(result.exceptions.is_empty());
    }
}
