//! Core type definitions for adshield
//!
//! These types describe one parsed filter rule and the inputs and outputs
//! of the matching engine.

// =============================================================================
// Rule Options (bit flags for the $options tail)
// =============================================================================

bitflags::bitflags! {
    /// Option vocabulary for network rules.
    ///
    /// A rule carries two of these sets: `options` (asserted tokens) and
    /// `exceptions` (`~`-negated tokens). WebSocket and Popup do not support
    /// negation and never enter the exception set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RuleOptions: u16 {
        const THIRD_PARTY = 1 << 0;
        const STYLESHEET = 1 << 1;
        const IMAGE = 1 << 2;
        const SCRIPT = 1 << 3;
        const OBJECT = 1 << 4;
        const OBJECT_SUBREQUEST = 1 << 5;
        const SUBDOCUMENT = 1 << 6;
        const XMLHTTPREQUEST = 1 << 7;
        const WEBSOCKET = 1 << 8;
        const POPUP = 1 << 9;
        const ELEMHIDE = 1 << 10;
        const GENERICHIDE = 1 << 11;

        /// Options that restrict a rule to specific resource types.
        const TYPE_MASK = Self::STYLESHEET.bits()
            | Self::IMAGE.bits()
            | Self::SCRIPT.bits()
            | Self::OBJECT.bits()
            | Self::OBJECT_SUBREQUEST.bits()
            | Self::SUBDOCUMENT.bits()
            | Self::XMLHTTPREQUEST.bits()
            | Self::WEBSOCKET.bits()
            | Self::POPUP.bits();
    }
}

// =============================================================================
// Resource Types
// =============================================================================

/// Resource classification assigned by the host to a network request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    StyleSheet,
    Script,
    Image,
    Object,
    ObjectSubrequest,
    XmlHttpRequest,
    WebSocket,
    Popup,
    Other,
}

impl ResourceType {
    /// Parse from the host's request type string.
    pub fn from_name(name: &str) -> Self {
        match name {
            "main_frame" => Self::MainFrame,
            "sub_frame" | "subdocument" => Self::SubFrame,
            "stylesheet" => Self::StyleSheet,
            "script" => Self::Script,
            "image" => Self::Image,
            "object" => Self::Object,
            "object_subrequest" => Self::ObjectSubrequest,
            "xmlhttprequest" => Self::XmlHttpRequest,
            "websocket" => Self::WebSocket,
            "popup" => Self::Popup,
            _ => Self::Other,
        }
    }

    /// Map to the option bit this type is filtered by, if any.
    ///
    /// Unmapped types (top-level documents, unclassified requests) are only
    /// subject to unrestricted rules.
    pub fn option_bit(self) -> Option<RuleOptions> {
        match self {
            Self::Image => Some(RuleOptions::IMAGE),
            Self::Script => Some(RuleOptions::SCRIPT),
            Self::StyleSheet => Some(RuleOptions::STYLESHEET),
            Self::Object => Some(RuleOptions::OBJECT),
            Self::XmlHttpRequest => Some(RuleOptions::XMLHTTPREQUEST),
            Self::SubFrame => Some(RuleOptions::SUBDOCUMENT),
            Self::Popup => Some(RuleOptions::POPUP),
            Self::ObjectSubrequest => Some(RuleOptions::OBJECT_SUBREQUEST),
            Self::WebSocket => Some(RuleOptions::WEBSOCKET),
            Self::MainFrame | Self::Other => None,
        }
    }
}

/// Resource types paired with the option bit they are filtered by, in the
/// order the matcher applies them.
pub const RESOURCE_TYPE_OPTIONS: [(ResourceType, RuleOptions); 9] = [
    (ResourceType::Image, RuleOptions::IMAGE),
    (ResourceType::Script, RuleOptions::SCRIPT),
    (ResourceType::StyleSheet, RuleOptions::STYLESHEET),
    (ResourceType::Object, RuleOptions::OBJECT),
    (ResourceType::XmlHttpRequest, RuleOptions::XMLHTTPREQUEST),
    (ResourceType::SubFrame, RuleOptions::SUBDOCUMENT),
    (ResourceType::Popup, RuleOptions::POPUP),
    (ResourceType::ObjectSubrequest, RuleOptions::OBJECT_SUBREQUEST),
    (ResourceType::WebSocket, RuleOptions::WEBSOCKET),
];

// =============================================================================
// Match Modes
// =============================================================================

/// How a rule's literal pattern is compared against the request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleMatch {
    /// Plain substring containment (the default).
    #[default]
    Contains,
    /// Leading `|`: the URL must start with the pattern.
    Start,
    /// Trailing `|`: the URL must end with the pattern.
    End,
    /// Both anchors: the URL must equal the pattern.
    Exact,
}

// =============================================================================
// Filter Rule
// =============================================================================

/// One parsed network-request filter line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule {
    /// The original line, echoed back in results.
    pub raw: String,
    pub match_mode: RuleMatch,
    /// Leading `@@`: a matching rule allows instead of blocks.
    pub is_exception: bool,
    /// Leading `||`: the pattern's host portion must be a suffix of the
    /// request host.
    pub needs_domain_anchor: bool,
    pub options: RuleOptions,
    pub exceptions: RuleOptions,
    /// `$domain=` entries without `~`: the rule applies only on these pages.
    pub blocked_domains: Vec<String>,
    /// `$domain=` entries with `~`: the rule never applies on these pages.
    pub allowed_domains: Vec<String>,
}

impl FilterRule {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            match_mode: RuleMatch::Contains,
            is_exception: false,
            needs_domain_anchor: false,
            options: RuleOptions::empty(),
            exceptions: RuleOptions::empty(),
            blocked_domains: Vec::new(),
            allowed_domains: Vec::new(),
        }
    }
}

// =============================================================================
// Cosmetic Filters Mode
// =============================================================================

/// Which cosmetic rules the host wants retained and served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CosmeticFiltersMode {
    NoFilters,
    DomainOnlyFilters,
    #[default]
    AllFilters,
}

// =============================================================================
// Results
// =============================================================================

/// Decision for one checked request.
///
/// Precedence is exception > block > pass: an exception result carries
/// `is_exception = true` and `is_blocked = false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckResult {
    /// The raw text of the rule that decided the request, if any.
    pub rule: Option<String>,
    pub is_blocked: bool,
    pub is_exception: bool,
    /// Set by `$elemhide` / `$generichide` exception rules to dial down
    /// cosmetic filtering for the page.
    pub cosmetic_mode_override: Option<CosmeticFiltersMode>,
}

/// Cosmetic selectors applicable to one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CosmeticFiltersResult {
    pub rules: Vec<String>,
    pub exceptions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_from_name() {
        assert_eq!(ResourceType::from_name("script"), ResourceType::Script);
        assert_eq!(ResourceType::from_name("sub_frame"), ResourceType::SubFrame);
        assert_eq!(ResourceType::from_name("xmlhttprequest"), ResourceType::XmlHttpRequest);
        assert_eq!(ResourceType::from_name("beacon"), ResourceType::Other);
    }

    #[test]
    fn test_option_bit_mapping() {
        assert_eq!(ResourceType::Image.option_bit(), Some(RuleOptions::IMAGE));
        assert_eq!(ResourceType::SubFrame.option_bit(), Some(RuleOptions::SUBDOCUMENT));
        assert_eq!(ResourceType::MainFrame.option_bit(), None);
        assert_eq!(ResourceType::Other.option_bit(), None);

        // Every mapped type appears exactly once in the evaluation order.
        for (resource_type, option) in RESOURCE_TYPE_OPTIONS {
            assert_eq!(resource_type.option_bit(), Some(option));
            assert!(RuleOptions::TYPE_MASK.contains(option));
        }
    }
}
