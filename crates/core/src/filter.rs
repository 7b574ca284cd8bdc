#![forbid(unsafe_code)]

use crate::model::ReportNode;
use crate::severity::SeveritySet;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MessageMatch {
    /// Case-sensitive equality.
    Exact,
    /// Containment after Unicode lowercase folding of both sides.
    #[default]
    Substring,
}

impl MessageMatch {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageMatch::Exact => "exact",
            MessageMatch::Substring => "substring",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exact" => Some(MessageMatch::Exact),
            "substring" => Some(MessageMatch::Substring),
            _ => None,
        }
    }
}

/// Predicate over leaf rows shared by filtered tree views and log listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LeafFilter {
    /// Empty means every severity, including leaves that carry none.
    pub severities: SeveritySet,
    pub message: Option<String>,
    pub message_match: MessageMatch,
}

impl LeafFilter {
    pub fn substring(message: Option<String>, severities: SeveritySet) -> Self {
        Self {
            severities,
            message: message.filter(|m| !m.is_empty()),
            message_match: MessageMatch::Substring,
        }
    }

    pub fn is_unfiltered(&self) -> bool {
        self.severities.is_empty() && self.message.is_none()
    }

    pub fn matches(&self, node: &ReportNode) -> bool {
        if !node.is_leaf {
            return false;
        }
        if !self.severities.is_empty() {
            match node.severity {
                Some(severity) if self.severities.contains(severity) => {}
                _ => return false,
            }
        }
        match self.message.as_deref() {
            None => true,
            Some(needle) => message_matches(&node.message, needle, self.message_match),
        }
    }
}

pub fn message_matches(message: &str, needle: &str, mode: MessageMatch) -> bool {
    match mode {
        MessageMatch::Exact => message == needle,
        MessageMatch::Substring => fold_case(message).contains(&fold_case(needle)),
    }
}

/// Case fold used by substring matching. SQL stores register it as a scalar function so both
/// sides of a filter fold the same way.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}
