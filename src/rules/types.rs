//! Rule types
//!
//! Core types of the ordered rule table.

use crate::error::RuleError;
use crate::rules::patterns::GlobPattern;
use serde::Serialize;
use std::fmt;

/// Prefix in the role column that marks a delegated rule
pub const DELEGATION_MARKER: char = '!';

/// What a matching rule does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Deny,
}

impl RuleAction {
    /// Parse an action column; only `allow` (any case) allows
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("allow") {
            RuleAction::Allow
        } else {
            RuleAction::Deny
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Allow => "allow",
            RuleAction::Deny => "deny",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a rule applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleTarget {
    /// No role column: applies to every caller
    Open,
    /// Caller must hold this (lower-case) role
    Role(String),
    /// Hand the decision to the service at `host[:port]`
    Delegate(String),
}

impl RuleTarget {
    /// Role target with the name normalized to lower case
    pub fn role(name: &str) -> Self {
        RuleTarget::Role(name.trim().to_lowercase())
    }

    /// Delegation target (`host[:port]`, no marker)
    pub fn delegate(target: &str) -> Self {
        RuleTarget::Delegate(target.trim().to_string())
    }

    /// Parse the optional third column of a rule line
    pub fn from_column(column: Option<&str>, line: usize) -> Result<Self, RuleError> {
        let Some(column) = column.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(RuleTarget::Open);
        };

        match column.strip_prefix(DELEGATION_MARKER) {
            Some(target) => {
                let target = target.trim();
                if target.is_empty() {
                    Err(RuleError::EmptyDelegationTarget { line })
                } else {
                    Ok(RuleTarget::delegate(target))
                }
            }
            None => Ok(RuleTarget::role(column)),
        }
    }

    pub fn is_delegated(&self) -> bool {
        matches!(self, RuleTarget::Delegate(_))
    }
}

impl fmt::Display for RuleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleTarget::Open => f.write_str("*"),
            RuleTarget::Role(role) => f.write_str(role),
            RuleTarget::Delegate(target) => write!(f, "{}{}", DELEGATION_MARKER, target),
        }
    }
}

/// A single authorization rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub action: RuleAction,
    pub pattern: GlobPattern,
    pub target: RuleTarget,
    /// 1-based line in the rule source, 0 when built in code
    pub line: usize,
}

impl Rule {
    pub fn new(action: RuleAction, pattern: &str, target: RuleTarget) -> Result<Self, RuleError> {
        Ok(Self {
            action,
            pattern: GlobPattern::new(pattern.trim())?,
            target,
            line: 0,
        })
    }

    pub fn allow(pattern: &str, target: RuleTarget) -> Result<Self, RuleError> {
        Self::new(RuleAction::Allow, pattern, target)
    }

    pub fn deny(pattern: &str, target: RuleTarget) -> Result<Self, RuleError> {
        Self::new(RuleAction::Deny, pattern, target)
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    pub fn matches(&self, path: &str) -> bool {
        self.pattern.matches(path)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            RuleTarget::Open => write!(f, "{}, {}", self.action, self.pattern),
            target => write!(f, "{}, {}, {}", self.action, self.pattern, target),
        }
    }
}

/// Ordered, immutable rule table
///
/// File order is the only precedence: the first rule whose pattern matches
/// the full path decides.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
    source: Option<String>,
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            source: None,
        }
    }

    /// A table with no rules: every decision is a deny
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// First rule whose pattern matches the path
    pub fn find_match(&self, path: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Where the table was loaded from, if anywhere
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse() {
        assert_eq!(RuleAction::parse("allow"), RuleAction::Allow);
        assert_eq!(RuleAction::parse(" ALLOW "), RuleAction::Allow);
        assert_eq!(RuleAction::parse("deny"), RuleAction::Deny);
        assert_eq!(RuleAction::parse("permit"), RuleAction::Deny);
        assert_eq!(RuleAction::parse(""), RuleAction::Deny);
    }

    #[test]
    fn test_target_from_column() {
        assert_eq!(RuleTarget::from_column(None, 1).unwrap(), RuleTarget::Open);
        assert_eq!(
            RuleTarget::from_column(Some("   "), 1).unwrap(),
            RuleTarget::Open
        );
        assert_eq!(
            RuleTarget::from_column(Some(" Admin "), 1).unwrap(),
            RuleTarget::Role("admin".into())
        );
        assert_eq!(
            RuleTarget::from_column(Some("!photos-svc:8000"), 1).unwrap(),
            RuleTarget::Delegate("photos-svc:8000".into())
        );
        assert_eq!(
            RuleTarget::from_column(Some("!"), 4).unwrap_err(),
            RuleError::EmptyDelegationTarget { line: 4 }
        );
    }

    #[test]
    fn test_is_delegated() {
        assert!(RuleTarget::delegate(" photos-svc:8000 ").is_delegated());
        assert!(!RuleTarget::Open.is_delegated());
        assert!(!RuleTarget::role("admin").is_delegated());
    }

    #[test]
    fn test_rule_display() {
        let rule = Rule::deny("/auth/authorize", RuleTarget::Open).unwrap();
        assert_eq!(rule.to_string(), "deny, /auth/authorize");

        let rule = Rule::allow("/photos/*", RuleTarget::delegate("photos:8000")).unwrap();
        assert_eq!(rule.to_string(), "allow, /photos/*, !photos:8000");
    }

    #[test]
    fn test_find_match_returns_first() {
        let table = RuleTable::new(vec![
            Rule::deny("/auth/authorize", RuleTarget::Open).unwrap(),
            Rule::allow("/auth/*", RuleTarget::role("public")).unwrap(),
        ]);

        let rule = table.find_match("/auth/authorize").unwrap();
        assert_eq!(rule.action, RuleAction::Deny);

        let rule = table.find_match("/auth/login").unwrap();
        assert_eq!(rule.action, RuleAction::Allow);

        assert!(table.find_match("/photos/x").is_none());
    }

    #[test]
    fn test_empty_table_matches_nothing() {
        let table = RuleTable::empty();
        assert!(table.is_empty());
        assert!(table.find_match("/").is_none());
        assert!(table.source().is_none());
    }
}
