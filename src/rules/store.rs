//! Rule source loading
//!
//! Reads the line-oriented rule file (`action, uri_pattern[, role]`) and
//! holds the current table behind an atomically swapped `Arc`.
//!
//! Loading fails soft: a missing or unreadable file yields an empty table,
//! and malformed lines are logged and skipped without aborting the load.

use crate::error::RuleError;
use crate::rules::types::{Rule, RuleAction, RuleTable, RuleTarget};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{error, info, warn};

/// Marker that starts a comment line
const COMMENT_MARKER: char = '#';

/// Parse a single rule line
///
/// Returns `Ok(None)` for blank and comment lines.
pub fn parse_rule_line(line: &str, line_no: usize) -> Result<Option<Rule>, RuleError> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split(',').collect();
    if fields[0].trim().starts_with(COMMENT_MARKER) {
        return Ok(None);
    }

    if fields.len() < 2 {
        return Err(RuleError::TooFewFields {
            line: line_no,
            fields: fields.len(),
        });
    }

    let pattern = fields[1].trim();
    if pattern.is_empty() {
        return Err(RuleError::EmptyPattern { line: line_no });
    }

    let action = RuleAction::parse(fields[0]);
    let target = RuleTarget::from_column(fields.get(2).copied(), line_no)?;

    Rule::new(action, pattern, target)
        .map(|rule| Some(rule.at_line(line_no)))
        .map_err(|e| e.at_line(line_no))
}

/// Parse a whole rule source, skipping malformed lines
pub fn parse_rules(text: &str, source: Option<&str>) -> RuleTable {
    let mut rules = Vec::new();

    for (index, line) in text.lines().enumerate() {
        match parse_rule_line(line, index + 1) {
            Ok(Some(rule)) => rules.push(rule),
            Ok(None) => {}
            Err(e) => warn!(
                source = source.unwrap_or("<inline>"),
                error = %e,
                "Skipping invalid rule"
            ),
        }
    }

    let table = RuleTable::new(rules);
    match source {
        Some(source) => table.with_source(source),
        None => table,
    }
}

/// Load rules from a file
///
/// Never fails: an unreadable file produces an empty table, which denies
/// every request.
pub fn load_rules(path: &Path) -> RuleTable {
    let source = path.display().to_string();

    match std::fs::read_to_string(path) {
        Ok(text) => {
            let table = parse_rules(&text, Some(&source));
            info!(rules = table.len(), source = %source, "Loaded authorization rules");
            table
        }
        Err(e) => {
            error!(
                source = %source,
                error = %e,
                "Authorization rules unavailable, denying all requests"
            );
            RuleTable::empty().with_source(source)
        }
    }
}

/// Holder of the current rule table
///
/// Readers take a snapshot (`Arc` clone) and evaluate against it without
/// holding the lock, so a reload never exposes a partially-built table.
pub struct RuleStore {
    path: Option<PathBuf>,
    table: RwLock<Arc<RuleTable>>,
}

impl RuleStore {
    /// Load the rule file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let table = load_rules(&path);
        Self {
            path: Some(path),
            table: RwLock::new(Arc::new(table)),
        }
    }

    /// Wrap an in-memory table (no backing file)
    pub fn from_table(table: RuleTable) -> Self {
        Self {
            path: None,
            table: RwLock::new(Arc::new(table)),
        }
    }

    fn read_table(&self) -> RwLockReadGuard<'_, Arc<RuleTable>> {
        self.table.read().unwrap_or_else(|poisoned| {
            warn!("rule table lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_table(&self) -> RwLockWriteGuard<'_, Arc<RuleTable>> {
        self.table.write().unwrap_or_else(|poisoned| {
            warn!("rule table lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Current table
    pub fn snapshot(&self) -> Arc<RuleTable> {
        Arc::clone(&self.read_table())
    }

    /// Install a new table
    pub fn replace(&self, table: RuleTable) {
        let table = Arc::new(table);
        *self.write_table() = table;
    }

    /// Re-read the backing file and swap it in, returning the new rule count
    ///
    /// The new table is fully parsed before the swap. Without a backing file
    /// the current table is kept.
    pub fn reload(&self) -> usize {
        match &self.path {
            Some(path) => {
                let table = load_rules(path);
                let count = table.len();
                self.replace(table);
                count
            }
            None => self.snapshot().len(),
        }
    }

    /// Path of the backing rule file
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Raw contents of the backing rule file
    pub fn raw_source(&self) -> std::io::Result<String> {
        match &self.path {
            Some(path) => std::fs::read_to_string(path),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "rule table has no backing file",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_variants() {
        let rule = parse_rule_line("allow, /photos/*, public", 1)
            .unwrap()
            .unwrap();
        assert_eq!(rule.action, RuleAction::Allow);
        assert_eq!(rule.pattern.as_str(), "/photos/*");
        assert_eq!(rule.target, RuleTarget::Role("public".into()));
        assert_eq!(rule.line, 1);

        let rule = parse_rule_line("deny, /auth/authorize", 2).unwrap().unwrap();
        assert_eq!(rule.action, RuleAction::Deny);
        assert_eq!(rule.target, RuleTarget::Open);

        let rule = parse_rule_line("allow, /auth/*,", 3).unwrap().unwrap();
        assert_eq!(rule.target, RuleTarget::Open);

        let rule = parse_rule_line("Allow,/photos/api/albums/*, !photos:8000", 4)
            .unwrap()
            .unwrap();
        assert_eq!(rule.action, RuleAction::Allow);
        assert_eq!(rule.target, RuleTarget::Delegate("photos:8000".into()));
    }

    #[test]
    fn test_parse_line_skips_blank_and_comments() {
        assert!(parse_rule_line("", 1).unwrap().is_none());
        assert!(parse_rule_line("   ", 1).unwrap().is_none());
        assert!(parse_rule_line("# action, pattern, role", 1).unwrap().is_none());
        assert!(parse_rule_line("  #allow, /x", 1).unwrap().is_none());
    }

    #[test]
    fn test_parse_line_errors() {
        assert_eq!(
            parse_rule_line("allow", 5).unwrap_err(),
            RuleError::TooFewFields { line: 5, fields: 1 }
        );
        assert_eq!(
            parse_rule_line("allow, , admin", 6).unwrap_err(),
            RuleError::EmptyPattern { line: 6 }
        );
        assert_eq!(
            parse_rule_line("allow, /x, !", 7).unwrap_err(),
            RuleError::EmptyDelegationTarget { line: 7 }
        );
    }

    #[test]
    fn test_parse_rules_keeps_order() {
        let table = parse_rules(
            "deny, /auth/authorize\n\
             allow, /auth/*, admin\n\
             allow, /auth*, public\n",
            None,
        );
        let patterns: Vec<_> = table.iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["/auth/authorize", "/auth/*", "/auth*"]);
    }

    #[test]
    fn test_store_from_table_reload_keeps_table() {
        let store = RuleStore::from_table(parse_rules("allow, /x", None));
        assert_eq!(store.reload(), 1);
        assert!(store.path().is_none());
        assert!(store.raw_source().is_err());
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let store = RuleStore::from_table(parse_rules("allow, /a\nallow, /b", None));
        let before = store.snapshot();

        store.replace(RuleTable::empty());

        assert_eq!(before.len(), 2);
        assert!(store.snapshot().is_empty());
    }
}
