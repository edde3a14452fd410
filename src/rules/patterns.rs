//! Glob pattern matching for rule paths
//!
//! Shell-glob semantics applied to the full request path: `*` matches any
//! run of characters (slashes included), `?` matches exactly one character,
//! `[seq]` and `[!seq]` match one character in or not in the set. Everything
//! else is literal. An unterminated `[` is treated as a literal bracket.

use crate::error::RuleError;
use regex::Regex;
use std::fmt;

/// Compiled glob pattern
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    kind: PatternKind,
}

#[derive(Debug, Clone)]
enum PatternKind {
    /// No wildcard: the path must equal the pattern
    Literal,
    Regex(Regex),
}

impl GlobPattern {
    /// Compile a glob pattern
    pub fn new(pattern: &str) -> Result<Self, RuleError> {
        if !has_wildcard(pattern) {
            return Ok(Self {
                source: pattern.to_string(),
                kind: PatternKind::Literal,
            });
        }

        let regex = Regex::new(&translate(pattern)).map_err(|e| RuleError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: pattern.to_string(),
            kind: PatternKind::Regex(regex),
        })
    }

    /// Check whether the whole path matches
    pub fn matches(&self, path: &str) -> bool {
        match &self.kind {
            PatternKind::Literal => self.source == path,
            PatternKind::Regex(regex) => regex.is_match(path),
        }
    }

    /// The pattern as written in the rule source
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether this pattern contains no wildcard
    pub fn is_literal(&self) -> bool {
        matches!(self.kind, PatternKind::Literal)
    }
}

impl PartialEq for GlobPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for GlobPattern {}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn has_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Translate a glob into an anchored regex
fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2 + 8);
    out.push_str("(?s)^");

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => {
                // Consecutive stars are equivalent to one
                while i < chars.len() && chars[i] == '*' {
                    i += 1;
                }
                out.push_str(".*");
            }
            '?' => out.push('.'),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push_str(&translate_class(&chars[i..end]));
                    i = end + 1;
                }
                None => out.push_str("\\["),
            },
            other => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(other.encode_utf8(&mut buf)));
            }
        }
    }

    out.push('$');
    out
}

/// Find the index of the `]` closing a class that starts at `start`
///
/// A `]` directly after `[` or `[!` is a member, not the terminator.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start;
    if j < chars.len() && chars[j] == '!' {
        j += 1;
    }
    if j < chars.len() && chars[j] == ']' {
        j += 1;
    }
    while j < chars.len() && chars[j] != ']' {
        j += 1;
    }
    (j < chars.len()).then_some(j)
}

fn translate_class(body: &[char]) -> String {
    let (negated, members) = match body.split_first() {
        Some((&'!', rest)) => (true, rest),
        _ => (false, body),
    };

    let mut out = String::from("[");
    if negated {
        out.push('^');
    }
    for &c in members {
        match c {
            '\\' | '[' | ']' | '^' | '&' | '~' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push(']');
    out
}
