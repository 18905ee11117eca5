//! Tool name patterns: exact names or `*` globs

use regex::Regex;

use crate::error::ProxyError;

const WILDCARD: char = '*';

/// Check whether `name` matches `pattern`.
///
/// Without a `*` this is plain string equality. With one, `*` matches any run
/// of characters (including none) and everything else is literal. The match is
/// anchored at both ends and case-sensitive.
pub fn matches(name: &str, pattern: &str) -> bool {
    match ToolPattern::new(pattern) {
        Ok(compiled) => compiled.is_match(name),
        // Only reachable when the regex size limit is hit; fall back to equality
        Err(_) => name == pattern,
    }
}

/// A single compiled pattern
#[derive(Debug, Clone)]
pub enum ToolPattern {
    Exact(String),
    Glob(Regex),
}

impl ToolPattern {
    pub fn new(pattern: &str) -> Result<Self, ProxyError> {
        if !pattern.contains(WILDCARD) {
            return Ok(ToolPattern::Exact(pattern.to_string()));
        }

        let body = pattern
            .split(WILDCARD)
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("^(?s:{})$", body)).map_err(|source| {
            ProxyError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;

        Ok(ToolPattern::Glob(regex))
    }

    pub fn is_match(&self, name: &str) -> bool {
        match self {
            ToolPattern::Exact(exact) => exact == name,
            ToolPattern::Glob(regex) => regex.is_match(name),
        }
    }
}

/// Patterns compiled once per run
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<ToolPattern>,
}

impl PatternSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ProxyError> {
        let patterns = patterns
            .iter()
            .map(|p| ToolPattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// True if any pattern matches
    pub fn matches_any(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(name))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
