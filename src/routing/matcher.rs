//! Route matching logic.
//!
//! # Responsibilities
//! - Match path prefix (case-sensitive, literal)
//! - Rank matchers by specificity
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - No glob or regex to guarantee O(n) matching
//! - A path equal to the prefix matches (`/bg3/` matches `/bg3/`)

/// Matches the request path against a literal prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns true if `path` starts with this prefix.
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }

    /// Specificity used for ordering: longer prefixes win.
    pub fn specificity(&self) -> usize {
        self.prefix.len()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// True for the `/` catch-all.
    pub fn is_catch_all(&self) -> bool {
        self.prefix == "/"
    }

    /// Remove the prefix from `path`, keeping the result rooted at `/`.
    pub fn strip<'a>(&self, path: &'a str) -> std::borrow::Cow<'a, str> {
        let rest = path.strip_prefix(self.prefix.as_str()).unwrap_or(path);
        if rest.starts_with('/') {
            std::borrow::Cow::Borrowed(rest)
        } else {
            std::borrow::Cow::Owned(format!("/{}", rest))
        }
    }
}
