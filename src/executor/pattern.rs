// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! String pattern matchers
//!
//! LIKE patterns and the STARTING_WITH / ENDING_WITH / CONTAINING family all
//! compile to a [`StringPattern`]. Simple shapes (`abc`, `abc%`, `%abc`,
//! `%abc%`) avoid the regex engine entirely.

use std::borrow::Cow;
use std::sync::Arc;

use crate::core::{Error, Result};

#[derive(Debug, Clone)]
enum Matcher {
    /// No wildcards
    Exact(Arc<str>),
    /// pattern%
    Prefix(Arc<str>),
    /// %pattern
    Suffix(Arc<str>),
    /// %pattern%
    Contains(Arc<str>),
    /// Anything else
    Regex(regex::Regex),
}

/// Compiled string matcher
#[derive(Debug, Clone)]
pub struct StringPattern {
    matcher: Matcher,
    ignore_case: bool,
}

impl StringPattern {
    /// Compile a SQL LIKE pattern (`%` any run, `_` one char, `\` escapes)
    pub fn like(pattern: &str, ignore_case: bool) -> Result<Self> {
        let pattern = fold(pattern, ignore_case);
        let leading = pattern.starts_with('%');
        let trailing = pattern.ends_with('%') && !pattern.ends_with("\\%");
        let inner = pattern.trim_start_matches('%');
        let inner = if trailing { inner.trim_end_matches('%') } else { inner };
        let has_inner_wildcards = inner.contains(['%', '_', '\\']);

        let matcher = if has_inner_wildcards {
            let flags = if ignore_case { "(?i)" } else { "" };
            let full = format!("^{}{}$", flags, like_to_regex(&pattern));
            let regex = regex::Regex::new(&full).map_err(|e| {
                Error::invalid_argument(format!("invalid LIKE pattern '{}': {}", pattern, e))
            })?;
            Matcher::Regex(regex)
        } else {
            let inner: Arc<str> = Arc::from(inner);
            match (leading, trailing) {
                (false, false) => Matcher::Exact(inner),
                (false, true) => Matcher::Prefix(inner),
                (true, false) => Matcher::Suffix(inner),
                (true, true) => Matcher::Contains(inner),
            }
        };
        Ok(Self {
            matcher,
            ignore_case,
        })
    }

    /// STARTING_WITH
    pub fn starting_with(prefix: &str, ignore_case: bool) -> Self {
        Self::literal(Matcher::Prefix, prefix, ignore_case)
    }

    /// ENDING_WITH
    pub fn ending_with(suffix: &str, ignore_case: bool) -> Self {
        Self::literal(Matcher::Suffix, suffix, ignore_case)
    }

    /// CONTAINING
    pub fn containing(needle: &str, ignore_case: bool) -> Self {
        Self::literal(Matcher::Contains, needle, ignore_case)
    }

    /// Case-insensitive equality
    pub fn equal_ignore_case(value: &str) -> Self {
        Self::literal(Matcher::Exact, value, true)
    }

    fn literal(make: fn(Arc<str>) -> Matcher, text: &str, ignore_case: bool) -> Self {
        Self {
            matcher: make(Arc::from(fold(text, ignore_case).as_ref())),
            ignore_case,
        }
    }

    /// Check if a string matches this pattern
    #[inline]
    pub fn matches(&self, s: &str) -> bool {
        let s = match (&self.matcher, self.ignore_case) {
            (Matcher::Regex(_), _) | (_, false) => Cow::Borrowed(s),
            (_, true) => Cow::Owned(s.to_lowercase()),
        };
        match &self.matcher {
            Matcher::Exact(p) => s.as_ref() == p.as_ref(),
            Matcher::Prefix(p) => s.starts_with(p.as_ref()),
            Matcher::Suffix(p) => s.ends_with(p.as_ref()),
            Matcher::Contains(p) => s.contains(p.as_ref()),
            Matcher::Regex(re) => re.is_match(&s),
        }
    }
}

fn fold(s: &str, ignore_case: bool) -> Cow<'_, str> {
    if ignore_case {
        Cow::Owned(s.to_lowercase())
    } else {
        Cow::Borrowed(s)
    }
}

/// Translate LIKE syntax to an (unanchored) regex body
fn like_to_regex(pattern: &str) -> String {
    let mut result = String::with_capacity(pattern.len() * 2);
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '%' => result.push_str(".*"),
            '_' => result.push('.'),
            '\\' => match chars.next() {
                Some(next) => result.push_str(&regex::escape(&next.to_string())),
                None => result.push_str("\\\\"),
            },
            other => result.push_str(&regex::escape(&other.to_string())),
        }
    }
    result
}
