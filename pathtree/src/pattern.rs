// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Route pattern syntax.
//!
//! A pattern is tokenized the same way the tree consumes it: a `/` is a token of its own, any
//! other token extends up to the next `/`. A token starting with [`WILDCARD_MARKER`] matches one
//! path segment and binds it to the name following the marker. A token starting with
//! [`CATCH_ALL_MARKER`] matches the entire remaining path and must be the last token. Marker
//! characters are only meaningful as the first character of a token, anywhere else they make the
//! pattern invalid.

use serde::Deserialize;
use std::fmt::Debug;
use std::str::FromStr;

use crate::RouteError;

/// Character separating path segments
pub(crate) const SEPARATOR: u8 = b'/';

/// Marker starting a named single-segment wildcard token
pub(crate) const WILDCARD_MARKER: u8 = b':';

/// Marker starting a terminal catch-all token
pub(crate) const CATCH_ALL_MARKER: u8 = b'*';

/// Splits off the next token of a pattern or path.
///
/// Returns the token and the number of bytes it occupies. A separator is always a token of its
/// own, anything else extends up to the next separator. Note that a catch-all token is the
/// exception to this rule, the caller is expected to recognize it by its first character and
/// consume the entire remaining input.
pub(crate) fn next_token(input: &[u8]) -> (&[u8], usize) {
    if input.first() == Some(&SEPARATOR) {
        (&input[..1], 1)
    } else if let Some(pos) = input.iter().position(|b| *b == SEPARATOR) {
        (&input[..pos], pos)
    } else {
        (input, input.len())
    }
}

/// A validated route pattern
///
/// Parsing only performs the syntactic checks, e.g. `"/user/:id".parse::<Pattern>()`. Conflicts
/// with other routes such as duplicate or ambiguous registrations are only detected when the
/// pattern is added to a tree.
///
/// This type deserializes from a plain string, so that route tables can be listed in
/// configuration files.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Pattern {
    raw: String,
}

impl Pattern {
    /// Returns the pattern as originally written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Debug for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Pattern {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut remaining = s.as_bytes();
        while !remaining.is_empty() {
            let (token, token_end) = next_token(remaining);
            match token.first() {
                Some(&CATCH_ALL_MARKER) => {
                    if token.len() < 2 {
                        return Err(RouteError::invalid(s, "empty catch-all name"));
                    }
                    if token_end < remaining.len() {
                        return Err(RouteError::invalid(s, "catch-all must be the final token"));
                    }
                }
                Some(&WILDCARD_MARKER) => {
                    if token.len() < 2 {
                        return Err(RouteError::invalid(s, "empty wildcard name"));
                    }
                }
                _ => {
                    if token
                        .iter()
                        .any(|b| *b == WILDCARD_MARKER || *b == CATCH_ALL_MARKER)
                    {
                        return Err(RouteError::invalid(
                            s,
                            "marker character in the middle of a token",
                        ));
                    }
                }
            }
            remaining = &remaining[token_end..];
        }

        Ok(Self { raw: s.to_owned() })
    }
}

impl TryFrom<String> for Pattern {
    type Error = RouteError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(pattern: &str) -> Result<Pattern, RouteError> {
        pattern.parse()
    }

    #[test]
    fn tokenization() {
        assert_eq!(next_token(b"/abc/def"), (&b"/"[..], 1));
        assert_eq!(next_token(b"abc/def"), (&b"abc"[..], 3));
        assert_eq!(next_token(b"abc"), (&b"abc"[..], 3));
        assert_eq!(next_token(b""), (&b""[..], 0));
    }

    #[test]
    fn accepts_valid_patterns() {
        for pattern in [
            "",
            "/",
            "/foobar",
            "/user/:id",
            "/user/:id/edit",
            "/files/*path",
            "/*everything",
            "/a/b/c/d",
            "/:one/:two/*rest",
        ] {
            assert_eq!(parse(pattern).map(|p| p.as_str().to_owned()), Ok(pattern.to_owned()));
        }
    }

    #[test]
    fn rejects_mid_token_markers() {
        for pattern in ["/user:id", "/user/i:d", "/fi*les", "/files/a*"] {
            assert!(matches!(
                parse(pattern),
                Err(RouteError::InvalidPattern { .. })
            ));
        }
    }

    #[test]
    fn rejects_non_terminal_catch_all() {
        for pattern in ["/files/*path/extra", "/*all/", "/*all/x"] {
            assert!(matches!(
                parse(pattern),
                Err(RouteError::InvalidPattern { .. })
            ));
        }
    }

    #[test]
    fn rejects_empty_names() {
        for pattern in ["/user/:", "/files/*", "/:/x"] {
            assert!(matches!(
                parse(pattern),
                Err(RouteError::InvalidPattern { .. })
            ));
        }
    }

    #[test]
    fn deserializes_from_yaml() {
        let patterns: Vec<Pattern> =
            serde_yaml::from_str("- /user/:id\n- /files/*path\n- /foobar\n").unwrap();
        assert_eq!(
            patterns.iter().map(Pattern::as_str).collect::<Vec<_>>(),
            ["/user/:id", "/files/*path", "/foobar"]
        );

        let result: Result<Vec<Pattern>, _> = serde_yaml::from_str("- /user:id\n");
        assert!(result.is_err());
    }
}
