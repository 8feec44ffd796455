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

//! This implements the radix tree underlying the router. The design goals are:
//!
//! * One tree node per path token or common token prefix, so that lookup cost depends on the
//!   length of the path rather than on the number of registered routes
//! * Static children are indexed by their first byte and kept sorted by descending priority, so
//!   that heavily used branches are probed first
//! * No mutation during lookup, the tree can be queried concurrently once built
//!
//! Each node exclusively owns its children. Splitting a common prefix replaces an owned child
//! with a new owned intermediary node that in turn owns the old child, so no shared references
//! are needed and lookup only ever walks downward.

use log::trace;
use std::fmt::Write;

use crate::pattern::{next_token, CATCH_ALL_MARKER, SEPARATOR, WILDCARD_MARKER};
use crate::RouteError;

/// Calculates the length of the longest common prefix of two byte strings.
pub(crate) fn common_prefix_length(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// A tree node consuming one path-segment fragment
///
/// The fragment is usually a complete token (a literal segment or a `/` separator) but may be a
/// shorter common prefix after a split inserted an intermediary node. Wildcard and catch-all
/// children are not part of the static index: a node has at most one of each, anything else
/// would make matching ambiguous.
pub(crate) struct Node<Value> {
    /// Literal bytes this node consumes from the path, empty for the root and for wildcard nodes
    segment: Vec<u8>,

    /// Number of routes registered through this node, used to order sibling probes
    priority: u32,

    /// First bytes of the static children, pairwise distinct, same order as `static_children`
    static_indices: Vec<u8>,

    /// Static children, sorted by descending priority
    static_children: Vec<Node<Value>>,

    /// Child taken when no static child matches, consumes a single path segment
    wildcard_child: Option<Box<Node<Value>>>,

    /// Child taken last, consumes the entire remaining path; its segment is the bound name
    catch_all_child: Option<Box<Node<Value>>>,

    /// Handler value if a route terminates at this node
    handler: Option<Value>,

    /// Parameter names collected from the root to this node, bound when the first route with
    /// wildcards terminates here and fixed afterwards
    wildcard_names: Vec<String>,
}

impl<Value> Node<Value> {
    fn new(segment: Vec<u8>) -> Self {
        Self {
            segment,
            priority: 0,
            static_indices: Vec::new(),
            static_children: Vec::new(),
            wildcard_child: None,
            catch_all_child: None,
            handler: None,
            wildcard_names: Vec::new(),
        }
    }

    pub(crate) fn root() -> Self {
        Self::new(Vec::new())
    }

    pub(crate) fn handler(&self) -> Option<&Value> {
        self.handler.as_ref()
    }

    pub(crate) fn wildcard_names(&self) -> &[String] {
        &self.wildcard_names
    }

    /// Inserts the remainder of a pattern below this node, recursing token by token.
    ///
    /// `names` accumulates the wildcard names seen so far on this registration, `pattern_str` is
    /// the complete original pattern for error reporting. The pattern is expected to be
    /// syntactically valid, see [`crate::Pattern`].
    pub(crate) fn insert(
        &mut self,
        pattern: &[u8],
        mut names: Vec<String>,
        value: Value,
        pattern_str: &str,
    ) -> Result<(), RouteError> {
        if pattern.is_empty() {
            return self.bind(names, value, pattern_str);
        }

        let (token, token_end) = next_token(pattern);
        let remaining = &pattern[token_end..];

        match token[0] {
            CATCH_ALL_MARKER => {
                // Validation made sure the catch-all is the final token.
                let name = String::from_utf8_lossy(&token[1..]).into_owned();
                if let Some(child) = &self.catch_all_child {
                    if child.segment != name.as_bytes() {
                        return Err(RouteError::ConflictingCatchAll {
                            existing: String::from_utf8_lossy(&child.segment).into_owned(),
                            new: name,
                        });
                    }
                }

                names.push(name.clone());
                self.catch_all_child
                    .get_or_insert_with(|| Box::new(Self::new(name.into_bytes())))
                    .bind(names, value, pattern_str)
            }
            WILDCARD_MARKER => {
                names.push(String::from_utf8_lossy(&token[1..]).into_owned());

                // All wildcard registrations at this position share one child node.
                self.wildcard_child
                    .get_or_insert_with(|| Box::new(Self::new(Vec::new())))
                    .insert(remaining, names, value, pattern_str)
            }
            first => {
                if let Some(i) = self.static_indices.iter().position(|b| *b == first) {
                    let (i, consumed) = self.split_common_prefix(i, token);
                    self.static_children[i].priority += 1;
                    let i = self.sort_static_child(i);
                    self.static_children[i].insert(&pattern[consumed..], names, value, pattern_str)
                } else {
                    self.static_indices.push(first);
                    self.static_children.push(Self::new(token.to_vec()));
                    let i = self.static_children.len() - 1;
                    self.static_children[i].insert(remaining, names, value, pattern_str)
                }
            }
        }
    }

    /// Terminates a registration at this node, binding the handler and the wildcard names.
    ///
    /// Name consistency is checked before the duplicate check, so that two routes differing only
    /// in wildcard names are reported as ambiguous rather than as duplicates.
    fn bind(
        &mut self,
        names: Vec<String>,
        value: Value,
        pattern_str: &str,
    ) -> Result<(), RouteError> {
        if !names.is_empty() {
            if self.wildcard_names.is_empty() {
                self.wildcard_names = names;
            } else if self.wildcard_names != names {
                return Err(RouteError::AmbiguousWildcards {
                    existing: self.wildcard_names.clone(),
                    new: names,
                });
            }
        }

        if self.handler.is_some() {
            return Err(RouteError::DuplicateRoute(pattern_str.to_owned()));
        }
        self.handler = Some(value);
        Ok(())
    }

    /// Makes sure the static child at the given index starts with the given token or a prefix of
    /// it, splitting the child if necessary.
    ///
    /// If the child's segment is a prefix of the token no restructuring is needed. Otherwise a
    /// new intermediary node holding exactly the common prefix replaces the child, and the child,
    /// its segment truncated accordingly, is demoted to a static child of the intermediary.
    ///
    /// Returns the index of the resulting child and the number of token bytes it consumes.
    fn split_common_prefix(&mut self, i: usize, token: &[u8]) -> (usize, usize) {
        let child = &mut self.static_children[i];
        if token.len() >= child.segment.len() && token[..child.segment.len()] == child.segment {
            return (i, child.segment.len());
        }

        // First bytes are equal, so the common prefix is never empty.
        let common = common_prefix_length(&child.segment, token);
        trace!(
            "splitting node {} at prefix {}",
            String::from_utf8_lossy(&child.segment),
            String::from_utf8_lossy(&child.segment[..common])
        );

        let mut demoted = std::mem::replace(child, Self::new(token[..common].to_vec()));
        demoted.segment.drain(..common);

        // All routes through the demoted child pass through the intermediary.
        let intermediary = &mut self.static_children[i];
        intermediary.priority = demoted.priority;
        intermediary.static_indices.push(demoted.segment[0]);
        intermediary.static_children.push(demoted);
        (i, common)
    }

    /// Bubbles the child at the given index left past siblings with lower priority, restoring
    /// the descending priority order. Returns the child's new index.
    fn sort_static_child(&mut self, mut i: usize) -> usize {
        while i > 0 && self.static_children[i].priority > self.static_children[i - 1].priority {
            self.static_children.swap(i, i - 1);
            self.static_indices.swap(i, i - 1);
            i -= 1;
        }
        i
    }

    /// Matches the remaining path against the subtree rooted at this node.
    ///
    /// Returns the terminal node and the captured raw parameter values in leaf-to-root order
    /// (the caller reverses them once). At every node a matching static child is probed first;
    /// only if its entire subtree fails to match is the wildcard child tried, and the catch-all
    /// child last. Static children have pairwise distinct first bytes, so at most one of them
    /// can match.
    pub(crate) fn search<'node, 'path>(
        &'node self,
        path: &'path [u8],
    ) -> Option<(&'node Node<Value>, Vec<&'path [u8]>)> {
        if path.is_empty() {
            return if self.handler.is_some() {
                Some((self, Vec::new()))
            } else {
                None
            };
        }

        if let Some(i) = self.static_indices.iter().position(|b| *b == path[0]) {
            let child = &self.static_children[i];
            if path.len() >= child.segment.len() && child.segment == path[..child.segment.len()] {
                if let Some(found) = child.search(&path[child.segment.len()..]) {
                    return Some(found);
                }
            }
        }

        if let Some(wildcard) = &self.wildcard_child {
            let token_end = path
                .iter()
                .position(|b| *b == SEPARATOR)
                .unwrap_or(path.len());

            // An empty token never matches a wildcard.
            if token_end > 0 {
                if let Some((node, mut params)) = wildcard.search(&path[token_end..]) {
                    params.push(&path[..token_end]);
                    return Some((node, params));
                }
            }
        }

        if let Some(catch_all) = &self.catch_all_child {
            return Some((catch_all, vec![path]));
        }

        None
    }

    /// Renders this subtree as one line per node for debugging route registration.
    pub(crate) fn dump_into(&self, out: &mut String, prefix: &str, kind: &str) {
        let _ = writeln!(
            out,
            "{prefix}{:02} {kind}{} [{}] {} wildcards {:?}",
            self.priority,
            String::from_utf8_lossy(&self.segment),
            self.static_children.len(),
            if self.handler.is_some() { "+" } else { "-" },
            self.wildcard_names,
        );

        let prefix = format!("{prefix}  ");
        for child in &self.static_children {
            child.dump_into(out, &prefix, "");
        }
        if let Some(child) = &self.wildcard_child {
            child.dump_into(out, &prefix, ":");
        }
        if let Some(child) = &self.catch_all_child {
            child.dump_into(out, &prefix, "*");
        }
    }
}
