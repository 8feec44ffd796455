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

//! The public routing interface on top of the radix tree.
//!
//! Lookup is strictly read-only: [`PathTree::resolve`] takes `&self`, so once the tree is built
//! and shared it can be queried from any number of threads concurrently. Registration takes
//! `&mut self` and is meant for the setup phase only. A deployment that needs to change routes
//! later should build a complete replacement tree and swap it in atomically instead of mutating
//! a live one.

use log::trace;
use percent_encoding::percent_decode_str;
use std::fmt::Debug;
use std::ops::Deref;

use crate::pattern::Pattern;
use crate::trie::Node;
use crate::RouteError;

/// The router implementation.
///
/// Routes are added with [`PathTree::register`] during setup and resolved with
/// [`PathTree::resolve`] afterwards:
///
/// ```rust
/// use pathtree::PathTree;
///
/// let mut tree = PathTree::new();
/// tree.register("/", "root").unwrap();
/// tree.register("/posts/:year/:slug", "post").unwrap();
///
/// let found = tree.resolve("/posts/2024/hello").unwrap();
/// assert_eq!(*found, "post");
/// assert_eq!(found.params(), ["2024", "hello"]);
/// assert_eq!(
///     found.iter().collect::<Vec<_>>(),
///     [("year", "2024"), ("slug", "hello")]
/// );
/// assert!(tree.resolve("/posts/2024").is_none());
/// ```
pub struct PathTree<Value> {
    root: Node<Value>,
}

impl<Value> PathTree<Value> {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self { root: Node::root() }
    }

    /// Registers a pattern, mapping every path it matches to the given handler value.
    ///
    /// Fails if the pattern is syntactically invalid or conflicts with a previously registered
    /// route. A failed registration leaves the previously registered routes intact.
    pub fn register(&mut self, pattern: &str, value: Value) -> Result<(), RouteError> {
        self.register_pattern(&pattern.parse()?, value)
    }

    /// Registers an already parsed pattern, see [`PathTree::register`].
    pub fn register_pattern(&mut self, pattern: &Pattern, value: Value) -> Result<(), RouteError> {
        trace!("registering route {pattern}");
        self.root
            .insert(pattern.as_str().as_bytes(), Vec::new(), value, pattern.as_str())
    }

    /// Resolves a path to the handler of the best matching route.
    ///
    /// The path is expected to be the normalized path component of the URL, without scheme, host
    /// or query string. `None` is the regular “no route” outcome that the caller turns into its
    /// own not-found handling.
    ///
    /// At every tree level a matching literal branch is probed first, a wildcard branch only if
    /// the entire literal subtree failed to match, and a catch-all branch last. Captured
    /// wildcard values are percent-decoded on a best-effort basis: text that does not decode to
    /// valid UTF-8 is passed through as captured, a malformed escape never makes a matching
    /// route unreachable.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch<'_, Value>> {
        let (node, mut raw) = self.root.search(path.as_bytes())?;
        raw.reverse();
        Some(RouteMatch {
            value: node.handler()?,
            names: node.wildcard_names(),
            params: raw.into_iter().map(decode_param).collect(),
        })
    }

    /// Renders the full tree structure as a human-readable multi-line string, one line per node
    /// with priority, segment, static child count, handler presence (`+`/`-`) and bound wildcard
    /// names. Meant for debugging route registration, not for the request path.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.root.dump_into(&mut out, "", "");
        out
    }
}

impl<Value> Default for PathTree<Value> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Value> Debug for PathTree<Value> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.dump())
    }
}

/// Decodes a captured parameter value, falling back to the raw text if the result is not valid
/// UTF-8. Malformed escape sequences are kept verbatim.
fn decode_param(raw: &[u8]) -> String {
    let raw = match std::str::from_utf8(raw) {
        Ok(raw) => raw,
        Err(_) => return String::from_utf8_lossy(raw).into_owned(),
    };
    match percent_decode_str(raw).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_owned(),
    }
}

/// Successful lookup result, will dereference into the handler value
///
/// Captured parameter values are ordered root to leaf, matching the order in which the wildcard
/// names appear in the registered pattern, so names and values can be zipped positionally.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a, Value> {
    value: &'a Value,
    names: &'a [String],
    params: Vec<String>,
}

impl<'a, Value> RouteMatch<'a, Value> {
    /// Retrieves the handler value
    ///
    /// Unlike dereferencing, this propagates lifetimes properly.
    pub fn as_value(&self) -> &'a Value {
        self.value
    }

    /// The captured parameter values in declaration order, percent-decoded
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// The parameter names bound by the matched route, same order as [`RouteMatch::params`]
    pub fn param_names(&self) -> &'a [String] {
        self.names
    }

    /// Iterates over `(name, value)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.params.iter().map(String::as_str))
    }

    /// Consumes the match, returning the captured parameter values
    pub fn into_params(self) -> Vec<String> {
        self.params
    }
}

impl<Value> Deref for RouteMatch<'_, Value> {
    type Target = Value;

    fn deref(&self) -> &Self::Target {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn make_tree(patterns: &[&str]) -> PathTree<String> {
        let mut tree = PathTree::new();
        for pattern in patterns {
            tree.register(pattern, (*pattern).to_owned()).unwrap();
        }
        tree
    }

    fn resolve<'a>(tree: &'a PathTree<String>, path: &str) -> Option<(&'a str, Vec<String>)> {
        tree.resolve(path)
            .map(|found| (found.as_value().as_str(), found.into_params()))
    }

    #[test]
    fn static_routes_resolve_to_their_own_pattern() {
        let patterns = ["/", "/foobar", "/foo/bar", "/foo/baz", "/images/logo.png"];
        let tree = make_tree(&patterns);
        for pattern in patterns {
            assert_eq!(resolve(&tree, pattern), Some((pattern, Vec::new())));
        }
    }

    #[test]
    fn wildcard_routes_capture_segments() {
        let tree = make_tree(&["/user/:id", "/user/:id/edit"]);

        assert_eq!(
            resolve(&tree, "/user/42"),
            Some(("/user/:id", vec!["42".to_owned()]))
        );
        assert_eq!(
            resolve(&tree, "/user/42/edit"),
            Some(("/user/:id/edit", vec!["42".to_owned()]))
        );
    }

    #[test]
    fn catch_all_captures_remaining_path() {
        let tree = make_tree(&["/files/*rest"]);

        assert_eq!(
            resolve(&tree, "/files/a/b/c.txt"),
            Some(("/files/*rest", vec!["a/b/c.txt".to_owned()]))
        );
        assert_eq!(resolve(&tree, "/files"), None);
    }

    #[test]
    fn params_come_in_declaration_order() {
        let tree = make_tree(&["/:lang/docs/:page/*anchor"]);

        let found = tree.resolve("/en/docs/routing/sub/section").unwrap();
        assert_eq!(found.param_names(), ["lang", "page", "anchor"]);
        assert_eq!(found.params(), ["en", "routing", "sub/section"]);
        assert_eq!(
            found.iter().collect::<Vec<_>>(),
            [
                ("lang", "en"),
                ("page", "routing"),
                ("anchor", "sub/section")
            ]
        );
    }

    #[test]
    fn shared_prefixes_are_split() {
        let tree = make_tree(&["/apple", "/applesauce", "/applepie"]);

        assert_eq!(resolve(&tree, "/apple"), Some(("/apple", Vec::new())));
        assert_eq!(
            resolve(&tree, "/applesauce"),
            Some(("/applesauce", Vec::new()))
        );
        assert_eq!(resolve(&tree, "/applepie"), Some(("/applepie", Vec::new())));
        assert_eq!(resolve(&tree, "/apples"), None);
    }

    #[test]
    fn percent_decoding_is_best_effort() {
        let tree = make_tree(&["/greet/:name", "/raw/*rest"]);

        assert_eq!(
            resolve(&tree, "/greet/hello%20world"),
            Some(("/greet/:name", vec!["hello world".to_owned()]))
        );

        // Malformed escapes stay as captured.
        assert_eq!(
            resolve(&tree, "/greet/%zz"),
            Some(("/greet/:name", vec!["%zz".to_owned()]))
        );

        // An escape decoding to invalid UTF-8 falls back to the raw text.
        assert_eq!(
            resolve(&tree, "/raw/a%ffb"),
            Some(("/raw/*rest", vec!["a%ffb".to_owned()]))
        );
    }

    #[test]
    fn unmatched_paths_return_none() {
        let tree = make_tree(&["/foo/bar", "/user/:id"]);

        assert_eq!(resolve(&tree, "/foo"), None);
        assert_eq!(resolve(&tree, "/foo/baz"), None);
        assert_eq!(resolve(&tree, "/foo/bar/baz"), None);
        assert_eq!(resolve(&tree, "/user"), None);
        assert_eq!(resolve(&tree, "/user/42/delete"), None);
        assert_eq!(resolve(&tree, "unrelated"), None);
    }

    #[test]
    fn static_miss_falls_back_to_wildcard_on_unwind() {
        // The literal branch is entered for /a/… and rejected deeper down, after which the
        // wildcard sibling at the branch point is still tried.
        let tree = make_tree(&["/a/b", "/:x/c"]);

        assert_eq!(resolve(&tree, "/a/b"), Some(("/a/b", Vec::new())));
        assert_eq!(
            resolve(&tree, "/a/c"),
            Some(("/:x/c", vec!["a".to_owned()]))
        );
    }

    #[test]
    fn wildcard_miss_falls_back_to_catch_all() {
        let tree = make_tree(&["/data/:key/meta", "/data/*rest"]);

        assert_eq!(
            resolve(&tree, "/data/abc/meta"),
            Some(("/data/:key/meta", vec!["abc".to_owned()]))
        );
        assert_eq!(
            resolve(&tree, "/data/abc/value"),
            Some(("/data/*rest", vec!["abc/value".to_owned()]))
        );
    }

    #[test]
    fn registration_errors_are_reported() {
        let mut tree = PathTree::new();
        tree.register("/a/:name", 1).unwrap();

        assert!(matches!(
            tree.register("/a/:other", 2),
            Err(RouteError::AmbiguousWildcards { .. })
        ));
        assert!(matches!(
            tree.register("/a/:name", 3),
            Err(RouteError::DuplicateRoute(_))
        ));
        assert!(matches!(
            tree.register("/a*b", 4),
            Err(RouteError::InvalidPattern { .. })
        ));

        // The tree still works after failed registrations.
        assert_eq!(tree.resolve("/a/42").as_deref(), Some(&1));
    }

    #[test]
    fn lookups_and_dumps_do_not_mutate() {
        let tree = make_tree(&["/", "/user/:id", "/files/*rest", "/applesauce", "/applepie"]);

        let before = tree.dump();
        for path in ["/", "/user/42", "/files/a/b", "/applesauce", "/nothing"] {
            let _ = tree.resolve(path);
        }
        assert_eq!(tree.dump(), before);
        assert_eq!(format!("{tree:?}"), before);
    }

    #[test]
    fn dump_shows_structure() {
        let tree = make_tree(&["/user/:id", "/files/*rest"]);
        let dump = tree.dump();

        assert!(dump.lines().count() > 4);
        assert!(dump.contains(":"));
        assert!(dump.contains("*rest"));
        assert!(dump.contains("wildcards [\"id\"]"));
    }

    #[test]
    fn tree_built_from_yaml_route_list() {
        let patterns: Vec<Pattern> =
            serde_yaml::from_str("- /\n- /user/:id\n- /files/*path\n").unwrap();

        let mut tree = PathTree::new();
        for (index, pattern) in patterns.iter().enumerate() {
            tree.register_pattern(pattern, index).unwrap();
        }

        assert_eq!(tree.resolve("/user/7").as_deref(), Some(&1));
        assert_eq!(tree.resolve("/files/x/y").as_deref(), Some(&2));
    }

    #[test]
    fn shared_tree_is_usable_from_threads() {
        let tree = std::sync::Arc::new(make_tree(&["/user/:id", "/files/*rest"]));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let tree = std::sync::Arc::clone(&tree);
                std::thread::spawn(move || {
                    let path = format!("/user/{i}");
                    let found = tree.resolve(&path).unwrap();
                    assert_eq!(found.as_value().as_str(), "/user/:id");
                    assert_eq!(found.params(), [i.to_string()]);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
