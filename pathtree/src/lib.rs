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

//! # Path tree routing
//!
//! This crate implements a radix tree mapping URL path patterns to opaque handler values. The
//! design goals are:
//!
//! * Lookup time proportional to the length of the path, not to the number of registered routes
//! * Registration happens once during the setup phase, afterwards the tree is immutable and can
//!   be queried from any number of threads without locking
//! * Named wildcard segments (`:name`) and terminal catch-all segments (`*name`) in addition to
//!   literal path segments
//! * All route definition errors are reported during registration, never while serving traffic
//!
//! Patterns consist of literal segments, segments starting with `:` which match exactly one path
//! segment and bind it to a name, and at most one final segment starting with `*` which matches
//! the entire remaining path including any `/` characters.
//!
//! ```rust
//! use pathtree::PathTree;
//!
//! let mut tree = PathTree::new();
//! tree.register("/user/:id", "user")?;
//! tree.register("/user/:id/edit", "edit")?;
//! tree.register("/files/*path", "files")?;
//!
//! let found = tree.resolve("/user/42/edit").unwrap();
//! assert_eq!(*found, "edit");
//! assert_eq!(found.params(), ["42"]);
//!
//! let found = tree.resolve("/files/css/site.css").unwrap();
//! assert_eq!(*found, "files");
//! assert_eq!(found.params(), ["css/site.css"]);
//! # Ok::<(), pathtree::RouteError>(())
//! ```

mod pattern;
mod router;
mod trie;

pub use pattern::Pattern;
pub use router::{PathTree, RouteMatch};

use thiserror::Error;

/// Errors reported during route registration
///
/// All of these indicate a mistake in the route definitions. They are meant to be handled during
/// application setup, typically by refusing to start up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The same full pattern was registered twice.
    #[error("route {0} is already registered")]
    DuplicateRoute(String),

    /// Two registrations reaching the same node bind different parameter name sets.
    #[error("wildcard names {new:?} are ambiguous with previously registered names {existing:?}")]
    AmbiguousWildcards {
        /// Parameter names bound by an earlier registration
        existing: Vec<String>,
        /// Parameter names of the registration being added
        new: Vec<String>,
    },

    /// A marker character appears in the middle of a token, a wildcard or catch-all name is
    /// empty, or a catch-all is not the final token of its pattern.
    #[error("invalid pattern {pattern}: {reason}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Explanation of the violated rule
        reason: String,
    },

    /// Two different catch-all parameter names were registered at the same node.
    #[error("catch-all name {new} conflicts with previously registered name {existing}")]
    ConflictingCatchAll {
        /// Catch-all name bound by an earlier registration
        existing: String,
        /// Catch-all name of the registration being added
        new: String,
    },
}

impl RouteError {
    pub(crate) fn invalid(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: reason.into(),
        }
    }
}
