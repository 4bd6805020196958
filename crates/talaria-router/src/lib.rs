//! Per-method pattern trie router.
//!
//! This crate provides the route-matching core: a [`Tree`] keyed by path
//! segments with literal children, a wildcard child, and ordered leaves,
//! plus the [`Params`] storage bound during a match.
//!
//! Patterns support literal segments, named captures (`:id`), optional
//! captures (`?:id`), typed shorthands (`:id:int`, `:name:string`), inline
//! regexes (`:id([0-9]+)`), mixed segments (`cms_:id_:page.html`), and the
//! catch-alls `*` and `*.*`. See [`segment`] for the full grammar.
//!
//! # Example
//!
//! ```rust
//! use talaria_router::Tree;
//!
//! let mut tree = Tree::new();
//! tree.add_router("/user/:id", "show_user")?;
//!
//! let (payload, params) = tree.match_path("/user/42").unwrap();
//! assert_eq!(*payload, "show_user");
//! assert_eq!(params.get("id"), Some("42"));
//! # Ok::<(), talaria_router::PatternError>(())
//! ```

pub mod params;
pub mod segment;
pub mod tree;

pub use params::Params;
pub use segment::{split_segment, Capture, SegmentSpec};
pub use tree::{Leaf, PatternError, Tree};
