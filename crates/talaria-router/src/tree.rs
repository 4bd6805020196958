//! Per-method route trie.
//!
//! A [`Tree`] stores route patterns split on `/`. Literal segments descend
//! through the `fixed` child map, capturing segments through the single
//! `wildcard` child, and complete patterns end in ordered leaves. Matching
//! prefers literal children, then an extension fallback for the final
//! segment, then the wildcard descent, and finally re-probes the current
//! node's leaves with the remaining segments as candidate values.

use std::collections::{hash_map::Entry, HashMap};

use regex::Regex;
use thiserror::Error;

use crate::params::Params;
use crate::segment::{split_segment, Capture};

/// Error raised while registering or grafting a pattern.
#[derive(Debug, Error)]
pub enum PatternError {
    /// The regex source accumulated for a pattern failed to compile.
    #[error("invalid regex in route pattern `{pattern}`: {source}")]
    InvalidRegex {
        /// Pattern being registered.
        pattern: String,
        /// Underlying compile error.
        #[source]
        source: regex::Error,
    },
    /// `graft` was called with an empty prefix.
    #[error("graft prefix must not be empty")]
    EmptyGraftPrefix,
    /// `graft` was called with a prefix containing unsupported capture
    /// segments.
    #[error("graft prefix `{prefix}` may contain only literal and plain `:name` segments")]
    WildcardGraftPrefix {
        /// Offending prefix.
        prefix: String,
    },
}

/// A complete registered pattern with its payload.
#[derive(Debug, Clone)]
pub struct Leaf<T> {
    /// Original pattern string, kept for reverse URL generation.
    pattern: String,
    /// Captures bound when this leaf matches, in declaration order.
    captures: Vec<Capture>,
    /// Compiled constraint for regex leaves; plain leaves match structurally.
    regex: Option<Regex>,
    payload: T,
}

impl<T> Leaf<T> {
    /// The pattern this leaf was registered under.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The payload stored at this leaf.
    #[must_use]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    fn match_values(&self, values: &[String]) -> Option<Params> {
        match &self.regex {
            None => self.match_plain(values),
            Some(re) => self.match_regex(re, values),
        }
    }

    fn match_plain(&self, values: &[String]) -> Option<Params> {
        // a lone splat accepts any remainder, the empty one included
        if let [Capture::Splat] = self.captures.as_slice() {
            let mut params = Params::new();
            params.set("splat", values.join("/"));
            return Some(params);
        }
        if values.is_empty() {
            if self.captures.is_empty() {
                return Some(Params::new());
            }
            // ?:name leaves accept the empty remainder and bind ""
            if self.captures.contains(&Capture::Optional) {
                let mut params = Params::new();
                for c in &self.captures {
                    if let Some(key) = c.key() {
                        params.set(key, "");
                    }
                }
                return Some(params);
            }
            return None;
        }
        if self.captures.len() == 3 && self.captures[0] == Capture::Dot {
            let (stem, ext) = split_stem(values.last()?);
            let mut params = Params::new();
            params.set("ext", ext);
            params.set("path", join_stem(&values[..values.len() - 1], stem));
            return Some(params);
        }
        let mut params = Params::new();
        let mut j = 0;
        for c in &self.captures {
            match c {
                Capture::Optional => {}
                Capture::Dot => {
                    let (stem, ext) = split_stem(values.last()?);
                    params.set("ext", ext);
                    params.set("path", join_stem(values.get(j..values.len() - 1)?, stem));
                    return Some(params);
                }
                Capture::Name(name) => {
                    params.set(name, values.get(j)?);
                    j += 1;
                }
                Capture::Splat => {
                    params.set("splat", values.get(j..)?.join("/"));
                    j = values.len();
                }
            }
        }
        // every candidate value must have been consumed by a capture
        if j != values.len() {
            return None;
        }
        Some(params)
    }

    fn match_regex(&self, re: &Regex, values: &[String]) -> Option<Params> {
        let joined = values.join("/");
        let caps = re.captures(&joined)?;
        let mut params = Params::new();
        // regex leaves carry pre-filtered captures, one per group
        for (i, c) in self.captures.iter().enumerate() {
            if let (Some(key), Some(m)) = (c.key(), caps.get(i + 1)) {
                params.set(key, m.as_str());
            }
        }
        Some(params)
    }
}

fn split_stem(last: &str) -> (&str, &str) {
    match last.find('.') {
        Some(i) => (&last[..i], &last[i + 1..]),
        None => (last, ""),
    }
}

fn join_stem(prefix: &[String], stem: &str) -> String {
    if prefix.is_empty() {
        stem.to_string()
    } else {
        format!("{}/{}", prefix.join("/"), stem)
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Route trie generic over its leaf payload.
#[derive(Debug)]
pub struct Tree<T> {
    fixed: HashMap<String, Tree<T>>,
    wildcard: Option<Box<Tree<T>>>,
    leaves: Vec<Leaf<T>>,
    case_sensitive: bool,
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Tree<T> {
    /// Creates an empty, case-sensitive tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fixed: HashMap::new(),
            wildcard: None,
            leaves: Vec::new(),
            case_sensitive: true,
        }
    }

    /// Creates an empty tree that lower-cases patterns and paths at its
    /// entry points.
    #[must_use]
    pub fn case_insensitive() -> Self {
        Self {
            case_sensitive: false,
            ..Self::new()
        }
    }

    /// Registers a pattern with its payload. Leaves are kept in
    /// registration order and earlier leaves win ties.
    pub fn add_router(&mut self, pattern: &str, payload: T) -> Result<(), PatternError> {
        let pattern = if self.case_sensitive {
            pattern.to_string()
        } else {
            pattern.to_lowercase()
        };
        let segments = split_path(&pattern);
        self.add_segments(&segments, &pattern, payload, Vec::new(), String::new())
    }

    fn add_segments(
        &mut self,
        segments: &[&str],
        pattern: &str,
        payload: T,
        captures: Vec<Capture>,
        reg: String,
    ) -> Result<(), PatternError> {
        if segments.is_empty() {
            let leaf = if reg.is_empty() {
                Leaf {
                    pattern: pattern.to_string(),
                    captures,
                    regex: None,
                    payload,
                }
            } else {
                let regex = Regex::new(&format!("^{reg}$")).map_err(|source| {
                    PatternError::InvalidRegex {
                        pattern: pattern.to_string(),
                        source,
                    }
                })?;
                Leaf {
                    pattern: pattern.to_string(),
                    captures: captures.into_iter().filter(|c| c.key().is_some()).collect(),
                    regex: Some(regex),
                    payload,
                }
            };
            self.leaves.push(leaf);
            return Ok(());
        }

        let seg = segments[0];
        let mut spec = split_segment(seg);
        // a literal after a splat becomes part of the accumulated regex,
        // so /login/*/access matches /login/2009/11/access
        if !spec.wild && captures.contains(&Capture::Splat) {
            spec.wild = true;
            spec.captures.clear();
            spec.regex_src = regex::escape(seg);
        }
        if seg == "*" && !captures.is_empty() && reg.is_empty() {
            spec.regex_src = "(.+)".to_string();
        }

        if spec.wild {
            let mut regex_src = spec.regex_src;
            if !regex_src.is_empty() {
                if reg.is_empty() {
                    let mut rr = String::new();
                    for c in &captures {
                        match c {
                            Capture::Optional | Capture::Dot => {}
                            Capture::Splat => rr.push_str("(.+)/"),
                            Capture::Name(_) => rr.push_str("([^/]+)/"),
                        }
                    }
                    regex_src = rr + &regex_src;
                } else {
                    regex_src = format!("/{regex_src}");
                }
            } else if !reg.is_empty() {
                for c in &spec.captures {
                    if c.key().is_some() {
                        regex_src = format!("/([^/]+){regex_src}");
                    }
                }
            }
            let mut captures = captures;
            captures.extend(spec.captures);
            self.wildcard
                .get_or_insert_with(|| Box::new(Tree::new()))
                .add_segments(&segments[1..], pattern, payload, captures, reg + &regex_src)
        } else {
            self.fixed
                .entry(seg.to_string())
                .or_insert_with(Tree::new)
                .add_segments(&segments[1..], pattern, payload, captures, reg)
        }
    }

    /// Matches a request path, returning the payload and bound parameters
    /// of the first compatible leaf. Returns `None` for paths that do not
    /// start with `/`.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&T, Params)> {
        self.match_leaf(path)
            .map(|(leaf, params)| (&leaf.payload, params))
    }

    /// Like [`Tree::match_path`] but returns the whole leaf, exposing the
    /// pattern the path matched under.
    #[must_use]
    pub fn match_leaf(&self, path: &str) -> Option<(&Leaf<T>, Params)> {
        if !path.starts_with('/') {
            return None;
        }
        let lowered;
        let path = if self.case_sensitive {
            path
        } else {
            lowered = path.to_lowercase();
            lowered.as_str()
        };
        let segments = split_path(path);
        self.match_segments(&segments, &[])
    }

    /// Whether no pattern is registered anywhere in the tree.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
            && self.fixed.values().all(Tree::is_empty)
            && self.wildcard.as_ref().map_or(true, |w| w.is_empty())
    }

    fn match_segments<'t>(&'t self, segments: &[&str], values: &[String]) -> Option<(&'t Leaf<T>, Params)> {
        if segments.is_empty() {
            for leaf in &self.leaves {
                if let Some(params) = leaf.match_values(values) {
                    return Some((leaf, params));
                }
            }
            if let Some(wild) = &self.wildcard {
                for leaf in &wild.leaves {
                    if let Some(params) = leaf.match_values(values) {
                        return Some((leaf, params));
                    }
                }
            }
            return None;
        }

        let (seg, rest) = (segments[0], &segments[1..]);
        let mut found = None;
        if let Some(sub) = self.fixed.get(seg) {
            found = sub.match_segments(rest, values);
        } else if rest.is_empty() {
            // /a/b.json falls back to the literal /a/b child and binds ext
            if let Some(dot) = seg.rfind('.') {
                if let Some(sub) = self.fixed.get(&seg[..dot]) {
                    if let Some((leaf, mut params)) = sub.match_segments(rest, values) {
                        params.set("ext", &seg[dot + 1..]);
                        return Some((leaf, params));
                    }
                }
            }
        }
        if found.is_none() {
            if let Some(wild) = &self.wildcard {
                let mut extended = values.to_vec();
                extended.push(seg.to_string());
                found = wild.match_segments(rest, &extended);
            }
        }
        if found.is_none() {
            // a regex leaf at this depth may still consume the remainder
            let mut extended = values.to_vec();
            extended.extend(segments.iter().map(|s| (*s).to_string()));
            for leaf in &self.leaves {
                if let Some(params) = leaf.match_values(&extended) {
                    return Some((leaf, params));
                }
            }
        }
        found
    }

    /// Attaches `tree` under `prefix`, rewriting every grafted leaf's stored
    /// pattern so reverse URL generation stays correct. The prefix may mix
    /// literal segments with plain `:name` captures; captured prefix
    /// segments bind on every grafted leaf.
    pub fn graft(&mut self, prefix: &str, mut tree: Tree<T>) -> Result<(), PatternError> {
        let prefix = if self.case_sensitive {
            prefix.to_string()
        } else {
            prefix.to_lowercase()
        };
        let segments = split_path(&prefix);
        if segments.is_empty() {
            return Err(PatternError::EmptyGraftPrefix);
        }
        let mut prefix_captures = Vec::new();
        for seg in &segments {
            let spec = split_segment(seg);
            if !spec.wild {
                continue;
            }
            // typed, optional, splat, and regex prefix segments stay rejected
            let plain_name = spec.regex_src.is_empty()
                && matches!(spec.captures.as_slice(), [Capture::Name(_)]);
            if !plain_name {
                return Err(PatternError::WildcardGraftPrefix { prefix });
            }
            prefix_captures.extend(spec.captures);
        }
        tree.rewrite_patterns(&format!("/{}", segments.join("/")));
        if !prefix_captures.is_empty() {
            tree.prepend_captures(&prefix_captures)?;
        }
        let mut node = self;
        for seg in &segments {
            node = if split_segment(seg).wild {
                &mut **node.wildcard.get_or_insert_with(|| Box::new(Tree::new()))
            } else {
                node.fixed
                    .entry((*seg).to_string())
                    .or_insert_with(Tree::new)
            };
        }
        node.merge(tree);
        Ok(())
    }

    /// Prepends prefix captures to every leaf; regex leaves grow one
    /// `([^/]+)` group per capture and recompile.
    fn prepend_captures(&mut self, captures: &[Capture]) -> Result<(), PatternError> {
        for leaf in &mut self.leaves {
            let mut combined = captures.to_vec();
            combined.append(&mut leaf.captures);
            leaf.captures = combined;
            if let Some(re) = leaf.regex.take() {
                let inner = re.as_str().trim_start_matches('^').trim_end_matches('$');
                let groups = "([^/]+)/".repeat(captures.len());
                let recompiled = Regex::new(&format!("^{groups}{inner}$")).map_err(|source| {
                    PatternError::InvalidRegex {
                        pattern: leaf.pattern.clone(),
                        source,
                    }
                })?;
                leaf.regex = Some(recompiled);
            }
        }
        for sub in self.fixed.values_mut() {
            sub.prepend_captures(captures)?;
        }
        if let Some(wild) = self.wildcard.as_mut() {
            wild.prepend_captures(captures)?;
        }
        Ok(())
    }

    fn rewrite_patterns(&mut self, prefix: &str) {
        for leaf in &mut self.leaves {
            leaf.pattern = format!("{prefix}{}", leaf.pattern);
        }
        for sub in self.fixed.values_mut() {
            sub.rewrite_patterns(prefix);
        }
        if let Some(wild) = self.wildcard.as_mut() {
            wild.rewrite_patterns(prefix);
        }
    }

    fn merge(&mut self, other: Tree<T>) {
        for (seg, sub) in other.fixed {
            match self.fixed.entry(seg) {
                Entry::Occupied(mut e) => e.get_mut().merge(sub),
                Entry::Vacant(e) => {
                    e.insert(sub);
                }
            }
        }
        if let Some(other_wild) = other.wildcard {
            if let Some(wild) = self.wildcard.as_mut() {
                wild.merge(*other_wild);
            } else {
                self.wildcard = Some(other_wild);
            }
        }
        self.leaves.extend(other.leaves);
    }

    /// Visits every leaf in the tree with its stored pattern, used for
    /// reverse URL lookup.
    pub fn walk<'t, F>(&'t self, visit: &mut F)
    where
        F: FnMut(&'t Leaf<T>),
    {
        for leaf in &self.leaves {
            visit(leaf);
        }
        for sub in self.fixed.values() {
            sub.walk(visit);
        }
        if let Some(wild) = &self.wildcard {
            wild.walk(visit);
        }
    }
}
