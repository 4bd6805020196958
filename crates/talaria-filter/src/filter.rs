//! Pattern-scoped filters.
//!
//! A [`FilterRouter`] pairs one route pattern with an action. On a match the
//! action runs with the pattern's parameters bound; on a miss the entry
//! delegates to its `next` link, so a miss costs exactly one trie probe per
//! link. The same type backs both phase filters and filter-chain links.

use std::sync::Arc;

use talaria_core::{Context, HandleFunc, Interrupt};
use talaria_router::{PatternError, Tree};

/// Options controlling a filter's interaction with the response and the
/// bound parameters.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// Report terminal as soon as the response has started (checked both
    /// before and after the action runs). Defaults to true.
    pub return_on_output: bool,
    /// Restore the pre-filter parameters afterwards, keeping only writes
    /// the action made explicitly. Defaults to false.
    pub reset_params: bool,
    /// Override the registry's case sensitivity for this pattern.
    pub case_sensitive: Option<bool>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            return_on_output: true,
            reset_params: false,
            case_sensitive: None,
        }
    }
}

impl FilterOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `return_on_output`.
    #[must_use]
    pub fn return_on_output(mut self, value: bool) -> Self {
        self.return_on_output = value;
        self
    }

    /// Sets `reset_params`.
    #[must_use]
    pub fn reset_params(mut self, value: bool) -> Self {
        self.reset_params = value;
        self
    }

    /// Sets a per-filter case sensitivity override.
    #[must_use]
    pub fn case_sensitive(mut self, value: bool) -> Self {
        self.case_sensitive = Some(value);
        self
    }
}

/// What a filter run reported back to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterVerdict {
    /// Whether the response has started.
    pub started: bool,
    /// Whether dispatch should stop processing this phase and short-circuit.
    pub terminal: bool,
}

/// One pattern-scoped filter entry.
pub struct FilterRouter {
    pattern: String,
    tree: Tree<()>,
    action: HandleFunc,
    return_on_output: bool,
    reset_params: bool,
    next: Option<Arc<FilterRouter>>,
}

impl FilterRouter {
    /// Builds a filter for `pattern`. `case_sensitive` is the registry
    /// default; the options may override it.
    pub fn new(
        pattern: impl Into<String>,
        action: HandleFunc,
        opts: &FilterOptions,
        case_sensitive: bool,
    ) -> Result<Self, PatternError> {
        Self::with_next(pattern, action, opts, case_sensitive, None)
    }

    /// Builds a filter that delegates to `next` when its pattern misses.
    pub fn with_next(
        pattern: impl Into<String>,
        action: HandleFunc,
        opts: &FilterOptions,
        case_sensitive: bool,
        next: Option<Arc<FilterRouter>>,
    ) -> Result<Self, PatternError> {
        let pattern = pattern.into();
        let mut tree = if opts.case_sensitive.unwrap_or(case_sensitive) {
            Tree::new()
        } else {
            Tree::case_insensitive()
        };
        tree.add_router(&pattern, ())?;
        Ok(Self {
            pattern,
            tree,
            action,
            return_on_output: opts.return_on_output,
            reset_params: opts.reset_params,
            next,
        })
    }

    /// The pattern this filter is scoped to.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The filter's action.
    #[must_use]
    pub fn action(&self) -> &HandleFunc {
        &self.action
    }

    /// Runs the filter against `path`.
    pub fn filter(&self, ctx: &mut Context, path: &str) -> Result<FilterVerdict, Interrupt> {
        if self.return_on_output && ctx.output.started() {
            return Ok(FilterVerdict {
                started: true,
                terminal: true,
            });
        }
        if let Some(((), params)) = self.tree.match_path(path) {
            let snapshot = self.reset_params.then(|| ctx.input.params().clone());
            for (name, value) in &params {
                ctx.input.set_param(name, value);
            }
            if self.reset_params {
                ctx.input.start_param_journal();
            }
            let result = (self.action)(ctx);
            if let Some(snapshot) = snapshot {
                let journal = ctx.input.take_param_journal();
                ctx.input.restore_params(snapshot);
                for (name, value) in journal {
                    ctx.input.set_param(name, value);
                }
            }
            result?;
            let started = ctx.output.started();
            return Ok(FilterVerdict {
                started,
                terminal: self.return_on_output && started,
            });
        }
        if let Some(next) = &self.next {
            return next.filter(ctx, path);
        }
        Ok(FilterVerdict {
            started: ctx.output.started(),
            terminal: false,
        })
    }
}

impl std::fmt::Debug for FilterRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRouter")
            .field("pattern", &self.pattern)
            .field("return_on_output", &self.return_on_output)
            .field("reset_params", &self.reset_params)
            .field("chained", &self.next.is_some())
            .finish_non_exhaustive()
    }
}
