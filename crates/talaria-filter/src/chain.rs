//! Filter-chain configuration.
//!
//! A chain is registered as a pattern plus a builder. The builder receives
//! the continuation for everything beneath it (older chains, then dispatch)
//! and returns the composed action. Composition happens when the registry
//! freezes: each config wraps the then-current head, so the most recently
//! installed chain runs first. A link that never calls its continuation
//! short-circuits everything beneath it.

use talaria_core::HandleFunc;

use crate::filter::FilterOptions;

/// Builds a chain link's action around the continuation beneath it.
pub type ChainBuilder = Box<dyn FnOnce(HandleFunc) -> HandleFunc + Send>;

/// A registered, not-yet-composed filter chain.
pub struct ChainConfig {
    pattern: String,
    builder: ChainBuilder,
    opts: FilterOptions,
}

impl ChainConfig {
    /// Records a chain for `pattern`.
    pub fn new(pattern: impl Into<String>, builder: ChainBuilder, opts: FilterOptions) -> Self {
        Self {
            pattern: pattern.into(),
            builder,
            opts,
        }
    }

    /// The pattern this chain is scoped to.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Decomposes the config for composition at freeze time.
    #[must_use]
    pub fn into_parts(self) -> (String, ChainBuilder, FilterOptions) {
        (self.pattern, self.builder, self.opts)
    }
}

impl std::fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainConfig")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_builder_wraps_continuation() {
        let config = ChainConfig::new(
            "/api/*",
            Box::new(|next: HandleFunc| {
                Arc::new(move |ctx: &mut talaria_core::Context| {
                    ctx.output.set_header("x-wrapped", "1");
                    next(ctx)
                })
            }),
            FilterOptions::new(),
        );
        assert_eq!(config.pattern(), "/api/*");

        let (_, builder, _) = config.into_parts();
        let inner: HandleFunc = Arc::new(|ctx: &mut talaria_core::Context| {
            ctx.output.write_str("inner");
            Ok(())
        });
        let composed = builder(inner);

        let mut ctx = talaria_core::Context::new(talaria_core::Request::new(
            http::Method::GET,
            "/api/x".parse().unwrap(),
        ));
        composed(&mut ctx).unwrap();
        assert_eq!(ctx.output.headers().get("x-wrapped").unwrap(), "1");
        assert_eq!(ctx.output.body(), b"inner");
    }
}
