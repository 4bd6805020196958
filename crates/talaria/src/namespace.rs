//! Route namespaces.
//!
//! A [`Namespace`] groups routes and filters under a shared prefix and can
//! nest. Nothing is validated or inserted until the namespace is merged into
//! a builder with [`crate::RegistryBuilder::namespace`]: routes graft into
//! the builder's trees under the accumulated prefix, and filters are
//! re-registered with prefixed patterns.

use std::sync::Arc;

use talaria_core::{Context, HandleFunc, Interrupt};
use talaria_filter::{FilterOptions, Phase};

use crate::controller::ControllerDescriptor;
use crate::registry::RawHandler;

/// A recorded, not-yet-applied namespace operation.
pub(crate) enum NsOp {
    Controller {
        pattern: String,
        descriptor: ControllerDescriptor,
        mapping: String,
    },
    Handler {
        verbs: String,
        pattern: String,
        func: HandleFunc,
    },
    Raw {
        pattern: String,
        handler: Arc<dyn RawHandler>,
        capture_all: bool,
    },
    Auto {
        descriptor: ControllerDescriptor,
    },
    Filter {
        pattern: String,
        phase: Phase,
        func: HandleFunc,
        opts: FilterOptions,
    },
    Child(Namespace),
}

/// A group of routes and filters under a shared prefix.
pub struct Namespace {
    prefix: String,
    ops: Vec<NsOp>,
}

impl Namespace {
    /// Creates a namespace for `prefix` (a leading `/` is added if missing).
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        let raw = prefix.into();
        let trimmed = raw.trim_matches('/');
        Self {
            prefix: format!("/{trimmed}"),
            ops: Vec::new(),
        }
    }

    /// The normalized prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Adds a controller route under the prefix.
    #[must_use]
    pub fn router(
        mut self,
        pattern: impl Into<String>,
        descriptor: ControllerDescriptor,
        mapping: impl Into<String>,
    ) -> Self {
        self.ops.push(NsOp::Controller {
            pattern: pattern.into(),
            descriptor,
            mapping: mapping.into(),
        });
        self
    }

    /// Adds a handler for an explicit verb list under the prefix.
    #[must_use]
    pub fn add_method<F>(mut self, verbs: impl Into<String>, pattern: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), Interrupt> + Send + Sync + 'static,
    {
        self.ops.push(NsOp::Handler {
            verbs: verbs.into(),
            pattern: pattern.into(),
            func: Arc::new(func),
        });
        self
    }

    /// Adds a GET handler under the prefix.
    #[must_use]
    pub fn get<F>(self, pattern: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), Interrupt> + Send + Sync + 'static,
    {
        self.add_method("get", pattern, func)
    }

    /// Adds a POST handler under the prefix.
    #[must_use]
    pub fn post<F>(self, pattern: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), Interrupt> + Send + Sync + 'static,
    {
        self.add_method("post", pattern, func)
    }

    /// Adds an any-verb handler under the prefix.
    #[must_use]
    pub fn any<F>(self, pattern: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), Interrupt> + Send + Sync + 'static,
    {
        self.add_method("*", pattern, func)
    }

    /// Adds a raw handler under the prefix.
    #[must_use]
    pub fn handler(
        mut self,
        pattern: impl Into<String>,
        raw: Arc<dyn RawHandler>,
        capture_all: bool,
    ) -> Self {
        self.ops.push(NsOp::Raw {
            pattern: pattern.into(),
            handler: raw,
            capture_all,
        });
        self
    }

    /// Auto-routes a controller under the prefix.
    #[must_use]
    pub fn auto(mut self, descriptor: ControllerDescriptor) -> Self {
        self.ops.push(NsOp::Auto { descriptor });
        self
    }

    /// Adds a phase filter scoped to a pattern under the prefix.
    #[must_use]
    pub fn filter<F>(
        mut self,
        pattern: impl Into<String>,
        phase: Phase,
        func: F,
        opts: FilterOptions,
    ) -> Self
    where
        F: Fn(&mut Context) -> Result<(), Interrupt> + Send + Sync + 'static,
    {
        self.ops.push(NsOp::Filter {
            pattern: pattern.into(),
            phase,
            func: Arc::new(func),
            opts,
        });
        self
    }

    /// Nests another namespace.
    #[must_use]
    pub fn namespace(mut self, child: Namespace) -> Self {
        self.ops.push(NsOp::Child(child));
        self
    }

    pub(crate) fn into_parts(self) -> (String, Vec<NsOp>) {
        (self.prefix, self.ops)
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("prefix", &self.prefix)
            .field("ops", &self.ops.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_normalization() {
        assert_eq!(Namespace::new("api").prefix(), "/api");
        assert_eq!(Namespace::new("/api").prefix(), "/api");
        assert_eq!(Namespace::new("/api/").prefix(), "/api");
    }
}
