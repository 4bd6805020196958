//! Controllers and their lifecycle.
//!
//! A controller handles one route with a fixed lifecycle around the action:
//! `init` → `prepare` → XSRF check (mutating verbs, when enabled) →
//! `url_mapping` → argument binding → the action via [`Controller::handle`]
//! → `render` (when auto-render is on and nothing was written) → `finish`.
//! `finish` always runs, even when the action failed.
//!
//! A fresh controller instance is created per request through the
//! descriptor's factory, so controllers may keep per-request state freely.

use std::collections::HashMap;
use std::sync::Arc;

use talaria_core::{Context, Interrupt};

use crate::param::ParamSpec;

/// Lifecycle method names excluded from auto routing.
pub(crate) const LIFECYCLE_DENY_LIST: &[&str] =
    &["init", "prepare", "url_mapping", "handle", "render", "finish"];

/// A request-scoped controller.
///
/// Only [`Controller::handle`] is mandatory; the lifecycle hooks default to
/// no-ops. `handle` receives the resolved action name and should return
/// [`Interrupt::method_not_allowed`] for actions it does not implement.
pub trait Controller: Send {
    /// First hook after instantiation.
    fn init(&mut self, ctx: &mut Context) -> Result<(), Interrupt> {
        let _ = ctx;
        Ok(())
    }

    /// Runs before the action; the usual place for per-controller guards.
    fn prepare(&mut self, ctx: &mut Context) -> Result<(), Interrupt> {
        let _ = ctx;
        Ok(())
    }

    /// Hook for custom action resolution, before argument binding.
    fn url_mapping(&mut self, ctx: &mut Context) -> Result<(), Interrupt> {
        let _ = ctx;
        Ok(())
    }

    /// Runs the named action.
    fn handle(&mut self, action: &str, ctx: &mut Context) -> Result<(), Interrupt>;

    /// Produces a response body when the action wrote nothing.
    fn render(&mut self, ctx: &mut Context) -> Result<(), Interrupt> {
        let _ = ctx;
        Ok(())
    }

    /// Always runs last, regardless of the action's outcome.
    fn finish(&mut self, ctx: &mut Context) -> Result<(), Interrupt> {
        let _ = ctx;
        Ok(())
    }
}

/// Creates a fresh controller per request.
pub type ControllerFactory = Arc<dyn Fn() -> Box<dyn Controller> + Send + Sync>;

/// Registration-time description of a controller: its name, factory, the
/// actions it declares, and per-action argument specs.
#[derive(Clone)]
pub struct ControllerDescriptor {
    name: String,
    factory: ControllerFactory,
    actions: Vec<String>,
    args: HashMap<String, Vec<ParamSpec>>,
}

impl ControllerDescriptor {
    /// Describes a controller by name and factory.
    pub fn new(name: impl Into<String>, factory: ControllerFactory) -> Self {
        Self {
            name: name.into(),
            factory,
            actions: Vec::new(),
            args: HashMap::new(),
        }
    }

    /// Declares an action the controller implements.
    #[must_use]
    pub fn action(mut self, name: impl Into<String>) -> Self {
        self.actions.push(name.into());
        self
    }

    /// Declares argument specs for an action.
    #[must_use]
    pub fn args(mut self, action: impl Into<String>, specs: Vec<ParamSpec>) -> Self {
        self.args.insert(action.into(), specs);
        self
    }

    /// The controller's registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared actions.
    #[must_use]
    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    /// Whether the controller declares `action`.
    #[must_use]
    pub fn declares(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a == action)
    }

    /// Argument specs for an action, if declared.
    #[must_use]
    pub fn arg_specs(&self, action: &str) -> Option<&[ParamSpec]> {
        self.args.get(action).map(Vec::as_slice)
    }

    /// Instantiates a fresh controller.
    #[must_use]
    pub fn instantiate(&self) -> Box<dyn Controller> {
        (self.factory)()
    }

    /// The path segment used for auto routes: the name without a trailing
    /// `Controller` suffix.
    #[must_use]
    pub fn auto_segment(&self) -> &str {
        self.name.strip_suffix("Controller").unwrap_or(&self.name)
    }
}

impl std::fmt::Debug for ControllerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerDescriptor")
            .field("name", &self.name)
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl Controller for Noop {
        fn handle(&mut self, _action: &str, _ctx: &mut Context) -> Result<(), Interrupt> {
            Ok(())
        }
    }

    fn descriptor() -> ControllerDescriptor {
        ControllerDescriptor::new("UserController", Arc::new(|| Box::new(Noop)))
            .action("List")
            .action("Save")
    }

    #[test]
    fn test_declares() {
        let d = descriptor();
        assert!(d.declares("List"));
        assert!(d.declares("Save"));
        assert!(!d.declares("Delete"));
    }

    #[test]
    fn test_auto_segment_strips_suffix() {
        assert_eq!(descriptor().auto_segment(), "User");
        let plain = ControllerDescriptor::new("Health", Arc::new(|| Box::new(Noop)));
        assert_eq!(plain.auto_segment(), "Health");
    }

    #[test]
    fn test_deny_list_covers_lifecycle() {
        for hook in ["init", "prepare", "render", "finish"] {
            assert!(LIFECYCLE_DENY_LIST.contains(&hook));
        }
    }
}
