//! Route registration and the frozen serving registry.
//!
//! Setup and serving are separated at the type level: a [`RegistryBuilder`]
//! exposes the mutable registration API, and [`RegistryBuilder::build`]
//! freezes everything into a [`Registry`] whose serving structures are
//! immutable and shared. Registration mistakes (bad patterns, unknown verbs,
//! actions a controller never declared) fail fast at registration, never at
//! request time.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use http::Method;
use thiserror::Error;

use talaria_core::{Config, Context, ContextPool, HandleFunc, Interrupt, SessionProvider};
use talaria_filter::{ChainBuilder, ChainConfig, FilterOptions, FilterRouter, Phase, PhaseFilterSet};
use talaria_router::{PatternError, Tree};

use crate::controller::{ControllerDescriptor, LIFECYCLE_DENY_LIST};
use crate::namespace::{Namespace, NsOp};
use crate::reverse;
use crate::stats::{UrlStat, UrlStats};

/// Verbs the dispatcher recognizes; anything else is 405.
pub(crate) const KNOWN_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::HEAD,
    Method::OPTIONS,
];

/// Idle contexts the pool retains.
const POOL_MAX_IDLE: usize = 64;

/// Registration-time error. Every variant is a setup mistake; none of these
/// can occur while serving.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A mapping names an action the controller does not declare.
    #[error("controller `{controller}` does not declare action `{action}`")]
    UnknownAction {
        /// Controller name.
        controller: String,
        /// Offending action.
        action: String,
    },
    /// A mapping names a verb outside the supported set.
    #[error("unknown HTTP verb `{verb}`")]
    UnknownVerb {
        /// Offending verb.
        verb: String,
    },
    /// A method mapping string could not be parsed.
    #[error("invalid method mapping `{mapping}`, expected `verb[,verb]:Action[;...]`")]
    InvalidMapping {
        /// Offending mapping string.
        mapping: String,
    },
    /// The route pattern was rejected by the router.
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// A handler given full control of the context, bypassing the controller
/// lifecycle.
pub trait RawHandler: Send + Sync {
    /// Handles the request.
    fn handle(&self, ctx: &mut Context) -> Result<(), Interrupt>;
}

/// What a matched route dispatches to. Resolved fully at registration.
pub enum RouteTarget {
    /// A controller with its verb-to-action mapping.
    Controller {
        /// The controller's descriptor.
        descriptor: ControllerDescriptor,
        /// Verb (uppercase) or `*` to action name. Empty means every verb
        /// resolves to the action named after it.
        methods: HashMap<String, String>,
    },
    /// A plain function handler.
    Handler {
        /// The handler.
        func: HandleFunc,
        /// Verbs the handler accepts; `None` accepts all.
        methods: Option<HashSet<Method>>,
    },
    /// A raw handler outside the controller lifecycle.
    Raw {
        /// The handler.
        handler: Arc<dyn RawHandler>,
    },
}

impl std::fmt::Debug for RouteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Controller { descriptor, .. } => f
                .debug_struct("Controller")
                .field("name", &descriptor.name())
                .finish_non_exhaustive(),
            Self::Handler { methods, .. } => f
                .debug_struct("Handler")
                .field("methods", methods)
                .finish_non_exhaustive(),
            Self::Raw { .. } => f.debug_struct("Raw").finish_non_exhaustive(),
        }
    }
}

/// Per-verb route trees with a shared case-sensitivity setting.
pub(crate) struct RouteTable {
    trees: HashMap<Method, Tree<Arc<RouteTarget>>>,
    case_sensitive: bool,
}

impl RouteTable {
    pub(crate) fn new(case_sensitive: bool) -> Self {
        let mut trees = HashMap::new();
        for method in KNOWN_METHODS {
            trees.insert(
                method,
                if case_sensitive {
                    Tree::new()
                } else {
                    Tree::case_insensitive()
                },
            );
        }
        Self {
            trees,
            case_sensitive,
        }
    }

    pub(crate) fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub(crate) fn tree(&self, method: &Method) -> Option<&Tree<Arc<RouteTarget>>> {
        self.trees.get(method)
    }

    pub(crate) fn trees(&self) -> &HashMap<Method, Tree<Arc<RouteTarget>>> {
        &self.trees
    }

    fn insert(
        &mut self,
        verbs: &HashSet<Method>,
        pattern: &str,
        target: &Arc<RouteTarget>,
    ) -> Result<(), PatternError> {
        for verb in verbs {
            if let Some(tree) = self.trees.get_mut(verb) {
                tree.add_router(pattern, Arc::clone(target))?;
            }
        }
        Ok(())
    }

    fn insert_all(&mut self, pattern: &str, target: &Arc<RouteTarget>) -> Result<(), PatternError> {
        for tree in self.trees.values_mut() {
            tree.add_router(pattern, Arc::clone(target))?;
        }
        Ok(())
    }

    pub(crate) fn graft_from(&mut self, prefix: &str, other: RouteTable) -> Result<(), PatternError> {
        for (method, tree) in other.trees {
            if tree.is_empty() {
                continue;
            }
            if let Some(own) = self.trees.get_mut(&method) {
                own.graft(prefix, tree)?;
            }
        }
        Ok(())
    }
}

fn parse_verb(verb: &str) -> Result<Method, RegistryError> {
    let upper = verb.trim().to_ascii_uppercase();
    KNOWN_METHODS
        .iter()
        .find(|m| m.as_str() == upper)
        .cloned()
        .ok_or(RegistryError::UnknownVerb {
            verb: verb.to_string(),
        })
}

/// Parses a verb list: `*` accepts every verb, otherwise a comma list.
fn parse_verbs(verbs: &str) -> Result<Option<HashSet<Method>>, RegistryError> {
    if verbs.trim() == "*" {
        return Ok(None);
    }
    let mut set = HashSet::new();
    for verb in verbs.split(',') {
        set.insert(parse_verb(verb)?);
    }
    Ok(Some(set))
}

/// Registers a controller route, validating the mapping string
/// (`"get:List;post,put:Save"` or `"*:Handle"`; empty maps every verb to
/// its same-named action).
pub(crate) fn add_controller_route(
    table: &mut RouteTable,
    pattern: &str,
    descriptor: ControllerDescriptor,
    mapping: &str,
) -> Result<(), RegistryError> {
    let mut methods = HashMap::new();
    let mut verbs = HashSet::new();
    let mut all = mapping.trim().is_empty();

    for clause in mapping.split(';').filter(|c| !c.trim().is_empty()) {
        let (verb_list, action) =
            clause
                .split_once(':')
                .ok_or_else(|| RegistryError::InvalidMapping {
                    mapping: mapping.to_string(),
                })?;
        let action = action.trim();
        if !descriptor.declares(action) {
            return Err(RegistryError::UnknownAction {
                controller: descriptor.name().to_string(),
                action: action.to_string(),
            });
        }
        for verb in verb_list.split(',') {
            let verb = verb.trim();
            if verb == "*" {
                methods.insert("*".to_string(), action.to_string());
                all = true;
            } else {
                let method = parse_verb(verb)?;
                methods.insert(method.as_str().to_string(), action.to_string());
                verbs.insert(method);
            }
        }
    }

    let target = Arc::new(RouteTarget::Controller {
        descriptor,
        methods,
    });
    if all {
        table.insert_all(pattern, &target)?;
    } else {
        table.insert(&verbs, pattern, &target)?;
    }
    Ok(())
}

pub(crate) fn add_handler_route(
    table: &mut RouteTable,
    verbs: Option<HashSet<Method>>,
    pattern: &str,
    func: HandleFunc,
) -> Result<(), RegistryError> {
    let target = Arc::new(RouteTarget::Handler {
        func,
        methods: verbs.clone(),
    });
    match verbs {
        None => table.insert_all(pattern, &target)?,
        Some(set) => table.insert(&set, pattern, &target)?,
    }
    Ok(())
}

pub(crate) fn add_raw_route(
    table: &mut RouteTable,
    pattern: &str,
    handler: Arc<dyn RawHandler>,
    capture_all: bool,
) -> Result<(), RegistryError> {
    let pattern = if capture_all && !pattern.ends_with('*') {
        format!("{}/?:all", pattern.trim_end_matches('/'))
    } else {
        pattern.to_string()
    };
    let target = Arc::new(RouteTarget::Raw { handler });
    table.insert_all(&pattern, &target)?;
    Ok(())
}

/// Registers one route per declared action, skipping lifecycle names. Each
/// action gets four pattern variants: lower/exact case, with and without a
/// trailing `/*`.
pub(crate) fn add_auto_routes(
    table: &mut RouteTable,
    prefix: &str,
    descriptor: &ControllerDescriptor,
) -> Result<(), RegistryError> {
    let segment = descriptor.auto_segment().to_string();
    for action in descriptor.actions().to_vec() {
        if LIFECYCLE_DENY_LIST.contains(&action.to_lowercase().as_str()) {
            continue;
        }
        let mut patterns = Vec::new();
        for (c, a) in [
            (segment.to_lowercase(), action.to_lowercase()),
            (segment.clone(), action.clone()),
        ] {
            for suffix in ["", "/*"] {
                let pattern = format!("{prefix}/{c}/{a}{suffix}");
                if !patterns.contains(&pattern) {
                    patterns.push(pattern);
                }
            }
        }
        for pattern in patterns {
            let mut methods = HashMap::new();
            methods.insert("*".to_string(), action.clone());
            let target = Arc::new(RouteTarget::Controller {
                descriptor: descriptor.clone(),
                methods,
            });
            table.insert_all(&pattern, &target)?;
        }
    }
    Ok(())
}

/// Mutable registration surface. Consumed by [`RegistryBuilder::build`].
pub struct RegistryBuilder {
    config: Config,
    table: RouteTable,
    filters: PhaseFilterSet,
    chains: Vec<ChainConfig>,
    error_handlers: HashMap<String, HandleFunc>,
    static_handler: Option<HandleFunc>,
    session_provider: Option<Arc<dyn SessionProvider>>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("config", &self.config)
            .field("chains", &self.chains.len())
            .field("error_handlers", &self.error_handlers.len())
            .finish_non_exhaustive()
    }
}

impl RegistryBuilder {
    /// Creates a builder with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let table = RouteTable::new(config.router_case_sensitive);
        Self {
            config,
            table,
            filters: PhaseFilterSet::new(),
            chains: Vec::new(),
            error_handlers: HashMap::new(),
            static_handler: None,
            session_provider: None,
        }
    }

    /// The configuration this builder was created with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registers a controller route. See [`add_controller_route`] for the
    /// mapping grammar.
    pub fn add(
        &mut self,
        pattern: &str,
        descriptor: ControllerDescriptor,
        mapping: &str,
    ) -> Result<&mut Self, RegistryError> {
        add_controller_route(&mut self.table, pattern, descriptor, mapping)?;
        Ok(self)
    }

    /// Registers a handler for an explicit verb list (`"get,post"` or `"*"`).
    pub fn add_method<F>(
        &mut self,
        verbs: &str,
        pattern: &str,
        func: F,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&mut Context) -> Result<(), Interrupt> + Send + Sync + 'static,
    {
        let verbs = parse_verbs(verbs)?;
        add_handler_route(&mut self.table, verbs, pattern, Arc::new(func))?;
        Ok(self)
    }

    /// Registers a GET handler.
    pub fn get<F>(&mut self, pattern: &str, func: F) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&mut Context) -> Result<(), Interrupt> + Send + Sync + 'static,
    {
        self.add_method("get", pattern, func)
    }

    /// Registers a POST handler.
    pub fn post<F>(&mut self, pattern: &str, func: F) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&mut Context) -> Result<(), Interrupt> + Send + Sync + 'static,
    {
        self.add_method("post", pattern, func)
    }

    /// Registers a PUT handler.
    pub fn put<F>(&mut self, pattern: &str, func: F) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&mut Context) -> Result<(), Interrupt> + Send + Sync + 'static,
    {
        self.add_method("put", pattern, func)
    }

    /// Registers a DELETE handler.
    pub fn delete<F>(&mut self, pattern: &str, func: F) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&mut Context) -> Result<(), Interrupt> + Send + Sync + 'static,
    {
        self.add_method("delete", pattern, func)
    }

    /// Registers a HEAD handler.
    pub fn head<F>(&mut self, pattern: &str, func: F) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&mut Context) -> Result<(), Interrupt> + Send + Sync + 'static,
    {
        self.add_method("head", pattern, func)
    }

    /// Registers a PATCH handler.
    pub fn patch<F>(&mut self, pattern: &str, func: F) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&mut Context) -> Result<(), Interrupt> + Send + Sync + 'static,
    {
        self.add_method("patch", pattern, func)
    }

    /// Registers an OPTIONS handler.
    pub fn options<F>(&mut self, pattern: &str, func: F) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&mut Context) -> Result<(), Interrupt> + Send + Sync + 'static,
    {
        self.add_method("options", pattern, func)
    }

    /// Registers a handler for every verb.
    pub fn any<F>(&mut self, pattern: &str, func: F) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&mut Context) -> Result<(), Interrupt> + Send + Sync + 'static,
    {
        self.add_method("*", pattern, func)
    }

    /// Registers a raw handler. With `capture_all` the pattern also matches
    /// any sub-path, binding it under `all`.
    pub fn handler(
        &mut self,
        pattern: &str,
        raw: Arc<dyn RawHandler>,
        capture_all: bool,
    ) -> Result<&mut Self, RegistryError> {
        add_raw_route(&mut self.table, pattern, raw, capture_all)?;
        Ok(self)
    }

    /// Auto-routes a controller: one route per declared action.
    pub fn add_auto(&mut self, descriptor: ControllerDescriptor) -> Result<&mut Self, RegistryError> {
        add_auto_routes(&mut self.table, "", &descriptor)?;
        Ok(self)
    }

    /// Auto-routes a controller under a prefix.
    pub fn add_auto_prefix(
        &mut self,
        prefix: &str,
        descriptor: ControllerDescriptor,
    ) -> Result<&mut Self, RegistryError> {
        add_auto_routes(&mut self.table, prefix.trim_end_matches('/'), &descriptor)?;
        Ok(self)
    }

    /// Installs a phase filter.
    pub fn insert_filter<F>(
        &mut self,
        pattern: &str,
        phase: Phase,
        func: F,
        opts: FilterOptions,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&mut Context) -> Result<(), Interrupt> + Send + Sync + 'static,
    {
        self.insert_filter_handle(pattern, phase, Arc::new(func), opts)
    }

    pub(crate) fn insert_filter_handle(
        &mut self,
        pattern: &str,
        phase: Phase,
        func: HandleFunc,
        opts: FilterOptions,
    ) -> Result<&mut Self, RegistryError> {
        let filter = FilterRouter::new(pattern, func, &opts, self.config.router_case_sensitive)?;
        self.filters.push(phase, filter);
        Ok(self)
    }

    /// Registers a filter chain. Chains compose at [`RegistryBuilder::build`]:
    /// the most recently installed chain becomes the outermost link.
    pub fn insert_filter_chain(
        &mut self,
        pattern: &str,
        builder: ChainBuilder,
        opts: FilterOptions,
    ) -> &mut Self {
        self.chains.push(ChainConfig::new(pattern, builder, opts));
        self
    }

    /// Registers a recovery handler for a status code (`"404"`) or a
    /// failure message key.
    pub fn error_handler<F>(&mut self, key: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(&mut Context) -> Result<(), Interrupt> + Send + Sync + 'static,
    {
        self.error_handlers.insert(key.into(), Arc::new(func));
        self
    }

    /// Installs the static-prefix handler consulted before routing.
    pub fn static_handler<F>(&mut self, func: F) -> &mut Self
    where
        F: Fn(&mut Context) -> Result<(), Interrupt> + Send + Sync + 'static,
    {
        self.static_handler = Some(Arc::new(func));
        self
    }

    /// Installs the session provider.
    pub fn session_provider(&mut self, provider: Arc<dyn SessionProvider>) -> &mut Self {
        self.session_provider = Some(provider);
        self
    }

    /// Merges a namespace: its routes graft under the namespace prefix and
    /// its filters are re-registered with prefixed patterns.
    pub fn namespace(&mut self, ns: Namespace) -> Result<&mut Self, RegistryError> {
        self.apply_namespace(ns, "")?;
        Ok(self)
    }

    fn apply_namespace(&mut self, ns: Namespace, parent: &str) -> Result<(), RegistryError> {
        let (prefix, ops) = ns.into_parts();
        let prefix = format!("{parent}{prefix}");
        let mut table = RouteTable::new(self.table.case_sensitive());
        for op in ops {
            match op {
                NsOp::Controller {
                    pattern,
                    descriptor,
                    mapping,
                } => add_controller_route(&mut table, &pattern, descriptor, &mapping)?,
                NsOp::Handler {
                    verbs,
                    pattern,
                    func,
                } => {
                    let verbs = parse_verbs(&verbs)?;
                    add_handler_route(&mut table, verbs, &pattern, func)?;
                }
                NsOp::Raw {
                    pattern,
                    handler,
                    capture_all,
                } => add_raw_route(&mut table, &pattern, handler, capture_all)?,
                NsOp::Auto { descriptor } => add_auto_routes(&mut table, "", &descriptor)?,
                NsOp::Filter {
                    pattern,
                    phase,
                    func,
                    opts,
                } => {
                    let full = join_pattern(&prefix, &pattern);
                    self.insert_filter_handle(&full, phase, func, opts)?;
                }
                NsOp::Child(child) => self.apply_namespace(child, &prefix)?,
            }
        }
        self.table.graft_from(&prefix, table)?;
        Ok(())
    }

    /// Freezes the builder into a serving [`Registry`], composing the
    /// filter chains around the dispatch state machine.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let case_sensitive = self.config.router_case_sensitive;
        let core = Arc::new(RegistryCore {
            config: self.config,
            table: self.table,
            filters: self.filters,
            error_handlers: self.error_handlers,
            static_handler: self.static_handler,
            session_provider: self.session_provider,
            stats: UrlStats::new(),
        });

        // innermost link: the dispatch state machine itself
        let dispatch_core = Arc::clone(&core);
        let dispatch_fn: HandleFunc =
            Arc::new(move |ctx: &mut Context| crate::dispatch::dispatch(&dispatch_core, ctx));
        let mut head = Arc::new(FilterRouter::new(
            "/*",
            dispatch_fn,
            &FilterOptions::new(),
            case_sensitive,
        )?);

        for chain in self.chains {
            let (pattern, builder, opts) = chain.into_parts();
            let continuation_target = Arc::clone(&head);
            let continuation: HandleFunc = Arc::new(move |ctx: &mut Context| {
                let path = ctx.request.path().to_string();
                continuation_target.filter(ctx, &path).map(|_| ())
            });
            let body = builder(continuation);
            head = Arc::new(FilterRouter::with_next(
                pattern,
                body,
                &opts,
                case_sensitive,
                Some(head),
            )?);
        }

        Ok(Registry {
            core,
            chain_root: head,
            pool: ContextPool::new(POOL_MAX_IDLE),
        })
    }
}

fn join_pattern(prefix: &str, pattern: &str) -> String {
    if pattern == "/" {
        prefix.to_string()
    } else {
        format!("{prefix}{pattern}")
    }
}

/// Frozen registration state shared by the chain links and the dispatcher.
pub(crate) struct RegistryCore {
    pub(crate) config: Config,
    pub(crate) table: RouteTable,
    pub(crate) filters: PhaseFilterSet,
    pub(crate) error_handlers: HashMap<String, HandleFunc>,
    pub(crate) static_handler: Option<HandleFunc>,
    pub(crate) session_provider: Option<Arc<dyn SessionProvider>>,
    pub(crate) stats: UrlStats,
}

/// Frozen, shareable serving registry. Multiple independent instances can
/// coexist in one process.
pub struct Registry {
    pub(crate) core: Arc<RegistryCore>,
    pub(crate) chain_root: Arc<FilterRouter>,
    pub(crate) pool: ContextPool,
}

impl Registry {
    /// The configuration this registry serves with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.core.config
    }

    /// Reverse URL lookup for `"ControllerName.Action"`. Provided pairs fill
    /// pattern captures; leftovers become a query string. Returns an empty
    /// string on no match or malformed input.
    #[must_use]
    pub fn url_for(&self, endpoint: &str, pairs: &[(&str, &str)]) -> String {
        reverse::url_for(&self.core.table, endpoint, pairs)
    }

    /// Snapshot of the per-route statistics.
    #[must_use]
    pub fn stats(&self) -> Vec<UrlStat> {
        self.core.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;

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
    fn test_unknown_action_fails_fast() {
        let mut builder = RegistryBuilder::default();
        let err = builder
            .add("/user", descriptor(), "get:Missing")
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownAction { .. }));
    }

    #[test]
    fn test_unknown_verb_fails_fast() {
        let mut builder = RegistryBuilder::default();
        let err = builder.add("/user", descriptor(), "fetch:List").unwrap_err();
        assert!(matches!(err, RegistryError::UnknownVerb { .. }));
    }

    #[test]
    fn test_invalid_mapping_fails_fast() {
        let mut builder = RegistryBuilder::default();
        let err = builder.add("/user", descriptor(), "getList").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidMapping { .. }));
    }

    #[test]
    fn test_builder_debug_stays_summary_level() {
        let mut builder = RegistryBuilder::default();
        builder.add("/user", descriptor(), "get:List").unwrap();
        let rendered = format!("{builder:?}");
        assert!(rendered.contains("RegistryBuilder"));
        assert!(rendered.contains(".."));
    }

    #[test]
    fn test_namespace_table_inherits_case_sensitivity() {
        let mut config = Config::default();
        config.router_case_sensitive = false;
        let mut builder = RegistryBuilder::new(config);
        builder
            .namespace(Namespace::new("api").router("/User", descriptor(), "get:List"))
            .unwrap();
        let registry = builder.build().unwrap();

        let tree = registry.core.table.tree(&Method::GET).unwrap();
        assert!(tree.match_path("/api/user").is_some());
        assert!(tree.match_path("/API/USER").is_some());
    }

    #[test]
    fn test_mapping_targets_only_named_verbs() {
        let mut builder = RegistryBuilder::default();
        builder
            .add("/user", descriptor(), "get:List;post,put:Save")
            .unwrap();
        let registry = builder.build().unwrap();

        let get = registry.core.table.tree(&Method::GET).unwrap();
        assert!(get.match_path("/user").is_some());
        let put = registry.core.table.tree(&Method::PUT).unwrap();
        assert!(put.match_path("/user").is_some());
        let delete = registry.core.table.tree(&Method::DELETE).unwrap();
        assert!(delete.match_path("/user").is_none());
    }

    #[test]
    fn test_catch_all_mapping_covers_every_verb() {
        let mut builder = RegistryBuilder::default();
        builder.add("/user", descriptor(), "*:List").unwrap();
        let registry = builder.build().unwrap();
        for method in KNOWN_METHODS {
            let tree = registry.core.table.tree(&method).unwrap();
            assert!(tree.match_path("/user").is_some(), "missing for {method}");
        }
    }

    #[test]
    fn test_auto_routes_skip_lifecycle_and_cover_variants() {
        let d = ControllerDescriptor::new("UserController", Arc::new(|| Box::new(Noop)))
            .action("List")
            .action("Finish");
        let mut builder = RegistryBuilder::default();
        builder.add_auto(d).unwrap();
        let registry = builder.build().unwrap();

        let tree = registry.core.table.tree(&Method::GET).unwrap();
        assert!(tree.match_path("/user/list").is_some());
        assert!(tree.match_path("/User/List").is_some());
        assert!(tree.match_path("/user/list/7/extra").is_some());
        // lifecycle names are never auto-routed
        assert!(tree.match_path("/user/finish").is_none());
    }

    #[test]
    fn test_handler_capture_all_appends_optional_subpath() {
        struct Raw;
        impl RawHandler for Raw {
            fn handle(&self, _ctx: &mut Context) -> Result<(), Interrupt> {
                Ok(())
            }
        }
        let mut builder = RegistryBuilder::default();
        builder.handler("/proxy", Arc::new(Raw), true).unwrap();
        let registry = builder.build().unwrap();

        let tree = registry.core.table.tree(&Method::GET).unwrap();
        assert!(tree.match_path("/proxy").is_some());
        let (_, params) = tree.match_path("/proxy/deep").unwrap();
        assert_eq!(params.get("all"), Some("deep"));
    }
}
