//! # Talaria
//!
//! **Request routing and filter dispatch for buffered HTTP services**
//!
//! Talaria routes HTTP requests through a segment trie, a five-phase filter
//! pipeline, and a controller lifecycle, producing fully buffered responses:
//!
//! - **Expressive patterns** – `:name`, typed `:id:int`, inline regex,
//!   optional segments, splats, and path/extension captures
//! - **Five filter phases** – `BeforeStatic`, `BeforeRouter`, `BeforeExec`,
//!   `AfterExec`, `FinishRouter`, plus composable filter chains
//! - **Fail-fast registration** – bad patterns, unknown verbs, and undeclared
//!   actions are rejected when routes are added, never at request time
//! - **Frozen serving state** – [`RegistryBuilder`] is mutable,
//!   [`Registry`] is immutable and freely shared across threads
//!
//! ## Quick Start
//!
//! ```rust
//! use talaria::prelude::*;
//!
//! let mut builder = RegistryBuilder::default();
//! builder.get("/user/:id", |ctx: &mut Context| {
//!     let id = ctx.input.param("id").unwrap_or_default().to_string();
//!     ctx.output.write_str(&id);
//!     Ok(())
//! })?;
//! let registry = builder.build()?;
//!
//! let response = registry.serve(Request::new(http::Method::GET, "/user/42".parse()?));
//! assert_eq!(response.status.as_u16(), 200);
//! assert_eq!(&response.body[..], b"42");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! One request flows through the frozen registry in a fixed order:
//!
//! ```text
//! Request → FilterChains → StaticCheck → BodyIngest → SessionAcquire
//!         → BeforeRouter → RouteMatch → BeforeExec → Target → AfterExec
//!                                                                ↓
//! Response ← Statistics ← AccessLog ← FinishRouter ←─────────────┘
//! ```

pub use talaria_core as core;
pub use talaria_filter as filter;
pub use talaria_router as router;

pub mod controller;
mod dispatch;
pub mod namespace;
pub mod param;
pub mod registry;
mod reverse;
pub mod stats;

pub use controller::{Controller, ControllerDescriptor, ControllerFactory};
pub use namespace::Namespace;
pub use param::{BoundArgs, ParamSource, ParamSpec};
pub use registry::{RawHandler, Registry, RegistryBuilder, RegistryError, RouteTarget};
pub use stats::{UrlStat, UrlStats};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use talaria::prelude::*;
/// ```
pub mod prelude {
    pub use talaria_core::{
        Config, Context, HandleFunc, Interrupt, Request, RequestId, Response, Session,
        SessionProvider,
    };

    pub use talaria_filter::{ChainBuilder, FilterOptions, FilterRouter, Phase};

    pub use talaria_router::{Params, Tree};

    pub use crate::controller::{Controller, ControllerDescriptor};
    pub use crate::namespace::Namespace;
    pub use crate::param::{BoundArgs, ParamSource, ParamSpec};
    pub use crate::registry::{RawHandler, Registry, RegistryBuilder, RegistryError};
}
