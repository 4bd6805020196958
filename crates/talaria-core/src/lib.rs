//! Core request primitives for the Talaria dispatch stack.
//!
//! This crate defines what every other layer passes around:
//!
//! - [`Context`], [`Input`], [`Output`] — the pooled per-request state
//! - [`Interrupt`] and [`HandleFunc`] — the control-flow vocabulary shared
//!   by handlers, filters and chain links
//! - [`Config`] — dispatch configuration, TOML-loadable
//! - [`SessionProvider`] — the narrow seam to external session storage

pub mod config;
pub mod context;
pub mod error;
pub mod session;

pub use config::{Config, ConfigError};
pub use context::{Context, ContextPool, Input, Output, Request, RequestId, Response};
pub use error::{ErrorEnvelope, HandleFunc, Interrupt};
pub use session::{Session, SessionProvider};
