//! Phase filters and filter chains.
//!
//! Filters are pattern-scoped functions that run at fixed points
//! ([`Phase`]s) of dispatch. A [`FilterRouter`] carries one pattern and one
//! action; [`PhaseFilterSet`] groups them by phase in registration order.
//! [`ChainConfig`] records onion-style chains composed by the registry at
//! freeze time.

pub mod chain;
pub mod filter;
pub mod phase;

pub use chain::{ChainBuilder, ChainConfig};
pub use filter::{FilterOptions, FilterRouter, FilterVerdict};
pub use phase::{Phase, PhaseFilterSet};
