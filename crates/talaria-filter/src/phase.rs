//! Dispatch phases and per-phase filter sets.

use tracing::trace;

use talaria_core::{Context, Interrupt};

use crate::filter::FilterRouter;

/// The five points in dispatch where filters run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Before the static handler is consulted.
    BeforeStatic,
    /// After body ingest and session acquire, before route matching.
    BeforeRouter,
    /// After route matching, before the target runs.
    BeforeExec,
    /// After the target ran.
    AfterExec,
    /// Always, at the tail of dispatch, even on short-circuits.
    FinishRouter,
}

impl Phase {
    /// All phases in dispatch order.
    pub const ALL: [Self; 5] = [
        Self::BeforeStatic,
        Self::BeforeRouter,
        Self::BeforeExec,
        Self::AfterExec,
        Self::FinishRouter,
    ];

    /// Stable name for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeStatic => "before_static",
            Self::BeforeRouter => "before_router",
            Self::BeforeExec => "before_exec",
            Self::AfterExec => "after_exec",
            Self::FinishRouter => "finish_router",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::BeforeStatic => 0,
            Self::BeforeRouter => 1,
            Self::BeforeExec => 2,
            Self::AfterExec => 3,
            Self::FinishRouter => 4,
        }
    }
}

/// Filters grouped by phase, in registration order.
///
/// Populated during setup, read-only while serving: the registry freezes the
/// set before it starts handing out references.
#[derive(Debug, Default)]
pub struct PhaseFilterSet {
    sets: [Vec<FilterRouter>; 5],
}

impl PhaseFilterSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a filter to a phase.
    pub fn push(&mut self, phase: Phase, filter: FilterRouter) {
        self.sets[phase.index()].push(filter);
    }

    /// The filters registered for a phase.
    #[must_use]
    pub fn filters(&self, phase: Phase) -> &[FilterRouter] {
        &self.sets[phase.index()]
    }

    /// Whether a phase has any filters.
    #[must_use]
    pub fn is_empty(&self, phase: Phase) -> bool {
        self.sets[phase.index()].is_empty()
    }

    /// Runs a phase against `path` in registration order. Returns true when
    /// a filter reported terminal and dispatch should short-circuit.
    pub fn run(&self, phase: Phase, ctx: &mut Context, path: &str) -> Result<bool, Interrupt> {
        for filter in self.filters(phase) {
            let verdict = filter.filter(ctx, path)?;
            if verdict.terminal {
                trace!(
                    phase = phase.as_str(),
                    pattern = filter.pattern(),
                    "filter short-circuited dispatch"
                );
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOptions;
    use http::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use talaria_core::{HandleFunc, Request};

    fn ctx(path: &str) -> Context {
        Context::new(Request::new(Method::GET, path.parse().unwrap()))
    }

    // tiny append-only log usable from Fn closures
    #[derive(Default)]
    struct OrderLog(std::sync::Mutex<Vec<&'static str>>);

    impl OrderLog {
        fn push(&self, tag: &'static str) {
            self.0.lock().unwrap().push(tag);
        }

        fn snapshot(&self) -> Vec<&'static str> {
            self.0.lock().unwrap().clone()
        }
    }

    fn counting(order: &Arc<OrderLog>, tag: &'static str) -> HandleFunc {
        let order = Arc::clone(order);
        Arc::new(move |_| {
            order.push(tag);
            Ok(())
        })
    }

    #[test]
    fn test_phase_runs_in_registration_order() {
        let order = Arc::new(OrderLog::default());
        let mut set = PhaseFilterSet::new();
        for tag in ["first", "second", "third"] {
            set.push(
                Phase::BeforeRouter,
                FilterRouter::new("/*", counting(&order, tag), &FilterOptions::new(), true)
                    .unwrap(),
            );
        }
        let mut c = ctx("/x");
        let terminal = set.run(Phase::BeforeRouter, &mut c, "/x").unwrap();
        assert!(!terminal);
        assert_eq!(order.snapshot(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_terminal_filter_stops_the_phase() {
        let order = Arc::new(OrderLog::default());
        let mut set = PhaseFilterSet::new();
        set.push(
            Phase::BeforeRouter,
            FilterRouter::new(
                "/*",
                Arc::new(|ctx: &mut Context| {
                    ctx.output.write_str("blocked");
                    Ok(())
                }),
                &FilterOptions::new(),
                true,
            )
            .unwrap(),
        );
        set.push(
            Phase::BeforeRouter,
            FilterRouter::new("/*", counting(&order, "after"), &FilterOptions::new(), true)
                .unwrap(),
        );

        let mut c = ctx("/x");
        let terminal = set.run(Phase::BeforeRouter, &mut c, "/x").unwrap();
        assert!(terminal);
        assert!(order.snapshot().is_empty());
    }

    #[test]
    fn test_phases_are_independent() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = Arc::clone(&hits);
        let mut set = PhaseFilterSet::new();
        set.push(
            Phase::FinishRouter,
            FilterRouter::new(
                "/*",
                Arc::new(move |_| {
                    hits2.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
                &FilterOptions::new(),
                true,
            )
            .unwrap(),
        );

        let mut c = ctx("/x");
        set.run(Phase::BeforeRouter, &mut c, "/x").unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        set.run(Phase::FinishRouter, &mut c, "/x").unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
