//! Reverse URL lookup tests.
//!
//! `Registry::url_for` is exercised against registered controller routes,
//! including grafted namespace routes, and a property check round-trips
//! generated URLs back through dispatch.

use std::sync::Arc;

use http::{Method, StatusCode};
use proptest::prelude::*;

use talaria::prelude::*;

struct EchoController;

impl Controller for EchoController {
    fn handle(&mut self, _action: &str, ctx: &mut Context) -> Result<(), Interrupt> {
        let id = ctx.input.param("id").unwrap_or_default().to_string();
        ctx.output.write_str(&id);
        Ok(())
    }
}

fn user_descriptor() -> ControllerDescriptor {
    ControllerDescriptor::new("UserController", Arc::new(|| Box::new(EchoController)))
        .action("List")
        .action("Show")
}

/// Routes lookup warnings through the test harness; later calls are no-ops.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn registry() -> Registry {
    init_tracing();
    let mut builder = RegistryBuilder::default();
    builder.add("/user", user_descriptor(), "get:List").unwrap();
    builder
        .add("/user/:id:int", user_descriptor(), "get:Show")
        .unwrap();
    builder.build().unwrap()
}

#[test]
fn test_url_for_literal_route() {
    let registry = registry();
    assert_eq!(registry.url_for("UserController.List", &[]), "/user");
}

#[test]
fn test_url_for_fills_typed_capture() {
    let registry = registry();
    assert_eq!(
        registry.url_for("UserController.Show", &[("id", "42")]),
        "/user/42"
    );
}

#[test]
fn test_url_for_appends_leftovers_as_query() {
    let registry = registry();
    let url = registry.url_for("UserController.Show", &[("id", "42"), ("page", "2")]);
    assert_eq!(url, "/user/42?page=2");
}

#[test]
fn test_url_for_unknown_endpoint_is_empty() {
    let registry = registry();
    assert_eq!(registry.url_for("GhostController.List", &[]), "");
    assert_eq!(registry.url_for("no-dot-in-here", &[]), "");
    assert_eq!(registry.url_for("UserController.Missing", &[]), "");
}

#[test]
fn test_url_for_missing_capture_value_is_empty() {
    let registry = registry();
    assert_eq!(registry.url_for("UserController.Show", &[]), "");
}

#[test]
fn test_url_for_sees_grafted_namespace_patterns() {
    let mut builder = RegistryBuilder::default();
    builder
        .namespace(Namespace::new("api").router("/user/:id", user_descriptor(), "get:Show"))
        .unwrap();
    let registry = builder.build().unwrap();

    assert_eq!(
        registry.url_for("UserController.Show", &[("id", "7")]),
        "/api/user/7"
    );
}

proptest! {
    /// A URL generated for a route must dispatch back to that route.
    #[test]
    fn prop_generated_urls_round_trip_through_dispatch(id in 1u64..1_000_000u64) {
        let registry = registry();
        let id = id.to_string();
        let url = registry.url_for("UserController.Show", &[("id", id.as_str())]);
        prop_assert!(!url.is_empty());

        let response = registry.serve(Request::new(Method::GET, url.parse().unwrap()));
        prop_assert_eq!(response.status, StatusCode::OK);
        prop_assert_eq!(std::str::from_utf8(&response.body).unwrap(), id.as_str());
    }
}
