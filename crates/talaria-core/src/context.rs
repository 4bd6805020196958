//! Per-request context and the context pool.
//!
//! A [`Context`] carries everything a request accumulates on its way through
//! dispatch: the parsed [`Request`], the [`Input`] side (bound route
//! parameters, form values, per-request data), the [`Output`] sink, and the
//! optional session handle. Contexts are pooled by the registry and reset
//! between requests, so every field here must be cheap to clear.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use talaria_router::Params;

use crate::session::Session;

/// Correlation id assigned when a context is checked out for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a new time-ordered id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The inbound request as handed to dispatch.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Full request target.
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body, possibly empty.
    pub body: Bytes,
}

impl Request {
    /// Builds a request with an empty header map and body.
    #[must_use]
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// The request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// The raw query string, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// A header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Input side of a request: route parameters, form values, request data.
#[derive(Debug, Default)]
pub struct Input {
    params: Params,
    form: Vec<(String, String)>,
    data: HashMap<String, serde_json::Value>,
    matched_pattern: Option<String>,
    journal: Option<Vec<(String, String)>>,
}

impl Input {
    /// A bound route parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Binds a route parameter. While a journal is active the write is also
    /// recorded, so a parameter-resetting filter can replay it.
    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(journal) = self.journal.as_mut() {
            journal.push((name.clone(), value.clone()));
        }
        self.params.set(name, value);
    }

    /// All bound parameters.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Replaces the whole parameter set, bypassing the journal.
    pub fn restore_params(&mut self, params: Params) {
        self.params = params;
    }

    /// Starts recording explicit parameter writes.
    pub fn start_param_journal(&mut self) {
        self.journal = Some(Vec::new());
    }

    /// Stops recording and returns the journaled writes.
    pub fn take_param_journal(&mut self) -> Vec<(String, String)> {
        self.journal.take().unwrap_or_default()
    }

    /// Parses the query string and an urlencoded body into form values.
    /// Decoding is lenient: invalid percent escapes come through as literal
    /// text. A source the deserializer rejects is skipped, never fatal.
    pub fn parse_form(&mut self, query: Option<&str>, body: Option<&str>) {
        for src in [query, body].into_iter().flatten() {
            match serde_urlencoded::from_str::<Vec<(String, String)>>(src) {
                Ok(pairs) => self.form.extend(pairs),
                Err(err) => debug!(error = %err, "skipping malformed form source"),
            }
        }
    }

    /// First form value for a key (query before body).
    #[must_use]
    pub fn query(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All form values for a key.
    pub fn query_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> {
        self.form
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Stores a per-request data value.
    pub fn set_data(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// A per-request data value.
    #[must_use]
    pub fn data(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// The pattern the route matched under, once known.
    #[must_use]
    pub fn matched_pattern(&self) -> Option<&str> {
        self.matched_pattern.as_deref()
    }

    /// Records the matched pattern.
    pub fn set_matched_pattern(&mut self, pattern: impl Into<String>) {
        self.matched_pattern = Some(pattern.into());
    }

    fn reset(&mut self) {
        self.params.clear();
        self.form.clear();
        self.data.clear();
        self.matched_pattern = None;
        self.journal = None;
    }
}

/// Buffered response sink.
///
/// The first body write marks the output as started; filters consult that
/// flag to decide whether a response is already underway.
#[derive(Debug, Default)]
pub struct Output {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    started: bool,
}

impl Output {
    /// The status set so far, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Sets the response status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    /// Sets the response status from a bare code; out-of-range codes
    /// collapse to 500.
    pub fn set_status_u16(&mut self, status: u16) {
        self.status =
            Some(StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Sets a response header, replacing earlier values. Invalid names or
    /// values are dropped.
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::try_from(name),
            http::header::HeaderValue::try_from(value),
        ) {
            self.headers.insert(name, value);
        }
    }

    /// Appends to the response body and marks the output started.
    pub fn write(&mut self, chunk: &[u8]) {
        self.started = true;
        self.body.extend_from_slice(chunk);
    }

    /// Writes a string body.
    pub fn write_str(&mut self, s: &str) {
        self.write(s.as_bytes());
    }

    /// Serializes `value` as a JSON body with the matching content type.
    pub fn json<T: Serialize>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        self.set_header("content-type", "application/json");
        self.write(&body);
        Ok(())
    }

    /// Whether the response body has started.
    #[must_use]
    pub fn started(&self) -> bool {
        self.started
    }

    /// The buffered body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Takes the buffered body out of the sink.
    pub fn take_body(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.body)
    }

    fn reset(&mut self) {
        self.status = None;
        self.headers.clear();
        self.body.clear();
        self.started = false;
    }
}

/// A finished response, copied out of the context before it is pooled.
#[derive(Debug)]
pub struct Response {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Vec<u8>,
}

/// Everything one request carries through dispatch.
pub struct Context {
    /// The inbound request.
    pub request: Request,
    /// Input side: parameters, form values, request data.
    pub input: Input,
    /// Buffered response.
    pub output: Output,
    /// Session handle, populated when a session provider is configured.
    pub session: Option<Box<dyn Session>>,
    handler_override: Option<crate::error::HandleFunc>,
    request_id: RequestId,
}

impl Context {
    /// Builds a fresh context for a request.
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self {
            request,
            input: Input::default(),
            output: Output::default(),
            session: None,
            handler_override: None,
            request_id: RequestId::new(),
        }
    }

    /// The correlation id for this request.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Installs a handler that wins over route matching for this request.
    /// Intended for filters that resolve the target themselves.
    pub fn set_handler_override(&mut self, handler: crate::error::HandleFunc) {
        self.handler_override = Some(handler);
    }

    /// Takes the installed handler override, if any.
    pub fn take_handler_override(&mut self) -> Option<crate::error::HandleFunc> {
        self.handler_override.take()
    }

    /// Rearms a pooled context for a new request.
    pub fn reset(&mut self, request: Request) {
        self.request = request;
        self.input.reset();
        self.output.reset();
        self.session = None;
        self.handler_override = None;
        self.request_id = RequestId::new();
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.request_id)
            .field("method", &self.request.method)
            .field("path", &self.request.path())
            .finish_non_exhaustive()
    }
}

/// Fixed-capacity pool of reusable contexts.
///
/// Checkout never blocks: an empty pool just allocates. Restore drops the
/// context instead of growing past the idle cap.
pub struct ContextPool {
    idle: Mutex<Vec<Context>>,
    max_idle: usize,
}

impl ContextPool {
    /// Creates a pool retaining at most `max_idle` idle contexts.
    #[must_use]
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// Checks out a context for `request`, reusing an idle one if possible.
    pub fn checkout(&self, request: Request) -> Context {
        if let Some(mut ctx) = self.idle.lock().pop() {
            ctx.reset(request);
            ctx
        } else {
            Context::new(request)
        }
    }

    /// Returns a context to the pool.
    pub fn restore(&self, ctx: Context) {
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(path: &str) -> Request {
        Request::new(Method::GET, path.parse().unwrap())
    }

    #[test]
    fn test_request_parts() {
        let req = request("/user/1?active=true");
        assert_eq!(req.path(), "/user/1");
        assert_eq!(req.query(), Some("active=true"));
    }

    #[test]
    fn test_input_params_and_journal() {
        let mut input = Input::default();
        input.set_param("id", "1");
        assert!(input.take_param_journal().is_empty());

        input.start_param_journal();
        input.set_param("id", "2");
        input.set_param("extra", "x");
        let journal = input.take_param_journal();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[0], ("id".to_string(), "2".to_string()));
        assert_eq!(input.param("extra"), Some("x"));
    }

    #[test]
    fn test_form_parsing() {
        let mut input = Input::default();
        input.parse_form(Some("a=1&b=hello+world"), Some("a=2"));
        assert_eq!(input.query("a"), Some("1"));
        assert_eq!(input.query("b"), Some("hello world"));
        assert_eq!(input.query_all("a").collect::<Vec<_>>(), vec!["1", "2"]);
    }

    #[test]
    fn test_invalid_escapes_parse_leniently() {
        // an invalid percent escape is kept as literal text, not an error
        let mut input = Input::default();
        input.parse_form(Some("%zz=bad"), None);
        assert_eq!(input.query("%zz"), Some("bad"));
    }

    #[test]
    fn test_output_write_marks_started() {
        let mut out = Output::default();
        assert!(!out.started());
        out.write_str("hello");
        assert!(out.started());
        assert_eq!(out.body(), b"hello");
    }

    #[test]
    fn test_output_status_u16_clamps() {
        let mut out = Output::default();
        out.set_status_u16(1000);
        assert_eq!(out.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        out.set_status_u16(404);
        assert_eq!(out.status(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_output_json() {
        let mut out = Output::default();
        out.json(&serde_json::json!({"ok": true})).unwrap();
        assert_eq!(
            out.headers().get("content-type").unwrap(),
            "application/json"
        );
        assert!(out.started());
    }

    #[test]
    fn test_context_reset_clears_state() {
        let mut ctx = Context::new(request("/a"));
        let first_id = ctx.request_id();
        ctx.input.set_param("id", "1");
        ctx.output.write_str("body");

        ctx.reset(request("/b"));
        assert_ne!(ctx.request_id(), first_id);
        assert!(ctx.input.param("id").is_none());
        assert!(!ctx.output.started());
        assert_eq!(ctx.request.path(), "/b");
    }

    #[test]
    fn test_pool_reuses_and_caps() {
        let pool = ContextPool::new(1);
        let a = pool.checkout(request("/a"));
        let b = pool.checkout(request("/b"));
        pool.restore(a);
        pool.restore(b); // over the cap, dropped

        let c = pool.checkout(request("/c"));
        assert_eq!(c.request.path(), "/c");
        assert!(pool.idle.lock().is_empty());
    }
}
