//! Session seam.
//!
//! Session persistence is an external collaborator. Dispatch only needs two
//! things: acquire a session for a request and release it once the response
//! is written. Providers report failures as opaque [`anyhow::Error`]s, which
//! dispatch maps to 503.

use crate::context::Request;

/// A live session bound to one request.
pub trait Session: Send {
    /// Stable identifier of the session.
    fn id(&self) -> &str;

    /// Reads a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Writes a value.
    fn set(&mut self, key: &str, value: String);

    /// Removes a value.
    fn remove(&mut self, key: &str);
}

/// Acquires and releases sessions around dispatch.
pub trait SessionProvider: Send + Sync {
    /// Acquires the session for a request, creating one if needed.
    fn acquire(&self, request: &Request) -> anyhow::Result<Box<dyn Session>>;

    /// Persists and releases a session after the response is written.
    fn release(&self, session: Box<dyn Session>) -> anyhow::Result<()>;
}
