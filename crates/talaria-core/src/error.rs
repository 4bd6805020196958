//! Error taxonomy for request handling.
//!
//! Handlers, filters and controller actions all return
//! `Result<(), Interrupt>`. An [`Interrupt`] is not necessarily an error:
//! [`Interrupt::Abort`] is the sentinel a handler raises after writing (or
//! deciding) its own response, while [`Interrupt::Failure`] carries an
//! unexpected failure that the recovery boundary maps to a 500 unless an
//! error handler is registered for its message.

use serde::Serialize;
use thiserror::Error;

use crate::context::Context;

/// A handler, filter action or chain continuation.
pub type HandleFunc = std::sync::Arc<dyn Fn(&mut Context) -> Result<(), Interrupt> + Send + Sync>;

/// Control-flow interrupt raised during dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Interrupt {
    /// Deliberate short-circuit with a status code. Not logged as an error.
    #[error("aborted with status {status}")]
    Abort {
        /// HTTP status to respond with if nothing was written.
        status: u16,
    },
    /// Unexpected failure, mapped through the error-handler table or to 500.
    #[error("handler failure: {0}")]
    Failure(String),
}

impl Interrupt {
    /// Abort with 404 Not Found.
    #[must_use]
    pub fn not_found() -> Self {
        Self::Abort { status: 404 }
    }

    /// Abort with 405 Method Not Allowed.
    #[must_use]
    pub fn method_not_allowed() -> Self {
        Self::Abort { status: 405 }
    }

    /// Abort with 413 Payload Too Large.
    #[must_use]
    pub fn payload_too_large() -> Self {
        Self::Abort { status: 413 }
    }

    /// Failure from anything displayable.
    pub fn failure(msg: impl std::fmt::Display) -> Self {
        Self::Failure(msg.to_string())
    }
}

/// JSON body written for recovered failures when error exposure is on.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope<'a> {
    /// HTTP status code of the response.
    pub status: u16,
    /// Human-readable error detail.
    pub error: &'a str,
    /// Request correlation id.
    pub request_id: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_helpers() {
        assert_eq!(Interrupt::not_found(), Interrupt::Abort { status: 404 });
        assert_eq!(
            Interrupt::method_not_allowed(),
            Interrupt::Abort { status: 405 }
        );
        assert_eq!(
            Interrupt::payload_too_large(),
            Interrupt::Abort { status: 413 }
        );
    }

    #[test]
    fn test_failure_display() {
        let i = Interrupt::failure("db connection lost");
        assert_eq!(i.to_string(), "handler failure: db connection lost");
    }

    #[test]
    fn test_envelope_serializes() {
        let env = ErrorEnvelope {
            status: 500,
            error: "boom",
            request_id: "0192-test",
        };
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("\"status\":500"));
        assert!(json.contains("\"error\":\"boom\""));
    }
}
