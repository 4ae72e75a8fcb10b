//! Central routing for request failures.
//!
//! Fetchers propagate errors; whoever finally consumes them hands them to an
//! [`ErrorHandler`], which logs them and raises the session flags the
//! console reacts to.

use console_core::{ConsoleError, ConsoleResult, RequestError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, warn};

/// Session-wide failure flags.
#[derive(Debug, Default)]
pub struct SessionFlags {
    session_expired: AtomicBool,
    authorization_error: AtomicBool,
}

impl SessionFlags {
    pub fn is_session_expired(&self) -> bool {
        self.session_expired.load(Ordering::Acquire)
    }

    pub fn has_authorization_error(&self) -> bool {
        self.authorization_error.load(Ordering::Acquire)
    }

    /// Clear both flags, e.g. after signing in again.
    pub fn reset(&self) {
        self.session_expired.store(false, Ordering::Release);
        self.authorization_error.store(false, Ordering::Release);
    }
}

/// What the handler did with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    SessionExpired,
    AuthorizationError,
    /// Logged only.
    Reported,
}

/// Cloneable handle; clones share one set of [`SessionFlags`].
#[derive(Debug, Clone, Default)]
pub struct ErrorHandler {
    flags: Arc<SessionFlags>,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(&self) -> &SessionFlags {
        &self.flags
    }

    pub fn handle_error(&self, err: &ConsoleError) -> ErrorDisposition {
        match err {
            ConsoleError::Request(RequestError::SessionExpired) => {
                warn!(error = %err, "session expired");
                self.flags.session_expired.store(true, Ordering::Release);
                ErrorDisposition::SessionExpired
            }
            ConsoleError::Request(RequestError::PermissionDenied { action }) => {
                warn!(action = %action, "authorization error");
                self.flags.authorization_error.store(true, Ordering::Release);
                ErrorDisposition::AuthorizationError
            }
            other => {
                error!(error = %other, "request failed");
                ErrorDisposition::Reported
            }
        }
    }

    /// Unwrap `result`, routing a failure through [`handle_error`](Self::handle_error).
    pub fn report<T>(&self, result: ConsoleResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.handle_error(&err);
                None
            }
        }
    }
}
