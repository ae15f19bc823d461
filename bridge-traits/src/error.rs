use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The request never produced a response (connect, TLS, timeout, body read).
    #[error("Transport error: {0}")]
    Transport(String),

    /// A remote call completed with a non-success status. The status is kept so
    /// callers can tell authorization loss apart from other failures.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            BridgeError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// `true` for 401 responses.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// `true` for failures that may go away when the call is repeated as is.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::Transport(_) | BridgeError::Io(_))
    }

    /// `true` for statuses that mean "this identity cannot see the resource".
    pub fn is_access_denied(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403) | Some(404))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
