//! Error kinds surfaced by the Wayland bridge.
//!
//! Library operations return [`BridgeError`]; the command line driver and the
//! configuration loader wrap these in `anyhow` with context.

use thiserror::Error;
use wayland_client::backend::WaylandError;
use wayland_client::{ConnectError, DispatchError};

/// Result alias used by the bridge API.
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The compositor socket could not be reached.
    #[error("Display on {display} not responding: {reason}")]
    ConnectionFailed { display: String, reason: String },

    /// A global the bridge cannot work without was not advertised.
    #[error("Wayland display {display} does not advertise required global {interface}")]
    MissingRequiredGlobal {
        display: String,
        interface: &'static str,
    },

    /// A display selector (name, terminal or frame) could not be resolved.
    #[error("No such Wayland display: {0}")]
    NoSuchDisplay(String),

    #[error("Invalid frame font")]
    InvalidFrameFont,

    #[error("Invalid frame name--not a string or nil")]
    InvalidFrameName,

    #[error("Terminal is not live, can't create new frames on it")]
    TerminalNotLive,

    #[error("Undefined color {0}")]
    UndefinedColor(String),

    /// A frame parameter carried a value of the wrong shape.
    #[error("Invalid value for frame parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("No such frame: {0}")]
    NoSuchFrame(u64),

    /// The protocol connection failed while dispatching or flushing.
    #[error("Wayland protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub(crate) fn connection_failed(display: &str, reason: impl ToString) -> Self {
        BridgeError::ConnectionFailed {
            display: display.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<DispatchError> for BridgeError {
    fn from(err: DispatchError) -> Self {
        BridgeError::Protocol(err.to_string())
    }
}

impl From<WaylandError> for BridgeError {
    fn from(err: WaylandError) -> Self {
        match err {
            WaylandError::Io(io) => BridgeError::Io(io),
            other => BridgeError::Protocol(other.to_string()),
        }
    }
}

impl From<ConnectError> for BridgeError {
    fn from(err: ConnectError) -> Self {
        BridgeError::connection_failed("<env>", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_match_host_wording() {
        assert_eq!(BridgeError::InvalidFrameFont.to_string(), "Invalid frame font");
        let err = BridgeError::connection_failed("wayland-9", "no socket");
        assert_eq!(
            err.to_string(),
            "Display on wayland-9 not responding: no socket"
        );
    }

    #[test]
    fn test_io_wayland_error_stays_io() {
        let err: BridgeError =
            WaylandError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe)).into();
        assert!(matches!(err, BridgeError::Io(_)));
    }
}
