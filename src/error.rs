use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by the protocol client.
///
/// Every variant renders to a self-contained diagnostic that names the
/// operation and, when the device answered, the raw line it sent back.
#[derive(Error, Debug)]
pub enum Error {
    #[error("No device connected. Connect a communicator before sending commands.")]
    NotConnected,

    #[error("Device returned no response to `{op}`")]
    NoResponse { op: &'static str },

    #[error("Device did not respond to `{op}` within {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("Device rejected `{op}`. Error returned from the device: {line}")]
    DeviceRejected { op: &'static str, line: String },

    #[error("Device returned a malformed `{op}` response ({reason}): {line}")]
    MalformedResponse {
        op: &'static str,
        line: String,
        reason: String,
    },

    #[error("`{op}` failed: checksum mismatch! Expected {expected}, got {actual}")]
    ChecksumMismatch {
        op: &'static str,
        expected: u32,
        actual: u32,
    },

    #[error("Pull of {path} failed: file has 0 bytes")]
    ShortPayload { path: String },

    #[error("`{op}` failed to read expected data chunk. Received {received}/{expected} bytes.")]
    StreamClosed {
        op: &'static str,
        received: u64,
        expected: u64,
    },

    #[error("Transport I/O error during `{op}`: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn malformed(op: &'static str, line: &str, reason: impl Into<String>) -> Self {
        Error::MalformedResponse {
            op,
            line: line.to_string(),
            reason: reason.into(),
        }
    }

    pub fn io(op: &'static str, source: io::Error) -> Self {
        Error::Io { op, source }
    }

    /// True for failures where the device answered but refused the request.
    pub fn is_device_rejection(&self) -> bool {
        matches!(self, Error::DeviceRejected { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_message_carries_device_line() {
        let err = Error::DeviceRejected {
            op: "rm",
            line: "err no such file".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("`rm`"));
        assert!(msg.contains("err no such file"));
        assert!(err.is_device_rejection());
    }

    #[test]
    fn test_checksum_message_names_both_values() {
        let err = Error::ChecksumMismatch {
            op: "pull",
            expected: 10,
            actual: 20,
        };
        assert_eq!(
            err.to_string(),
            "`pull` failed: checksum mismatch! Expected 10, got 20"
        );
    }

    #[test]
    fn test_stream_closed_reports_progress() {
        let err = Error::StreamClosed {
            op: "pull",
            received: 1024,
            expected: 4096,
        };
        let msg = err.to_string();
        assert!(msg.contains("`pull`"));
        assert!(msg.contains("1024/4096"));
    }

    #[test]
    fn test_io_message_names_operation() {
        let err = Error::io(
            "push",
            io::Error::new(io::ErrorKind::BrokenPipe, "bridge exited"),
        );
        let msg = err.to_string();
        assert!(msg.contains("`push`"), "{msg}");
        assert!(msg.contains("bridge exited"), "{msg}");
        assert!(std::error::Error::source(&err).is_some());
    }
}
