//! Protocol client for the communicator storage/playback device.
//!
//! The device speaks a line-oriented text protocol over a raw byte pipe
//! (USB CDC-ACM in practice). This crate frames commands, runs the chunked,
//! checksummed, stop-and-wait transfers for `push`/`pull`, and parses the
//! `info` and `ls` replies.
//!
//! ```no_run
//! use communicator::{ProcessConnector, Session, SessionOptions};
//!
//! # async fn example() -> communicator::Result<()> {
//! let mut session = Session::new(SessionOptions::default());
//! session
//!     .connect(&ProcessConnector::new("socat - /dev/ttyACM0,b{baud},raw,echo=0"))
//!     .await?;
//! let result = session.push(b"RIFF....", "r_0.wav").await?;
//! let back = session.pull(&result.path).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod manifest;
pub mod protocol;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use manifest::ConfigurationManifest;
pub use protocol::{DeviceInfo, DeviceKind, EntryKind, FileSystemEntry, TransferResult};
pub use session::{ConnectionState, Session, SessionOptions};
pub use transport::{ByteStream, Connector, DeviceFilter, ProcessConnector};
