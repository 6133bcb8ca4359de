//! Device wire protocol.
//!
//! Commands are text terminated by a single EOT byte. The device answers with
//! `\n`-terminated lines (`ack ...` on success, anything else is an error
//! line) or, for listings, with an EOT-terminated block. File content moves
//! in fixed 1024-byte chunks under stop-and-wait flow control:
//!
//! ```text
//! push:  client -> "push <dest> <size> <crc>"
//!        device -> "ack"   client -> chunk[0]
//!        device -> "ack"   client -> chunk[1]   ...
//!        device -> "ack"   (final)
//!
//! pull:  client -> "pull <path>"
//!        device -> "ack <size> <crc>"
//!        client -> "ack"   device -> chunk[0]
//!        client -> "ack"   device -> chunk[1]   ...
//! ```

pub mod command;
pub mod crc32;
pub mod reader;
pub mod response;

pub use command::{send_command, Command};
pub use crc32::{crc32, Crc32};
pub use reader::FrameReader;
pub use response::{
    expect_ack, parse_info_line, parse_listing, parse_pull_header, DeviceInfo, DeviceKind,
    EntryKind, FileSystemEntry, PullHeader, TransferResult,
};

/// ASCII End-Of-Transmission, terminates every command and listing block.
pub const EOT: u8 = 0x04;

/// Payload bytes per flow-controlled chunk, both directions.
pub const CHUNK_SIZE: usize = 1024;

/// Leading token of every positive device response.
pub const ACK: &str = "ack";

/// Device file holding the JSON list of uploaded configuration manifests.
pub const CONF_INFO_PATH: &str = "conf_info";
