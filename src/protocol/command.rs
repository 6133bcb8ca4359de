//! Command lines sent to the device.
//!
//! Wire format: `<word> [arg ...]<EOT>`, words in lowercase, arguments
//! separated by single spaces, no trailing newline.

use super::EOT;
use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// A single request understood by the firmware command parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Info,
    Push { dest: String, size: u64, checksum: u32 },
    Pull { path: String },
    Ls,
    Rm { path: String },
    Mv { source: String, dest: String },
    Play { path: String },
    /// Receiver-side flow control token emitted once per pulled chunk.
    Ack,
}

impl Command {
    /// Command word as the firmware expects it.
    pub fn word(&self) -> &'static str {
        match self {
            Command::Info => "info",
            Command::Push { .. } => "push",
            Command::Pull { .. } => "pull",
            Command::Ls => "ls",
            Command::Rm { .. } => "rm",
            Command::Mv { .. } => "mv",
            Command::Play { .. } => "play",
            Command::Ack => "ack",
        }
    }

    /// Encode as `<text><EOT>`.
    pub fn encode(&self) -> Bytes {
        let text = self.to_string();
        let mut buf = BytesMut::with_capacity(text.len() + 1);
        buf.put_slice(text.as_bytes());
        buf.put_u8(EOT);
        buf.freeze()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.word())?;
        match self {
            Command::Push {
                dest,
                size,
                checksum,
            } => write!(f, " {} {} {}", dest, size, checksum),
            Command::Pull { path } | Command::Rm { path } | Command::Play { path } => {
                write!(f, " {}", path)
            }
            Command::Mv { source, dest } => write!(f, " {} {}", source, dest),
            Command::Info | Command::Ls | Command::Ack => Ok(()),
        }
    }
}

/// Write an encoded command and flush it to the transport.
///
/// No acknowledgement is awaited here; callers read the response separately.
pub async fn send_command<W: AsyncWrite + Unpin + ?Sized>(w: &mut W, cmd: &Command) -> Result<()> {
    tracing::debug!(command = %cmd, "sending command");
    let op = cmd.word();
    w.write_all(&cmd.encode()).await.map_err(|e| Error::io(op, e))?;
    w.flush().await.map_err(|e| Error::io(op, e))?;
    Ok(())
}
