//! Bridge-process transport - the device link is a helper program's stdio.
//!
//! The helper (e.g. `socat - /dev/ttyACM0,b{baud},raw,echo=0`) owns the
//! physical port; we only shuttle bytes through its stdin/stdout.

use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::{ByteStream, Connector, DeviceFilter};
use crate::error::{Error, Result};

/// Spawns a bridge command per connection.
///
/// The template is split on whitespace; `{baud}`, `{vid}` and `{pid}` are
/// substituted in each argument (ids as 4-digit lowercase hex).
#[derive(Debug, Clone)]
pub struct ProcessConnector {
    template: String,
}

impl ProcessConnector {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    fn argv(&self, filter: DeviceFilter, baud_rate: u32) -> Vec<String> {
        self.template
            .split_whitespace()
            .map(|arg| {
                arg.replace("{baud}", &baud_rate.to_string())
                    .replace("{vid}", &format!("{:04x}", filter.vendor_id))
                    .replace("{pid}", &format!("{:04x}", filter.product_id))
            })
            .collect()
    }
}

#[async_trait]
impl Connector for ProcessConnector {
    async fn open(&self, filter: DeviceFilter, baud_rate: u32) -> Result<Box<dyn ByteStream>> {
        let argv = self.argv(filter, baud_rate);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Config("bridge command is empty".to_string()))?;

        tracing::debug!(program = %program, ?args, "spawning bridge");

        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| Error::io("connect", e))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| bridge_pipe_missing("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| bridge_pipe_missing("stdout"))?;

        Ok(Box::new(ProcessStream {
            _child: child,
            stdin,
            stdout,
        }))
    }
}

fn bridge_pipe_missing(which: &str) -> Error {
    Error::io(
        "connect",
        io::Error::new(io::ErrorKind::BrokenPipe, format!("bridge {which} unavailable")),
    )
}

/// Bridge stdout as the read half, stdin as the write half.
struct ProcessStream {
    // Dropping the child kills the bridge.
    _child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
}

impl AsyncRead for ProcessStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

impl AsyncWrite for ProcessStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stdin).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdin).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdin).poll_shutdown(cx)
    }
}
