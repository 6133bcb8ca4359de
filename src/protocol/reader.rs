//! Line/frame reader over a raw byte transport.
//!
//! Responses are text delimited either by `\n` (single-line replies) or by
//! EOT (multi-line blocks such as directory listings). Pulled file content is
//! raw bytes read in exact-size chunks. All three share one accumulation
//! buffer so bytes that arrive past a delimiter are kept for the next read
//! of the same exchange.

use super::EOT;
use crate::error::{Error, Result};
use bytes::{Bytes, BytesMut};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Bytes requested from the transport per read call.
const READ_CHUNK: usize = 1024;

/// Accumulates transport bytes and splits them into frames.
#[derive(Debug)]
pub struct FrameReader {
    pending: BytesMut,
    read_timeout: Option<Duration>,
}

impl FrameReader {
    pub fn new(read_timeout: Option<Duration>) -> Self {
        Self {
            pending: BytesMut::with_capacity(READ_CHUNK),
            read_timeout,
        }
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Drop anything left over from a previous exchange.
    ///
    /// Returns the number of bytes discarded.
    pub fn discard_pending(&mut self) -> usize {
        let stale = self.pending.len();
        if stale > 0 {
            tracing::warn!(bytes = stale, "discarding unread bytes from previous exchange");
            self.pending.clear();
        }
        stale
    }

    /// Read one `\n`-terminated line, trimmed.
    ///
    /// If the stream ends first, whatever was accumulated is returned as the
    /// line. An empty result is reported as [`Error::NoResponse`].
    pub async fn read_line<R>(&mut self, r: &mut R, op: &'static str) -> Result<String>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let (frame, _) = self.read_delimited(r, b'\n', op).await?;
        let line = String::from_utf8_lossy(&frame).trim().to_string();
        tracing::debug!(op, line = %line, "response line");
        if line.is_empty() {
            return Err(Error::NoResponse { op });
        }
        Ok(line)
    }

    /// Read an EOT-terminated block, with the EOT removed and the text trimmed.
    pub async fn read_until_eot<R>(&mut self, r: &mut R, op: &'static str) -> Result<String>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let (mut frame, terminated) = self.read_delimited(r, EOT, op).await?;
        if terminated {
            frame.truncate(frame.len() - 1);
        }
        let block = String::from_utf8_lossy(&frame).trim().to_string();
        tracing::debug!(op, bytes = block.len(), "response block");
        if block.is_empty() {
            return Err(Error::NoResponse { op });
        }
        Ok(block)
    }

    /// Read exactly `len` raw bytes.
    ///
    /// Short transport reads are retried until the chunk is complete. If the
    /// stream closes early the returned buffer is shorter than `len`.
    pub async fn read_chunk<R>(&mut self, r: &mut R, len: usize, op: &'static str) -> Result<Bytes>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let limit = self.read_timeout;
        let pending = &mut self.pending;
        bounded(limit, op, async move {
            while pending.len() < len {
                pending.reserve(len - pending.len());
                if r.read_buf(pending).await.map_err(|e| Error::io(op, e))? == 0 {
                    tracing::debug!(op, got = pending.len(), want = len, "stream closed mid-chunk");
                    return Ok(pending.split().freeze());
                }
            }
            Ok(pending.split_to(len).freeze())
        })
        .await
    }

    async fn read_delimited<R>(
        &mut self,
        r: &mut R,
        delim: u8,
        op: &'static str,
    ) -> Result<(BytesMut, bool)>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let limit = self.read_timeout;
        let pending = &mut self.pending;
        bounded(limit, op, async move {
            // Delimiters are ASCII, so a match can never split a multi-byte character.
            let mut scanned = 0;
            loop {
                if let Some(pos) = pending[scanned..].iter().position(|&b| b == delim) {
                    return Ok((pending.split_to(scanned + pos + 1), true));
                }
                scanned = pending.len();
                pending.reserve(READ_CHUNK);
                if r.read_buf(pending).await.map_err(|e| Error::io(op, e))? == 0 {
                    return Ok((pending.split(), false));
                }
            }
        })
        .await
    }
}

/// Run `fut`, converting an elapsed deadline into [`Error::Timeout`].
async fn bounded<F, T>(limit: Option<Duration>, op: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| Error::Timeout { op, after })?,
        None => fut.await,
    }
}
