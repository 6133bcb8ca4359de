//! Protocol client session.
//!
//! A [`Session`] owns the connection state for one device: the transport
//! while attached and the last device info snapshot. Every operation takes
//! `&mut self`, so at most one exchange is in flight on the stream at a time.
//!
//! Each operation is a strict request/response sequence:
//! send command -> read reply line -> (chunk loop) -> final ack. Mutating
//! operations (`push`, `rm`) refresh the cached info afterwards; a failed
//! refresh never fails the operation itself.

use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::manifest::{decode_manifests, ConfigurationManifest};
use crate::protocol::{
    crc32, expect_ack, parse_info_line, parse_listing, parse_pull_header, send_command, Command,
    Crc32, DeviceInfo, FileSystemEntry, FrameReader, TransferResult, CHUNK_SIZE, CONF_INFO_PATH,
};
use crate::transport::{ByteStream, Connector, DeviceFilter, DEFAULT_BAUD_RATE};

/// Upper bound on buffer pre-allocation from a device-announced pull size.
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Deadline for each line read and each chunk read; `None` waits forever.
    pub read_timeout: Option<Duration>,
    pub baud_rate: u32,
    pub filter: DeviceFilter,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            read_timeout: Some(Duration::from_secs(5)),
            baud_rate: DEFAULT_BAUD_RATE,
            filter: DeviceFilter::default(),
        }
    }
}

/// Attached transport plus its reader state.
struct Link {
    stream: Box<dyn ByteStream>,
    reader: FrameReader,
}

impl Link {
    /// Start a new exchange: drop stale input, then send.
    async fn command(&mut self, cmd: &Command) -> Result<()> {
        self.reader.discard_pending();
        send_command(&mut *self.stream, cmd).await
    }

    /// Send within an ongoing exchange.
    async fn send(&mut self, cmd: &Command) -> Result<()> {
        send_command(&mut *self.stream, cmd).await
    }

    async fn write(&mut self, bytes: &[u8], op: &'static str) -> Result<()> {
        self.stream
            .write_all(bytes)
            .await
            .map_err(|e| Error::io(op, e))?;
        self.stream.flush().await.map_err(|e| Error::io(op, e))
    }

    async fn read_line(&mut self, op: &'static str) -> Result<String> {
        self.reader.read_line(&mut *self.stream, op).await
    }

    async fn read_until_eot(&mut self, op: &'static str) -> Result<String> {
        self.reader.read_until_eot(&mut *self.stream, op).await
    }

    async fn read_chunk(&mut self, len: usize, op: &'static str) -> Result<Bytes> {
        self.reader.read_chunk(&mut *self.stream, len, op).await
    }

    /// Send a single-line command and require an `ack` reply.
    async fn acked(&mut self, op: &'static str, cmd: &Command) -> Result<()> {
        self.command(cmd).await?;
        let line = self.read_line(op).await?;
        expect_ack(op, &line)
    }
}

/// Whether a transport is attached and what the device last reported.
#[derive(Default)]
pub struct ConnectionState {
    link: Option<Link>,
    last_info: Option<DeviceInfo>,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn last_info(&self) -> Option<&DeviceInfo> {
        self.last_info.as_ref()
    }
}

/// Protocol client bound to at most one device.
pub struct Session {
    state: ConnectionState,
    options: SessionOptions,
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            state: ConnectionState::default(),
            options,
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Info snapshot from the last successful `info` or refresh.
    pub fn last_info(&self) -> Option<&DeviceInfo> {
        self.state.last_info()
    }

    /// Open a transport through `connector` and attach it.
    pub async fn connect(&mut self, connector: &dyn Connector) -> Result<()> {
        let stream = connector
            .open(self.options.filter, self.options.baud_rate)
            .await?;
        self.attach(stream).await;
        Ok(())
    }

    /// Attach an already-open transport and fetch device info.
    ///
    /// The transport stays attached even if the info exchange fails; in that
    /// case [`Session::last_info`] is `None`.
    pub async fn attach(&mut self, stream: Box<dyn ByteStream>) {
        tracing::info!("device transport attached");
        self.state.link = Some(Link {
            stream,
            reader: FrameReader::new(self.options.read_timeout),
        });
        self.state.last_info = None;
        self.refresh().await;
    }

    /// Drop the transport and forget the cached info.
    pub fn disconnect(&mut self) {
        if self.state.link.take().is_some() {
            tracing::info!("device transport detached");
        }
        self.state.last_info = None;
    }

    fn link(&mut self) -> Result<&mut Link> {
        self.state.link.as_mut().ok_or(Error::NotConnected)
    }

    /// Re-read device info, keeping the previous snapshot on failure.
    pub async fn refresh(&mut self) -> Option<&DeviceInfo> {
        if let Err(e) = self.info().await {
            tracing::warn!(error = %e, "device info refresh failed");
        }
        self.state.last_info.as_ref()
    }

    /// Query identity and capacity, plus the uploaded configuration list.
    pub async fn info(&mut self) -> Result<DeviceInfo> {
        let link = self.link()?;
        link.command(&Command::Info).await?;
        let line = link.read_line("info").await?;
        let mut info = parse_info_line(&line)?;

        info.loaded_configurations = self.loaded_configurations().await;

        self.state.last_info = Some(info.clone());
        Ok(info)
    }

    /// The last info snapshot, querying the device only if there is none.
    pub async fn cached_info(&mut self) -> Result<DeviceInfo> {
        if let Some(info) = self.state.last_info() {
            return Ok(info.clone());
        }
        self.info().await
    }

    async fn loaded_configurations(&mut self) -> Vec<ConfigurationManifest> {
        let blob = match self.pull(CONF_INFO_PATH).await {
            Ok(blob) => blob,
            Err(e) => {
                tracing::debug!(error = %e, "no configuration manifest on device");
                return Vec::new();
            }
        };
        decode_manifests(&blob).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "unreadable {}", CONF_INFO_PATH);
            Vec::new()
        })
    }

    /// Upload `payload` to `dest`.
    pub async fn push(&mut self, payload: &[u8], dest: &str) -> Result<TransferResult> {
        self.push_with_progress(payload, dest, |_| {}).await
    }

    /// Upload `payload` to `dest`, calling `on_progress` with the number of
    /// bytes still to send after each chunk.
    pub async fn push_with_progress<F>(
        &mut self,
        payload: &[u8],
        dest: &str,
        mut on_progress: F,
    ) -> Result<TransferResult>
    where
        F: FnMut(u64) + Send,
    {
        let size = payload.len() as u64;
        let checksum = crc32(payload);
        let link = self.link()?;

        link.command(&Command::Push {
            dest: dest.to_string(),
            size,
            checksum,
        })
        .await?;

        let mut sent = 0u64;
        for chunk in payload.chunks(CHUNK_SIZE) {
            // Stop-and-wait: the device asks for every chunk.
            let line = link.read_line("push").await?;
            expect_ack("push", &line)?;

            link.write(chunk, "push").await?;
            sent += chunk.len() as u64;
            tracing::trace!(dest, sent, size, "chunk sent");
            on_progress(size - sent);
        }

        let line = link.read_line("push").await?;
        expect_ack("push", &line)?;
        tracing::debug!(dest, bytes = sent, "push complete");

        self.refresh().await;

        Ok(TransferResult {
            path: dest.to_string(),
            bytes_transferred: sent,
        })
    }

    /// Download the file at `path`.
    ///
    /// A zero-byte file is reported as [`Error::ShortPayload`].
    pub async fn pull(&mut self, path: &str) -> Result<Bytes> {
        let link = self.link()?;

        link.command(&Command::Pull {
            path: path.to_string(),
        })
        .await?;
        let header = parse_pull_header(&link.read_line("pull").await?)?;

        if header.size == 0 {
            return Err(Error::ShortPayload {
                path: path.to_string(),
            });
        }

        let mut data = BytesMut::with_capacity(header.size.min(MAX_PREALLOC) as usize);
        let mut hasher = Crc32::new();
        let mut received = 0u64;

        while received < header.size {
            // Receiver-paced: one ack per chunk before the device sends it.
            link.send(&Command::Ack).await?;

            let want = (CHUNK_SIZE as u64).min(header.size - received) as usize;
            let chunk = link.read_chunk(want, "pull").await?;
            hasher.update(&chunk);
            data.extend_from_slice(&chunk);
            received += chunk.len() as u64;

            if chunk.len() < want {
                return Err(Error::StreamClosed {
                    op: "pull",
                    received,
                    expected: header.size,
                });
            }
            tracing::trace!(path, received, size = header.size, "chunk received");
        }

        let actual = hasher.finalize();
        if actual != header.checksum {
            return Err(Error::ChecksumMismatch {
                op: "pull",
                expected: header.checksum,
                actual,
            });
        }

        tracing::debug!(path, bytes = received, "pull complete");
        Ok(data.freeze())
    }

    /// List the device's file system.
    pub async fn ls(&mut self) -> Result<Vec<FileSystemEntry>> {
        let link = self.link()?;
        link.command(&Command::Ls).await?;
        let block = link.read_until_eot("ls").await?;
        parse_listing(&block)
    }

    /// Delete `path`; returns the removed path.
    pub async fn rm(&mut self, path: &str) -> Result<String> {
        self.link()?
            .acked(
                "rm",
                &Command::Rm {
                    path: path.to_string(),
                },
            )
            .await?;
        self.refresh().await;
        Ok(path.to_string())
    }

    /// Rename `source` to `dest`; returns the new path.
    pub async fn mv(&mut self, source: &str, dest: &str) -> Result<String> {
        self.link()?
            .acked(
                "mv",
                &Command::Mv {
                    source: source.to_string(),
                    dest: dest.to_string(),
                },
            )
            .await?;
        Ok(dest.to_string())
    }

    /// Start playback of `path` on the device.
    pub async fn play(&mut self, path: &str) -> Result<String> {
        self.link()?
            .acked(
                "play",
                &Command::Play {
                    path: path.to_string(),
                },
            )
            .await?;
        Ok(path.to_string())
    }
}
