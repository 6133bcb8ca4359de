//! Simulated communicator firmware for integration tests.
//!
//! Serves the device side of every command over an in-memory pipe, backed
//! by a flat in-memory file store.

#![allow(dead_code)]

use async_trait::async_trait;
use communicator::{ByteStream, Connector, DeviceFilter};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

const EOT: u8 = 0x04;
const CHUNK: usize = 1024;

#[derive(Debug, Clone)]
pub struct SimDevice {
    pub files: BTreeMap<String, Vec<u8>>,
    pub block_size: u64,
    pub block_count: u64,
    pub played: Vec<String>,
    /// Commands in the order received, including per-chunk `ack`s.
    pub log: Vec<String>,
    /// Flip one byte of every pulled file to provoke checksum failures.
    pub corrupt_pulls: bool,
}

impl Default for SimDevice {
    fn default() -> Self {
        Self {
            files: BTreeMap::new(),
            block_size: 512,
            block_count: 64,
            played: Vec::new(),
            log: Vec::new(),
            corrupt_pulls: false,
        }
    }
}

impl SimDevice {
    pub fn with_file(mut self, name: &str, content: &[u8]) -> Self {
        self.files.insert(name.to_string(), content.to_vec());
        self
    }

    pub fn used_blocks(&self) -> u64 {
        self.files
            .values()
            .map(|f| (f.len() as u64).div_ceil(self.block_size))
            .sum()
    }

    /// Run the firmware on one end of a pipe; returns the client end.
    pub fn spawn(self) -> (DuplexStream, JoinHandle<SimDevice>) {
        let (client, device) = tokio::io::duplex(16 * 1024);
        (client, tokio::spawn(self.serve(device)))
    }

    async fn serve(mut self, mut io: DuplexStream) -> SimDevice {
        while let Some(cmd) = read_command(&mut io).await {
            self.log.push(cmd.clone());
            if self.handle(&cmd, &mut io).await.is_err() {
                break;
            }
        }
        self
    }

    async fn handle(&mut self, cmd: &str, io: &mut DuplexStream) -> std::io::Result<()> {
        let parts: Vec<&str> = cmd.split(' ').collect();
        match parts.as_slice() {
            ["info"] => {
                let line = format!(
                    "sisyphus SimCom deadbee 2.0.1 2025-02-01T09:30:00 {} {} {} 1\n",
                    self.block_count,
                    self.used_blocks(),
                    self.block_size
                );
                io.write_all(line.as_bytes()).await
            }
            ["ls"] => {
                let mut block = String::from(". d\n.. d\n");
                for (name, content) in &self.files {
                    block.push_str(&format!("{} f {}\n", name, content.len()));
                }
                io.write_all(block.as_bytes()).await?;
                io.write_all(&[EOT]).await
            }
            ["push", dest, size, crc] => self.receive(io, dest, size, crc).await,
            ["pull", path] => self.send(io, path).await,
            ["rm", path] => {
                let reply = if self.files.remove(*path).is_some() {
                    "ack\n"
                } else {
                    "err not found\n"
                };
                io.write_all(reply.as_bytes()).await
            }
            ["mv", source, dest] => {
                let reply = match self.files.remove(*source) {
                    Some(content) => {
                        self.files.insert(dest.to_string(), content);
                        "ack\n"
                    }
                    None => "err not found\n",
                };
                io.write_all(reply.as_bytes()).await
            }
            ["play", path] => {
                let reply = if self.files.contains_key(*path) {
                    self.played.push(path.to_string());
                    "ack\n"
                } else {
                    "err not found\n"
                };
                io.write_all(reply.as_bytes()).await
            }
            _ => io.write_all(b"err unknown command\n").await,
        }
    }

    async fn receive(
        &mut self,
        io: &mut DuplexStream,
        dest: &str,
        size: &str,
        crc: &str,
    ) -> std::io::Result<()> {
        let (Ok(size), Ok(crc)) = (size.parse::<usize>(), crc.parse::<u32>()) else {
            return io.write_all(b"err bad arguments\n").await;
        };
        let needed = (size as u64).div_ceil(self.block_size);
        if self.used_blocks() + needed > self.block_count {
            return io.write_all(b"err no space left\n").await;
        }

        let mut content = Vec::with_capacity(size);
        while content.len() < size {
            io.write_all(b"ack\n").await?;
            let mut chunk = vec![0u8; CHUNK.min(size - content.len())];
            io.read_exact(&mut chunk).await?;
            content.extend_from_slice(&chunk);
        }

        if crc32fast::hash(&content) != crc {
            return io.write_all(b"err checksum\n").await;
        }
        self.files.insert(dest.to_string(), content);
        io.write_all(b"ack\n").await
    }

    async fn send(&mut self, io: &mut DuplexStream, path: &str) -> std::io::Result<()> {
        let Some(content) = self.files.get(path).cloned() else {
            return io.write_all(b"err not found\n").await;
        };
        let header = format!("ack {} {}\n", content.len(), crc32fast::hash(&content));
        io.write_all(header.as_bytes()).await?;

        let mut served = content;
        if self.corrupt_pulls {
            if let Some(b) = served.first_mut() {
                *b ^= 0xFF;
            }
        }
        for chunk in served.chunks(CHUNK) {
            match read_command(io).await {
                Some(ack) if ack == "ack" => self.log.push(ack),
                _ => return Ok(()),
            }
            io.write_all(chunk).await?;
        }
        Ok(())
    }
}

async fn read_command(io: &mut DuplexStream) -> Option<String> {
    let mut out = Vec::new();
    loop {
        match io.read_u8().await {
            Ok(EOT) => return Some(String::from_utf8_lossy(&out).into_owned()),
            Ok(b) => out.push(b),
            Err(_) => return None,
        }
    }
}

/// Hands out a pre-opened pipe once, recording what it was asked for.
pub struct SimConnector {
    stream: Mutex<Option<DuplexStream>>,
    pub requested: Mutex<Option<(DeviceFilter, u32)>>,
}

impl SimConnector {
    pub fn new(stream: DuplexStream) -> Self {
        Self {
            stream: Mutex::new(Some(stream)),
            requested: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Connector for SimConnector {
    async fn open(
        &self,
        filter: DeviceFilter,
        baud_rate: u32,
    ) -> communicator::Result<Box<dyn ByteStream>> {
        *self.requested.lock().unwrap() = Some((filter, baud_rate));
        let stream = self.stream.lock().unwrap().take().ok_or_else(|| {
            communicator::Error::io(
                "connect",
                std::io::Error::new(std::io::ErrorKind::NotFound, "no device selected"),
            )
        })?;
        Ok(Box::new(stream))
    }
}
