//! Parsers for device response lines and the values they produce.

use super::ACK;
use crate::error::{Error, Result};
use crate::manifest::ConfigurationManifest;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

/// Length of the fixed trailing suffix the firmware appends to the INFO line.
const INFO_SUFFIX_CHARS: usize = 2;

// =============================================================================
// Data model
// =============================================================================

/// Firmware mode reported in the first INFO field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Bootloader,
    Application,
}

impl DeviceKind {
    fn from_field(field: &str) -> Self {
        if field.eq_ignore_ascii_case("bootloader") {
            DeviceKind::Bootloader
        } else {
            DeviceKind::Application
        }
    }
}

/// Snapshot of device identity and storage capacity.
///
/// Never mutated after construction; a refresh replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub kind: DeviceKind,
    pub device_name: String,
    pub git_commit_sha: String,
    pub firmware_version: String,
    pub build_date: DateTime<Utc>,
    pub block_count: u64,
    pub used_block_count: u64,
    pub block_size: u64,
    pub uses_eternity_flag: bool,
    /// Manifests recovered from `conf_info`; empty when the file is absent.
    pub loaded_configurations: Vec<ConfigurationManifest>,
}

impl DeviceInfo {
    pub fn total_bytes(&self) -> u64 {
        self.block_count.saturating_mul(self.block_size)
    }

    pub fn used_bytes(&self) -> u64 {
        self.used_block_count.saturating_mul(self.block_size)
    }

    pub fn free_bytes(&self) -> u64 {
        self.total_bytes().saturating_sub(self.used_bytes())
    }

    /// Used share of total capacity in percent, 0.0 for an empty device.
    pub fn usage_percent(&self) -> f64 {
        let total = self.total_bytes();
        if total == 0 {
            return 0.0;
        }
        self.used_bytes() as f64 * 100.0 / total as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size_bytes: Option<u64>,
}

/// Outcome of a completed push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub path: String,
    pub bytes_transferred: u64,
}

/// Size and checksum announced by the device before a pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullHeader {
    pub size: u64,
    pub checksum: u32,
}

// =============================================================================
// Parsers
// =============================================================================

/// Require `line` to start with the `ack` token.
pub fn expect_ack(op: &'static str, line: &str) -> Result<()> {
    if line.starts_with(ACK) {
        Ok(())
    } else {
        Err(Error::DeviceRejected {
            op,
            line: line.to_string(),
        })
    }
}

/// Parse the INFO line.
///
/// Field order: type, device name, git SHA, firmware version, build date,
/// block count, used block count, block size. The last two characters of
/// the line are a fixed suffix carrying the eternity flag and are stripped
/// before tokenizing.
pub fn parse_info_line(line: &str) -> Result<DeviceInfo> {
    let split_at = line
        .char_indices()
        .rev()
        .nth(INFO_SUFFIX_CHARS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let (body, suffix) = line.split_at(split_at);

    let fields: Vec<&str> = body.split_whitespace().collect();
    if fields.len() < 8 {
        return Err(Error::malformed(
            "info",
            line,
            format!("expected 8 fields, got {}", fields.len()),
        ));
    }

    let number = |idx: usize, name: &str| -> Result<u64> {
        fields[idx]
            .parse::<u64>()
            .map_err(|_| Error::malformed("info", line, format!("invalid {}: {:?}", name, fields[idx])))
    };

    Ok(DeviceInfo {
        kind: DeviceKind::from_field(fields[0]),
        device_name: fields[1].to_string(),
        git_commit_sha: fields[2].to_string(),
        firmware_version: fields[3].to_string(),
        build_date: parse_build_date(fields[4])
            .ok_or_else(|| Error::malformed("info", line, format!("invalid build date: {:?}", fields[4])))?,
        block_count: number(5, "block count")?,
        used_block_count: number(6, "used block count")?,
        block_size: number(7, "block size")?,
        uses_eternity_flag: suffix.trim() != "0",
        loaded_configurations: Vec::new(),
    })
}

fn parse_build_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse an LS block into entries.
///
/// Each line is `<name> [kind-code] [size]`. `.` and `..` marker lines and
/// blank lines are skipped. Kind code `f` is a file, anything else (or none)
/// a directory.
pub fn parse_listing(block: &str) -> Result<Vec<FileSystemEntry>> {
    let mut entries = Vec::new();

    for raw in block.lines() {
        let line = raw.trim();
        let parts: Vec<&str> = line.split_whitespace().collect();

        match parts.first() {
            None => continue,
            Some(&".") | Some(&"..") => continue,
            Some(_) => {}
        }
        let kind = if parts.get(1) == Some(&"f") {
            EntryKind::File
        } else {
            EntryKind::Directory
        };
        let size_bytes = match parts.get(2) {
            Some(s) => Some(
                s.parse::<u64>()
                    .map_err(|_| Error::malformed("ls", line, format!("invalid size: {:?}", s)))?,
            ),
            None => None,
        };

        entries.push(FileSystemEntry {
            name: parts[0].to_string(),
            kind,
            size_bytes,
        });
    }

    Ok(entries)
}

/// Parse `ack <size> <checksum>`.
pub fn parse_pull_header(line: &str) -> Result<PullHeader> {
    expect_ack("pull", line)?;

    let mut fields = line.split_whitespace().skip(1);
    let size = fields
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| Error::malformed("pull", line, "missing or invalid size"))?;
    let checksum = fields
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| Error::malformed("pull", line, "missing or invalid checksum"))?;

    Ok(PullHeader { size, checksum })
}
