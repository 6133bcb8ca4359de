//! Byte transport seam.
//!
//! The protocol client talks to any duplex byte stream. Reads may return
//! fewer bytes than requested; that is normal, not an error. Physical links
//! (USB CDC-ACM, a TCP bridge, a test pipe) are supplied by a [`Connector`].

pub mod process;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

pub use process::ProcessConnector;

/// Duplex byte stream the session owns while connected.
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ByteStream for T {}

/// USB identifiers of the communicator.
pub const USB_VENDOR_ID: u16 = 0xCAFE;
pub const USB_PRODUCT_ID: u16 = 0x6942;

/// Serial line speed used where the transport is a physical port.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Which device to open, for transports that can filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFilter {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self {
            vendor_id: USB_VENDOR_ID,
            product_id: USB_PRODUCT_ID,
        }
    }
}

/// Acquires and opens a transport to the device.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, filter: DeviceFilter, baud_rate: u32) -> Result<Box<dyn ByteStream>>;
}
