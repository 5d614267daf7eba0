//! Bluetooth-like edge device transport

use crate::session::DeviceInfo;
use crate::Result;

/// Pushed by the transport whenever a device's link state actually changes.
/// The edge controller treats this callback as the single writer of
/// connection status.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionEvent {
    pub device: DeviceInfo,
    pub connected: bool,
}

pub trait DeviceTransport: Send + Sync {
    fn connect(&self, device_id: &str) -> Result<()>;

    fn disconnect(&self) -> Result<()>;

    /// Write a payload to the connected device.
    fn write(&self, payload: &[u8]) -> Result<()>;

    fn is_connected(&self, device_id: &str) -> bool;

    /// Register the connection-changed callback. Called once, at controller
    /// construction.
    fn on_connection_changed(&self, callback: Box<dyn Fn(ConnectionEvent) + Send + Sync>);
}
