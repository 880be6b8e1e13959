//! Port abstraction for the serial link to the radio.
//!
//! The protocol layers never talk to an OS handle directly. They drive a
//! [`Port`], which bundles three things:
//!
//! - a duplex byte stream (`Read + Write`),
//! - a mutable [`LineConfig`] (baud rate plus the read-blocking regime),
//! - the [`LineSignals`] capability used to force the radio into its
//!   bootloader (control lines and the break condition).
//!
//! ```text
//! +--------------------------------+
//! |  target::xbee (entry, flasher) |
//! +--------------------------------+
//! |  protocol (at, xmodem, crc)    |
//! +--------------------------------+
//! |  connection::SerialChannel     |
//! +--------------------------------+
//! |  Port trait                    |
//! +---------------+----------------+
//! | NativePort    | simulated port |
//! | (serialport)  | (unit tests)   |
//! +---------------+----------------+
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::io::Write;
//! use xbfwup::port::{LineConfig, Port};
//!
//! fn probe<P: Port>(port: &mut P) -> xbfwup::Result<()> {
//!     port.apply_line_config(LineConfig::polling(115_200, 1))?;
//!     port.write_all(b"\r")?;
//!     Ok(())
//! }
//! ```

#[cfg(feature = "native")]
pub mod native;

#[cfg(test)]
pub(crate) mod sim;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Baud rate the radio application runs at out of the box.
pub const DEFAULT_APP_BAUD: u32 = 9600;

/// Fixed baud rate of the radio bootloader.
pub const BOOTLOADER_BAUD: u32 = 115_200;

/// Read-blocking regime of the line.
///
/// Mirrors the classic terminal `VMIN`/`VTIME` pair:
///
/// - `min_bytes = 1, timeout_deciseconds = 0`: a read waits until at least
///   one byte is available, however long that takes.
/// - `min_bytes = 0, timeout_deciseconds = n`: a read returns whatever is
///   available, or nothing after `n` tenths of a second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineConfig {
    /// Baud rate.
    pub baud_rate: u32,
    /// Minimum number of bytes before a read returns.
    pub min_bytes: u8,
    /// Read timeout in tenths of a second (0 = none).
    pub timeout_deciseconds: u8,
}

impl LineConfig {
    /// Reads wait for at least one byte.
    pub const fn blocking(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            min_bytes: 1,
            timeout_deciseconds: 0,
        }
    }

    /// Reads return after at most `deciseconds` tenths of a second.
    pub const fn polling(baud_rate: u32, deciseconds: u8) -> Self {
        Self {
            baud_rate,
            min_bytes: 0,
            timeout_deciseconds: deciseconds,
        }
    }

    /// Whether a read may return empty-handed.
    pub fn is_polling(&self) -> bool {
        self.min_bytes == 0
    }

    /// The read timeout as a duration.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_deciseconds) * 100)
    }
}

impl Default for LineConfig {
    fn default() -> Self {
        Self::blocking(DEFAULT_APP_BAUD)
    }
}

/// Serial port configuration used when opening a device.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Initial line configuration.
    pub line: LineConfig,
    /// Data bits (typically 8).
    pub data_bits: DataBits,
    /// Parity (typically None).
    pub parity: Parity,
    /// Stop bits (typically One).
    pub stop_bits: StopBits,
    /// Flow control (typically None).
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            line: LineConfig::default(),
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            line: LineConfig::blocking(baud_rate),
            ..Default::default()
        }
    }
}

/// Number of data bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataBits {
    /// 7 data bits.
    Seven,
    /// 8 data bits.
    #[default]
    Eight,
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    /// No parity.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    /// 1 stop bit.
    #[default]
    One,
    /// 2 stop bits.
    Two,
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowControl {
    /// No flow control.
    #[default]
    None,
    /// Hardware flow control (RTS/CTS).
    Hardware,
}

/// Serial port information.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial_number: Option<String>,
}

/// Electrical signalling used to push the radio into its bootloader.
pub trait LineSignals {
    /// Drive the handshake lines to the bootloader-entry levels
    /// (DTR asserted, RTS released).
    fn assert_control_lines(&mut self) -> Result<()>;

    /// Start a sustained break condition on the transmit line.
    fn set_break(&mut self) -> Result<()>;

    /// End the break condition.
    fn clear_break(&mut self) -> Result<()>;
}

/// Unified port trait for the serial link.
///
/// `read` honours the current [`LineConfig`] only for a bounded slice of
/// time: it returns `Ok(n > 0)` with data, or `Ok(0)` / an
/// [`std::io::ErrorKind::TimedOut`] error when nothing arrived in that slice.
/// Indefinite blocking is layered on top by
/// [`SerialChannel`](crate::connection::SerialChannel).
pub trait Port: Read + Write + LineSignals + Send {
    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Current line configuration.
    fn line_config(&self) -> LineConfig;

    /// Reconfigure baud rate and read-blocking regime.
    ///
    /// Takes effect before the next read.
    fn apply_line_config(&mut self, config: LineConfig) -> Result<()>;

    /// Wait up to `timeout` for received data; `true` if some is pending.
    fn wait_readable(&mut self, timeout: Duration) -> Result<bool>;

    /// Close the port and release resources.
    ///
    /// After calling this method, the port cannot be used for further I/O.
    fn close(&mut self) -> Result<()>;
}

/// Trait for listing available serial ports.
///
/// This is separated from `Port` because it's a static operation that
/// doesn't require an open port instance.
pub trait PortEnumerator {
    /// List all available serial ports.
    fn list_ports() -> Result<Vec<PortInfo>>;
}

#[cfg(feature = "native")]
pub use native::{NativePort, NativePortEnumerator};
