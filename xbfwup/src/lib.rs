//! # xbfwup
//!
//! A library for updating the firmware of XBee radios over a serial line.
//!
//! The update runs in three parts:
//!
//! - coerce the running radio into its serial bootloader (`+++`, `ATFR`,
//!   break-held power cycle, baud switch, prompt probing)
//! - send the image with XMODEM-CRC in 128-byte blocks
//! - start the new firmware and return the line to the application baud rate
//!
//! ## Supported Platforms
//!
//! - **Native** (default): Linux, macOS, Windows via the `serialport` crate
//!
//! ## Features
//!
//! - `native` (default): Native serial port support
//! - `serde`: Serialization support for data types
//!
//! ## Example
//!
//! ```rust,no_run
//! use xbfwup::{FirmwareImage, NativePort, UpdateConfig, XbeeFlasher};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let image = FirmwareImage::from_file("xb24-zb.ebl")?;
//!     let port = NativePort::open_simple("/dev/ttyUSB0", 9600)?;
//!
//!     let mut flasher = XbeeFlasher::new(port, UpdateConfig::default());
//!     flasher.update(&image, |done, total| {
//!         println!("Block {}/{}", done, total);
//!     })?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod error;
pub mod image;
pub mod port;
pub mod protocol;
pub mod target;

// Re-exports for convenience
// Native-specific re-exports
#[cfg(feature = "native")]
pub use port::{NativePort, NativePortEnumerator};
pub use {
    connection::{SerialChannel, Timing},
    error::{Error, ErrorKind, Result, Stage, UpdateError},
    image::{FirmwareImage, PAD_BYTE},
    port::{LineConfig, LineSignals, Port, PortEnumerator, PortInfo, SerialConfig},
    protocol::{
        at::AtCommand,
        crc::crc16_xmodem,
        xmodem::{BLOCK_SIZE, Block, XmodemSender},
    },
    target::xbee::{
        BootState, BootloaderEntry, UpdateConfig, XbeeFlasher, run_firmware_update,
        run_firmware_update_with,
    },
};
