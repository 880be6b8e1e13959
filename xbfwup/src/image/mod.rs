//! Firmware image handling.

pub mod firmware;

pub use firmware::{FirmwareImage, PAD_BYTE};
