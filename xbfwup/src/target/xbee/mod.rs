//! XBee radio support.

pub mod bootloader;
pub mod flasher;

pub use {
    bootloader::{BootState, BootloaderEntry, EntryConfig},
    flasher::{UpdateConfig, XbeeFlasher, run_firmware_update, run_firmware_update_with},
};
