//! Protocol implementations.

pub mod at;
pub mod crc;
pub mod xmodem;

// Re-export common types
pub use at::{AtCommand, send_command};
pub use xmodem::{Block, XmodemSender};
