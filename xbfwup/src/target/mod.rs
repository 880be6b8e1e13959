//! Device-specific update sequences.

pub mod xbee;

pub use xbee::{UpdateConfig, XbeeFlasher};
