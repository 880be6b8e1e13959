//! Byte-level transport over an owned [`Port`](crate::port::Port).

pub mod channel;

pub use channel::{SerialChannel, Timing};
