//! Error types for xbfwup.

use std::{fmt, io};
use thiserror::Error;

/// Result type for xbfwup operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for xbfwup operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the serial stream or firmware source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The stream stopped accepting or producing bytes.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A bounded wait ran out without a usable response.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// A reply did not have the expected shape or value.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The device refused (or never answered) a data block.
    #[error("failed to transfer block {block}: {}", describe_reply(.reply))]
    BlockRejected {
        /// 1-based index of the block within the image.
        block: usize,
        /// The byte received instead of ACK, if any.
        reply: Option<u8>,
    },

    /// A precondition was violated before any I/O took place.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

#[allow(clippy::ref_option)]
fn describe_reply(reply: &Option<u8>) -> String {
    match reply {
        Some(byte) => format!("{byte:02x}"),
        None => "no reply".to_string(),
    }
}

/// Coarse classification of every [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Stream-level read/write failure.
    Transport,
    /// Retry budget or wait limit exhausted.
    Timeout,
    /// Unexpected reply from the device.
    Protocol,
    /// Rejected before any byte was written.
    Validation,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::Transport(_) => ErrorKind::Transport,
            #[cfg(feature = "native")]
            Self::Serial(_) => ErrorKind::Transport,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Protocol(_) | Self::BlockRejected { .. } => ErrorKind::Protocol,
            Self::Validation(_) | Self::Config(_) => ErrorKind::Validation,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Timeout => write!(f, "timeout"),
            Self::Protocol => write!(f, "protocol"),
            Self::Validation => write!(f, "validation"),
        }
    }
}

/// Phase of a firmware update.
///
/// Phases only ever advance; an [`UpdateError`] records the phase that was
/// executing when the update aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Checking the firmware image.
    Validate,
    /// Escaping from the running application into AT command mode.
    CommandMode,
    /// Forcing the power cycle with the break condition held.
    PowerCycle,
    /// Switching the line to the bootloader baud rate.
    BaudSwitch,
    /// Probing for the bootloader prompt.
    BootloaderPrompt,
    /// Restoring blocking reads for the transfer.
    Ready,
    /// Choosing the upload entry of the bootloader menu.
    SelectProtocol,
    /// Sending data blocks.
    Transfer,
    /// Waiting for the end-of-transfer confirmation.
    Confirm,
    /// Starting the new firmware and restoring the line.
    Resume,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validate => "validate",
            Self::CommandMode => "command mode",
            Self::PowerCycle => "power cycle",
            Self::BaudSwitch => "baud switch",
            Self::BootloaderPrompt => "bootloader prompt",
            Self::Ready => "ready",
            Self::SelectProtocol => "select protocol",
            Self::Transfer => "transfer",
            Self::Confirm => "confirm",
            Self::Resume => "resume",
        };
        f.write_str(name)
    }
}

/// Terminal error of a firmware update.
#[derive(Debug, Error)]
#[error("firmware update failed during {stage}: {source}")]
pub struct UpdateError {
    /// Phase that was executing.
    pub stage: Stage,
    /// Underlying failure.
    #[source]
    pub source: Error,
}

impl UpdateError {
    /// Wrap `source` as a failure of `stage`.
    pub fn new(stage: Stage, source: Error) -> Self {
        Self { stage, source }
    }

    /// Classification of the underlying failure.
    pub fn kind(&self) -> ErrorKind {
        self.source
            .kind()
    }
}
