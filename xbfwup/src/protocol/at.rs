//! AT command frames for the radio's transparent-mode command interface.
//!
//! ## Frame Format
//!
//! ```text
//! +------+---------+------------------+------+
//! | "AT" | command | argument (opt.)  | "\r" |
//! +------+---------+------------------+------+
//! |  2   |    2    |     0..=251      |  1   |
//! +------+---------+------------------+------+
//! ```
//!
//! The radio answers with `OK\r`; only the `O` and the two bytes after it
//! are consumed.

use {
    crate::{
        connection::SerialChannel,
        error::{Error, Result},
        port::Port,
    },
    log::debug,
};

/// Prefix of every command frame.
pub const PREFIX: &[u8; 2] = b"AT";

/// Frame terminator.
pub const TERMINATOR: u8 = b'\r';

/// Largest frame the radio accepts, terminator included.
pub const MAX_FRAME_LEN: usize = 256;

/// First byte of the `OK` acknowledgment.
pub const OK_SENTINEL: u8 = b'O';

/// Escape sequence that switches a running radio into command mode.
pub const ESCAPE_SEQUENCE: &[u8; 3] = b"+++";

/// Force a power cycle (`ATFR`).
pub const FORCE_RESET: &str = "FR";

/// One command request: two-letter code plus optional argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtCommand {
    code: [u8; 2],
    argument: Option<String>,
}

impl AtCommand {
    /// Command without an argument.
    ///
    /// `code` must be exactly two printable ASCII characters.
    pub fn new(code: &str) -> Result<Self> {
        let bytes = code.as_bytes();
        match bytes {
            [a, b] if a.is_ascii_graphic() && b.is_ascii_graphic() => Ok(Self {
                code: [*a, *b],
                argument: None,
            }),
            _ => Err(Error::Validation(format!(
                "AT command code must be two ASCII characters, got {code:?}"
            ))),
        }
    }

    /// Attach a pre-formatted argument.
    #[must_use]
    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.argument = Some(argument.into());
        self
    }

    /// The two-letter command code.
    pub fn code(&self) -> &str {
        // Constructed from ASCII only.
        std::str::from_utf8(&self.code).unwrap_or("??")
    }

    /// The argument, if any.
    pub fn argument(&self) -> Option<&str> {
        self.argument
            .as_deref()
    }

    /// Build the wire frame.
    ///
    /// Fails with a validation error if the frame would exceed
    /// [`MAX_FRAME_LEN`].
    pub fn build(&self) -> Result<Vec<u8>> {
        let arg = self
            .argument
            .as_deref()
            .unwrap_or("")
            .as_bytes();
        let len = PREFIX.len() + self.code.len() + arg.len() + 1;
        if len > MAX_FRAME_LEN {
            return Err(Error::Validation(format!(
                "AT{} frame is {len} bytes, limit is {MAX_FRAME_LEN}",
                self.code()
            )));
        }

        let mut frame = Vec::with_capacity(len);
        frame.extend_from_slice(PREFIX);
        frame.extend_from_slice(&self.code);
        frame.extend_from_slice(arg);
        frame.push(TERMINATOR);
        Ok(frame)
    }
}

/// Send `command` and wait for the radio's `OK`.
///
/// Returns the number of bytes written.
pub fn send_command<P: Port>(channel: &mut SerialChannel<P>, command: &AtCommand) -> Result<usize> {
    let frame = command.build()?;
    debug!(
        "AT{}{}",
        command.code(),
        command
            .argument()
            .unwrap_or("")
    );
    channel.write_all(&frame)?;
    channel.wait_for_sentinel(OK_SENTINEL)?;
    Ok(frame.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Timing;
    use crate::port::sim::SimulatedPort;
    use std::time::Duration;

    #[test]
    fn test_build_without_argument() {
        let frame = AtCommand::new(FORCE_RESET)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(frame, b"ATFR\r");
    }

    #[test]
    fn test_build_with_argument() {
        let frame = AtCommand::new("BD")
            .unwrap()
            .with_argument(format!("{:X}", 7))
            .build()
            .unwrap();
        assert_eq!(frame, b"ATBD7\r");
    }

    #[test]
    fn test_rejects_bad_code() {
        assert!(matches!(AtCommand::new("F"), Err(Error::Validation(_))));
        assert!(matches!(AtCommand::new("FRX"), Err(Error::Validation(_))));
        assert!(matches!(AtCommand::new("F "), Err(Error::Validation(_))));
    }

    #[test]
    fn test_frame_capacity_boundary() {
        let fits = AtCommand::new("NI")
            .unwrap()
            .with_argument("x".repeat(MAX_FRAME_LEN - 5));
        assert_eq!(
            fits.build()
                .unwrap()
                .len(),
            MAX_FRAME_LEN
        );

        let too_long = AtCommand::new("NI")
            .unwrap()
            .with_argument("x".repeat(MAX_FRAME_LEN - 4));
        assert!(matches!(too_long.build(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_oversized_command_writes_nothing() {
        let port = SimulatedPort::new();
        let shared = port.shared();
        let mut channel = SerialChannel::new(port, Timing::immediate(Duration::from_millis(50)));

        let command = AtCommand::new("NI")
            .unwrap()
            .with_argument("x".repeat(400));
        assert!(send_command(&mut channel, &command).is_err());
        assert!(
            shared
                .lock()
                .unwrap()
                .written
                .is_empty()
        );
    }

    #[test]
    fn test_send_command_waits_for_ok() {
        let port = SimulatedPort::new();
        let shared = port.shared();
        let mut channel = SerialChannel::new(port, Timing::immediate(Duration::from_millis(50)));

        let written = send_command(&mut channel, &AtCommand::new(FORCE_RESET).unwrap()).unwrap();

        let state = shared
            .lock()
            .unwrap();
        assert_eq!(written, 5);
        assert_eq!(state.commands, vec![b"ATFR\r".to_vec()]);
        assert_eq!(state.unread(), 0);
    }

    #[test]
    fn test_send_command_without_reply_times_out() {
        let port = SimulatedPort::new().with(|s| s.command_reply.clear());
        let mut channel = SerialChannel::new(port, Timing::immediate(Duration::from_millis(20)));

        let err = send_command(&mut channel, &AtCommand::new(FORCE_RESET).unwrap()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Timeout);
    }
}
