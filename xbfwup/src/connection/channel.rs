//! Serial channel with pause-delimited framing.
//!
//! Most replies from the radio carry no length field. The channel therefore
//! infers message boundaries from the line going quiet: a framed read keeps
//! appending as long as more bytes arrive within [`Timing::idle_window`].
//!
//! The channel also realises the read-blocking regime of the current
//! [`LineConfig`]. In the blocking regime a read waits for at least one byte
//! with no upper bound unless [`Timing::wait_limit`] is set.

use {
    crate::{
        error::{Error, Result},
        port::{LineConfig, Port},
    },
    log::{debug, trace, warn},
    std::{
        io::ErrorKind,
        thread,
        time::{Duration, Instant},
    },
};

/// Delays and wait bounds used by the protocol layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Quiet period before and after the `+++` escape sequence.
    pub escape_guard: Duration,
    /// How long the break is held while the radio power-cycles.
    pub power_cycle_hold: Duration,
    /// Pause between sentinel polls.
    pub sentinel_poll: Duration,
    /// Silence that ends a framed read.
    pub idle_window: Duration,
    /// Upper bound for waits that are otherwise unbounded.
    ///
    /// `None` (the default) waits forever.
    pub wait_limit: Option<Duration>,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            escape_guard: Duration::from_secs(1),
            power_cycle_hold: Duration::from_secs(2),
            sentinel_poll: Duration::from_millis(100),
            idle_window: Duration::from_millis(100),
            wait_limit: None,
        }
    }
}

impl Timing {
    /// No delays at all; waits give up after `wait_limit`.
    pub fn immediate(wait_limit: Duration) -> Self {
        Self {
            escape_guard: Duration::ZERO,
            power_cycle_hold: Duration::ZERO,
            sentinel_poll: Duration::ZERO,
            idle_window: Duration::ZERO,
            wait_limit: Some(wait_limit),
        }
    }

    /// Set the bound on otherwise unbounded waits.
    #[must_use]
    pub fn with_wait_limit(mut self, wait_limit: Option<Duration>) -> Self {
        self.wait_limit = wait_limit;
        self
    }
}

/// Exclusive owner of the serial link.
pub struct SerialChannel<P: Port> {
    port: P,
    line: LineConfig,
    timing: Timing,
}

impl<P: Port> SerialChannel<P> {
    /// Take ownership of an open port.
    pub fn new(port: P, timing: Timing) -> Self {
        let line = port.line_config();
        Self { port, line, timing }
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Get a mutable reference to the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Consume the channel and return the underlying port.
    pub fn into_port(self) -> P {
        self.port
    }

    /// Timing policy in effect.
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Current line configuration.
    pub fn line_config(&self) -> LineConfig {
        self.line
    }

    /// Reconfigure the line; applies before the next read.
    pub fn set_line_config(&mut self, line: LineConfig) -> Result<()> {
        debug!(
            "Line: {} baud, min_bytes={}, timeout={}ds",
            line.baud_rate, line.min_bytes, line.timeout_deciseconds
        );
        self.port
            .apply_line_config(line)?;
        self.line = line;
        Ok(())
    }

    /// Sleep for `duration` (no-op when zero).
    pub fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }

    /// Write every byte of `data`, retrying partial writes.
    ///
    /// Zero progress from the port is an unrecoverable transport failure.
    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut remaining = data;
        while !remaining.is_empty() {
            match self
                .port
                .write(remaining)
            {
                Ok(0) => {
                    return Err(Error::Transport(format!(
                        "write made no progress with {} bytes left",
                        remaining.len()
                    )));
                },
                Ok(n) => remaining = &remaining[n..],
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                Err(e) => return Err(Error::Io(e)),
            }
        }
        self.port
            .flush()?;
        trace!("Wrote {} bytes", data.len());
        Ok(())
    }

    /// One port read; `Ok(0)` when nothing arrived in the port's slice.
    fn read_once(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self
            .port
            .read(buf)
        {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Read according to the line regime.
    ///
    /// Polling: a single attempt that may return 0. Blocking: repeat until
    /// at least one byte arrives or `deadline` passes.
    fn read_some(&mut self, buf: &mut [u8], deadline: Option<Instant>) -> Result<usize> {
        if self
            .line
            .is_polling()
        {
            return self.read_once(buf);
        }

        loop {
            let n = self.read_once(buf)?;
            if n > 0 {
                return Ok(n);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(Error::Timeout("no data before the wait limit".into()));
            }
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.timing
            .wait_limit
            .map(|limit| Instant::now() + limit)
    }

    /// Read a single byte; `None` if the line is polling and stayed quiet.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        let deadline = self.deadline();
        match self.read_some(&mut buf, deadline)? {
            0 => Ok(None),
            _ => Ok(Some(buf[0])),
        }
    }

    /// Read one pause-delimited message of at most `max_bytes`.
    ///
    /// Returns an empty vector if the line is polling and nothing arrived.
    pub fn read_framed(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        if max_bytes == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; max_bytes];
        let deadline = self.deadline();
        let mut pos = self.read_some(&mut buf, deadline)?;
        if pos == 0 {
            return Ok(Vec::new());
        }

        while pos < max_bytes
            && self
                .port
                .wait_readable(self.timing.idle_window)?
        {
            let n = self.read_once(&mut buf[pos..])?;
            if n == 0 {
                break;
            }
            pos += n;
        }

        buf.truncate(pos);
        trace!("Framed read: {} bytes", buf.len());
        Ok(buf)
    }

    /// Discard input until `sentinel` shows up, then discard the two bytes
    /// that follow it (the rest of `OK\r`).
    ///
    /// Unbounded unless [`Timing::wait_limit`] is set.
    pub fn wait_for_sentinel(&mut self, sentinel: u8) -> Result<()> {
        let deadline = self.deadline();
        let mut buf = [0u8; 1];
        let mut discarded = 0usize;

        loop {
            if self.read_some(&mut buf, deadline)? == 1 && buf[0] == sentinel {
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(Error::Timeout(format!(
                    "no 0x{sentinel:02X} sentinel before the wait limit"
                )));
            }
            discarded += 1;
            self.pause(self.timing.sentinel_poll);
        }

        if discarded > 0 {
            warn!("Discarded {discarded} bytes before 0x{sentinel:02X}");
        }

        for _ in 0..2 {
            self.read_some(&mut buf, deadline)?;
        }
        trace!("Sentinel 0x{sentinel:02X} seen");
        Ok(())
    }

    /// Drive the handshake lines to the bootloader-entry levels.
    pub fn assert_control_lines(&mut self) -> Result<()> {
        self.port
            .assert_control_lines()
    }

    /// Start the break condition.
    pub fn set_break(&mut self) -> Result<()> {
        self.port
            .set_break()
    }

    /// End the break condition.
    pub fn clear_break(&mut self) -> Result<()> {
        self.port
            .clear_break()
    }
}
