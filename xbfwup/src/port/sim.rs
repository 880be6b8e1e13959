//! In-memory model of the radio for unit tests.
//!
//! The model reacts to what the host writes:
//!
//! - application mode: `+++` and `AT..\r` are answered with the command reply
//!   (`OK\r` by default);
//! - once the break has been released and the line runs at the bootloader
//!   baud rate, carriage returns are prompt probes, `1`/`2` are menu
//!   selections, SOH frames are data blocks and EOT ends the transfer.
//!
//! State is shared behind an `Arc<Mutex<_>>` so tests can inspect it after
//! the port has been moved into (and dropped by) the code under test.

use {
    crate::{
        error::Result,
        port::{BOOTLOADER_BAUD, LineConfig, LineSignals, Port},
        protocol::xmodem::{FRAME_LEN, control},
    },
    std::{
        collections::VecDeque,
        io::{Read, Write},
        sync::{Arc, Mutex, MutexGuard},
        time::Duration,
    },
};

/// Signal event recorded by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    ControlLines,
    BreakOn,
    BreakOff,
}

/// Reply policy for data blocks, keyed by 1-based block index.
pub(crate) type AckPolicy = Box<dyn Fn(usize) -> Option<u8> + Send>;

pub(crate) struct SimState {
    rx: VecDeque<u8>,
    pending: Vec<u8>,
    break_released: bool,

    /// Every byte the host wrote, in order.
    pub written: Vec<u8>,
    /// Successful `write` calls.
    pub write_calls: usize,
    /// Escape sequences and AT command frames, one entry each.
    pub commands: Vec<Vec<u8>>,
    /// Complete block frames.
    pub frames: Vec<Vec<u8>>,
    /// Menu selections received by the bootloader.
    pub menu: Vec<u8>,
    /// Prompt probes received by the bootloader.
    pub probes: usize,
    /// End-of-transfer bytes received.
    pub eots: usize,
    /// Current line configuration.
    pub line: LineConfig,
    /// Every configuration applied, in order.
    pub line_history: Vec<LineConfig>,
    /// Control-line and break events, in order.
    pub signals: Vec<Signal>,
    /// The host closed the port.
    pub closed: bool,

    /// Reply to `+++` and AT commands.
    pub command_reply: Vec<u8>,
    /// Probe number (1-based) that gets the prompt; `None` never answers.
    pub prompt_after: Option<usize>,
    /// Reply to the upload menu selection.
    pub upload_reply: Vec<u8>,
    /// Reply to each data block.
    pub ack_for: AckPolicy,
    /// Reply to end-of-transfer.
    pub eot_reply: Vec<u8>,
    /// Accept at most this many bytes per `write`.
    pub max_write_chunk: Option<usize>,
    /// Report zero progress once this many bytes were accepted.
    pub stall_after: Option<usize>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            rx: VecDeque::new(),
            pending: Vec::new(),
            break_released: false,
            written: Vec::new(),
            write_calls: 0,
            commands: Vec::new(),
            frames: Vec::new(),
            menu: Vec::new(),
            probes: 0,
            eots: 0,
            line: LineConfig::default(),
            line_history: Vec::new(),
            signals: Vec::new(),
            closed: false,
            command_reply: b"OK\r".to_vec(),
            prompt_after: Some(1),
            upload_reply: b"\r\nbegin upload\r\nC".to_vec(),
            ack_for: Box::new(|_| Some(control::ACK)),
            eot_reply: b"\x06\r\nSerial upload complete\r\n".to_vec(),
            max_write_chunk: None,
            stall_after: None,
        }
    }
}

impl SimState {
    /// Queue bytes for the host to read.
    pub fn push_rx(&mut self, bytes: &[u8]) {
        self.rx
            .extend(bytes.iter().copied());
    }

    /// Bytes queued but not yet read by the host.
    pub fn unread(&self) -> usize {
        self.rx
            .len()
    }

    fn in_bootloader(&self) -> bool {
        self.break_released && self.line.baud_rate == BOOTLOADER_BAUD
    }

    fn process(&mut self) {
        loop {
            let Some(&first) = self.pending.first() else {
                return;
            };

            if self.in_bootloader() {
                match first {
                    control::SOH => {
                        if self.pending.len() < FRAME_LEN {
                            return;
                        }
                        let frame: Vec<u8> = self.pending.drain(..FRAME_LEN).collect();
                        self.frames.push(frame);
                        if let Some(reply) = (self.ack_for)(self.frames.len()) {
                            self.rx.push_back(reply);
                        }
                    },
                    control::EOT => {
                        self.pending.remove(0);
                        self.eots += 1;
                        let reply = self.eot_reply.clone();
                        self.push_rx(&reply);
                    },
                    b'\r' => {
                        self.pending.remove(0);
                        self.probes += 1;
                        if self.prompt_after == Some(self.probes) {
                            self.push_rx(b"\r\nBL >");
                        }
                    },
                    b'1' => {
                        self.pending.remove(0);
                        self.menu.push(first);
                        let reply = self.upload_reply.clone();
                        self.push_rx(&reply);
                    },
                    b'2' => {
                        self.pending.remove(0);
                        self.menu.push(first);
                    },
                    _ => {
                        self.pending.remove(0);
                    },
                }
                continue;
            }

            if self.pending.starts_with(b"+++") {
                let escape: Vec<u8> = self.pending.drain(..3).collect();
                self.commands.push(escape);
                let reply = self.command_reply.clone();
                self.push_rx(&reply);
            } else if b"+++".starts_with(&self.pending) {
                return;
            } else if self.pending.starts_with(b"AT") {
                let Some(end) = self.pending.iter().position(|&b| b == b'\r') else {
                    return;
                };
                let command: Vec<u8> = self.pending.drain(..=end).collect();
                self.commands.push(command);
                let reply = self.command_reply.clone();
                self.push_rx(&reply);
            } else if self.pending == b"A" {
                return;
            } else {
                self.pending.remove(0);
            }
        }
    }
}

/// Simulated radio implementing [`Port`].
pub(crate) struct SimulatedPort {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPort {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    /// Adjust the model before use.
    pub fn with(self, configure: impl FnOnce(&mut SimState)) -> Self {
        configure(&mut *self.state());
        self
    }

    /// Handle for inspecting the model after the port is gone.
    pub fn shared(&self) -> Arc<Mutex<SimState>> {
        Arc::clone(&self.state)
    }

    pub fn state(&self) -> MutexGuard<'_, SimState> {
        self.state
            .lock()
            .unwrap()
    }
}

impl LineSignals for SimulatedPort {
    fn assert_control_lines(&mut self) -> Result<()> {
        self.state()
            .signals
            .push(Signal::ControlLines);
        Ok(())
    }

    fn set_break(&mut self) -> Result<()> {
        self.state()
            .signals
            .push(Signal::BreakOn);
        Ok(())
    }

    fn clear_break(&mut self) -> Result<()> {
        let mut state = self.state();
        state
            .signals
            .push(Signal::BreakOff);
        state.break_released = true;
        Ok(())
    }
}

impl Port for SimulatedPort {
    fn name(&self) -> &str {
        "sim"
    }

    fn line_config(&self) -> LineConfig {
        self.state().line
    }

    fn apply_line_config(&mut self, config: LineConfig) -> Result<()> {
        let mut state = self.state();
        state.line = config;
        state
            .line_history
            .push(config);
        Ok(())
    }

    fn wait_readable(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(self.state().unread() > 0)
    }

    fn close(&mut self) -> Result<()> {
        self.state().closed = true;
        Ok(())
    }
}

impl Read for SimulatedPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut state = self.state();
        if state.rx.is_empty() {
            return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf
            .len()
            .min(state.rx.len());
        for (slot, byte) in buf
            .iter_mut()
            .zip(state.rx.drain(..n))
        {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for SimulatedPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut state = self.state();
        if state
            .stall_after
            .is_some_and(|limit| state.written.len() >= limit)
        {
            return Ok(0);
        }
        let n = state
            .max_write_chunk
            .map_or(buf.len(), |chunk| chunk.min(buf.len()));
        state
            .written
            .extend_from_slice(&buf[..n]);
        state
            .pending
            .extend_from_slice(&buf[..n]);
        state.write_calls += 1;
        state.process();
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
