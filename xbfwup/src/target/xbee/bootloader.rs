//! Coercing a running radio into its serial bootloader.
//!
//! ```text
//! Operational --+++--> CommandMode --ATFR, DTR, break 2s--> PowerCycling
//!     --115200, poll 100ms--> BaudSwitch --CR probes--> BootloaderPrompt
//!     --block until 1 byte--> Ready
//! ```
//!
//! Every transition runs once. A failure leaves the machine in the last
//! state it reached and the caller aborts.

use {
    crate::{
        connection::SerialChannel,
        error::{Error, Result, Stage},
        port::{LineConfig, Port},
        protocol::at::{self, AtCommand},
    },
    log::{debug, info},
};

/// Largest reply read while probing for the prompt.
const PROMPT_READ_MAX: usize = 1024;

/// Read timeout while probing, in tenths of a second.
const PROBE_TIMEOUT_DECISECONDS: u8 = 1;

/// Bootloader menu entries.
pub mod menu {
    /// "1. upload ebl".
    pub const UPLOAD: u8 = b'1';
    /// "2. run".
    pub const RUN: u8 = b'2';
}

/// Where the radio is on its way into the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BootState {
    /// Application running, transparent mode.
    Operational,
    /// AT command mode accepted.
    CommandMode,
    /// Power cycle forced and break released.
    PowerCycling,
    /// Line at the bootloader baud rate, polling reads.
    BaudSwitch,
    /// Prompt observed.
    BootloaderPrompt,
    /// Blocking reads restored; ready for the transfer.
    Ready,
}

impl BootState {
    /// The state a successful step leads to.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Operational => Some(Self::CommandMode),
            Self::CommandMode => Some(Self::PowerCycling),
            Self::PowerCycling => Some(Self::BaudSwitch),
            Self::BaudSwitch => Some(Self::BootloaderPrompt),
            Self::BootloaderPrompt => Some(Self::Ready),
            Self::Ready => None,
        }
    }
}

impl From<BootState> for Stage {
    /// Stage that executes while moving *into* `state`.
    fn from(state: BootState) -> Self {
        match state {
            BootState::Operational | BootState::CommandMode => Self::CommandMode,
            BootState::PowerCycling => Self::PowerCycle,
            BootState::BaudSwitch => Self::BaudSwitch,
            BootState::BootloaderPrompt => Self::BootloaderPrompt,
            BootState::Ready => Self::Ready,
        }
    }
}

/// Parameters of the bootloader entry sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryConfig {
    /// Baud rate the bootloader talks at.
    pub bootloader_baud: u32,
    /// Carriage-return probes before giving up on the prompt.
    pub probe_attempts: usize,
    /// Skip `+++` and `ATFR`; the radio is power-cycled by hand.
    pub recovery: bool,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            bootloader_baud: crate::port::BOOTLOADER_BAUD,
            probe_attempts: 20,
            recovery: false,
        }
    }
}

/// Drives a radio from [`BootState::Operational`] to [`BootState::Ready`].
pub struct BootloaderEntry<'a, P: Port> {
    channel: &'a mut SerialChannel<P>,
    config: EntryConfig,
    state: BootState,
}

impl<'a, P: Port> BootloaderEntry<'a, P> {
    /// Start from the running application.
    pub fn new(channel: &'a mut SerialChannel<P>, config: EntryConfig) -> Self {
        Self {
            channel,
            config,
            state: BootState::Operational,
        }
    }

    /// Current state.
    pub fn state(&self) -> BootState {
        self.state
    }

    /// Perform the next transition. Returns the new state.
    ///
    /// Once [`BootState::Ready`] is reached this does nothing.
    pub fn advance(&mut self) -> Result<BootState> {
        let next = match self.state {
            BootState::Operational => {
                self.enter_command_mode()?;
                BootState::CommandMode
            },
            BootState::CommandMode => {
                self.power_cycle()?;
                BootState::PowerCycling
            },
            BootState::PowerCycling => {
                self.switch_baud()?;
                BootState::BaudSwitch
            },
            BootState::BaudSwitch => {
                self.probe_prompt()?;
                BootState::BootloaderPrompt
            },
            BootState::BootloaderPrompt => {
                self.settle()?;
                BootState::Ready
            },
            BootState::Ready => return Ok(BootState::Ready),
        };

        debug!("Boot state: {:?} -> {next:?}", self.state);
        self.state = next;
        Ok(next)
    }

    /// Run every remaining transition.
    pub fn run(&mut self) -> Result<()> {
        while self.state != BootState::Ready {
            self.advance()?;
        }
        Ok(())
    }

    fn enter_command_mode(&mut self) -> Result<()> {
        if self
            .config
            .recovery
        {
            info!("Recovery mode: skipping AT command mode");
            return Ok(());
        }

        info!("Entering AT command mode...");
        let guard = self
            .channel
            .timing()
            .escape_guard;
        self.channel
            .pause(guard);
        self.channel
            .write_all(at::ESCAPE_SEQUENCE)?;
        self.channel
            .pause(guard);
        self.channel
            .wait_for_sentinel(at::OK_SENTINEL)
    }

    fn power_cycle(&mut self) -> Result<()> {
        info!("Entering bootloader...");
        if !self
            .config
            .recovery
        {
            at::send_command(self.channel, &AtCommand::new(at::FORCE_RESET)?)?;
        }

        self.channel
            .assert_control_lines()?;
        self.channel
            .set_break()?;
        if self
            .config
            .recovery
        {
            info!("Power-cycle the radio now");
        }
        let hold = self
            .channel
            .timing()
            .power_cycle_hold;
        self.channel
            .pause(hold);
        self.channel
            .clear_break()?;
        // The handshake lines tend to drop while the break is held.
        self.channel
            .assert_control_lines()
    }

    fn switch_baud(&mut self) -> Result<()> {
        self.channel
            .set_line_config(LineConfig::polling(
                self.config
                    .bootloader_baud,
                PROBE_TIMEOUT_DECISECONDS,
            ))
    }

    fn probe_prompt(&mut self) -> Result<()> {
        let attempts = self
            .config
            .probe_attempts;
        for attempt in 1..=attempts {
            self.channel
                .write_all(b"\r")?;
            let reply = self
                .channel
                .read_framed(PROMPT_READ_MAX)?;
            if !reply.is_empty() {
                debug!(
                    "Bootloader answered probe {attempt}: {:?}",
                    String::from_utf8_lossy(&reply)
                );
                return Ok(());
            }
            debug!("No answer to probe {attempt}/{attempts}");
        }

        Err(Error::Timeout(format!(
            "no bootloader prompt after {attempts} attempts"
        )))
    }

    fn settle(&mut self) -> Result<()> {
        self.channel
            .set_line_config(LineConfig::blocking(
                self.config
                    .bootloader_baud,
            ))
    }
}
