//! XBee firmware update orchestration.
//!
//! The flasher owns the serial channel for the whole update and walks the
//! stages in order:
//!
//! ```text
//! Validate -> CommandMode -> PowerCycle -> BaudSwitch -> BootloaderPrompt
//!          -> Ready -> SelectProtocol -> Transfer -> Confirm -> Resume
//! ```
//!
//! The first failure ends the update. The radio is left wherever the failing
//! step left it; there is no rollback.
//!
//! ## Example
//!
//! ```rust,no_run
//! use xbfwup::{NativePort, run_firmware_update};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let port = NativePort::open_simple("/dev/ttyUSB0", 9600)?;
//!     let firmware = std::fs::read("xb24-zb.ebl")?;
//!     run_firmware_update(port, &firmware)?;
//!     Ok(())
//! }
//! ```

use {
    crate::{
        connection::{SerialChannel, Timing},
        error::{Error, Stage, UpdateError},
        image::FirmwareImage,
        port::{BOOTLOADER_BAUD, LineConfig, Port},
        protocol::xmodem::XmodemSender,
        target::xbee::bootloader::{BootloaderEntry, EntryConfig, menu},
    },
    log::{debug, info, warn},
};

/// Parameters of a firmware update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateConfig {
    /// Baud rate the bootloader talks at.
    pub bootloader_baud: u32,
    /// Carriage-return probes before giving up on the bootloader prompt.
    pub probe_attempts: usize,
    /// The application no longer answers `+++`; skip command mode.
    pub recovery: bool,
    /// Delays and wait bounds.
    pub timing: Timing,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            bootloader_baud: BOOTLOADER_BAUD,
            probe_attempts: 20,
            recovery: false,
            timing: Timing::default(),
        }
    }
}

impl UpdateConfig {
    /// Reject settings the bootloader entry cannot work with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.bootloader_baud == 0 {
            return Err(Error::Config("bootloader baud rate must be greater than zero".into()));
        }
        if self.probe_attempts == 0 {
            return Err(Error::Config("at least one prompt probe is required".into()));
        }
        Ok(())
    }

    fn entry(&self) -> EntryConfig {
        EntryConfig {
            bootloader_baud: self.bootloader_baud,
            probe_attempts: self.probe_attempts,
            recovery: self.recovery,
        }
    }
}

/// XBee flasher.
///
/// Generic over the port type `P`, so the same sequence runs against a real
/// serial port or an in-memory model. The line settings the port has when
/// the flasher takes it over are put back once the new firmware runs.
pub struct XbeeFlasher<P: Port> {
    channel: SerialChannel<P>,
    config: UpdateConfig,
    original_line: LineConfig,
    stage: Stage,
}

impl<P: Port> XbeeFlasher<P> {
    /// Take ownership of an open port.
    pub fn new(port: P, config: UpdateConfig) -> Self {
        let channel = SerialChannel::new(port, config.timing);
        Self {
            original_line: channel.line_config(),
            channel,
            config,
            stage: Stage::Validate,
        }
    }

    /// Stage reached so far.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Configuration in use.
    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Close the port to release the device.
    pub fn close(&mut self) {
        if let Err(e) = self
            .channel
            .port_mut()
            .close()
        {
            warn!("Failed to close {}: {e}", self.channel.port().name());
        }
    }

    /// Consume the flasher and return the underlying port.
    pub fn into_port(self) -> P {
        self.channel
            .into_port()
    }

    /// Run the whole update.
    ///
    /// `progress` receives (blocks acknowledged, total blocks).
    pub fn update<F>(&mut self, image: &FirmwareImage, progress: F) -> Result<(), UpdateError>
    where
        F: FnMut(usize, usize),
    {
        self.stage = Stage::Validate;
        self.config
            .validate()
            .map_err(|e| UpdateError::new(Stage::Validate, e))?;
        debug!(
            "Updating {} with {} bytes ({} blocks)",
            self.channel
                .port()
                .name(),
            image.len(),
            image.block_count()
        );

        let mut entry = BootloaderEntry::new(&mut self.channel, self.config.entry());
        while let Some(next) = entry
            .state()
            .next()
        {
            let stage = Stage::from(next);
            self.stage = stage;
            entry
                .advance()
                .map_err(|e| UpdateError::new(stage, e))?;
        }

        info!("Beginning programming...");
        self.stage = Stage::SelectProtocol;
        XmodemSender::new(&mut self.channel)
            .negotiate(menu::UPLOAD)
            .map_err(|e| UpdateError::new(Stage::SelectProtocol, e))?;

        self.stage = Stage::Transfer;
        let mut sender = XmodemSender::new(&mut self.channel);
        sender
            .send_blocks(image, progress)
            .map_err(|e| UpdateError::new(Stage::Transfer, e))?;

        self.stage = Stage::Confirm;
        sender
            .finish()
            .map_err(|e| UpdateError::new(Stage::Confirm, e))?;

        self.stage = Stage::Resume;
        self.resume()
            .map_err(|e| UpdateError::new(Stage::Resume, e))?;

        info!("Programming complete");
        Ok(())
    }

    /// Start the new firmware and put the line back the way it was found.
    fn resume(&mut self) -> crate::Result<()> {
        self.channel
            .write_all(&[menu::RUN])?;
        self.channel
            .set_line_config(self.original_line)
    }
}

/// Update the radio behind `port` with `firmware`, using default settings.
///
/// The port is consumed and closed on every exit path.
pub fn run_firmware_update<P: Port>(port: P, firmware: &[u8]) -> Result<(), UpdateError> {
    run_firmware_update_with(port, firmware, &UpdateConfig::default(), |_, _| {})
}

/// [`run_firmware_update`] with explicit settings and a progress sink.
///
/// An empty image is rejected before anything is written to the port.
pub fn run_firmware_update_with<P, F>(
    port: P,
    firmware: &[u8],
    config: &UpdateConfig,
    progress: F,
) -> Result<(), UpdateError>
where
    P: Port,
    F: FnMut(usize, usize),
{
    let image =
        FirmwareImage::new(firmware).map_err(|e| UpdateError::new(Stage::Validate, e))?;
    XbeeFlasher::new(port, *config).update(&image, progress)
}
