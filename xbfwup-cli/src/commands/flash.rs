//! Flash command implementation.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use xbfwup::port::{BOOTLOADER_BAUD, DEFAULT_APP_BAUD};
use xbfwup::{FirmwareImage, NativePort, SerialConfig, Timing, UpdateConfig, XbeeFlasher};

use crate::config::Config;
use crate::{Cli, CliError, use_fancy_output};

/// Serial device used when nothing else is configured.
pub(crate) const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Default number of bootloader prompt probes.
const DEFAULT_PROBE_ATTEMPTS: usize = 20;

/// Blocks per line of dot progress.
const DOTS_PER_LINE: usize = 50;

/// Arguments of `xbfwup flash`.
#[derive(Args, Debug)]
pub(crate) struct FlashArgs {
    /// Path to the firmware image (.ebl).
    pub firmware: PathBuf,

    /// Serial device the radio is attached to.
    #[arg(short, long, env = "XBFWUP_PORT")]
    pub port: Option<String>,

    /// Baud rate of the running application.
    #[arg(short, long, env = "XBFWUP_BAUD")]
    pub baud: Option<u32>,

    /// Baud rate of the bootloader.
    #[arg(long, env = "XBFWUP_BOOT_BAUD")]
    pub boot_baud: Option<u32>,

    /// Carriage-return probes before giving up on the bootloader prompt.
    #[arg(long, value_name = "N")]
    pub probe_attempts: Option<usize>,

    /// Give up waits for the radio after this many seconds (default: wait forever).
    #[arg(long, value_name = "SECS")]
    pub wait_limit: Option<u64>,

    /// The application no longer answers AT commands; power-cycle the radio
    /// by hand while the break is held.
    #[arg(long)]
    pub recovery: bool,
}

/// Settings after layering arguments over the config files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FlashSettings {
    pub port: String,
    pub baud: u32,
    pub update: UpdateConfig,
}

impl FlashSettings {
    /// Resolve the effective settings. Arguments (including environment)
    /// win over the config files, which win over built-in defaults.
    pub(crate) fn resolve(args: &FlashArgs, config: &Config) -> Result<Self> {
        let port = args
            .port
            .clone()
            .or_else(|| {
                config
                    .connection
                    .serial
                    .clone()
            })
            .unwrap_or_else(|| DEFAULT_PORT.to_string());

        let baud = args
            .baud
            .or(config.connection.baud)
            .unwrap_or(DEFAULT_APP_BAUD);
        let bootloader_baud = args
            .boot_baud
            .or(config.bootloader.baud)
            .unwrap_or(BOOTLOADER_BAUD);
        let probe_attempts = args
            .probe_attempts
            .or(config.bootloader.probe_attempts)
            .unwrap_or(DEFAULT_PROBE_ATTEMPTS);
        let wait_limit = args
            .wait_limit
            .or(config.bootloader.wait_limit_secs)
            .map(Duration::from_secs);

        if baud == 0 || bootloader_baud == 0 {
            return Err(CliError::Usage("baud rate must be greater than zero".into()).into());
        }
        if probe_attempts == 0 {
            return Err(CliError::Usage("probe attempts must be at least 1".into()).into());
        }
        if wait_limit.is_some_and(|limit| limit.is_zero()) {
            return Err(CliError::Usage("wait limit must be at least 1 second".into()).into());
        }

        Ok(Self {
            port,
            baud,
            update: UpdateConfig {
                bootloader_baud,
                probe_attempts,
                recovery: args.recovery || config.bootloader.recovery,
                timing: Timing::default().with_wait_limit(wait_limit),
            },
        })
    }
}

/// How block progress is shown.
enum Progress {
    Bar(ProgressBar),
    Dots,
    Silent,
}

impl Progress {
    fn new(quiet: bool, total: usize) -> Self {
        if quiet {
            return Self::Silent;
        }
        if !use_fancy_output() {
            return Self::Dots;
        }

        let pb = ProgressBar::new(total as u64);
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} blocks")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        Self::Bar(pb)
    }

    fn update(&self, done: usize, total: usize) {
        match self {
            Self::Bar(pb) => pb.set_position(done as u64),
            Self::Dots => {
                eprint!(".");
                if done % DOTS_PER_LINE == 0 || done == total {
                    eprintln!(" {done}/{total}");
                }
            },
            Self::Silent => {},
        }
    }

    fn finish(&self) {
        if let Self::Bar(pb) = self {
            pb.finish();
        }
    }

    fn abandon(&self) {
        if let Self::Bar(pb) = self {
            pb.abandon();
        }
    }
}

/// Flash command implementation.
pub(crate) fn cmd_flash(cli: &Cli, config: &Config, args: &FlashArgs) -> Result<()> {
    let settings = FlashSettings::resolve(args, config)?;

    if !cli.quiet {
        eprintln!(
            "{} Loading firmware: {}",
            style("::").cyan(),
            args.firmware
                .display()
        );
    }
    let image = FirmwareImage::from_file(&args.firmware)
        .with_context(|| format!("Failed to load firmware {}", args.firmware.display()))?;

    if settings
        .update
        .recovery
        && !cli.quiet
    {
        eprintln!(
            "{} Recovery mode: power-cycle the radio when asked",
            style("!").yellow()
        );
    }

    let serial = SerialConfig::new(&settings.port, settings.baud);
    let port = NativePort::open(&serial)
        .with_context(|| format!("Failed to open serial port {}", settings.port))?;
    if !cli.quiet {
        eprintln!(
            "{} Using {} at {} baud",
            style("::").cyan(),
            settings.port, settings.baud
        );
    }

    let progress = Progress::new(cli.quiet, image.block_count());
    let mut flasher = XbeeFlasher::new(port, settings.update);
    let result = flasher.update(&image, |done, total| progress.update(done, total));

    // Close the flasher to release the serial port
    flasher.close();

    match result {
        Ok(()) => progress.finish(),
        Err(err) => {
            progress.abandon();
            return Err(err.into());
        },
    }

    if !cli.quiet {
        eprintln!("{} Firmware updated", style("✓").green().bold());
    }

    Ok(())
}
