//! Native serial port implementation using the `serialport` crate.
//!
//! `serialport` exposes a single read timeout rather than a `VMIN`/`VTIME`
//! pair, so the blocking regime is approximated with short read slices that
//! the channel layer repeats until data shows up.

use {
    crate::{
        error::{Error, Result},
        port::{
            DataBits, FlowControl, LineConfig, LineSignals, Parity, Port, PortEnumerator,
            PortInfo, SerialConfig, StopBits,
        },
    },
    log::trace,
    std::{
        io::{Read, Write},
        thread,
        time::{Duration, Instant},
    },
};

/// Read slice used while the line is in the blocking regime.
const BLOCKING_SLICE: Duration = Duration::from_millis(100);

/// Granularity of [`Port::wait_readable`] polling.
const READABLE_POLL: Duration = Duration::from_millis(2);

/// Native serial port implementation.
pub struct NativePort {
    port: Option<Box<dyn serialport::SerialPort>>,
    name: String,
    line: LineConfig,
}

impl NativePort {
    /// Open a serial port with the given configuration.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = serialport::new(&config.port_name, config.line.baud_rate)
            .timeout(slice_for(config.line))
            .data_bits(
                config
                    .data_bits
                    .into(),
            )
            .parity(
                config
                    .parity
                    .into(),
            )
            .stop_bits(
                config
                    .stop_bits
                    .into(),
            )
            .flow_control(
                config
                    .flow_control
                    .into(),
            )
            .open()?;

        Ok(Self {
            port: Some(port),
            name: config
                .port_name
                .clone(),
            line: config.line,
        })
    }

    /// Open a serial port with default settings.
    pub fn open_simple(port_name: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig::new(port_name, baud_rate);
        Self::open(&config)
    }

    fn inner(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| {
                Error::Serial(serialport::Error::new(
                    serialport::ErrorKind::NoDevice,
                    "Port is closed",
                ))
            })
    }
}

/// Port timeout that realises the read regime of `line`.
fn slice_for(line: LineConfig) -> Duration {
    if line.is_polling() {
        line.read_timeout()
            .max(Duration::from_millis(1))
    } else {
        BLOCKING_SLICE
    }
}

impl LineSignals for NativePort {
    fn assert_control_lines(&mut self) -> Result<()> {
        trace!("Asserting DTR, releasing RTS");
        let port = self.inner()?;
        port.write_data_terminal_ready(true)?;
        port.write_request_to_send(false)?;
        Ok(())
    }

    fn set_break(&mut self) -> Result<()> {
        trace!("Setting break");
        self.inner()?
            .set_break()?;
        Ok(())
    }

    fn clear_break(&mut self) -> Result<()> {
        trace!("Clearing break");
        self.inner()?
            .clear_break()?;
        Ok(())
    }
}

impl Port for NativePort {
    fn name(&self) -> &str {
        &self.name
    }

    fn line_config(&self) -> LineConfig {
        self.line
    }

    fn apply_line_config(&mut self, config: LineConfig) -> Result<()> {
        let port = self.inner()?;
        if port.baud_rate()? != config.baud_rate {
            port.set_baud_rate(config.baud_rate)?;
        }
        port.set_timeout(slice_for(config))?;
        self.line = config;
        Ok(())
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<bool> {
        let start = Instant::now();
        let port = self.inner()?;
        loop {
            if port.bytes_to_read()? > 0 {
                return Ok(true);
            }
            if start.elapsed() >= timeout {
                return Ok(false);
            }
            thread::sleep(READABLE_POLL);
        }
    }

    fn close(&mut self) -> Result<()> {
        // Take ownership of the port and let it drop (close)
        self.port
            .take();
        Ok(())
    }
}

impl Read for NativePort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "port closed"))
            .and_then(|p| p.read(buf))
    }
}

impl Write for NativePort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "port closed"))
            .and_then(|p| p.write(buf))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "port closed"))
            .and_then(std::io::Write::flush)
    }
}

/// Native port enumerator.
pub struct NativePortEnumerator;

impl PortEnumerator for NativePortEnumerator {
    fn list_ports() -> Result<Vec<PortInfo>> {
        let ports = serialport::available_ports().map_err(Error::Serial)?;

        Ok(ports
            .into_iter()
            .map(|p| {
                let (vid, pid, manufacturer, product, serial_number) = match &p.port_type {
                    serialport::SerialPortType::UsbPort(info) => (
                        Some(info.vid),
                        Some(info.pid),
                        info.manufacturer
                            .clone(),
                        info.product
                            .clone(),
                        info.serial_number
                            .clone(),
                    ),
                    _ => (None, None, None, None, None),
                };

                PortInfo {
                    name: p.port_name,
                    vid,
                    pid,
                    manufacturer,
                    product,
                    serial_number,
                }
            })
            .collect())
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Seven => Self::Seven,
            DataBits::Eight => Self::Eight,
        }
    }
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => Self::None,
            Parity::Odd => Self::Odd,
            Parity::Even => Self::Even,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => Self::One,
            StopBits::Two => Self::Two,
        }
    }
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => Self::None,
            FlowControl::Hardware => Self::Hardware,
        }
    }
}
