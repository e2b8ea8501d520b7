//! Acquiring and configuring the serial half of the proxy: either a real
//! device via `serialport`/`mio-serial`, or standard input/output when the
//! device path is `"-"`.

use crate::config::{DataBits, LineParameters, Parity, StopBits};
use mio_serial::SerialPortBuilderExt;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

fn to_data_bits(d: DataBits) -> serialport::DataBits {
    match d {
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    }
}

fn to_parity(p: Parity) -> serialport::Parity {
    match p {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    }
}

fn to_stop_bits(s: StopBits) -> serialport::StopBits {
    match s {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    }
}

fn to_flow_control(line: &LineParameters) -> serialport::FlowControl {
    if line.rts_cts {
        serialport::FlowControl::Hardware
    } else if line.xon_xoff {
        serialport::FlowControl::Software
    } else {
        serialport::FlowControl::None
    }
}

/// The serial half of the proxy: either a genuine device, registered with
/// the multiplexor through `mio-serial`'s native async support, or standard
/// input/output, registered by raw descriptor.
pub enum SerialEndpoint {
    Device(mio_serial::SerialStream),
    Stdio {
        stdin: io::Stdin,
        stdout: io::Stdout,
    },
}

impl SerialEndpoint {
    pub fn open(path: &str, line: &LineParameters) -> io::Result<Self> {
        if path == "-" {
            return Ok(SerialEndpoint::Stdio {
                stdin: io::stdin(),
                stdout: io::stdout(),
            });
        }

        let port = serialport::new(path, line.baud_rate)
            .data_bits(to_data_bits(line.data_bits))
            .parity(to_parity(line.parity))
            .stop_bits(to_stop_bits(line.stop_bits))
            .flow_control(to_flow_control(line))
            .timeout(Duration::from_millis(0))
            .open_native_async()?;

        Ok(SerialEndpoint::Device(port))
    }

    pub fn read_fd(&self) -> RawFd {
        match self {
            SerialEndpoint::Device(port) => port.as_raw_fd(),
            SerialEndpoint::Stdio { stdin, .. } => stdin.as_raw_fd(),
        }
    }

    pub fn write_fd(&self) -> RawFd {
        match self {
            SerialEndpoint::Device(port) => port.as_raw_fd(),
            SerialEndpoint::Stdio { stdout, .. } => stdout.as_raw_fd(),
        }
    }

    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            SerialEndpoint::Device(port) => port.read(buf),
            SerialEndpoint::Stdio { stdin, .. } => stdin.read(buf),
        }
    }

    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            SerialEndpoint::Device(port) => port.write_all(buf),
            SerialEndpoint::Stdio { stdout, .. } => {
                stdout.write_all(buf)?;
                stdout.flush()
            }
        }
    }
}
