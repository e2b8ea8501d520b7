//! The event loop: drains bytes from the serial half into the framer,
//! forwards completed frames to UDP, and frames inbound datagrams back out
//! to serial. Single-threaded; the only suspension points are the
//! multiplexor's wait and the underlying read/write/send/recv calls.

use crate::config::{EndpointSpec, ProxyConfiguration, ProxyRole};
use crate::serial::SerialEndpoint;
use crate::signals::{Hangup, Terminate};
use diminuto_framer::{encode, Framer, FramerState};
use diminuto_mux::Multiplexor;
use std::net::{SocketAddr, UdpSocket};
use std::os::fd::AsRawFd;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] std::io::Error),
    #[error("failed to open or configure the serial device: {0}")]
    Serial(#[source] std::io::Error),
    #[error("invalid endpoint")]
    Endpoint,
    #[error("failed to create or bind the UDP socket: {0}")]
    Socket(#[source] std::io::Error),
    #[error("failed to register a descriptor with the multiplexor: {0}")]
    Registration(#[from] diminuto_mux::MuxError),
    #[error("serial read failed: {0}")]
    SerialRead(#[source] std::io::Error),
    #[error("serial write failed: {0}")]
    SerialWrite(#[source] std::io::Error),
    #[error("datagram send failed: {0}")]
    Send(#[source] std::io::Error),
    #[error("datagram receive failed: {0}")]
    Recv(#[source] std::io::Error),
}

/// Runs the proxy to completion (orderly termination via signal, or a fatal
/// I/O error). Returns `Ok(())` on a clean shutdown. `mask_path` is the
/// per-process log-mask file re-read on every hangup, per spec §6
/// "Persisted state" — unconditional, not gated on any command-line flag.
pub fn run(config: &ProxyConfiguration, mask_path: &Path) -> Result<(), ProxyError> {
    let hangup = Hangup::new().map_err(ProxyError::Signal)?;
    let terminate = Terminate::new().map_err(ProxyError::Signal)?;

    let mut serial = SerialEndpoint::open(&config.serial_device, &config.line)
        .map_err(ProxyError::Serial)?;

    let socket = open_socket(config)?;
    socket.set_nonblocking(true).map_err(ProxyError::Socket)?;

    let mut mux = Multiplexor::new(16)?;
    mux.register_read(serial.read_fd())?;
    mux.register_read(socket.as_raw_fd())?;

    let mut payload_buffer = vec![0u8; config.buffer_size];
    let mut framer = Framer::new(config.buffer_size);
    let mut most_recent_sender: Option<SocketAddr> = None;

    loop {
        if hangup.consume() {
            diminuto_log::import_mask_from_file(Some(mask_path));
        }
        if terminate.consume() {
            break;
        }

        let ready = mux.wait(config.select_timeout)?;
        if ready == 0 {
            continue;
        }

        while let Some(fd) = mux.ready_read() {
            if fd == serial.read_fd() {
                step_serial(&mut serial, &mut framer, &socket, config, &most_recent_sender)?;
            } else if fd == socket.as_raw_fd() {
                step_socket(&socket, &mut serial, &mut payload_buffer, &mut most_recent_sender)?;
            }
        }
    }

    mux.close(serial.read_fd())?;
    if serial.write_fd() != serial.read_fd() {
        mux.close(serial.write_fd())?;
    }
    mux.close(socket.as_raw_fd())?;
    Ok(())
}

fn open_socket(config: &ProxyConfiguration) -> Result<UdpSocket, ProxyError> {
    match config.role {
        ProxyRole::Client => UdpSocket::bind("0.0.0.0:0").map_err(ProxyError::Socket),
        ProxyRole::Server => {
            let EndpointSpec::PortOnly(port) = config.endpoint else {
                return Err(ProxyError::Endpoint);
            };
            UdpSocket::bind(("0.0.0.0", port)).map_err(ProxyError::Socket)
        }
    }
}

fn reply_address(
    config: &ProxyConfiguration,
    most_recent_sender: &Option<SocketAddr>,
) -> Option<SocketAddr> {
    match config.role {
        ProxyRole::Client => match config.endpoint {
            EndpointSpec::HostAndPort(addr) => Some(addr),
            EndpointSpec::PortOnly(_) => None,
        },
        ProxyRole::Server => *most_recent_sender,
    }
}

/// Feeds whatever is available on the serial descriptor into the framer one
/// byte at a time; every complete frame the chunk produces is forwarded as
/// its own UDP datagram, so a single read that spans more than one frame (or
/// only part of one) is handled correctly either way.
fn step_serial(
    serial: &mut SerialEndpoint,
    framer: &mut Framer,
    socket: &UdpSocket,
    config: &ProxyConfiguration,
    most_recent_sender: &Option<SocketAddr>,
) -> Result<(), ProxyError> {
    let mut chunk = [0u8; 4096];
    let n = match serial.read(&mut chunk) {
        Ok(0) => return Ok(()),
        Ok(n) => n,
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
        Err(e) => return Err(ProxyError::SerialRead(e)),
    };

    for &byte in &chunk[..n] {
        framer.step(byte);
        if framer.state() == FramerState::Complete {
            let payload = framer.payload().to_vec();
            framer.acknowledge();
            framer.reset();

            if let Some(destination) = reply_address(config, most_recent_sender) {
                socket
                    .send_to(&payload, destination)
                    .map_err(ProxyError::Send)?;
            }
        }
    }
    Ok(())
}

fn step_socket(
    socket: &UdpSocket,
    serial: &mut SerialEndpoint,
    payload_buffer: &mut [u8],
    most_recent_sender: &mut Option<SocketAddr>,
) -> Result<(), ProxyError> {
    let (n, sender) = match socket.recv_from(payload_buffer) {
        Ok(pair) => pair,
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
        Err(e) => return Err(ProxyError::Recv(e)),
    };
    *most_recent_sender = Some(sender);

    let mut wire = Vec::with_capacity(n + 16);
    encode(&payload_buffer[..n], &mut wire);
    serial.write_all(&wire).map_err(ProxyError::SerialWrite)
}
