//! Command-line surface: short single-letter options matching the option
//! string `124678B:D:E:b:cdehmnorst:x?` carried over from the original
//! program, re-expressed as a `clap` derive struct instead of a getopt
//! table.

use crate::config::{
    ConfigError, DataBits, EndpointSpec, IpPreference, LineParameters, Parity, ProxyConfiguration,
    ProxyRole, StopBits,
};
use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "conestoga", about = "Framer-over-serial / UDP proxy")]
pub struct Cli {
    /// Seven data bits (default is eight).
    #[arg(short = '7')]
    pub seven_bits: bool,

    /// Eight data bits (the default; accepted for symmetry with `-7`).
    #[arg(short = '8')]
    pub eight_bits: bool,

    /// One stop bit (the default; accepted for symmetry with `-2`).
    #[arg(short = '1')]
    pub one_stop_bit: bool,

    /// Two stop bits.
    #[arg(short = '2')]
    pub two_stop_bits: bool,

    /// RTS/CTS hardware flow control.
    #[arg(short = 'r')]
    pub rts_cts: bool,

    /// XON/XOFF software flow control.
    #[arg(short = 'x')]
    pub xon_xoff: bool,

    /// Assert modem control lines.
    #[arg(short = 'm')]
    pub modem_control: bool,

    /// Even parity.
    #[arg(short = 'e')]
    pub even_parity: bool,

    /// No parity (the default; accepted for symmetry with `-e`/`-o`).
    #[arg(short = 'n')]
    pub no_parity: bool,

    /// Odd parity.
    #[arg(short = 'o')]
    pub odd_parity: bool,

    /// Run as a client: the endpoint is the fixed far peer.
    #[arg(short = 'c')]
    pub client: bool,

    /// Run as a server: the endpoint port comes from `-E`.
    #[arg(short = 's')]
    pub server: bool,

    /// Fork into the background after initialization.
    #[arg(short = 'd')]
    pub daemonize: bool,

    /// Baud rate, in bits per second.
    #[arg(short = 'B', value_name = "RATE")]
    pub baud: Option<u32>,

    /// Serial device path, or "-" for standard input/output.
    #[arg(short = 'D', value_name = "PATH", default_value = "-")]
    pub device: String,

    /// UDP endpoint: `host:port` for a client, or a bare port for a server.
    #[arg(short = 'E', value_name = "ENDPOINT")]
    pub endpoint: Option<String>,

    /// Payload buffer size in bytes, capped at 65,527.
    #[arg(short = 'b', value_name = "BYTES")]
    pub buffer_size: Option<usize>,

    /// Multiplexor wait timeout in milliseconds.
    #[arg(short = 't', value_name = "MILLIS")]
    pub timeout_millis: Option<u64>,

    /// Path suffix under /var/run carrying a dynamically reloadable mask.
    #[arg(short = 'h', value_name = "SUFFIX")]
    pub log_mask_suffix: Option<String>,

    /// Prefer IPv4 for the UDP endpoint.
    #[arg(short = '4')]
    pub prefer_v4: bool,

    /// Prefer IPv6 for the UDP endpoint.
    #[arg(short = '6')]
    pub prefer_v6: bool,
}

impl Cli {
    pub fn into_configuration(self) -> Result<ProxyConfiguration, ConfigError> {
        let role = if self.server {
            ProxyRole::Server
        } else {
            ProxyRole::Client
        };

        let endpoint_text = self.endpoint.unwrap_or_default();
        let endpoint = EndpointSpec::parse(&endpoint_text)?;

        let data_bits = if self.seven_bits {
            DataBits::Seven
        } else {
            DataBits::Eight
        };
        let stop_bits = if self.two_stop_bits {
            StopBits::Two
        } else {
            StopBits::One
        };
        let parity = if self.even_parity {
            Parity::Even
        } else if self.odd_parity {
            Parity::Odd
        } else {
            Parity::None
        };

        let ip_preference = if self.prefer_v6 {
            IpPreference::V6
        } else if self.prefer_v4 {
            IpPreference::V4
        } else {
            IpPreference::None
        };

        let mut line = LineParameters::default();
        if let Some(baud) = self.baud {
            line.baud_rate = baud;
        }
        line.data_bits = data_bits;
        line.parity = parity;
        line.stop_bits = stop_bits;
        line.modem_control = self.modem_control;
        line.rts_cts = self.rts_cts;
        line.xon_xoff = self.xon_xoff;

        ProxyConfiguration {
            role,
            serial_device: self.device,
            line,
            ip_preference,
            endpoint,
            buffer_size: self.buffer_size.unwrap_or(4096),
            select_timeout: Duration::from_millis(self.timeout_millis.unwrap_or(1000)),
            daemonize: self.daemonize,
            log_mask_file: self.log_mask_suffix,
        }
        .validate()
    }
}
