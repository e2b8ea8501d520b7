//! The proxy's validated configuration record, and the line/endpoint
//! vocabularies it is built from.

use std::net::SocketAddr;
use std::time::Duration;

/// Largest payload a UDP datagram can carry: 65,535 minus the 8-byte UDP
/// header.
pub const MAX_BUFFER_SIZE: usize = 65_527;

/// Smallest buffer size the proxy will operate with. A framer below this
/// cannot even carry the shortest wire header, so a tighter bound than "at
/// least one byte" is imposed here rather than discovered at run time.
pub const MIN_BUFFER_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyRole {
    /// The far endpoint is fixed at configuration time.
    Client,
    /// The far endpoint is whoever sent the most recent datagram.
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Seven,
    Eight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpPreference {
    None,
    V4,
    V6,
}

/// The serial line parameters the device is configured with after opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineParameters {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub modem_control: bool,
    pub rts_cts: bool,
    pub xon_xoff: bool,
}

impl Default for LineParameters {
    fn default() -> Self {
        Self {
            baud_rate: 57_600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            modem_control: false,
            rts_cts: false,
            xon_xoff: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("bufferSize {0} is below the minimum of {MIN_BUFFER_SIZE}")]
    BufferTooSmall(usize),
    #[error("bufferSize {0} exceeds the maximum of {MAX_BUFFER_SIZE}")]
    BufferTooLarge(usize),
    #[error("client role requires an endpoint with both host and port")]
    ClientEndpointIncomplete,
    #[error("server role requires a port but no host")]
    ServerEndpointHasHost,
    #[error("invalid endpoint {0:?}: {1}")]
    InvalidEndpoint(String, std::net::AddrParseError),
    #[error("invalid endpoint {0:?}: missing port")]
    EndpointMissingPort(String),
}

/// One endpoint as given on the command line: either a full `host:port` (the
/// client's peer) or a bare `port` (the server's bind port).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointSpec {
    HostAndPort(SocketAddr),
    PortOnly(u16),
}

impl EndpointSpec {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        if let Ok(port) = text.parse::<u16>() {
            return Ok(EndpointSpec::PortOnly(port));
        }
        let addr = text
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEndpoint(text.to_string(), e))?;
        Ok(EndpointSpec::HostAndPort(addr))
    }
}

#[derive(Debug, Clone)]
pub struct ProxyConfiguration {
    pub role: ProxyRole,
    pub serial_device: String,
    pub line: LineParameters,
    pub ip_preference: IpPreference,
    pub endpoint: EndpointSpec,
    pub buffer_size: usize,
    pub select_timeout: Duration,
    pub daemonize: bool,
    pub log_mask_file: Option<String>,
}

impl ProxyConfiguration {
    /// Validates a fully assembled configuration. Enforces the buffer-size
    /// bounds and that the endpoint shape matches the role — no fall-through
    /// between the two is permitted: a client without a host, or a server
    /// given one, is a configuration error rather than a guess.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(ConfigError::BufferTooSmall(self.buffer_size));
        }
        if self.buffer_size > MAX_BUFFER_SIZE {
            return Err(ConfigError::BufferTooLarge(self.buffer_size));
        }
        match (self.role, &self.endpoint) {
            (ProxyRole::Client, EndpointSpec::HostAndPort(_)) => {}
            (ProxyRole::Client, EndpointSpec::PortOnly(_)) => {
                return Err(ConfigError::ClientEndpointIncomplete)
            }
            (ProxyRole::Server, EndpointSpec::PortOnly(_)) => {}
            (ProxyRole::Server, EndpointSpec::HostAndPort(_)) => {
                return Err(ConfigError::ServerEndpointHasHost)
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(role: ProxyRole, endpoint: EndpointSpec) -> ProxyConfiguration {
        ProxyConfiguration {
            role,
            serial_device: "-".to_string(),
            line: LineParameters::default(),
            ip_preference: IpPreference::None,
            endpoint,
            buffer_size: 256,
            select_timeout: Duration::from_millis(100),
            daemonize: false,
            log_mask_file: None,
        }
    }

    #[test]
    fn client_without_host_is_rejected_not_defaulted() {
        let cfg = base(ProxyRole::Client, EndpointSpec::PortOnly(5005));
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ClientEndpointIncomplete)
        ));
    }

    #[test]
    fn server_given_a_host_is_rejected_not_defaulted() {
        let addr: SocketAddr = "127.0.0.1:5005".parse().unwrap();
        let cfg = base(ProxyRole::Server, EndpointSpec::HostAndPort(addr));
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ServerEndpointHasHost)
        ));
    }

    #[test]
    fn buffer_size_below_minimum_is_rejected() {
        let mut cfg = base(ProxyRole::Server, EndpointSpec::PortOnly(5005));
        cfg.buffer_size = 4;
        assert!(matches!(cfg.validate(), Err(ConfigError::BufferTooSmall(4))));
    }

    #[test]
    fn buffer_size_above_maximum_is_rejected() {
        let mut cfg = base(ProxyRole::Server, EndpointSpec::PortOnly(5005));
        cfg.buffer_size = MAX_BUFFER_SIZE + 1;
        assert!(matches!(cfg.validate(), Err(ConfigError::BufferTooLarge(_))));
    }

    #[test]
    fn well_formed_client_configuration_validates() {
        let addr: SocketAddr = "127.0.0.1:5005".parse().unwrap();
        let cfg = base(ProxyRole::Client, EndpointSpec::HostAndPort(addr));
        assert!(cfg.validate().is_ok());
    }
}
