//! Bidirectional forwarder between a byte-stuffed framer link on a serial
//! descriptor and UDP datagrams on the other side, driven by a readiness
//! multiplexor with signal-aware mask reload and shutdown.

pub mod cli;
pub mod config;
pub mod proxy;
pub mod serial;
pub mod signals;

pub use config::{ConfigError, ProxyConfiguration, ProxyRole};
pub use proxy::ProxyError;

use std::path::PathBuf;

/// The per-process log-mask file path, `/var/run/<suffix>-<pid>.msk`. The
/// suffix defaults to the running binary's own program name and is
/// overridable by `-h`/`log_mask_suffix`; this file is consulted
/// unconditionally at startup and on every hangup, per spec §6 "Persisted
/// state" — it is not gated behind the override being present.
pub fn mask_file_path(suffix_override: Option<&str>) -> PathBuf {
    let suffix = suffix_override
        .map(str::to_string)
        .unwrap_or_else(program_name);
    PathBuf::from(format!("/var/run/{suffix}-{}.msk", std::process::id()))
}

fn program_name() -> String {
    std::env::args()
        .next()
        .and_then(|arg0| {
            std::path::Path::new(&arg0)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "conestoga".to_string())
}

/// Exit codes matching the documented command-line contract.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const CONFIGURATION_HELP: i32 = 1;
    pub const ARGUMENT_PARSE_ERROR: i32 = 2;
    pub const SIGNAL_INSTALLATION_FAILURE: i32 = 3;
    pub const DEVICE_FAILURE: i32 = 4;
    pub const ENDPOINT_INVALID: i32 = 5;
    pub const SOCKET_FAILURE: i32 = 6;
    pub const MULTIPLEXOR_REGISTRATION_FAILURE: i32 = 7;
    pub const MEMORY_ALLOCATION_FAILURE: i32 = 8;
    pub const FRAMER_INITIALIZATION_FAILURE: i32 = 9;
}

/// Maps a [`ProxyError`] to the exit code documented for the command-line
/// surface.
pub fn exit_code_for(error: &ProxyError) -> i32 {
    match error {
        ProxyError::Signal(_) => exit_code::SIGNAL_INSTALLATION_FAILURE,
        ProxyError::Serial(_) => exit_code::DEVICE_FAILURE,
        ProxyError::Endpoint => exit_code::ENDPOINT_INVALID,
        ProxyError::Socket(_) => exit_code::SOCKET_FAILURE,
        ProxyError::Registration(_) => exit_code::MULTIPLEXOR_REGISTRATION_FAILURE,
        ProxyError::SerialRead(_)
        | ProxyError::SerialWrite(_)
        | ProxyError::Send(_)
        | ProxyError::Recv(_) => exit_code::SUCCESS,
    }
}
