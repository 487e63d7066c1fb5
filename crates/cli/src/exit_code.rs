// Consistent exit codes for the coreport CLI.
//
//   0  = success
//   1  = general error
//   2  = usage/argument error
//   10 = sync or API service not reachable
//   11 = authentication error
//   12 = invalid input (vector, document, config)
//   13 = network error

use std::process;

use coreport_client::config::ConfigError;
use coreport_common::cvss::CvssParseError;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    Unreachable = 10,
    Auth = 11,
    InvalidInput = 12,
    Network = 13,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if cause.downcast_ref::<CvssParseError>().is_some()
                || cause.downcast_ref::<ConfigError>().is_some()
                || cause.downcast_ref::<serde_json::Error>().is_some()
            {
                return Self::InvalidInput;
            }
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
                return match io_err.kind() {
                    std::io::ErrorKind::ConnectionRefused => Self::Unreachable,
                    std::io::ErrorKind::TimedOut => Self::Network,
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::InvalidData => {
                        Self::InvalidInput
                    }
                    _ => Self::Error,
                };
            }
        }

        let msg = format!("{err:#}").to_ascii_lowercase();
        if msg.contains("connection refused") || msg.contains("unreachable") {
            return Self::Unreachable;
        }
        if msg.contains("unauthorized") || msg.contains("forbidden") || msg.contains("token") {
            return Self::Auth;
        }
        if msg.contains("timed out") {
            return Self::Network;
        }

        Self::Error
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}
