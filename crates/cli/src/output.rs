// Rendering of command results and diagnostics.
//
// Results go to stdout, diagnostics to stderr. Interactive terminals get
// plain text; pipes get one JSON object per line so scripts can parse the
// stream. `--json` forces the latter.

use std::io::{self, IsTerminal, Write};

use coreport_client::config::{config_path, ConfigError};
use coreport_common::cvss::CvssParseError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn detect(json_flag: bool) -> Self {
        Self::choose(json_flag, io::stdout().is_terminal())
    }

    fn choose(json_flag: bool, stdout_is_tty: bool) -> Self {
        if json_flag || !stdout_is_tty {
            Self::Json
        } else {
            Self::Human
        }
    }
}

pub fn print_output<T, F>(format: OutputFormat, value: &T, human: F) -> io::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    render(&mut io::stdout().lock(), format, value, human)
}

fn render<W, T, F>(out: &mut W, format: OutputFormat, value: &T, human: F) -> io::Result<()>
where
    W: Write,
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => writeln!(out, "{}", human(value)),
        OutputFormat::Json => {
            let line = serde_json::to_string(value).map_err(io::Error::other)?;
            writeln!(out, "{line}")
        }
    }
}

// ── Diagnostics ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Level {
    Error,
    Warning,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Error => "\x1b[31m",
            Self::Warning => "\x1b[33m",
        }
    }
}

#[derive(Debug, Serialize)]
struct Diagnostic<'a> {
    level: Level,
    code: &'a str,
    message: &'a str,
}

impl Diagnostic<'_> {
    fn human(&self, color: bool) -> String {
        let label = self.level.label();
        if color {
            format!("{}{label}:\x1b[0m {}", self.level.color(), self.message)
        } else {
            format!("{label}: {}", self.message)
        }
    }
}

fn print_diagnostic(format: OutputFormat, diagnostic: &Diagnostic<'_>) {
    let stderr = io::stderr();
    let color = stderr.is_terminal();
    // Nowhere left to report a failed stderr write.
    let _ = render(&mut stderr.lock(), format, diagnostic, |d| d.human(color));
}

pub fn print_warning(format: OutputFormat, code: &str, message: &str) {
    print_diagnostic(format, &Diagnostic { level: Level::Warning, code, message });
}

/// Report a failed command with a stable code and a hint on what to fix.
pub fn print_anyhow_error(format: OutputFormat, error: &anyhow::Error) {
    let (code, message) = actionable_error(error);
    print_diagnostic(format, &Diagnostic { level: Level::Error, code, message: &message });
}

fn actionable_error(error: &anyhow::Error) -> (&'static str, String) {
    let message = format!("{error:#}");
    let lower = message.to_ascii_lowercase();

    if error.chain().any(|cause| cause.downcast_ref::<CvssParseError>().is_some()) {
        return ("INVALID_VECTOR", format!("Invalid CVSS v4.0 vector: {}", error.root_cause()));
    }

    if error.chain().any(|cause| cause.downcast_ref::<ConfigError>().is_some())
        || lower.contains("invalid client configuration")
    {
        let path = config_path()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "~/.coreport/config.toml".to_string());
        return ("CONFIG_ERROR", format!("Configuration problem: {message}. Check {path}"));
    }

    if lower.contains("connection refused")
        || lower.contains("dns error")
        || lower.contains("failed to connect")
    {
        let url = extract_url(&message).unwrap_or_else(|| "the service".to_string());
        return (
            "SYNC_UNREACHABLE",
            format!("Could not reach {url}. Check sync_url/api_url or set COREPORT_SYNC_URL"),
        );
    }

    if lower.contains("timed out") {
        return (
            "NETWORK_TIMEOUT",
            "The service did not answer in time. Check your network and retry".to_string(),
        );
    }

    if lower.contains("unauthorized")
        || lower.contains("forbidden")
        || lower.contains("instance mismatch")
        || lower.contains("token")
    {
        return (
            "AUTH_FAILURE",
            "Authentication failed. Set a valid token in the config or COREPORT_TOKEN".to_string(),
        );
    }

    ("ERROR", message)
}

fn extract_url(message: &str) -> Option<String> {
    let start = message.find("://")?;
    let scheme_start = message[..start]
        .rfind(|c: char| !c.is_ascii_alphanumeric())
        .map_or(0, |idx| idx + 1);
    let tail = &message[scheme_start..];
    let end = tail.find(|c: char| c.is_whitespace() || c == '`' || c == ')').unwrap_or(tail.len());
    Some(tail[..end].to_string())
}
