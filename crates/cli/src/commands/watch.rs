// `coreport watch` — open a live session and print status transitions.

use std::time::Duration;

use anyhow::Context;
use clap::Args;
use coreport_client::{
    ClientConfig, ConnectionManager, ConnectionStatus, CredentialSource, SessionOptions,
    WsTransportFactory,
};
use coreport_common::types::DocumentIdentity;
use serde::Serialize;

use crate::commands::block_on;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Model name, e.g. `pentestfinding`.
    model: String,

    /// Object ID within the model.
    object_id: String,

    /// Stop after this many seconds (default: until interrupted).
    #[arg(long)]
    seconds: Option<u64>,

    /// Force JSON output (one object per transition).
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusLine {
    document: String,
    status: ConnectionStatus,
    can_edit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    instance_id: Option<String>,
}

pub fn run(args: WatchArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let config = ClientConfig::load();
    let result = config
        .validate()
        .context("invalid client configuration")
        .and_then(|()| block_on(watch(args, config, format)));
    if let Err(error) = &result {
        output::print_anyhow_error(format, error);
    }
    result
}

async fn watch(args: WatchArgs, config: ClientConfig, format: OutputFormat) -> anyhow::Result<()> {
    let token = config.token.clone().unwrap_or_default();
    if token.is_empty() {
        output::print_warning(format, "NO_TOKEN", "no token configured; the service may refuse the session");
    }

    let identity = DocumentIdentity::new(args.model, args.object_id);
    let mut session = ConnectionManager::open(
        identity.clone(),
        CredentialSource::fixed(token),
        &WsTransportFactory,
        SessionOptions::from(&config),
    )?;

    let deadline = args.seconds.map(|seconds| tokio::time::Instant::now() + Duration::from_secs(seconds));
    let mut last = None;
    loop {
        let status = session.status();
        if last != Some(status) {
            last = Some(status);
            let line = StatusLine {
                document: identity.to_string(),
                status,
                can_edit: status.can_edit(),
                instance_id: session.instance_id().map(str::to_string),
            };
            output::print_output(format, &line, format_human)?;
        }

        let step = async {
            tokio::select! {
                alive = session.pump() => alive,
                _ = tokio::signal::ctrl_c() => false,
            }
        };
        let alive = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, step).await.unwrap_or(false),
            None => step.await,
        };
        if !alive {
            break;
        }
    }

    tracing::debug!(document = %identity, "closing watched session");
    session.close();
    Ok(())
}

fn format_human(line: &StatusLine) -> String {
    let editing = if line.can_edit { "editable" } else { "read-only" };
    match &line.instance_id {
        Some(instance_id) => {
            format!("{}: {} ({editing}, instance {instance_id})", line.document, line.status)
        }
        None => format!("{}: {} ({editing})", line.document, line.status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_format_shows_status_and_editability() {
        let line = StatusLine {
            document: "pentestfinding/f-1".into(),
            status: ConnectionStatus::Syncing,
            can_edit: false,
            instance_id: None,
        };
        assert_eq!(format_human(&line), "pentestfinding/f-1: syncing (read-only)");
    }

    #[test]
    fn human_format_includes_instance_id() {
        let line = StatusLine {
            document: "pentestfinding/f-1".into(),
            status: ConnectionStatus::Idle,
            can_edit: true,
            instance_id: Some("gen-3".into()),
        };
        assert_eq!(format_human(&line), "pentestfinding/f-1: idle (editable, instance gen-3)");
    }

    #[test]
    fn json_line_uses_lowercase_status() {
        let line = StatusLine {
            document: "pentestfinding/f-1".into(),
            status: ConnectionStatus::Dirty,
            can_edit: true,
            instance_id: None,
        };
        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(value["status"], "dirty");
        assert_eq!(value["canEdit"], true);
        assert!(value.get("instanceId").is_none());
    }
}
