// `coreport notify` — broadcast or follow project tree refetch hints.

use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, ValueEnum};
use coreport_client::transport::WsTransport;
use coreport_client::{ClientConfig, CredentialSource, TreeNotifier, WsTransportFactory};
use coreport_common::protocol::tree::{TreeChange, TreeSyncMessage};
use serde::Serialize;

use crate::commands::block_on;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct NotifyArgs {
    /// Project whose tree changed (or to listen on).
    project_id: String,

    /// Kind of change to announce. Requires --node.
    #[arg(long, value_enum, requires = "node")]
    change: Option<ChangeKind>,

    /// Node affected by the change.
    #[arg(long, requires = "change")]
    node: Option<String>,

    /// Print refetch requests from other clients instead of sending one.
    #[arg(long, conflicts_with_all = ["change", "node"])]
    listen: bool,

    /// How long to keep the connection open after sending, so the
    /// notification can flush.
    #[arg(long, default_value_t = 1000)]
    linger_ms: u64,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ChangeKind {
    Created,
    Renamed,
    Moved,
    Deleted,
}

impl From<ChangeKind> for TreeChange {
    fn from(kind: ChangeKind) -> Self {
        match kind {
            ChangeKind::Created => Self::Created,
            ChangeKind::Renamed => Self::Renamed,
            ChangeKind::Moved => Self::Moved,
            ChangeKind::Deleted => Self::Deleted,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Sent {
    project_id: String,
    origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    change: Option<TreeChange>,
}

pub fn run(args: NotifyArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let config = ClientConfig::load();
    let result = config
        .validate()
        .context("invalid client configuration")
        .and_then(|()| block_on(notify(args, config, format)));
    if let Err(error) = &result {
        output::print_anyhow_error(format, error);
    }
    result
}

async fn notify(args: NotifyArgs, config: ClientConfig, format: OutputFormat) -> anyhow::Result<()> {
    if args.project_id.trim().is_empty() {
        bail!("project id must not be empty");
    }
    let credentials = CredentialSource::fixed(config.token.clone().unwrap_or_default());
    let mut notifier: TreeNotifier<WsTransport> = TreeNotifier::open(
        args.project_id.clone(),
        credentials,
        &WsTransportFactory,
        config.sync_url.clone(),
        config.reconnect.policy(),
    )?;

    if args.listen {
        listen(&mut notifier, format).await?;
    } else {
        let change = args.change.map(TreeChange::from);
        match (change, args.node) {
            (Some(change), Some(node)) => notifier.notify_change(change, node),
            _ => notifier.notify(),
        }
        tokio::time::sleep(Duration::from_millis(args.linger_ms)).await;
        let sent = Sent {
            project_id: notifier.project_id().to_string(),
            origin: notifier.origin().to_string(),
            change,
        };
        output::print_output(format, &sent, |sent| format!("notified project {}", sent.project_id))?;
    }

    notifier.close();
    Ok(())
}

async fn listen(notifier: &mut TreeNotifier<WsTransport>, format: OutputFormat) -> anyhow::Result<()> {
    loop {
        let message = tokio::select! {
            message = notifier.next_refetch() => message,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(message) = message else {
            return Ok(());
        };
        output::print_output(format, &message, format_refetch)?;
    }
}

fn format_refetch(message: &TreeSyncMessage) -> String {
    match message {
        TreeSyncMessage::Refetch { origin, sent_at, change: Some(change), node_id } => {
            let node = node_id.as_deref().unwrap_or("?");
            format!("{} refetch: {change:?} {node} (from {origin})", sent_at.format("%H:%M:%S"))
        }
        TreeSyncMessage::Refetch { origin, sent_at, .. } => {
            format!("{} refetch (from {origin})", sent_at.format("%H:%M:%S"))
        }
    }
}
