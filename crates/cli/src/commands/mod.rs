// CLI subcommand dispatch.

use std::future::Future;

use anyhow::Context;
use clap::Subcommand;

pub mod acronyms;
pub mod cvss;
pub mod notify;
pub mod textmap;
pub mod watch;

#[derive(Subcommand)]
pub enum Command {
    /// Score or normalize CVSS v4.0 vectors
    #[command(subcommand)]
    Cvss(cvss::CvssCommand),
    /// Map plain-text ranges onto a rich-text document
    Textmap(textmap::TextmapArgs),
    /// Look up acronym expansions
    Acronyms(acronyms::AcronymsArgs),
    /// Open a live session and follow its status
    Watch(watch::WatchArgs),
    /// Broadcast or listen for project tree refetch notifications
    Notify(notify::NotifyArgs),
}

pub fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Cvss(cmd) => cvss::run(cmd),
        Command::Textmap(args) => textmap::run(args),
        Command::Acronyms(args) => acronyms::run(args),
        Command::Watch(args) => watch::run(args),
        Command::Notify(args) => notify::run(args),
    }
}

/// Drive `future` to completion on a fresh current-thread runtime.
pub(crate) fn block_on<F, T>(future: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?
        .block_on(future)
}
