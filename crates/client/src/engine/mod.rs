pub mod ydoc;

pub use ydoc::{ServerInfo, SyncDoc};
