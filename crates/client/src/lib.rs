pub mod acronyms;
pub mod config;
pub mod engine;
pub mod notifier;
pub mod session;
pub mod transport;
pub mod upload;

pub use config::ClientConfig;
pub use engine::SyncDoc;
pub use notifier::TreeNotifier;
pub use session::{ConnectionManager, ConnectionStatus, CredentialSource, SessionOptions};
pub use transport::{WsTransport, WsTransportFactory};
pub use upload::{HttpUploader, UploadError, UploadGate};
