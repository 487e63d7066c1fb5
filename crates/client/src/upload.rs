// Upload gating and the HTTP uploader for images and evidence files.
//
// One upload runs at a time per gate and at most one more may wait for it.
// A completion that lands after its session closed is reported as
// `SessionClosed` so callers never touch a torn-down document.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use coreport_common::types::DocumentIdentity;
use serde::Deserialize;
use tokio::sync::{Semaphore, TryAcquireError};

use crate::session::Liveness;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("another upload is already in flight and one is queued")]
    Busy,
    #[error("upload failed: {0:#}")]
    Failed(anyhow::Error),
    #[error("session closed before the upload completed")]
    SessionClosed,
}

/// Single-slot upload queue shared by the controls of one session.
#[derive(Debug, Clone)]
pub struct UploadGate {
    in_flight: Arc<Semaphore>,
    waiting: Arc<AtomicBool>,
}

/// Clears the waiting slot when the queued attempt starts or is dropped.
struct WaitingSlot<'a>(&'a AtomicBool);

impl Drop for WaitingSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl UploadGate {
    pub fn new() -> Self {
        Self { in_flight: Arc::new(Semaphore::new(1)), waiting: Arc::new(AtomicBool::new(false)) }
    }

    /// Whether an upload is currently running.
    pub fn is_uploading(&self) -> bool {
        self.in_flight.available_permits() == 0
    }

    /// Run `upload` once the slot is free.
    ///
    /// The slot is released when `upload` finishes, whether it succeeded or
    /// failed. Failures are returned, never retried.
    pub async fn run<F, Fut, R>(&self, liveness: &Liveness, upload: F) -> Result<R, UploadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<R>>,
    {
        if !liveness.is_alive() {
            return Err(UploadError::SessionClosed);
        }

        let _permit = match Arc::clone(&self.in_flight).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                if self.waiting.swap(true, Ordering::SeqCst) {
                    return Err(UploadError::Busy);
                }
                let _slot = WaitingSlot(&self.waiting);
                Arc::clone(&self.in_flight)
                    .acquire_owned()
                    .await
                    .map_err(|_| UploadError::SessionClosed)?
            }
            Err(TryAcquireError::Closed) => return Err(UploadError::SessionClosed),
        };

        if !liveness.is_alive() {
            return Err(UploadError::SessionClosed);
        }
        let result = upload().await;
        if !liveness.is_alive() {
            tracing::debug!("discarding upload result for a closed session");
            return Err(UploadError::SessionClosed);
        }
        result.map_err(|error| {
            tracing::warn!(error = %format!("{error:#}"), "upload failed");
            UploadError::Failed(error)
        })
    }
}

impl Default for UploadGate {
    fn default() -> Self {
        Self::new()
    }
}

// ── HTTP uploader ───────────────────────────────────────────────────

/// File record returned by the API after an upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
}

/// Kind of upload endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    File,
}

impl UploadKind {
    fn path_segment(self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::File => "files",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl HttpUploader {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_url: api_url.into(), token: token.into() }
    }

    /// `{api_url}/api/v1/{model}/{object_id}/{kind}/upload/`.
    pub fn endpoint(&self, target: &DocumentIdentity, kind: UploadKind) -> String {
        format!(
            "{}/api/v1/{}/{}/{}/upload/",
            self.api_url.trim_end_matches('/'),
            target.model(),
            target.object_id(),
            kind.path_segment()
        )
    }

    pub async fn upload(
        &self,
        target: &DocumentIdentity,
        kind: UploadKind,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> anyhow::Result<UploadedFile> {
        let url = self.endpoint(target, kind);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(
                reqwest::header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name.replace('"', "")),
            )
            .body(bytes)
            .send()
            .await
            .with_context(|| format!("failed to reach {url}"))?
            .error_for_status()
            .with_context(|| format!("upload of {file_name} rejected"))?;

        response.json::<UploadedFile>().await.context("invalid upload response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    use crate::session::tests::MockFactory;
    use crate::session::{ConnectionManager, CredentialSource, SessionOptions};

    fn live_session(factory: &MockFactory) -> ConnectionManager<crate::session::tests::MockTransport> {
        ConnectionManager::open(
            DocumentIdentity::new("pentestfinding", "f-1"),
            CredentialSource::fixed("jwt"),
            factory,
            SessionOptions::new("ws://localhost:8000/ws"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn single_upload_runs_and_releases_slot() {
        let factory = MockFactory::default();
        let session = live_session(&factory);
        let gate = UploadGate::new();

        let result = gate.run(&session.liveness(), || async { Ok(7) }).await.unwrap();
        assert_eq!(result, 7);
        assert!(!gate.is_uploading());
    }

    #[tokio::test]
    async fn failure_releases_slot_and_is_not_retried() {
        let factory = MockFactory::default();
        let session = live_session(&factory);
        let gate = UploadGate::new();
        let attempts = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let counter = Arc::clone(&attempts);
        let result: Result<(), _> = gate
            .run(&session.liveness(), || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("413 payload too large")
            })
            .await;

        assert!(matches!(result, Err(UploadError::Failed(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(!gate.is_uploading());
    }

    #[tokio::test]
    async fn third_concurrent_attempt_is_busy() {
        let factory = MockFactory::default();
        let session = live_session(&factory);
        let liveness = session.liveness();
        let gate = UploadGate::new();

        let (release_tx, release_rx) = oneshot::channel::<()>();
        let first = {
            let gate = gate.clone();
            let liveness = liveness.clone();
            tokio::spawn(async move {
                gate.run(&liveness, || async move {
                    let _ = release_rx.await;
                    Ok("first")
                })
                .await
            })
        };
        while !gate.is_uploading() {
            tokio::task::yield_now().await;
        }

        let second = {
            let gate = gate.clone();
            let liveness = liveness.clone();
            tokio::spawn(async move { gate.run(&liveness, || async { Ok("second") }).await })
        };
        while !gate.waiting.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        let third = gate.run(&liveness, || async { Ok("third") }).await;
        assert!(matches!(third, Err(UploadError::Busy)));

        release_tx.send(()).unwrap();
        assert_eq!(first.await.unwrap().unwrap(), "first");
        assert_eq!(second.await.unwrap().unwrap(), "second");
        assert!(!gate.waiting.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn completion_after_close_reports_session_closed() {
        let factory = MockFactory::default();
        let mut session = live_session(&factory);
        let liveness = session.liveness();
        let gate = UploadGate::new();

        let (started_tx, started_rx) = oneshot::channel::<()>();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let upload = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.run(&liveness, || async move {
                    let _ = started_tx.send(());
                    let _ = release_rx.await;
                    Ok(())
                })
                .await
            })
        };

        started_rx.await.unwrap();
        session.close();
        release_tx.send(()).unwrap();

        assert!(matches!(upload.await.unwrap(), Err(UploadError::SessionClosed)));
        assert!(!gate.is_uploading());
    }

    #[tokio::test]
    async fn closed_session_never_starts_upload() {
        let factory = MockFactory::default();
        let mut session = live_session(&factory);
        session.close();

        let gate = UploadGate::new();
        let started = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&started);
        let result = gate
            .run(&session.liveness(), || async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(UploadError::SessionClosed)));
        assert!(!started.load(Ordering::SeqCst));
    }

    #[test]
    fn endpoint_composes_target_path() {
        let uploader = HttpUploader::new("https://reports.example.com/", "jwt");
        let target = DocumentIdentity::new("pentestproject", "p-9");
        assert_eq!(
            uploader.endpoint(&target, UploadKind::Image),
            "https://reports.example.com/api/v1/pentestproject/p-9/images/upload/"
        );
    }
}
