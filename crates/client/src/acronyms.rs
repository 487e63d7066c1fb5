// Remote acronym table.

use std::time::Duration;

use anyhow::{Context, Result};
use coreport_common::acronym::{AcronymMap, DynamicAcronym};

use crate::config::ClientConfig;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetch the administrator-managed acronym records.
pub async fn fetch_dynamic(
    client: &reqwest::Client,
    url: &str,
    token: Option<&str>,
) -> Result<Vec<DynamicAcronym>> {
    let mut request = client.get(url).timeout(FETCH_TIMEOUT);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    request
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?
        .error_for_status()
        .context("acronym table request rejected")?
        .json::<Vec<DynamicAcronym>>()
        .await
        .context("invalid acronym table")
}

/// Builtin table merged with the remote records, or builtins alone when no
/// remote table is configured or the fetch fails.
pub async fn load_acronym_map(config: &ClientConfig) -> AcronymMap {
    let Some(url) = config.acronyms_url.as_deref() else {
        return AcronymMap::builtin();
    };
    let client = reqwest::Client::new();
    match fetch_dynamic(&client, url, config.token.as_deref()).await {
        Ok(records) => {
            tracing::debug!(records = records.len(), "merged remote acronym table");
            AcronymMap::merged(&records)
        }
        Err(error) => {
            tracing::warn!(error = %format!("{error:#}"), "acronym table unavailable; using builtin table");
            AcronymMap::builtin()
        }
    }
}
