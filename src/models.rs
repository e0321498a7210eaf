//! Listing the models an OpenAI-compatible endpoint offers.

use crate::error::PdfChatError;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Default endpoint when no base URL is configured.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// `GET {base_url}/models` with a bearer token; returns sorted unique ids.
pub async fn list_models(base_url: &str, api_key: &str) -> Result<Vec<String>, PdfChatError> {
    let url = format!("{}/models", base_url.trim_end_matches('/'));
    let fail = |reason: String| PdfChatError::ModelListFailed {
        url: url.clone(),
        reason,
    };
    info!("Listing models from {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| fail(e.to_string()))?;

    let response = client
        .get(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .send()
        .await
        .map_err(|e| fail(e.to_string()))?;

    let status = response.status();
    let body = response.text().await.map_err(|e| fail(e.to_string()))?;
    if !status.is_success() {
        return Err(fail(format!("HTTP {}: {}", status, body.trim())));
    }

    let ids = parse_model_list(&body).map_err(|e| fail(e.to_string()))?;
    debug!("{} model(s) available", ids.len());
    Ok(ids)
}

/// Parse an OpenAI-style `{"data":[{"id":…},…]}` body.
pub fn parse_model_list(body: &str) -> Result<Vec<String>, serde_json::Error> {
    let list: ModelList = serde_json::from_str(body)?;
    let mut ids: Vec<String> = list.data.into_iter().map(|m| m.id).collect();
    ids.sort();
    ids.dedup();
    Ok(ids)
}
