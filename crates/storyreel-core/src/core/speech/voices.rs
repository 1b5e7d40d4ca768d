//! Voice catalogue lookup

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::SpeechSettings;
use crate::core::{CoreError, CoreResult};

/// One voice offered by the speech service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Voice {
    pub name: String,
    /// Name passed back as the request voice, e.g. `en-US-AriaNeural`
    pub short_name: String,
    #[serde(default)]
    pub friendly_name: String,
    #[serde(default)]
    pub gender: String,
    pub locale: String,
}

/// Restricts voices to exact locales, or else to a locale prefix.
///
/// Both comparisons ignore case. Exact locales win when given.
pub fn filter_voices(voices: Vec<Voice>, prefix: Option<&str>, exact: &[String]) -> Vec<Voice> {
    if !exact.is_empty() {
        return voices
            .into_iter()
            .filter(|voice| exact.iter().any(|l| l.eq_ignore_ascii_case(&voice.locale)))
            .collect();
    }

    match prefix.map(str::to_lowercase) {
        Some(prefix) => voices
            .into_iter()
            .filter(|voice| voice.locale.to_lowercase().starts_with(&prefix))
            .collect(),
        None => voices,
    }
}

fn is_loopback(url: &str) -> bool {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .map(|host| {
            host == "localhost"
                || host
                    .parse::<IpAddr>()
                    .map(|ip| ip.is_loopback())
                    .unwrap_or(false)
        })
        .unwrap_or(false)
}

/// HTTP client for the voice list endpoint
#[derive(Clone, Debug)]
pub struct VoiceCatalog {
    url: String,
    client: reqwest::Client,
}

impl VoiceCatalog {
    pub fn new(settings: &SpeechSettings) -> CoreResult<Self> {
        if settings.voices_url.trim().is_empty() {
            return Err(CoreError::Validation(
                "No voice list URL configured".to_string(),
            ));
        }

        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(settings.timeout_sec.max(1)));
        if is_loopback(&settings.voices_url) {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| CoreError::Synthesis(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: settings.voices_url.clone(),
            client,
        })
    }

    /// Fetches the catalogue and applies [`filter_voices`]
    pub async fn list(&self, prefix: Option<&str>, exact: &[String]) -> CoreResult<Vec<Voice>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CoreError::Synthesis(format!("Failed to fetch voices: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Synthesis(format!(
                "Failed to fetch voices: {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CoreError::Synthesis(format!("Failed to read voice list: {}", e)))?;
        let voices: Vec<Voice> = serde_json::from_str(&body)
            .map_err(|e| CoreError::Synthesis(format!("Failed to parse voice list: {}", e)))?;

        tracing::debug!(total = voices.len(), url = %self.url, "fetched voice list");
        Ok(filter_voices(voices, prefix, exact))
    }
}
