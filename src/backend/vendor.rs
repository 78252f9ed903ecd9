//! Vendor RUM agent backend.
//!
//! Activation fetches the vendor's agent script from the configured URL and,
//! once the load finishes, attaches the configured session attributes. The
//! load runs asynchronously and never blocks activation; a load failure is a
//! warning that leaves the host application unaffected.

use std::collections::HashMap;

use serde::Deserialize;
use tokio::sync::watch;
use url::Url;

use super::BackendError;

/// Configuration for the vendor RUM agent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VendorConfig {
    /// URL of the vendor agent script. Required.
    pub script_url: Option<String>,

    /// Key-value attributes attached to the agent session once loaded.
    pub session_attributes: HashMap<String, String>,
}

/// Handle to the active vendor agent.
#[derive(Debug)]
pub struct VendorBackend {
    script_url: Url,
    loaded: watch::Receiver<bool>,
}

impl VendorBackend {
    /// URL the agent script was requested from.
    pub fn script_url(&self) -> &Url {
        &self.script_url
    }

    /// Waits until the agent script load finished, successfully or not.
    pub async fn loaded(&self) {
        let mut loaded = self.loaded.clone();
        let _ = loaded.wait_for(|done| *done).await;
    }
}

pub(crate) async fn activate(config: VendorConfig) -> Result<VendorBackend, BackendError> {
    let raw = config
        .script_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or(BackendError::MissingScriptUrl)?;
    let script_url = Url::parse(raw)?;

    // The HTTP client for the script fetch is constructed only when this
    // branch is selected.
    let client = reqwest::Client::new();
    let (done_tx, done_rx) = watch::channel(false);
    tokio::spawn(load_agent(
        client,
        script_url.clone(),
        config.session_attributes,
        done_tx,
    ));

    Ok(VendorBackend {
        script_url,
        loaded: done_rx,
    })
}

async fn load_agent(
    client: reqwest::Client,
    url: Url,
    attributes: HashMap<String, String>,
    done: watch::Sender<bool>,
) {
    match fetch_script(&client, url.clone()).await {
        Ok(bytes) => {
            tracing::info!(url = %url, bytes, "vendor agent script loaded");
            for (key, value) in &attributes {
                tracing::debug!(key = %key, value = %value, "session attribute attached");
            }
        }
        Err(error) => tracing::warn!(url = %url, %error, "vendor agent script load failed"),
    }
    let _ = done.send(true);
}

async fn fetch_script(client: &reqwest::Client, url: Url) -> reqwest::Result<usize> {
    let response = client.get(url).send().await?.error_for_status()?;
    let body = response.bytes().await?;
    Ok(body.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_script_url() {
        let error = activate(VendorConfig::default()).await.unwrap_err();
        assert!(matches!(error, BackendError::MissingScriptUrl));
    }

    #[tokio::test]
    async fn test_blank_script_url() {
        let config = VendorConfig {
            script_url: Some("   ".to_string()),
            ..VendorConfig::default()
        };
        let error = activate(config).await.unwrap_err();
        assert!(matches!(error, BackendError::MissingScriptUrl));
    }

    #[tokio::test]
    async fn test_invalid_script_url() {
        let config = VendorConfig {
            script_url: Some("not a url".to_string()),
            ..VendorConfig::default()
        };
        let error = activate(config).await.unwrap_err();
        assert!(matches!(error, BackendError::InvalidScriptUrl(_)));
    }

    #[tokio::test]
    async fn test_failed_load_still_signals() {
        // Port 9 (discard) is not listening; the load fails with a warning
        // and the loaded signal still fires.
        let config = VendorConfig {
            script_url: Some("http://127.0.0.1:9/agent.js".to_string()),
            ..VendorConfig::default()
        };
        let backend = activate(config).await.unwrap();
        backend.loaded().await;
        assert_eq!(backend.script_url().path(), "/agent.js");
    }
}
