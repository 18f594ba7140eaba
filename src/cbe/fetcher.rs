//! WebDriver-driven fetcher for the CBE auction listing
//!
//! The listing page renders its results tables dynamically, so a plain HTTP
//! GET returns a shell document. The fetcher drives a headless browser
//! through a WebDriver endpoint, waits for the results table to materialize,
//! and hands the full page source to the parser.

use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::common::errors::{PipelineError, Result};
use crate::common::traits::YieldSource;
use crate::common::types::RawPayload;
use crate::config::types::SourceConfig;

/// Content markers indicating the source refused the request rather than
/// failing to respond
const BLOCK_MARKERS: [&str; 4] = [
    "access denied",
    "request unsuccessful",
    "captcha",
    "too many requests",
];

/// Fetches the auction listing through an isolated headless browser session
pub struct CbeFetcher {
    config: SourceConfig,
}

impl CbeFetcher {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    async fn open_session(&self) -> Result<Client> {
        let mut caps = serde_json::map::Map::new();
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({
                "args": [
                    "--headless=new",
                    "--disable-dev-shm-usage",
                    format!("--user-agent={}", self.config.user_agent),
                ]
            }),
        );

        let mut builder = ClientBuilder::rustls()
            .map_err(|e| PipelineError::SourceUnavailable(format!("tls setup: {e}")))?;
        let client = builder
            .capabilities(caps)
            .connect(&self.config.webdriver_url)
            .await?;
        Ok(client)
    }

    /// Navigate and extract the page source. A partial extraction is a
    /// failure, never a partial success.
    async fn capture(&self, client: &mut Client) -> Result<RawPayload> {
        let nav_timeout = Duration::from_secs(self.config.navigation_timeout_secs);
        match tokio::time::timeout(nav_timeout, client.goto(&self.config.listing_url)).await {
            Err(_) => {
                return Err(PipelineError::SourceRenderTimeout(
                    self.config.navigation_timeout_secs,
                ))
            }
            Ok(nav) => nav?,
        }

        // Present is not enough: the table is injected after load, so wait
        // until the element is actually locatable.
        let render_timeout = Duration::from_secs(self.config.render_timeout_secs);
        let waited = client
            .wait()
            .at_most(render_timeout)
            .every(Duration::from_millis(250))
            .for_element(Locator::Css("table"))
            .await;
        match waited {
            Err(CmdError::WaitTimeout) => {
                return Err(PipelineError::SourceRenderTimeout(
                    self.config.render_timeout_secs,
                ))
            }
            Err(other) => return Err(other.into()),
            Ok(_) => {}
        }

        let html = client.source().await?;
        if html.trim().is_empty() {
            return Err(PipelineError::SourceUnavailable(
                "empty page source".to_string(),
            ));
        }
        if let Some(marker) = block_marker(&html) {
            return Err(PipelineError::SourceBlocked(format!(
                "page contains '{marker}'"
            )));
        }

        debug!(bytes = html.len(), "captured listing page source");
        Ok(RawPayload::new(html))
    }
}

#[async_trait]
impl YieldSource for CbeFetcher {
    #[instrument(skip(self), fields(url = %self.config.listing_url))]
    async fn fetch_latest_listing(&self) -> Result<RawPayload> {
        let mut client = self.open_session().await?;
        let outcome = self.capture(&mut client).await;

        // The session is scoped to this attempt and must be released on
        // every exit path.
        if let Err(err) = client.close().await {
            warn!("failed to close webdriver session: {err}");
        }

        outcome
    }
}

fn block_marker(html: &str) -> Option<&'static str> {
    let lowered = html.to_lowercase();
    BLOCK_MARKERS
        .iter()
        .copied()
        .find(|marker| lowered.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_markers_are_case_insensitive() {
        assert_eq!(
            block_marker("<h1>Access Denied</h1>"),
            Some("access denied")
        );
        assert_eq!(block_marker("please solve this CAPTCHA"), Some("captcha"));
        assert_eq!(block_marker("<table><tr><td>91</td></tr></table>"), None);
    }
}
