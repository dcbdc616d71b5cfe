use std::time::Duration;

use reqwest::Client;

/// Thin wrapper around a shared `reqwest::Client`, grounded on the
/// orchestrator's `UpstreamClient`: one client built once, a fixed timeout
/// applied per call rather than relying on the client's own default.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
}

/// Per spec.md §5: every upstream call gets a 5-second timeout.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

impl UpstreamClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent("geo-aggregator/0.1")
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("reqwest client");
        Self { client }
    }

    /// GET `url`, returning the response body as text regardless of status
    /// code — adapters decide what a non-2xx or malformed body means.
    pub async fn get(&self, url: &str) -> Result<String, reqwest::Error> {
        let resp = self
            .client
            .get(url)
            .timeout(UPSTREAM_TIMEOUT)
            .send()
            .await?;
        resp.text().await
    }
}

impl Default for UpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}
