//! reqwest-backed [`Remote`] implementation.

use std::time::Duration;

use tracing::debug;

use crate::{FetchError, PageCollection, Remote};

/// Bearer-authenticated HTTP client against one API base URL.
///
/// Relative paths are resolved against the base URL; continuation links are
/// absolute and used verbatim.
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpRemote {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{path}", self.base_url)
        }
    }
}

impl Remote for HttpRemote {
    async fn get(&self, path: &str) -> Result<PageCollection, FetchError> {
        let url = self.url(path);
        debug!("GET {url}");
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<PageCollection>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_the_base_url() {
        let remote = HttpRemote::new("https://api.example.com/", "tok", Duration::from_secs(5))
            .unwrap();
        assert_eq!(remote.url("/v1/teams"), "https://api.example.com/v1/teams");
        assert_eq!(
            remote.url("https://api.example.com/v1/teams?page=2"),
            "https://api.example.com/v1/teams?page=2"
        );
    }
}
