//! Blocking HTTPS transport over `ureq`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::time::Duration;
use tracing::debug;

use super::github::GITHUB_API_BASE;
use super::toggl::TOGGL_API_BASE;
use super::{IntegrationError, Transport};

const TIMEOUT_SECS: u64 = 15;
const USER_AGENT: &str = concat!("phitodo/", env!("CARGO_PKG_VERSION"));

/// One service: base URL plus the headers sent with every request
pub struct HttpTransport {
    agent: ureq::Agent,
    base_url: String,
    headers: Vec<(&'static str, String)>,
}

impl HttpTransport {
    pub fn new(base_url: &str, headers: Vec<(&'static str, String)>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
        }
    }

    pub fn github(token: &str) -> Self {
        Self::new(GITHUB_API_BASE, github_headers(token))
    }

    pub fn toggl(token: &str) -> Self {
        Self::new(TOGGL_API_BASE, toggl_headers(token))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn github_headers(token: &str) -> Vec<(&'static str, String)> {
    vec![
        ("Authorization", format!("Bearer {}", token.trim())),
        ("Accept", "application/vnd.github+json".to_string()),
        ("X-GitHub-Api-Version", "2022-11-28".to_string()),
    ]
}

/// Toggl takes the API token as the basic-auth user and `api_token` as the password
fn toggl_headers(token: &str) -> Vec<(&'static str, String)> {
    let credentials = STANDARD.encode(format!("{}:api_token", token.trim()));
    vec![
        ("Authorization", format!("Basic {}", credentials)),
        ("Accept", "application/json".to_string()),
    ]
}

impl Transport for HttpTransport {
    fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<serde_json::Value, IntegrationError> {
        let url = self.url(path);
        let mut request = self.agent.get(&url);
        for (name, value) in &self.headers {
            request = request.set(name, value);
        }
        for (key, value) in query {
            request = request.query(key, value);
        }

        debug!(%url, "GET");
        match request.call() {
            Ok(response) => {
                let body = response
                    .into_string()
                    .map_err(|e| IntegrationError::Transport(e.to_string()))?;
                Ok(serde_json::from_str(&body)?)
            }
            Err(ureq::Error::Status(code, _)) => Err(IntegrationError::Status(code)),
            Err(ureq::Error::Transport(e)) => Err(IntegrationError::Transport(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header<'a>(headers: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        headers.iter().find(|(n, _)| *n == name).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_github_uses_bearer_token() {
        let headers = github_headers(" ghp_abc \n");
        assert_eq!(header(&headers, "Authorization"), Some("Bearer ghp_abc"));
        assert_eq!(header(&headers, "Accept"), Some("application/vnd.github+json"));
    }

    #[test]
    fn test_toggl_uses_basic_auth_with_api_token_password() {
        let headers = toggl_headers("abc123");
        assert_eq!(
            header(&headers, "Authorization"),
            Some("Basic YWJjMTIzOmFwaV90b2tlbg==")
        );
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let transport = HttpTransport::new("https://api.track.toggl.com/api/v9/", Vec::new());
        assert_eq!(
            transport.url("/me/time_entries"),
            "https://api.track.toggl.com/api/v9/me/time_entries"
        );
        assert_eq!(HttpTransport::github("t").url("issues"), "https://api.github.com/issues");
    }
}
