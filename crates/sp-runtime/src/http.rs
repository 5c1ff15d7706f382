use reqwest::blocking::Client;
use sp_core::error::map_error;
use sp_core::PlaceholderError;

const USER_AGENT: &str = concat!("script-placeholders/", env!("CARGO_PKG_VERSION"));

/// Blocking HTTP reader exposed to scripts as `UtilityParser`.
#[derive(Debug, Clone)]
pub struct HttpUtility {
    client: Client,
}

impl HttpUtility {
    pub fn new() -> Result<Self, PlaceholderError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|error| map_error("HTTP_CLIENT", error))?;
        Ok(Self { client })
    }

    /// Fetches `url` and returns the body only when it is valid JSON.
    pub fn read_json(&self, url: &str) -> Result<String, PlaceholderError> {
        let body = self
            .client
            .get(url)
            .send()
            .and_then(|response| response.text())
            .map_err(|error| map_error("HTTP_REQUEST", error))?;
        Ok(json_or_empty(body))
    }
}

pub fn json_or_empty(body: String) -> String {
    if serde_json::from_str::<serde_json::Value>(&body).is_ok() {
        body
    } else {
        String::new()
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;

    #[test]
    fn only_valid_json_bodies_pass() {
        assert_eq!(json_or_empty("{\"a\":1}".to_string()), "{\"a\":1}");
        assert_eq!(json_or_empty("[1, 2]".to_string()), "[1, 2]");
        assert_eq!(json_or_empty("<html></html>".to_string()), "");
        assert_eq!(json_or_empty(String::new()), "");
    }

    #[test]
    fn unreachable_url_is_an_error() {
        let http = HttpUtility::new().expect("client should build");
        let error = http
            .read_json("not a url")
            .expect_err("invalid url should fail");
        assert_eq!(error.code, "HTTP_REQUEST");
    }
}
