use std::time::Duration;

use bon::bon;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::models::errors::RelayError;

/// Находит в тексте сообщения ссылку на пост.
///
/// The message qualifies when it contains one of `prefixes`; the link runs from
/// the first `https` up to the next whitespace and is percent-decoded.
pub fn extract_post_link(text: &str, prefixes: &[String]) -> Option<String> {
    if !prefixes.iter().any(|p| text.contains(p.as_str())) {
        return None;
    }
    let start = text.find("https")?;
    let raw = text[start..].split_whitespace().next()?;
    let decoded = urlencoding::decode(raw)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    Some(decoded)
}

/// Converts a human-typed link into an IDNA host + percent-encoded absolute URL.
pub fn normalize(iri: &str) -> Result<Url, RelayError> {
    Url::parse(iri.trim()).map_err(|e| RelayError::Resolution(format!("{}: {}", iri, e)))
}

/// Нормализатор ссылок с разворачиванием коротких ссылок через редиректы
pub struct UrlNormalizer {
    client: Client,
    short_link_re: Regex,
}

#[bon]
impl UrlNormalizer {
    #[builder]
    pub fn new(
        short_link_pattern: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            short_link_re: Regex::new(short_link_pattern)?,
        })
    }
}

impl UrlNormalizer {
    pub fn is_short_link(&self, url: &Url) -> bool {
        self.short_link_re.is_match(url.path())
    }

    /// Нормализует ссылку; короткую ссылку предварительно разворачивает.
    pub async fn resolve(&self, iri: &str) -> Result<Url, RelayError> {
        let url = normalize(iri)?;
        if !self.is_short_link(&url) {
            return Ok(url);
        }
        info!(%url, "normalizer: resolving short link");
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| RelayError::Resolution(format!("redirect of {} failed: {}", url, e)))?;
        let location = response.url().as_str().to_string();
        debug!(%location, status = %response.status(), "normalizer: redirect final location");

        let decoded = urlencoding::decode(&location)
            .map(|c| c.into_owned())
            .unwrap_or(location);
        let resolved = normalize(&decoded)?;
        if self.is_short_link(&resolved) {
            return Err(RelayError::Resolution(format!(
                "short link {} did not redirect to a post",
                url
            )));
        }
        Ok(resolved)
    }
}
