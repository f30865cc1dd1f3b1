use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backon::{ConstantBuilder, Retryable};
use bon::{Builder, bon};
use reqwest::Client;
use tracing::{info, warn};
use url::Url;

use crate::models::errors::RelayError;
use crate::models::types::RawPost;
use crate::services::diagnostics::OperatorChannel;
use crate::traits::page_fetcher::PageFetcher;

/// Реализация PageFetcher поверх reqwest
#[derive(Builder)]
pub struct HttpPageFetcher {
    #[builder(default)]
    client: Client,
}

impl HttpPageFetcher {
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let mut req = self.client.get(url);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("http error {} for {}", status, url).into());
        }
        Ok(response.text().await?)
    }
}

/// Загрузчик документа поста с ограниченным числом попыток
pub struct DocumentFetcher {
    pages: Arc<dyn PageFetcher>,
    operator: Option<Arc<OperatorChannel>>,
    max_attempts: usize,
    retry_delay: Duration,
    user_agent: String,
}

#[bon]
impl DocumentFetcher {
    #[builder]
    pub fn new(
        pages: Arc<dyn PageFetcher>,
        operator: Option<Arc<OperatorChannel>>,
        #[builder(default = 5)] max_attempts: usize,
        #[builder(default = Duration::from_millis(100))] retry_delay: Duration,
        #[builder(into)] user_agent: String,
    ) -> Self {
        Self {
            pages,
            operator,
            max_attempts: max_attempts.max(1),
            retry_delay,
            user_agent,
        }
    }
}

impl DocumentFetcher {
    /// Fetches `url`; every failed attempt is reported once to the operator as `Retry - <n>`.
    pub async fn fetch(&self, url: &Url) -> Result<RawPost, RelayError> {
        let attempts = AtomicUsize::new(0);
        let headers = [("User-Agent", self.user_agent.as_str())];

        let pages = &self.pages;
        let operator = &self.operator;
        let attempts_ref = &attempts;
        let headers_ref = &headers;
        let target = url.as_str();

        let fetch_page = || async move {
            let n = attempts_ref.fetch_add(1, Ordering::SeqCst) + 1;
            match pages.fetch(target, headers_ref).await {
                Ok(body) => Ok(body),
                Err(e) => {
                    warn!(url = %target, attempt = n, error = %e, "fetch: attempt failed");
                    if let Some(op) = operator {
                        op.notify(&format!("Retry - {}", n)).await;
                    }
                    Err(e.to_string())
                }
            }
        };

        let body = fetch_page
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.retry_delay)
                    .with_max_times(self.max_attempts - 1)
                    .with_jitter(),
            )
            .sleep(tokio::time::sleep)
            .await
            .map_err(|last_error| RelayError::FetchExhausted {
                url: target.to_string(),
                attempts: attempts.load(Ordering::SeqCst),
                last_error,
            })?;

        info!(url = %target, len = body.len(), "fetch: document received");
        Ok(RawPost { url: url.clone(), body })
    }
}
