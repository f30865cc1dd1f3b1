use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::bon;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::models::errors::RelayError;
use crate::models::types::CorrelationId;

/// Временный медиафайл; удаляется при уничтожении значения на любом пути выхода
#[derive(Debug)]
pub struct LocalMedia {
    path: PathBuf,
}

impl LocalMedia {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LocalMedia {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "downloads: temp file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "downloads: failed to remove temp file"),
        }
    }
}

/// Скачивание медиа во временный каталог, имя файла задаётся идентификатором корреляции
pub struct MediaDownloader {
    client: Client,
    temp_dir: PathBuf,
}

#[bon]
impl MediaDownloader {
    #[builder]
    pub fn new(
        #[builder(into)] temp_dir: PathBuf,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(user_agent).timeout(timeout).build()?;
        Ok(Self { client, temp_dir })
    }
}

impl MediaDownloader {
    pub fn temp_path(&self, id: CorrelationId, extension: &str) -> PathBuf {
        self.temp_dir.join(format!("{}.{}", id, extension))
    }

    /// Streams `url` into `<temp dir>/<id>.<extension>`; a partial file is removed on error.
    pub async fn download(&self, url: &str, id: CorrelationId, extension: &str) -> Result<LocalMedia, RelayError> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let local = LocalMedia::new(self.temp_path(id, extension));
        info!(%url, path = %local.path().display(), "downloads: fetching media");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RelayError::LocalStorage(format!("download of {} failed: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(RelayError::LocalStorage(format!(
                "download of {} failed: http {}",
                url,
                response.status()
            )));
        }

        let mut file = tokio::fs::File::create(local.path()).await?;
        let mut stream = response.bytes_stream();
        let mut written: usize = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RelayError::LocalStorage(format!("download of {} interrupted: {}", url, e)))?;
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;
        info!(size = written, "downloads: media saved");
        Ok(local)
    }
}
