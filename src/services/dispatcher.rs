use std::sync::Arc;

use tracing::{info, warn};

use crate::models::errors::TransportError;
use crate::models::types::{
    CorrelationId, DeliveryOutcome, GalleryItem, MediaKind, MediaSource, OutboundMedia, ParseMode, ResolvedMedia,
};
use crate::publishers::utils::{bold_markdown, escape_markdown_trimmed, trim_with_ellipsis};
use crate::services::downloads::MediaDownloader;
use crate::services::retry::retry_once;
use crate::traits::chat_transport::ChatTransport;

/// Telegram: подпись к медиа до 1024 символов, текст сообщения до 4096
pub const CAPTION_LIMIT: usize = 1024;
pub const MESSAGE_LIMIT: usize = 4096;

/// Куда и в ответ на что доставлять результат
#[derive(Debug, Clone, Copy)]
pub struct DeliveryTarget {
    pub id: CorrelationId,
    pub chat_id: i64,
    pub reply_to: i64,
    pub nsfw: bool,
}

/// Превращает разрешённый контент в вызовы транспорта
pub struct Dispatcher {
    transport: Arc<dyn ChatTransport>,
    downloader: MediaDownloader,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn ChatTransport>, downloader: MediaDownloader) -> Self {
        Self { transport, downloader }
    }

    pub async fn dispatch(&self, target: &DeliveryTarget, media: &ResolvedMedia) -> DeliveryOutcome {
        let res = match media {
            ResolvedMedia::SingleImage { url, caption } => {
                self.send_media(target, MediaKind::Photo, url, caption).await
            }
            ResolvedMedia::Animation { url, caption } => {
                self.send_media(target, MediaKind::Animation, url, caption).await
            }
            ResolvedMedia::SingleVideo { url, caption } => return self.send_video(target, url, caption).await,
            ResolvedMedia::GalleryBatch { items, index, count } => {
                info!(part = index, of = count, size = items.len(), "dispatcher: sending gallery batch");
                self.send_batch(target, items).await
            }
            ResolvedMedia::ExternalLink { url, caption } => {
                let text = trim_with_ellipsis(&format!("{}\n\n{}", caption, url), MESSAGE_LIMIT);
                self.reply(target, &text, None).await
            }
            ResolvedMedia::PlainText { body, caption } => {
                let text = markdown_text(caption, body);
                self.reply(target, &text, Some(ParseMode::Markdown)).await
            }
        };
        match res {
            Ok(()) => DeliveryOutcome { succeeded: true, ..Default::default() },
            Err(e) => DeliveryOutcome { error: Some(e.into()), ..Default::default() },
        }
    }

    async fn send_media(
        &self,
        target: &DeliveryTarget,
        kind: MediaKind,
        url: &str,
        caption: &str,
    ) -> Result<(), TransportError> {
        let media = OutboundMedia { kind, source: MediaSource::Url(url.to_string()) };
        let caption = trim_with_ellipsis(caption, CAPTION_LIMIT);
        let transport = &self.transport;
        let (media, caption) = (&media, caption.as_str());
        retry_once(kind.as_ref(), || async move {
            transport
                .send_media(target.chat_id, media, caption, target.nsfw, Some(target.reply_to))
                .await
        })
        .await
        .map(|_| ())
    }

    async fn send_batch(&self, target: &DeliveryTarget, items: &[GalleryItem]) -> Result<(), TransportError> {
        let items: Vec<GalleryItem> = items
            .iter()
            .map(|it| GalleryItem {
                url: it.url.clone(),
                caption: it.caption.as_deref().map(|c| trim_with_ellipsis(c, CAPTION_LIMIT)),
            })
            .collect();
        let transport = &self.transport;
        let items = items.as_slice();
        retry_once("media_group", || async move {
            transport
                .send_media_batch(target.chat_id, items, target.nsfw, Some(target.reply_to))
                .await
        })
        .await
    }

    async fn reply(&self, target: &DeliveryTarget, text: &str, parse_mode: Option<ParseMode>) -> Result<(), TransportError> {
        let transport = &self.transport;
        retry_once("message", || async move {
            transport.reply(target.chat_id, text, Some(target.reply_to), parse_mode).await
        })
        .await
        .map(|_| ())
    }

    /// Видео по ссылке; при отказе скачиваем файл и повторяем один раз уже с ним.
    async fn send_video(&self, target: &DeliveryTarget, url: &str, caption: &str) -> DeliveryOutcome {
        let caption = trim_with_ellipsis(caption, CAPTION_LIMIT);
        let by_url = OutboundMedia { kind: MediaKind::Video, source: MediaSource::Url(url.to_string()) };
        let first = self
            .transport
            .send_media(target.chat_id, &by_url, &caption, target.nsfw, Some(target.reply_to))
            .await;
        let first_err = match first {
            Ok(_) => return DeliveryOutcome { succeeded: true, ..Default::default() },
            Err(e) => e,
        };
        warn!(%url, error = %first_err, "dispatcher: video by url rejected, falling back to local upload");

        let local = match self.downloader.download(url, target.id, "mp4").await {
            Ok(local) => local,
            Err(e) => {
                warn!(error = %e, "dispatcher: video download failed");
                return DeliveryOutcome { used_local_fallback: true, error: Some(e), ..Default::default() };
            }
        };
        let by_file = OutboundMedia { kind: MediaKind::Video, source: MediaSource::File(local.path().to_path_buf()) };
        let second = self
            .transport
            .send_media(target.chat_id, &by_file, &caption, target.nsfw, Some(target.reply_to))
            .await;
        drop(local);

        match second {
            Ok(_) => {
                info!("dispatcher: video delivered from local file");
                DeliveryOutcome { succeeded: true, used_local_fallback: true, error: None }
            }
            Err(e) => DeliveryOutcome { succeeded: false, used_local_fallback: true, error: Some(e.into()) },
        }
    }
}

/// Bold caption plus escaped body; the body is cut before assembly so the
/// closing markers of the caption always survive the message limit.
fn markdown_text(caption: &str, body: &str) -> String {
    let title = bold_markdown(&trim_with_ellipsis(caption, CAPTION_LIMIT));
    let budget = MESSAGE_LIMIT.saturating_sub(title.chars().count() + 1);
    format!("{}\n{}", title, escape_markdown_trimmed(body, budget))
}
