#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_fs::TempDir;
use async_trait::async_trait;

use postrelay::models::errors::TransportError;
use postrelay::models::types::{
    ChatIdentity, GalleryItem, InboundMessage, MediaKind, MediaSource, MessageRef, OutboundMedia, ParseMode,
};
use postrelay::resolvers::{ContentResolver, LinkResolver, MirrorResolver};
use postrelay::services::classifier::Classifier;
use postrelay::services::diagnostics::{CorrelationCounter, DiagnosticsSink, FileCounterStore, OperatorChannel};
use postrelay::services::dispatcher::Dispatcher;
use postrelay::services::downloads::MediaDownloader;
use postrelay::services::fetcher::DocumentFetcher;
use postrelay::services::normalizer::UrlNormalizer;
use postrelay::services::pipeline::Pipeline;
use postrelay::traits::chat_transport::ChatTransport;
use postrelay::traits::page_fetcher::PageFetcher;

pub const USER_CHAT: i64 = 100;
pub const USER_MESSAGE: i64 = 7;
pub const OPERATOR_CHAT: i64 = 999;
pub const PRIMARY_MIRROR: &str = "https://primary.test/info?url=";
pub const SECONDARY_MIRROR: &str = "https://secondary.test/info?url=";

/// Один вызов транспорта в порядке поступления
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Reply { chat_id: i64, text: String, reply_to: Option<i64>, parse_mode: Option<ParseMode> },
    Media { chat_id: i64, kind: MediaKind, source: MediaSource, caption: String, nsfw: bool, file_existed: bool },
    Batch { chat_id: i64, items: Vec<GalleryItem>, nsfw: bool },
    Delete { chat_id: i64, message_id: i64 },
}

/// In-memory `ChatTransport`: records every call, media sends can be scripted to fail.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    media_failures: Mutex<VecDeque<TransportError>>,
    updates: Mutex<Option<Vec<InboundMessage>>>,
    update_polls: Mutex<usize>,
    next_id: Mutex<i64>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `send_media` calls fail with these errors, in order.
    pub fn fail_media_with(self, errors: Vec<TransportError>) -> Self {
        *self.media_failures.lock().unwrap() = errors.into();
        self
    }

    /// The next `get_updates` returns these messages; `None` makes every poll fail.
    pub fn with_updates(self, updates: Option<Vec<InboundMessage>>) -> Self {
        *self.updates.lock().unwrap() = updates;
        self
    }

    pub fn update_polls(&self) -> usize {
        *self.update_polls.lock().unwrap()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn replies_to(&self, chat: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Reply { chat_id, text, .. } if chat_id == chat => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn media(&self) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| matches!(s, Sent::Media { .. } | Sent::Batch { .. }))
            .collect()
    }

    fn issue_id(&self) -> MessageRef {
        let mut id = self.next_id.lock().unwrap();
        *id += 1;
        MessageRef::from(1000 + *id)
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn get_updates(&self, offset: i64, _timeout_secs: u64) -> Result<(Vec<InboundMessage>, i64), TransportError> {
        *self.update_polls.lock().unwrap() += 1;
        let batch = self.updates.lock().unwrap().as_mut().map(std::mem::take);
        match batch {
            Some(batch) if batch.is_empty() => {
                // пустой long poll: ответ приходит только по таймауту
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok((batch, offset))
            }
            Some(batch) => {
                let next = offset + batch.len() as i64;
                Ok((batch, next))
            }
            None => Err(TransportError::Http("connection reset".into())),
        }
    }

    async fn reply(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
        parse_mode: Option<ParseMode>,
    ) -> Result<MessageRef, TransportError> {
        self.sent.lock().unwrap().push(Sent::Reply { chat_id, text: text.to_string(), reply_to, parse_mode });
        Ok(self.issue_id())
    }

    async fn send_media(
        &self,
        chat_id: i64,
        media: &OutboundMedia,
        caption: &str,
        nsfw: bool,
        _reply_to: Option<i64>,
    ) -> Result<MessageRef, TransportError> {
        let file_existed = match &media.source {
            MediaSource::File(p) => p.exists(),
            MediaSource::Url(_) => false,
        };
        self.sent.lock().unwrap().push(Sent::Media {
            chat_id,
            kind: media.kind,
            source: media.source.clone(),
            caption: caption.to_string(),
            nsfw,
            file_existed,
        });
        match self.media_failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(self.issue_id()),
        }
    }

    async fn send_media_batch(
        &self,
        chat_id: i64,
        items: &[GalleryItem],
        nsfw: bool,
        _reply_to: Option<i64>,
    ) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent::Batch { chat_id, items: items.to_vec(), nsfw });
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message: MessageRef) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent::Delete { chat_id, message_id: message.id() });
        Ok(())
    }
}

/// Scripted `PageFetcher`: the first route whose prefix matches the URL answers.
#[derive(Default)]
pub struct FakePages {
    routes: Mutex<Vec<(String, Option<String>)>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl FakePages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(self, prefix: &str, body: impl Into<String>) -> Self {
        self.routes.lock().unwrap().push((prefix.to_string(), Some(body.into())));
        self
    }

    /// Every request under `prefix` fails.
    pub fn fail(self, prefix: &str) -> Self {
        self.routes.lock().unwrap().push((prefix.to_string(), None));
        self
    }

    pub fn hits(&self, prefix: &str) -> usize {
        self.hits.lock().unwrap().get(prefix).copied().unwrap_or(0)
    }
}

#[async_trait]
impl PageFetcher for FakePages {
    async fn fetch(
        &self,
        url: &str,
        _headers: &[(&str, &str)],
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let route = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .cloned();
        match route {
            Some((prefix, body)) => {
                *self.hits.lock().unwrap().entry(prefix).or_insert(0) += 1;
                body.ok_or_else(|| format!("connection refused: {}", url).into())
            }
            None => Err(format!("no route for {}", url).into()),
        }
    }
}

/// Конвейер, собранный на записывающем транспорте и заскриптованных страницах
pub struct Harness {
    pub transport: Arc<RecordingTransport>,
    pub pages: Arc<FakePages>,
    pub dir: TempDir,
    pub pipeline: Pipeline,
}

impl Harness {
    pub fn new(transport: RecordingTransport, pages: FakePages) -> Self {
        Self::with_self_chat(transport, pages, None)
    }

    pub fn with_self_chat(transport: RecordingTransport, pages: FakePages, self_chat_id: Option<i64>) -> Self {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(transport);
        let pages = Arc::new(pages);
        let chat: Arc<dyn ChatTransport> = transport.clone();
        let page_source: Arc<dyn PageFetcher> = pages.clone();

        let operator = Arc::new(OperatorChannel::new(Arc::clone(&chat), OPERATOR_CHAT, self_chat_id));
        let diagnostics = Arc::new(
            DiagnosticsSink::builder()
                .failures_log(dir.path().join("logs_fails.txt"))
                .errors_log(dir.path().join("logs_errors.txt"))
                .operator(Arc::clone(&operator))
                .build(),
        );
        let counter = CorrelationCounter::new(Box::new(
            FileCounterStore::builder().path(dir.path().join("id.txt")).build(),
        ));
        let fetcher = Arc::new(
            DocumentFetcher::builder()
                .pages(Arc::clone(&page_source))
                .operator(Arc::clone(&operator))
                .retry_delay(Duration::from_millis(1))
                .user_agent("test-agent")
                .build(),
        );
        let defaults = postrelay::models::config::SourceConfig::default();
        let normalizer = UrlNormalizer::builder()
            .short_link_pattern(&defaults.short_link_pattern)
            .user_agent("test-agent")
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        let classifier = Classifier::builder()
            .fetcher(Arc::clone(&fetcher))
            .base_url("https://www.reddit.com")
            .short_video_hosts(&defaults.short_video_hosts)
            .image_hosts(&defaults.image_hosts)
            .build()
            .unwrap();
        let video = MirrorResolver::builder()
            .pages(page_source)
            .primary_url(PRIMARY_MIRROR)
            .secondary_url(SECONDARY_MIRROR)
            .rehost_base_url("https://i.imgur.com")
            .user_agent("test-agent")
            .build();
        let link = LinkResolver::new(Arc::clone(&fetcher), defaults.image_host_pages.clone());
        let downloader = MediaDownloader::builder()
            .temp_dir(dir.path().join("tmp"))
            .user_agent("test-agent")
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        let pipeline = Pipeline::builder()
            .transport(Arc::clone(&chat))
            .link_prefixes(defaults.link_prefixes.clone())
            .counter(counter)
            .normalizer(normalizer)
            .fetcher(fetcher)
            .classifier(classifier)
            .resolver(ContentResolver::new(video, link))
            .dispatcher(Dispatcher::new(chat, downloader))
            .diagnostics(diagnostics)
            .build();

        Self { transport, pages, dir, pipeline }
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.dir.path().join("tmp")
    }

    pub fn read_log(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).unwrap_or_default()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

pub fn message(text: &str) -> InboundMessage {
    InboundMessage::builder()
        .message_id(USER_MESSAGE)
        .identity(
            ChatIdentity::builder()
                .chat_id(USER_CHAT)
                .title("Memes".to_string())
                .username("alice".to_string())
                .build(),
        )
        .text(text.to_string())
        .build()
}

/// `<shreddit-post>` document with the given attributes and inner markup.
pub fn post_page(post_type: &str, title: &str, origin: &str, content_href: &str, inner: &str) -> String {
    format!(
        r#"<html><body><shreddit-post post-title="{title}" subreddit-prefixed-name="{origin}" post-type="{post_type}" content-href="{content_href}">{inner}</shreddit-post></body></html>"#
    )
}

/// Inner markup of a gallery post: `<li>` per image, captions on the listed positions (1-based).
pub fn gallery_inner(count: usize, captioned: &[(usize, &str)]) -> String {
    let mut out = String::from("<gallery-carousel><ul>");
    for i in 1..=count {
        out.push_str(&format!(r#"<li><img src="https://i.redd.it/{i}.jpg">"#));
        if let Some((_, cap)) = captioned.iter().find(|(pos, _)| *pos == i) {
            out.push_str(&format!(r#"<gallery-caption image-caption="{cap}"></gallery-caption>"#));
        }
        out.push_str("</li>");
    }
    out.push_str("</ul></gallery-carousel>");
    out
}
