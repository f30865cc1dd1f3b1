use std::sync::Arc;

use bon::bon;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::models::errors::RelayError;
use crate::models::types::{CorrelationId, InboundMessage, MessageRef, PostCategory};
use crate::resolvers::ContentResolver;
use crate::services::classifier::Classifier;
use crate::services::diagnostics::{CorrelationCounter, DiagnosticsSink};
use crate::services::dispatcher::{DeliveryTarget, Dispatcher};
use crate::services::fetcher::DocumentFetcher;
use crate::services::normalizer::{UrlNormalizer, extract_post_link};
use crate::services::retry::retry_once;
use crate::traits::chat_transport::ChatTransport;

pub const WAIT_NOTICE: &str = "Please wait...";
pub const UNSUPPORTED_NOTICE: &str = "Supported content for extract not found";
pub const TOO_LARGE_NOTICE: &str = "Content is too large to be sent";

/// Что известно о посте к моменту ошибки
#[derive(Debug)]
struct Progress {
    url: String,
    category: Option<PostCategory>,
}

/// Обработка одного входящего сообщения от ссылки до доставки
pub struct Pipeline {
    transport: Arc<dyn ChatTransport>,
    link_prefixes: Vec<String>,
    counter: CorrelationCounter,
    normalizer: UrlNormalizer,
    fetcher: Arc<DocumentFetcher>,
    classifier: Classifier,
    resolver: ContentResolver,
    dispatcher: Dispatcher,
    diagnostics: Arc<DiagnosticsSink>,
}

#[bon]
impl Pipeline {
    #[builder]
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        link_prefixes: Vec<String>,
        counter: CorrelationCounter,
        normalizer: UrlNormalizer,
        fetcher: Arc<DocumentFetcher>,
        classifier: Classifier,
        resolver: ContentResolver,
        dispatcher: Dispatcher,
        diagnostics: Arc<DiagnosticsSink>,
    ) -> Self {
        Self {
            transport,
            link_prefixes,
            counter,
            normalizer,
            fetcher,
            classifier,
            resolver,
            dispatcher,
            diagnostics,
        }
    }
}

impl Pipeline {
    /// Единственная точка перехвата ошибок: сбой затрагивает только текущее сообщение.
    ///
    /// Messages without a post link are ignored and consume no correlation id.
    pub async fn handle_message(&self, msg: &InboundMessage) {
        let Some(link) = extract_post_link(&msg.text, &self.link_prefixes) else {
            debug!(chat = msg.chat_id(), "pipeline: message without post link ignored");
            return;
        };
        let id = self.counter.next();
        let span = info_span!("message", %id, chat = msg.chat_id());
        self.process(id, msg, link).instrument(span).await
    }

    async fn process(&self, id: CorrelationId, msg: &InboundMessage, link: String) {
        info!(identity = %msg.identity.render(), %link, "pipeline: post link received");
        let wait = self.reply(msg, WAIT_NOTICE).await;

        let mut progress = Progress { url: link, category: None };
        match self.run(id, msg, &mut progress).await {
            Ok(()) => info!("pipeline: delivered"),
            Err(RelayError::UnsupportedCategory(category)) => {
                info!(%category, url = %progress.url, "pipeline: unsupported content");
                if let Err(e) = self.diagnostics.record_unsupported(id, msg.chat_id(), &progress.url) {
                    error!(error = %e, "pipeline: failed to append failure log");
                }
                self.reply(msg, UNSUPPORTED_NOTICE).await;
            }
            Err(e) => {
                error!(error = %e, url = %progress.url, "pipeline: processing failed");
                self.diagnostics
                    .record_error(id, &msg.identity, progress.category, &progress.url, &e)
                    .await;
                if e.is_too_large() {
                    self.reply(msg, TOO_LARGE_NOTICE).await;
                }
            }
        }

        if let Some(wait) = wait {
            if let Err(e) = self.transport.delete_message(msg.chat_id(), wait).await {
                warn!(error = %e, "pipeline: failed to delete wait notice");
            }
        }
    }

    async fn run(&self, id: CorrelationId, msg: &InboundMessage, progress: &mut Progress) -> Result<(), RelayError> {
        let url = self.normalizer.resolve(&progress.url).await?;
        progress.url = url.to_string();

        let raw = self.fetcher.fetch(&url).await?;
        let post = self.classifier.classify(&raw).await?;
        progress.category = Some(post.category);
        info!(post_type = %post.category, nsfw = post.nsfw, "pipeline: post classified");
        self.report_classification(msg, post.category, &progress.url).await;

        let media = self.resolver.resolve(&post).await?;
        let target = DeliveryTarget {
            id,
            chat_id: msg.chat_id(),
            reply_to: msg.message_id,
            nsfw: post.nsfw,
        };
        for item in &media {
            let outcome = self.dispatcher.dispatch(&target, item).await;
            if outcome.used_local_fallback {
                info!(succeeded = outcome.succeeded, "pipeline: local upload fallback used");
            }
            if let Some(e) = outcome.error {
                return Err(e);
            }
        }
        Ok(())
    }

    async fn report_classification(&self, msg: &InboundMessage, category: PostCategory, url: &str) {
        let operator = self.diagnostics.operator();
        if operator.is_trusted(msg.chat_id()) {
            return;
        }
        let summary = format!(
            "Chat identity: \n{}\nPost type: {}\nURL: {}",
            msg.identity.render(),
            category,
            url
        );
        operator.notify(&summary).await;
    }

    async fn reply(&self, msg: &InboundMessage, text: &str) -> Option<MessageRef> {
        let transport = &self.transport;
        let chat_id = msg.chat_id();
        let reply_to = msg.message_id;
        match retry_once("reply", || async move { transport.reply(chat_id, text, Some(reply_to), None).await }).await {
            Ok(sent) => Some(sent),
            Err(e) => {
                warn!(error = %e, %text, "pipeline: reply failed");
                None
            }
        }
    }
}
