use async_trait::async_trait;

use crate::models::errors::TransportError;
use crate::models::types::{GalleryItem, InboundMessage, MessageRef, OutboundMedia, ParseMode};

/// `ChatTransport` defines the chat operations the relay needs.
///
/// The real implementation talks to the Telegram Bot API; tests use an
/// in-memory recorder.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Long-polls for new text messages starting at `offset`.
    /// Returns the messages together with the next offset to ask for.
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<(Vec<InboundMessage>, i64), TransportError>;

    /// Sends a text message, optionally as a reply.
    async fn reply(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
        parse_mode: Option<ParseMode>,
    ) -> Result<MessageRef, TransportError>;

    /// Sends a single photo, video or animation.
    async fn send_media(
        &self,
        chat_id: i64,
        media: &OutboundMedia,
        caption: &str,
        nsfw: bool,
        reply_to: Option<i64>,
    ) -> Result<MessageRef, TransportError>;

    /// Sends up to ten photos as one album.
    async fn send_media_batch(
        &self,
        chat_id: i64,
        items: &[GalleryItem],
        nsfw: bool,
        reply_to: Option<i64>,
    ) -> Result<(), TransportError>;

    async fn delete_message(&self, chat_id: i64, message: MessageRef) -> Result<(), TransportError>;
}
