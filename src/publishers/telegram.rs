use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::errors::TransportError;
use crate::models::types::{
    ChatIdentity, GalleryItem, InboundMessage, MediaKind, MediaSource, MessageRef, OutboundMedia, ParseMode,
};
use crate::traits::chat_transport::ChatTransport;

/// A real implementation of the `ChatTransport` trait that sends HTTP requests to the Telegram Bot API.
#[derive(Builder)]
pub struct RealTelegramApi {
    #[builder(default)]
    pub client: Client,
    #[builder(into)]
    pub base_url: String,
    #[builder(into)]
    pub token: String,
}

impl RealTelegramApi {
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url.trim_end_matches('/'), self.token, method)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &serde_json::Value) -> Result<T, TransportError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, %method, "HTTP error calling Telegram");
                TransportError::from(e)
            })?;
        decode(method, response).await
    }

    async fn call_multipart<T: DeserializeOwned>(&self, method: &str, form: Form) -> Result<T, TransportError> {
        let response = self
            .client
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, %method, "HTTP error uploading to Telegram");
                TransportError::from(e)
            })?;
        decode(method, response).await
    }
}

async fn decode<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> Result<T, TransportError> {
    let status = response.status();
    let body = response.text().await?;
    let parsed: ApiResponse<T> = match serde_json::from_str(&body) {
        Ok(p) => p,
        Err(_) => return Err(TransportError::from_api(i64::from(status.as_u16()), body)),
    };
    match (parsed.ok, parsed.result) {
        (true, Some(result)) => Ok(result),
        _ => {
            let code = parsed.error_code.unwrap_or_else(|| i64::from(status.as_u16()));
            let description = parsed.description.unwrap_or_else(|| format!("{} returned no result", method));
            tracing::warn!(%method, code, %description, "Telegram API error");
            Err(TransportError::from_api(code, description))
        }
    }
}

fn method_for(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "sendPhoto",
        MediaKind::Video => "sendVideo",
        MediaKind::Animation => "sendAnimation",
    }
}

fn reply_parameters(reply_to: Option<i64>) -> serde_json::Value {
    match reply_to {
        Some(id) => json!({ "message_id": id, "allow_sending_without_reply": true }),
        None => serde_json::Value::Null,
    }
}

#[async_trait]
impl ChatTransport for RealTelegramApi {
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<(Vec<InboundMessage>, i64), TransportError> {
        let body = json!({ "offset": offset, "timeout": timeout_secs, "allowed_updates": ["message"] });
        let response = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(Duration::from_secs(timeout_secs + 10))
            .json(&body)
            .send()
            .await?;
        let updates: Vec<Update> = decode("getUpdates", response).await?;

        let mut next = offset;
        let mut messages = Vec::new();
        for update in updates {
            next = next.max(update.update_id + 1);
            if let Some(msg) = update.message.and_then(Message::into_inbound) {
                messages.push(msg);
            }
        }
        Ok((messages, next))
    }

    async fn reply(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
        parse_mode: Option<ParseMode>,
    ) -> Result<MessageRef, TransportError> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if reply_to.is_some() {
            body["reply_parameters"] = reply_parameters(reply_to);
        }
        if let Some(mode) = parse_mode {
            body["parse_mode"] = json!(mode.to_string());
        }
        let sent: SentMessage = self.call("sendMessage", &body).await?;
        Ok(MessageRef::from(sent.message_id))
    }

    async fn send_media(
        &self,
        chat_id: i64,
        media: &OutboundMedia,
        caption: &str,
        nsfw: bool,
        reply_to: Option<i64>,
    ) -> Result<MessageRef, TransportError> {
        let method = method_for(media.kind);
        let field = media.kind.as_ref();
        let sent: SentMessage = match &media.source {
            MediaSource::Url(url) => {
                let mut body = json!({
                    "chat_id": chat_id,
                    field: url,
                    "caption": caption,
                    "has_spoiler": nsfw,
                });
                if reply_to.is_some() {
                    body["reply_parameters"] = reply_parameters(reply_to);
                }
                if media.kind == MediaKind::Video {
                    body["supports_streaming"] = json!(true);
                }
                self.call(method, &body).await?
            }
            MediaSource::File(path) => {
                let file_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("media")
                    .to_string();
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| TransportError::Http(format!("cannot read {}: {}", path.display(), e)))?;
                let mut form = Form::new()
                    .text("chat_id", chat_id.to_string())
                    .text("caption", caption.to_string())
                    .text("has_spoiler", nsfw.to_string())
                    .part(field.to_string(), Part::bytes(bytes).file_name(file_name));
                if let Some(id) = reply_to {
                    form = form.text("reply_parameters", reply_parameters(Some(id)).to_string());
                }
                if media.kind == MediaKind::Video {
                    form = form.text("supports_streaming", "true");
                }
                self.call_multipart(method, form).await?
            }
        };
        Ok(MessageRef::from(sent.message_id))
    }

    async fn send_media_batch(
        &self,
        chat_id: i64,
        items: &[GalleryItem],
        nsfw: bool,
        reply_to: Option<i64>,
    ) -> Result<(), TransportError> {
        let media: Vec<InputMediaPhoto> = items
            .iter()
            .map(|it| InputMediaPhoto {
                kind: "photo",
                media: it.url.clone(),
                caption: it.caption.clone(),
                has_spoiler: nsfw,
            })
            .collect();
        let mut body = json!({ "chat_id": chat_id, "media": media });
        if reply_to.is_some() {
            body["reply_parameters"] = reply_parameters(reply_to);
        }
        let _sent: Vec<SentMessage> = self.call("sendMediaGroup", &body).await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message: MessageRef) -> Result<(), TransportError> {
        let body = json!({ "chat_id": chat_id, "message_id": message.id() });
        let _deleted: bool = self.call("deleteMessage", &body).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    chat: Chat,
    from: Option<User>,
    text: Option<String>,
}

impl Message {
    /// Only text messages are relayed.
    fn into_inbound(self) -> Option<InboundMessage> {
        let text = self.text?;
        let (username, full_name) = match self.from {
            Some(user) => {
                let full = [user.first_name, user.last_name]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                (user.username, (!full.is_empty()).then_some(full))
            }
            None => (self.chat.username, None),
        };
        let identity = ChatIdentity::builder()
            .chat_id(self.chat.id)
            .maybe_title(self.chat.title)
            .maybe_username(username)
            .maybe_full_name(full_name)
            .build();
        Some(InboundMessage::builder().message_id(self.message_id).identity(identity).text(text).build())
    }
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    title: Option<String>,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Serialize)]
struct InputMediaPhoto {
    #[serde(rename = "type")]
    kind: &'static str,
    media: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<String>,
    has_spoiler: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use wiremock::matchers::{body_partial_json, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer) -> RealTelegramApi {
        RealTelegramApi::builder().base_url(server.uri()).token("T").build()
    }

    fn sent(id: i64) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": { "message_id": id } }))
    }

    #[tokio::test]
    async fn get_updates_parses_text_messages_and_advances_offset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT/getUpdates"))
            .and(body_partial_json(json!({ "offset": 5 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    { "update_id": 5, "message": {
                        "message_id": 11,
                        "chat": { "id": -100, "title": "Memes", "type": "supergroup" },
                        "from": { "username": "alice", "first_name": "Alice", "last_name": "Doe" },
                        "text": "https://www.reddit.com/r/pics/comments/1/x/"
                    }},
                    { "update_id": 6, "message": {
                        "message_id": 12,
                        "chat": { "id": 7, "type": "private" },
                        "sticker": {}
                    }}
                ]
            })))
            .mount(&server)
            .await;

        let (messages, next) = api(&server).get_updates(5, 0).await.unwrap();
        assert_eq!(next, 7);
        assert_eq!(messages.len(), 1);
        let m = &messages[0];
        assert_eq!(m.message_id, 11);
        assert_eq!(m.chat_id(), -100);
        assert_eq!(m.identity.title.as_deref(), Some("Memes"));
        assert_eq!(m.identity.username.as_deref(), Some("alice"));
        assert_eq!(m.identity.full_name.as_deref(), Some("Alice Doe"));
    }

    #[tokio::test]
    async fn reply_sends_markdown_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT/sendMessage"))
            .and(body_partial_json(json!({
                "chat_id": 1,
                "text": "*t*\nbody",
                "parse_mode": "Markdown",
                "reply_parameters": { "message_id": 3 }
            })))
            .respond_with(sent(99))
            .expect(1)
            .mount(&server)
            .await;

        let r = api(&server).reply(1, "*t*\nbody", Some(3), Some(ParseMode::Markdown)).await.unwrap();
        assert_eq!(r.id(), 99);
    }

    #[tokio::test]
    async fn photo_by_url_carries_spoiler_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT/sendPhoto"))
            .and(body_partial_json(json!({ "photo": "https://i.redd.it/a.jpg", "caption": "c", "has_spoiler": true })))
            .respond_with(sent(1))
            .expect(1)
            .mount(&server)
            .await;

        let media = OutboundMedia { kind: MediaKind::Photo, source: MediaSource::Url("https://i.redd.it/a.jpg".into()) };
        api(&server).send_media(1, &media, "c", true, Some(2)).await.unwrap();
    }

    #[tokio::test]
    async fn local_video_is_uploaded_as_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT/sendVideo"))
            .and(header_regex("content-type", "^multipart/form-data"))
            .respond_with(sent(4))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("9.mp4");
        std::fs::write(&file, b"video").unwrap();
        let media = OutboundMedia { kind: MediaKind::Video, source: MediaSource::File(file) };
        let r = api(&server).send_media(1, &media, "c", false, None).await.unwrap();
        assert_eq!(r.id(), 4);
    }

    #[tokio::test]
    async fn media_group_puts_caption_on_first_item_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT/sendMediaGroup"))
            .and(body_partial_json(json!({
                "media": [
                    { "type": "photo", "media": "a", "caption": "cap" },
                    { "type": "photo", "media": "b" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true, "result": [{ "message_id": 1 }, { "message_id": 2 }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let items = vec![
            GalleryItem { url: "a".into(), caption: Some("cap".into()) },
            GalleryItem { url: "b".into(), caption: None },
        ];
        api(&server).send_media_batch(1, &items, false, None).await.unwrap();
    }

    #[tokio::test]
    async fn oversized_payload_maps_to_too_large() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT/sendVideo"))
            .respond_with(ResponseTemplate::new(413).set_body_string("Request Entity Too Large"))
            .mount(&server)
            .await;

        let media = OutboundMedia { kind: MediaKind::Video, source: MediaSource::Url("u".into()) };
        let err = api(&server).send_media(1, &media, "c", false, None).await.unwrap_err();
        assert!(err.is_too_large());
    }

    #[tokio::test]
    async fn api_error_keeps_code_and_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT/deleteMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false, "error_code": 400, "description": "Bad Request: message to delete not found"
            })))
            .mount(&server)
            .await;

        let err = api(&server).delete_message(1, MessageRef::from(5)).await.unwrap_err();
        assert!(matches!(err, TransportError::Api { code: 400, .. }));
    }
}
