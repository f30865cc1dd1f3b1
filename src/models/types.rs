use bon::Builder;
use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumString};
use url::Url;

/// Идентификатор одного обработанного сообщения; связывает строки логов и временные файлы
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, From, Into, Display)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Снимок сведений о чате и отправителе, используется только для диагностики
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct ChatIdentity {
    pub chat_id: i64,
    pub title: Option<String>,
    pub username: Option<String>,
    pub full_name: Option<String>,
}

impl ChatIdentity {
    pub fn render(&self) -> String {
        let mut out = format!("Chat ID: {}\n", self.chat_id);
        if let Some(t) = self.title.as_deref().filter(|s| !s.is_empty()) {
            out.push_str(&format!("Chat title: {}\n", t));
        }
        if let Some(u) = self.username.as_deref().filter(|s| !s.is_empty()) {
            out.push_str(&format!("Username: {}\n", u));
        }
        if let Some(n) = self.full_name.as_deref().filter(|s| !s.is_empty()) {
            out.push_str(&format!("Full name: {}\n", n));
        }
        out
    }
}

/// Входящее текстовое сообщение из чата
#[derive(Debug, Clone, Builder)]
pub struct InboundMessage {
    pub message_id: i64,
    pub identity: ChatIdentity,
    pub text: String,
}

impl InboundMessage {
    pub fn chat_id(&self) -> i64 {
        self.identity.chat_id
    }
}

/// Ссылка на отправленное транспортом сообщение
#[derive(Debug, Clone, Copy, PartialEq, Eq, From, Into, Display)]
pub struct MessageRef(i64);

impl MessageRef {
    pub fn id(&self) -> i64 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct RawPost {
    pub url: Url,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum PostCategory {
    Image,
    Video,
    Gif,
    Gallery,
    Link,
    Text,
    Crosspost,
    Unknown,
}

impl PostCategory {
    /// Разбирает объявленный в документе тип поста; всё незнакомое становится `Unknown`.
    pub fn parse(declared: &str) -> Self {
        declared.trim().parse().unwrap_or(PostCategory::Unknown)
    }
}

#[derive(Debug, Clone, Builder)]
pub struct ClassifiedPost {
    pub source_url: Url,
    #[builder(into)]
    pub title: String,
    #[builder(into)]
    pub origin: String,
    pub category: PostCategory,
    #[builder(into)]
    pub content_ref: String,
    /// Serialized markup of the post element (gallery items, player, text body live here).
    #[builder(into)]
    pub element: String,
    #[builder(default)]
    pub nsfw: bool,
}

impl ClassifiedPost {
    /// `<origin>\n[NSFW] <title>`
    pub fn caption(&self) -> String {
        let marker = if self.nsfw { "[NSFW] " } else { "" };
        format!("{}\n{}{}", self.origin, marker, self.title)
    }
}

/// Элемент альбома; подпись есть только у первого элемента пачки
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryItem {
    pub url: String,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedMedia {
    SingleImage { url: String, caption: String },
    SingleVideo { url: String, caption: String },
    Animation { url: String, caption: String },
    GalleryBatch { items: Vec<GalleryItem>, index: usize, count: usize },
    ExternalLink { url: String, caption: String },
    PlainText { body: String, caption: String },
}

/// Вид медиа при отправке в чат
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Animation,
}

/// Источник медиа: удалённый URL или локальный файл
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Url(String),
    File(std::path::PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMedia {
    pub kind: MediaKind,
    pub source: MediaSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
pub enum ParseMode {
    Markdown,
}

/// Итог одного вызова диспетчера; не сохраняется
#[derive(Debug, Default)]
pub struct DeliveryOutcome {
    pub succeeded: bool,
    pub used_local_fallback: bool,
    pub error: Option<crate::models::errors::RelayError>,
}
