use std::sync::Arc;

use bon::bon;
use tracing::{info, warn};

use crate::models::errors::RelayError;
use crate::models::types::{ClassifiedPost, ResolvedMedia};
use crate::services::document::Document;
use crate::services::normalizer::normalize;
use crate::traits::page_fetcher::PageFetcher;

const PRIMARY_ANCHOR: &str = "a.downloadButton";
const SECONDARY_ANCHOR: &str = "a.downloadbutton";
/// Path segment after which the secondary mirror embeds the raw source name.
const MARKER_SEGMENT: &str = "dl";

/// Получение прямой ссылки на видео через два сервиса-зеркала
pub struct MirrorResolver {
    pages: Arc<dyn PageFetcher>,
    primary_url: String,
    secondary_url: String,
    secondary_cookie: Option<String>,
    rehost_base_url: String,
    user_agent: String,
}

#[bon]
impl MirrorResolver {
    #[builder]
    pub fn new(
        pages: Arc<dyn PageFetcher>,
        #[builder(into)] primary_url: String,
        #[builder(into)] secondary_url: String,
        secondary_cookie: Option<String>,
        #[builder(into)] rehost_base_url: String,
        #[builder(into)] user_agent: String,
    ) -> Self {
        Self {
            pages,
            primary_url,
            secondary_url,
            secondary_cookie: secondary_cookie.filter(|c| !c.trim().is_empty()),
            rehost_base_url,
            user_agent,
        }
    }
}

impl MirrorResolver {
    /// Secondary mirror first (its link needs decoding), primary mirror as fallback.
    pub async fn resolve(&self, post: &ClassifiedPost) -> Result<ResolvedMedia, RelayError> {
        let post_url = post.source_url.as_str();
        let link = match self.query_secondary(post_url).await {
            Some(link) => link,
            None => {
                info!(%post_url, "video: secondary mirror gave no link, trying primary");
                self.query_primary(post_url).await.ok_or_else(|| {
                    RelayError::Resolution(format!("no mirror returned a download link for {}", post_url))
                })?
            }
        };
        info!(%link, "video: download link resolved");
        Ok(ResolvedMedia::SingleVideo { url: link, caption: post.caption() })
    }

    async fn query_secondary(&self, post_url: &str) -> Option<String> {
        let raw = self
            .query(&self.secondary_url, post_url, SECONDARY_ANCHOR, self.secondary_cookie.as_deref())
            .await?;
        Some(decode_secondary_link(&raw, &self.rehost_base_url))
    }

    async fn query_primary(&self, post_url: &str) -> Option<String> {
        self.query(&self.primary_url, post_url, PRIMARY_ANCHOR, None).await
    }

    async fn query(&self, base: &str, post_url: &str, anchor: &str, cookie: Option<&str>) -> Option<String> {
        let url = match normalize(&format!("{}{}", base, post_url)) {
            Ok(u) => u,
            Err(e) => {
                warn!(%base, error = %e, "video: bad mirror url");
                return None;
            }
        };
        let mut headers = vec![("User-Agent", self.user_agent.as_str())];
        if let Some(c) = cookie {
            headers.push(("Cookie", c));
        }
        match self.pages.fetch(url.as_str(), &headers).await {
            Ok(body) => first_href(&body, anchor),
            Err(e) => {
                warn!(mirror = %url, error = %e, "video: mirror request failed");
                None
            }
        }
    }
}

fn first_href(body: &str, anchor: &str) -> Option<String> {
    let doc = Document::parse(body);
    doc.find_first(anchor)
        .and_then(|a| a.attr_non_empty("href"))
        .map(str::to_string)
}

/// Декодирует ссылку вторичного зеркала.
///
/// An image-host source is rewritten to `<rehost>/<id>.mp4`. Otherwise the
/// segment after the marker is percent-re-encoded; without the marker the link
/// is returned untouched.
pub fn decode_secondary_link(link: &str, rehost_base_url: &str) -> String {
    if link.contains("imgur") {
        if let Some(id) = imgur_media_id(link) {
            return format!("{}/{}.mp4", rehost_base_url.trim_end_matches('/'), id);
        }
    }
    reencode_after_marker(link, MARKER_SEGMENT)
}

fn imgur_media_id(link: &str) -> Option<String> {
    let decoded = urlencoding::decode(link).map(|c| c.into_owned()).unwrap_or_else(|_| link.to_string());
    let start = decoded.find("imgur.com/")? + "imgur.com/".len();
    let id: String = decoded[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    (!id.is_empty()).then_some(id)
}

fn reencode_after_marker(link: &str, marker: &str) -> String {
    let needle = format!("/{}/", marker);
    let Some(pos) = link.find(&needle) else {
        return link.to_string();
    };
    let seg_start = pos + needle.len();
    let rest = &link[seg_start..];
    let seg_len = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let segment = &rest[..seg_len];
    if segment.is_empty() {
        return link.to_string();
    }
    // повторное кодирование не должно портить уже закодированный сегмент
    let raw = urlencoding::decode(segment)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    format!("{}{}{}", &link[..seg_start], urlencoding::encode(&raw), &rest[seg_len..])
}
