use std::sync::Arc;

use tracing::{info, warn};

use crate::models::types::{ClassifiedPost, ResolvedMedia};
use crate::services::document::Document;
use crate::services::fetcher::DocumentFetcher;
use crate::services::normalizer::normalize;

/// Внешняя ссылка: для страниц фотохостинга пытаемся достать прямое видео
pub struct LinkResolver {
    fetcher: Arc<DocumentFetcher>,
    image_host_pages: Vec<String>,
}

impl LinkResolver {
    pub fn new(fetcher: Arc<DocumentFetcher>, image_host_pages: Vec<String>) -> Self {
        Self { fetcher, image_host_pages }
    }

    pub fn is_image_host_page(&self, url: &str) -> bool {
        self.image_host_pages.iter().any(|p| url.starts_with(p.as_str()))
    }

    /// Never fails: anything that is not a mined video becomes a plain link reply.
    pub async fn resolve(&self, post: &ClassifiedPost) -> ResolvedMedia {
        let caption = post.caption();
        if self.is_image_host_page(&post.content_ref) {
            match self.mine_video(&post.content_ref).await {
                Some(url) => {
                    info!(%url, "link: video mined from image host page");
                    return ResolvedMedia::SingleVideo { url, caption };
                }
                None => info!(url = %post.content_ref, "link: no video on image host page"),
            }
        }
        ResolvedMedia::ExternalLink { url: post.content_ref.clone(), caption }
    }

    async fn mine_video(&self, page: &str) -> Option<String> {
        let url = normalize(page).ok()?;
        let raw = match self.fetcher.fetch(&url).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%url, error = %e, "link: image host page fetch failed");
                return None;
            }
        };
        secure_video_url(&raw.body)
    }
}

fn secure_video_url(body: &str) -> Option<String> {
    let doc = Document::parse(body);
    doc.find_first(r#"meta[property="og:video:secure_url"]"#)
        .and_then(|m| m.attr_non_empty("content"))
        .map(str::to_string)
}
