use std::sync::Arc;

use bon::bon;
use regex::Regex;
use tracing::info;

use crate::models::errors::RelayError;
use crate::models::types::{ClassifiedPost, PostCategory, RawPost};
use crate::services::document::Document;
use crate::services::fetcher::DocumentFetcher;
use crate::services::normalizer::normalize;

/// Атрибуты элемента поста, извлечённые из документа
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostAttributes {
    pub title: String,
    pub origin: String,
    pub category: PostCategory,
    pub content_ref: String,
    pub element: String,
    pub nsfw: bool,
}

/// Находит единственный элемент поста и читает его атрибуты.
///
/// Missing attributes become empty strings. NSFW is a substring match on the
/// serialized element, so unrelated text containing the marker also counts.
pub fn parse_post(body: &str) -> Result<PostAttributes, RelayError> {
    let doc = Document::parse(body);
    let post = doc.find_first("shreddit-post").ok_or(RelayError::MalformedDocument)?;
    let element = post.outer_html();
    let attr = |name: &str| post.attr(name).map(str::trim).unwrap_or_default().to_string();
    Ok(PostAttributes {
        title: attr("post-title"),
        origin: attr("subreddit-prefixed-name"),
        category: PostCategory::parse(&attr("post-type")),
        content_ref: attr("content-href"),
        nsfw: element.contains("icon-nsfw"),
        element,
    })
}

/// Классификатор постов: разворачивает crosspost и применяет правила переклассификации
pub struct Classifier {
    fetcher: Arc<DocumentFetcher>,
    base_url: String,
    short_video_hosts: Vec<Regex>,
    image_hosts: Vec<Regex>,
}

#[bon]
impl Classifier {
    #[builder]
    pub fn new(
        fetcher: Arc<DocumentFetcher>,
        #[builder(into)] base_url: String,
        short_video_hosts: &[String],
        image_hosts: &[String],
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            short_video_hosts: compile(short_video_hosts)?,
            image_hosts: compile(image_hosts)?,
        })
    }
}

impl Classifier {
    pub async fn classify(&self, raw: &RawPost) -> Result<ClassifiedPost, RelayError> {
        let attrs = parse_post(&raw.body)?;
        info!(post_type = %attrs.category, title = %attrs.title, "classifier: post parsed");

        let (category, content_ref, element) = if attrs.category == PostCategory::Crosspost {
            let nested = self.resolve_crosspost(&attrs.content_ref).await?;
            info!(post_type = %nested.category, "classifier: original post type");
            (nested.category, nested.content_ref, nested.element)
        } else {
            (attrs.category, attrs.content_ref, attrs.element)
        };

        let category = self.reclassify(category, &content_ref);

        Ok(ClassifiedPost::builder()
            .source_url(raw.url.clone())
            .title(attrs.title)
            .origin(attrs.origin)
            .category(category)
            .content_ref(content_ref)
            .element(element)
            .nsfw(attrs.nsfw)
            .build())
    }

    /// One re-fetch of the nested post; a nested crosspost is returned as is.
    async fn resolve_crosspost(&self, content_ref: &str) -> Result<PostAttributes, RelayError> {
        let nested_url = if content_ref.starts_with("http://") || content_ref.starts_with("https://") {
            normalize(content_ref)?
        } else {
            normalize(&format!("{}{}", self.base_url, content_ref))?
        };
        info!(url = %nested_url, "classifier: following crosspost");
        let nested = self.fetcher.fetch(&nested_url).await?;
        parse_post(&nested.body)
    }

    /// link + short-video host -> video; gif + image host -> link. Order matters.
    pub fn reclassify(&self, category: PostCategory, content_ref: &str) -> PostCategory {
        match category {
            PostCategory::Link if matches_any(&self.short_video_hosts, content_ref) => {
                info!(%content_ref, "classifier: link reclassified as video");
                PostCategory::Video
            }
            PostCategory::Gif if matches_any(&self.image_hosts, content_ref) => {
                info!(%content_ref, "classifier: gif reclassified as link");
                PostCategory::Link
            }
            other => other,
        }
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, regex::Error> {
    patterns.iter().map(|p| Regex::new(p)).collect()
}

fn matches_any(patterns: &[Regex], value: &str) -> bool {
    patterns.iter().any(|re| re.is_match(value))
}
