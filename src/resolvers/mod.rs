pub mod animation;
pub mod gallery;
pub mod image;
pub mod link;
pub mod text;
pub mod video;

pub use link::LinkResolver;
pub use video::MirrorResolver;

use tracing::info;

use crate::models::errors::RelayError;
use crate::models::types::{ClassifiedPost, PostCategory, ResolvedMedia};

/// Выбирает стратегию по категории поста.
///
/// Galleries yield one `GalleryBatch` per batch; every other category yields
/// exactly one value. Categories without a strategy fail with
/// `UnsupportedCategory`, which the pipeline routes to the unsupported notice.
pub struct ContentResolver {
    video: MirrorResolver,
    link: LinkResolver,
}

impl ContentResolver {
    pub fn new(video: MirrorResolver, link: LinkResolver) -> Self {
        Self { video, link }
    }

    pub async fn resolve(&self, post: &ClassifiedPost) -> Result<Vec<ResolvedMedia>, RelayError> {
        let resolved = match post.category {
            PostCategory::Image => vec![image::resolve(post)],
            PostCategory::Video => vec![self.video.resolve(post).await?],
            PostCategory::Gif => vec![animation::resolve(post)?],
            PostCategory::Gallery => gallery::resolve(post)?,
            PostCategory::Link => vec![self.link.resolve(post).await],
            PostCategory::Text => vec![text::resolve(post)],
            PostCategory::Crosspost | PostCategory::Unknown => {
                return Err(RelayError::UnsupportedCategory(post.category.to_string()));
            }
        };
        info!(post_type = %post.category, parts = resolved.len(), "resolver: content resolved");
        Ok(resolved)
    }
}
