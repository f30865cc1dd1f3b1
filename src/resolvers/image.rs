use crate::models::types::{ClassifiedPost, ResolvedMedia};

/// Ссылка на изображение берётся из поста без изменений.
pub fn resolve(post: &ClassifiedPost) -> ResolvedMedia {
    ResolvedMedia::SingleImage {
        url: post.content_ref.clone(),
        caption: post.caption(),
    }
}
