use crate::models::errors::RelayError;
use crate::models::types::{ClassifiedPost, ResolvedMedia};
use crate::services::document::Document;

// новый вариант плеера идёт первым
const PLAYER_SOURCES: [&str; 2] = ["shreddit-player-2 source", "shreddit-player source"];

pub fn resolve(post: &ClassifiedPost) -> Result<ResolvedMedia, RelayError> {
    let doc = Document::fragment(&post.element);
    let url = PLAYER_SOURCES
        .iter()
        .find_map(|css| doc.find_first(css).and_then(|n| n.attr_non_empty("src")))
        .ok_or_else(|| RelayError::Resolution("animation player source not found".to_string()))?;
    Ok(ResolvedMedia::Animation {
        url: url.to_string(),
        caption: post.caption(),
    })
}
