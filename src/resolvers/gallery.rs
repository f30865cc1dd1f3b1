use crate::models::errors::RelayError;
use crate::models::types::{ClassifiedPost, GalleryItem, ResolvedMedia};
use crate::services::document::Document;

/// Максимальный размер альбома в одном вызове доставки
pub const BATCH_SIZE: usize = 10;

/// Элемент галереи, как он объявлен в документе
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceItem {
    pub url: String,
    pub caption: Option<String>,
}

pub fn resolve(post: &ClassifiedPost) -> Result<Vec<ResolvedMedia>, RelayError> {
    let items = collect_items(&post.element);
    if items.is_empty() {
        return Err(RelayError::Resolution("gallery has no images".to_string()));
    }
    Ok(build_batches(&items, &post.caption()))
}

/// Items in document order; an item without an image is skipped.
pub fn collect_items(element: &str) -> Vec<SourceItem> {
    let doc = Document::fragment(element);
    doc.find_all("li")
        .into_iter()
        .filter_map(|li| {
            let img = li.find_first("img")?;
            let url = img
                .attr_non_empty("src")
                .or_else(|| img.attr_non_empty("data-lazy-src"))?;
            let caption = li
                .find_first("gallery-caption")
                .and_then(|c| c.attr_non_empty("image-caption"))
                .map(str::to_string);
            Some(SourceItem { url: url.to_string(), caption })
        })
        .collect()
}

/// Режет галерею на пачки по 10; подпись получает только первый элемент пачки.
pub fn build_batches(items: &[SourceItem], caption: &str) -> Vec<ResolvedMedia> {
    let count = items.len().div_ceil(BATCH_SIZE);
    items
        .chunks(BATCH_SIZE)
        .enumerate()
        .map(|(i, chunk)| {
            let block = caption_block(caption, chunk, i + 1, items.len() > BATCH_SIZE);
            let items = chunk
                .iter()
                .enumerate()
                .map(|(pos, item)| GalleryItem {
                    url: item.url.clone(),
                    caption: (pos == 0).then(|| block.clone()),
                })
                .collect();
            ResolvedMedia::GalleryBatch { items, index: i + 1, count }
        })
        .collect()
}

/// `<caption>[ (Part k)]` then a blank line and `<position>. <caption>` per captioned item.
fn caption_block(caption: &str, chunk: &[SourceItem], part: usize, multipart: bool) -> String {
    let mut block = caption.to_string();
    if multipart {
        block.push_str(&format!(" (Part {})", part));
    }
    let lines: Vec<String> = chunk
        .iter()
        .enumerate()
        .filter_map(|(pos, item)| item.caption.as_ref().map(|c| format!("{}. {}", pos + 1, c)))
        .collect();
    if !lines.is_empty() {
        block.push_str("\n\n");
        block.push_str(&lines.join("\n"));
    }
    block
}
