use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::types::{ClassifiedPost, ResolvedMedia};
use crate::services::document::Document;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<.*?>").expect("tag pattern is valid"));

const BODY_CONTAINER: &str = "div.text-neutral-content.md";

pub fn resolve(post: &ClassifiedPost) -> ResolvedMedia {
    ResolvedMedia::PlainText {
        body: extract_body(&post.element),
        caption: post.caption(),
    }
}

/// Текст поста без разметки; пустая строка, если контейнера нет.
pub fn extract_body(element: &str) -> String {
    let doc = Document::fragment(element);
    let Some(container) = doc.find_first(BODY_CONTAINER) else {
        return String::new();
    };
    let mut text = TAG_RE.replace_all(&container.outer_html(), "").into_owned();
    // трёх проходов хватает для наблюдаемой глубины вложенности
    for _ in 0..3 {
        text = text.replace("\n\n", "\n");
    }
    text
}
