use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Узкий интерфейс запросов к разметке: поиск по тегу/атрибуту и чтение атрибутов.
///
/// `scraper::Html` is not `Send`, so a `Document` must be created, queried and
/// dropped between two `.await` points.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(body: &str) -> Self {
        Self { html: Html::parse_document(body) }
    }

    pub fn fragment(markup: &str) -> Self {
        Self { html: Html::parse_fragment(markup) }
    }

    pub fn find_first(&self, css: &str) -> Option<Node<'_>> {
        let sel = selector(css)?;
        self.html.select(&sel).next().map(Node)
    }

    pub fn find_all(&self, css: &str) -> Vec<Node<'_>> {
        match selector(css) {
            Some(sel) => self.html.select(&sel).map(Node).collect(),
            None => Vec::new(),
        }
    }
}

/// Элемент документа
#[derive(Clone, Copy)]
pub struct Node<'a>(ElementRef<'a>);

impl<'a> Node<'a> {
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.0.value().attr(name)
    }

    /// Attribute value with surrounding whitespace removed; empty counts as absent.
    pub fn attr_non_empty(&self, name: &str) -> Option<&'a str> {
        self.attr(name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn find_first(&self, css: &str) -> Option<Node<'a>> {
        let sel = selector(css)?;
        self.0.select(&sel).next().map(Node)
    }

    pub fn find_all(&self, css: &str) -> Vec<Node<'a>> {
        match selector(css) {
            Some(sel) => self.0.select(&sel).map(Node).collect(),
            None => Vec::new(),
        }
    }

    pub fn outer_html(&self) -> String {
        self.0.html()
    }

    pub fn inner_html(&self) -> String {
        self.0.inner_html()
    }
}

fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(s) => Some(s),
        Err(e) => {
            debug!(%css, error = %e, "document: invalid selector");
            None
        }
    }
}
