//! Page title extraction.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

/// Returned when a page offers nothing usable.
pub const NO_TITLE: &str = "None";

/// Bodies whose whole text is at most this long are used verbatim.
const MAX_TEXT_TITLE: usize = 200;

static HEADINGS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["title", "h1", "h2", "h3"]
        .iter()
        .map(|s| Selector::parse(s).expect("valid heading selector"))
        .collect()
});

static META: Lazy<Vec<Selector>> = Lazy::new(|| {
    [r#"meta[name="description"]"#, r#"meta[name="keywords"]"#]
        .iter()
        .map(|s| Selector::parse(s).expect("valid meta selector"))
        .collect()
});

/// UTF-8 when the body is valid UTF-8, lossy otherwise.
pub fn decode_body(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}

/// First non-empty candidate out of `<title>`, `h1`, `h2`, `h3`, the
/// description and keywords meta tags, or the quoted document text when it
/// is short. [`NO_TITLE`] otherwise.
pub fn extract_title(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector in HEADINGS.iter() {
        if let Some(element) = document.select(selector).next() {
            let text = element.text().collect::<String>();
            let text = text.trim();
            if !text.is_empty() {
                return text.to_string();
            }
        }
    }

    for selector in META.iter() {
        let content = document
            .select(selector)
            .next()
            .and_then(|element| element.value().attr("content"))
            .map(str::trim)
            .filter(|content| !content.is_empty());
        if let Some(content) = content {
            return content.to_string();
        }
    }

    let text = document.root_element().text().collect::<String>();
    if text.chars().count() <= MAX_TEXT_TITLE {
        return format!("{text:?}");
    }

    NO_TITLE.to_string()
}
