use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::{ContentExtractor, FetchedPage, PageContent};
use crate::error::ExtractionError;
use crate::sanitize::{clean_text, strip_tags};

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static HEADER_CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static INFOBOX: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table.infobox").unwrap());

const TITLE_SUFFIX: &str = " - Wikipedia";

/// Flattens an article into title + body: paragraphs, then table cells, then
/// infobox `header: value` pairs. Every piece goes through [`clean_text`].
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlExtractor;

impl ContentExtractor for HtmlExtractor {
    fn extract(&self, page: &FetchedPage) -> Result<PageContent, ExtractionError> {
        let doc = Html::parse_document(&page.html);

        let raw_title = doc
            .select(&TITLE)
            .next()
            .map(element_text)
            .ok_or_else(|| ExtractionError::MissingTitle(page.url.clone()))?;
        let title = raw_title.trim();
        let title = title.strip_suffix(TITLE_SUFFIX).unwrap_or(title);
        let title = clean_text(&strip_tags(title));
        if title.is_empty() {
            return Err(ExtractionError::MissingTitle(page.url.clone()));
        }

        let parts = [paragraphs(&doc), tables(&doc), infobox(&doc)];
        let body = parts
            .iter()
            .filter(|p| !p.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        if body.is_empty() {
            return Err(ExtractionError::MissingBody(page.url.clone()));
        }

        Ok(PageContent { title, body })
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

fn join_clean<I: IntoIterator<Item = String>>(pieces: I) -> String {
    pieces
        .into_iter()
        .map(|p| clean_text(&p))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn paragraphs(doc: &Html) -> String {
    join_clean(doc.select(&PARAGRAPH).map(element_text))
}

fn tables(doc: &Html) -> String {
    join_clean(
        doc.select(&TABLE)
            .flat_map(|table| table.select(&ROW))
            .flat_map(|row| row.select(&CELL).map(element_text)),
    )
}

fn infobox(doc: &Html) -> String {
    let Some(table) = doc.select(&INFOBOX).next() else {
        return String::new();
    };
    join_clean(table.select(&ROW).filter_map(|row| {
        let header = row.select(&HEADER_CELL).next()?;
        let data = row.select(&CELL).next()?;
        Some(format!(
            "{}: {}",
            element_text(header).trim(),
            element_text(data).trim()
        ))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(fixture: &str) -> FetchedPage {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", fixture)).unwrap();
        FetchedPage {
            url: format!("https://en.wikipedia.org/wiki/{}", fixture),
            html,
        }
    }

    #[test]
    fn article_title_and_body() {
        let content = HtmlExtractor.extract(&page("ada_lovelace")).unwrap();
        assert_eq!(content.title, "Ada Lovelace");

        let body = &content.body;
        assert!(body.starts_with("Augusta Ada King; Countess of Lovelace was an English mathematician"));
        assert!(!body.contains("[1]"));
        assert!(!body.contains('"'));
        assert!(!body.contains(','));
        assert!(!body.contains('\n'));
    }

    #[test]
    fn tables_and_infobox_follow_paragraphs() {
        let body = HtmlExtractor.extract(&page("ada_lovelace")).unwrap().body;
        let para = body.find("Analytical Engine").unwrap();
        let cell = body.find("1815").unwrap();
        let pair = body.find("Born: 10 December 1815").unwrap();
        assert!(para < cell);
        assert!(cell < pair);
        assert!(body.contains("Known for: Mathematics; computing"));
    }

    #[test]
    fn missing_title_is_an_extraction_error() {
        let page = FetchedPage {
            url: "https://example.org/x".into(),
            html: "<html><body><p>Text only.</p></body></html>".into(),
        };
        assert_eq!(
            HtmlExtractor.extract(&page),
            Err(ExtractionError::MissingTitle("https://example.org/x".into()))
        );
    }

    #[test]
    fn page_without_text_has_no_body() {
        let page = FetchedPage {
            url: "https://example.org/y".into(),
            html: "<html><head><title>Empty - Wikipedia</title></head><body><p> </p></body></html>"
                .into(),
        };
        assert_eq!(
            HtmlExtractor.extract(&page),
            Err(ExtractionError::MissingBody("https://example.org/y".into()))
        );
    }
}
