//! Field extraction from raw article HTML.
//!
//! Article templates vary, so every field uses a short chain of fallbacks:
//!
//! | Field | Tried in order |
//! |-------|----------------|
//! | title | `<title>`, first `<h1>`/`<h2>`, the article link |
//! | description | `meta[name=description]`, `meta[property=og:description]`, first `<p>` of an article-like `div`, first `<p>` of the page |
//! | published | first `YYYY-MM-DD`, `YYYY/MM/DD` or `YYYY年MM月DD日` in the page text, then the fetch time |

use crate::models::{DiscoveredItem, FeedEntry};
use crate::utils::truncate_chars;
use chrono::{DateTime, NaiveDate, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static HEADING: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2").unwrap());
static META_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="description"]"#).unwrap());
static OG_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:description"]"#).unwrap());
static CLASSED_DIV: Lazy<Selector> = Lazy::new(|| Selector::parse("div[class]").unwrap());
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

static ARTICLE_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)article|content|news").unwrap());
static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})\s*[-/年]\s*(\d{1,2})\s*[-/月]\s*(\d{1,2})").unwrap()
});

/// Fields pulled out of one article page. Empty when nothing usable was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Extract the publishable fields of `html`.
pub fn extract_article(html: &str) -> ExtractedArticle {
    let document = Html::parse_document(html);
    ExtractedArticle {
        title: extract_title(&document),
        description: extract_description(&document),
        published_at: extract_date(&document),
    }
}

/// Build the feed entry for a discovered article served at `link`.
#[instrument(level = "debug", skip_all, fields(id = %item.id, %link))]
pub fn feed_entry(item: &DiscoveredItem, link: &Url, description_max_chars: usize) -> FeedEntry {
    let extracted = extract_article(&item.raw_content);
    debug!(
        has_title = extracted.title.is_some(),
        has_description = extracted.description.is_some(),
        has_date = extracted.published_at.is_some(),
        "Extracted article fields"
    );

    FeedEntry {
        id: item.id.get(),
        title: extracted.title.unwrap_or_else(|| link.to_string()),
        link: link.to_string(),
        content: extracted
            .description
            .map(|d| truncate_chars(&d, description_max_chars))
            .unwrap_or_default(),
        published_at: extracted.published_at.unwrap_or(item.fetched_at),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    document
        .select(&TITLE)
        .chain(document.select(&HEADING))
        .map(element_text)
        .find(|text| !text.is_empty())
}

fn extract_description(document: &Html) -> Option<String> {
    let meta = document
        .select(&META_DESCRIPTION)
        .chain(document.select(&OG_DESCRIPTION))
        .filter_map(|meta| meta.value().attr("content"))
        .map(normalize_whitespace)
        .find(|content| !content.is_empty());
    if meta.is_some() {
        return meta;
    }

    let article_body = document.select(&CLASSED_DIV).find(|div| {
        div.value()
            .attr("class")
            .is_some_and(|class| ARTICLE_CLASS.is_match(class))
    });
    let paragraph = match article_body {
        Some(div) => div.select(&PARAGRAPH).next(),
        None => document.select(&PARAGRAPH).next(),
    };
    paragraph.map(element_text).filter(|text| !text.is_empty())
}

fn extract_date(document: &Html) -> Option<DateTime<Utc>> {
    document.root_element().text().find_map(parse_date)
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    DATE.captures_iter(text).find_map(|caps| {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)?
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArticleId;
    use pretty_assertions::assert_eq;

    fn utc(date: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(date).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_full_page() {
        let html = r#"
            <html>
              <head>
                <title>  Council approves
                  new budget </title>
                <meta name="description" content="The city council approved the budget.">
              </head>
              <body>
                <h1>Ignored heading</h1>
                <span class="time">2025-05-06 14:30</span>
                <div class="article-content"><p>First paragraph.</p></div>
              </body>
            </html>"#;

        let article = extract_article(html);
        assert_eq!(article.title.as_deref(), Some("Council approves new budget"));
        assert_eq!(
            article.description.as_deref(),
            Some("The city council approved the budget.")
        );
        assert_eq!(article.published_at, Some(utc("2025-05-06T00:00:00Z")));
    }

    #[test]
    fn test_heading_when_title_missing() {
        let html = "<html><body><h2>Only a heading</h2></body></html>";
        assert_eq!(extract_article(html).title.as_deref(), Some("Only a heading"));
    }

    #[test]
    fn test_og_description_fallback() {
        let html = r#"<html><head><meta property="og:description" content="From OG"></head></html>"#;
        assert_eq!(extract_article(html).description.as_deref(), Some("From OG"));
    }

    #[test]
    fn test_article_div_paragraph_preferred_over_page_paragraph() {
        let html = r#"
            <html><body>
              <p>Navigation blurb</p>
              <div class="sidebar"><p>Sidebar</p></div>
              <div class="NewsBody"><p>The real lead paragraph.</p></div>
            </body></html>"#;
        assert_eq!(
            extract_article(html).description.as_deref(),
            Some("The real lead paragraph.")
        );
    }

    #[test]
    fn test_page_paragraph_when_no_article_div() {
        let html = "<html><body><p>Just a paragraph.</p></body></html>";
        assert_eq!(
            extract_article(html).description.as_deref(),
            Some("Just a paragraph.")
        );
    }

    #[test]
    fn test_chinese_date_format() {
        let html = "<html><body><p>发布时间：2024年3月9日 08:00</p></body></html>";
        assert_eq!(
            extract_article(html).published_at,
            Some(utc("2024-03-09T00:00:00Z"))
        );
    }

    #[test]
    fn test_invalid_date_is_skipped() {
        assert_eq!(parse_date("2024-13-45 then 2024/02/29"), Some(utc("2024-02-29T00:00:00Z")));
        assert_eq!(parse_date("no date here"), None);
    }

    #[test]
    fn test_feed_entry_fallbacks() {
        let item = DiscoveredItem {
            id: ArticleId::new(2000123).unwrap(),
            raw_content: "<html><body><div>bare</div></body></html>".to_string(),
            fetched_at: utc("2025-01-02T03:04:05Z"),
        };
        let link = Url::parse("https://www.example.com/news/2000123.html").unwrap();

        let entry = feed_entry(&item, &link, 400);
        assert_eq!(entry.id, 2000123);
        assert_eq!(entry.title, link.as_str());
        assert_eq!(entry.link, link.as_str());
        assert_eq!(entry.content, "");
        assert_eq!(entry.published_at, item.fetched_at);
    }

    #[test]
    fn test_feed_entry_truncates_description() {
        let item = DiscoveredItem {
            id: ArticleId::new(1).unwrap(),
            raw_content: format!("<html><body><p>{}</p></body></html>", "字".repeat(50)),
            fetched_at: utc("2025-01-02T03:04:05Z"),
        };
        let link = Url::parse("https://www.example.com/news/1.html").unwrap();

        let entry = feed_entry(&item, &link, 10);
        assert_eq!(entry.content.chars().count(), 10);
    }
}
