//! RSS 2.0 rendering with `quick-xml`.
//!
//! Every item carries `title`, `link`, `guid` (the link, as a permalink),
//! `description` and an RFC 2822 `pubDate`. Text is escaped by the writer.

use super::FeedError;
use crate::models::FeedEntry;
use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::fmt::Display;
use std::io::Write;

/// Channel-level metadata.
#[derive(Debug, Clone, Copy)]
pub struct Channel<'a> {
    pub title: &'a str,
    pub link: &'a str,
    pub description: &'a str,
}

/// Render `entries`, in the given order, as an RSS 2.0 document.
pub fn render(channel: &Channel<'_>, entries: &[FeedEntry], built_at: DateTime<Utc>) -> Result<String, FeedError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;
    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    writer.write_event(Event::Start(rss)).map_err(xml_error)?;
    writer
        .write_event(Event::Start(BytesStart::new("channel")))
        .map_err(xml_error)?;

    text_element(&mut writer, "title", channel.title)?;
    text_element(&mut writer, "link", channel.link)?;
    text_element(&mut writer, "description", channel.description)?;
    text_element(&mut writer, "lastBuildDate", &built_at.to_rfc2822())?;

    for entry in entries {
        writer
            .write_event(Event::Start(BytesStart::new("item")))
            .map_err(xml_error)?;
        text_element(&mut writer, "title", &entry.title)?;
        text_element(&mut writer, "link", &entry.link)?;
        let mut guid = BytesStart::new("guid");
        guid.push_attribute(("isPermaLink", "true"));
        writer.write_event(Event::Start(guid)).map_err(xml_error)?;
        writer
            .write_event(Event::Text(BytesText::new(&entry.link)))
            .map_err(xml_error)?;
        writer
            .write_event(Event::End(BytesEnd::new("guid")))
            .map_err(xml_error)?;
        text_element(&mut writer, "description", &entry.content)?;
        text_element(&mut writer, "pubDate", &entry.published_at.to_rfc2822())?;
        writer
            .write_event(Event::End(BytesEnd::new("item")))
            .map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("channel")))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("rss")))
        .map_err(xml_error)?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(xml_error)
}

fn text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<(), FeedError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)?;
    Ok(())
}

fn xml_error(e: impl Display) -> FeedError {
    FeedError::Xml(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(date).unwrap().with_timezone(&Utc)
    }

    fn channel() -> Channel<'static> {
        Channel {
            title: "Example News",
            link: "https://www.example.com/",
            description: "Everything new",
        }
    }

    #[test]
    fn test_render_channel_and_items() {
        let entries = vec![
            FeedEntry {
                id: 2,
                title: "Tom & Jerry <reunite>".to_string(),
                link: "https://www.example.com/news/2.html".to_string(),
                content: "A short summary.".to_string(),
                published_at: at("2025-05-06T00:00:00Z"),
            },
            FeedEntry {
                id: 1,
                title: "Earlier".to_string(),
                link: "https://www.example.com/news/1.html".to_string(),
                content: String::new(),
                published_at: at("2025-05-05T00:00:00Z"),
            },
        ];

        let xml = render(&channel(), &entries, at("2025-05-07T12:00:00Z")).unwrap();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"<rss version="2.0">"#));
        assert!(xml.contains("<title>Example News</title>"));
        assert!(xml.contains("7 May 2025 12:00:00 +0000</lastBuildDate>"));
        assert!(xml.contains("Tom &amp; Jerry &lt;reunite&gt;"));
        assert!(xml.contains(
            r#"<guid isPermaLink="true">https://www.example.com/news/2.html</guid>"#
        ));
        assert!(xml.contains("6 May 2025 00:00:00 +0000</pubDate>"));
        assert_eq!(xml.matches("<item>").count(), 2);
        assert!(xml.find("news/2.html").unwrap() < xml.find("news/1.html").unwrap());
        assert!(xml.trim_end().ends_with("</rss>"));
    }

    #[test]
    fn test_render_empty_channel() {
        let xml = render(&channel(), &[], at("2025-05-07T12:00:00Z")).unwrap();
        assert!(xml.contains("<channel>"));
        assert!(!xml.contains("<item>"));
    }
}
