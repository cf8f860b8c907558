// src/feed.rs
//! Feed Parser: RSS 2.0 / RSS 1.0 (RDF) / Atom into uniform raw item records.
//!
//! The document kind is resolved once from the root element. A well-formed document with
//! an unrecognized root yields zero items; only input that is not XML fails.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Rss,
    Atom,
    Unknown,
}

impl FeedKind {
    fn from_root(local: &str) -> Self {
        match local {
            "rss" | "RDF" => FeedKind::Rss,
            "feed" => FeedKind::Atom,
            _ => FeedKind::Unknown,
        }
    }

    fn is_item(&self, local: &str) -> bool {
        match self {
            FeedKind::Rss => local == "item",
            FeedKind::Atom => local == "entry",
            FeedKind::Unknown => false,
        }
    }
}

/// Raw fields of one item/entry, all optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    /// RSS `pubDate` / Atom `published`, else `dc:date` / `updated`.
    pub pub_date: Option<String>,
    /// Atom `content`.
    pub content: Option<String>,
    /// RSS `content:encoded`.
    pub encoded: Option<String>,
    /// RSS `description` / Atom `summary`.
    pub description: Option<String>,
    /// RSS `guid` / Atom `id`.
    pub guid: Option<String>,
    /// Feed-native labels (RSS `category`, `dc:subject`; Atom `category@term`).
    pub categories: Vec<String>,
}

impl RawItem {
    /// `content` → `content:encoded` → `description` → empty.
    pub fn body(&self) -> &str {
        self.content
            .as_deref()
            .or(self.encoded.as_deref())
            .or(self.description.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFeed {
    pub kind: FeedKind,
    pub items: Vec<RawItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    PubDate,
    FallbackDate,
    Content,
    Encoded,
    Description,
    Guid,
    Category,
}

fn field_for(kind: FeedKind, qname: &str, local: &str) -> Option<Field> {
    match kind {
        FeedKind::Rss => match qname {
            "title" => Some(Field::Title),
            "link" => Some(Field::Link),
            "pubDate" => Some(Field::PubDate),
            "dc:date" => Some(Field::FallbackDate),
            "description" => Some(Field::Description),
            "content:encoded" => Some(Field::Encoded),
            "guid" => Some(Field::Guid),
            "category" | "dc:subject" => Some(Field::Category),
            _ => None,
        },
        FeedKind::Atom => match local {
            "title" => Some(Field::Title),
            "published" => Some(Field::PubDate),
            "updated" => Some(Field::FallbackDate),
            "content" => Some(Field::Content),
            "summary" => Some(Field::Description),
            "id" => Some(Field::Guid),
            // Atom links and categories live in attributes.
            _ => None,
        },
        FeedKind::Unknown => None,
    }
}

#[derive(Debug)]
struct ItemBuilder {
    depth: usize,
    item: RawItem,
    fallback_date: Option<String>,
    field: Option<Field>,
    buf: String,
}

impl ItemBuilder {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            item: RawItem::default(),
            fallback_date: None,
            field: None,
            buf: String::new(),
        }
    }

    fn open(&mut self, kind: FeedKind, e: &BytesStart<'_>) {
        let (qname, local) = names(e);
        if kind == FeedKind::Atom {
            self.take_atom_attributes(local, e);
        }
        self.field = field_for(kind, &qname, local);
        self.buf.clear();
    }

    fn empty(&mut self, kind: FeedKind, e: &BytesStart<'_>) {
        if kind == FeedKind::Atom {
            let (_, local) = names(e);
            self.take_atom_attributes(local, e);
        }
    }

    fn take_atom_attributes(&mut self, local: &str, e: &BytesStart<'_>) {
        match local {
            "link" => {
                let rel = attr(e, "rel");
                let alternate = matches!(rel.as_deref(), None | Some("alternate"));
                if alternate && self.item.link.is_none() {
                    self.item.link = attr(e, "href").filter(|h| !h.is_empty());
                }
            }
            "category" => {
                if let Some(term) = attr(e, "term").or_else(|| attr(e, "label")) {
                    if !term.trim().is_empty() {
                        self.item.categories.push(term.trim().to_string());
                    }
                }
            }
            _ => {}
        }
    }

    /// Atom `type="xhtml"` content arrives as child elements; keep it as markup.
    fn raw_content(&mut self, raw: &str) {
        let raw = raw.trim();
        if self.item.content.is_none() && !raw.is_empty() {
            self.item.content = Some(raw.to_string());
        }
    }

    fn text(&mut self, s: &str) {
        if self.field.is_none() || s.is_empty() {
            return;
        }
        if !self.buf.is_empty() {
            self.buf.push(' ');
        }
        self.buf.push_str(s);
    }

    fn close(&mut self) {
        let Some(field) = self.field.take() else {
            return;
        };
        let value = self.buf.trim().to_string();
        self.buf.clear();
        if value.is_empty() {
            return;
        }
        let slot = match field {
            Field::Title => &mut self.item.title,
            Field::Link => &mut self.item.link,
            Field::PubDate => &mut self.item.pub_date,
            Field::FallbackDate => &mut self.fallback_date,
            Field::Content => &mut self.item.content,
            Field::Encoded => &mut self.item.encoded,
            Field::Description => &mut self.item.description,
            Field::Guid => &mut self.item.guid,
            Field::Category => {
                self.item.categories.push(value);
                return;
            }
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    fn finish(mut self) -> RawItem {
        if self.item.pub_date.is_none() {
            self.item.pub_date = self.fallback_date.take();
        }
        self.item
    }
}

fn names<'a>(e: &'a BytesStart<'_>) -> (String, &'a str) {
    let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let local = std::str::from_utf8(e.local_name().into_inner()).unwrap_or_default();
    (qname, local)
}

fn attr(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.try_get_attribute(key)
        .ok()
        .flatten()
        .map(|a| match a.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => decode_html(&a.value),
        })
}

// Fallback for entities XML does not know (`&eacute;`): decode the whole run as HTML.
fn decode_html(raw: &[u8]) -> String {
    html_escape::decode_html_entities(&String::from_utf8_lossy(raw)).into_owned()
}

/// Publisher feeds routinely carry HTML-only entities that XML rejects.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", "&#160;")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
        .replace("&copy;", "(c)")
}

/// Parse feed text into its kind plus raw items, in document order.
pub fn parse_feed(xml: &str) -> Result<ParsedFeed, ParseError> {
    let cleaned = scrub_html_entities_for_xml(xml);
    let mut reader = Reader::from_str(&cleaned);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut kind: Option<FeedKind> = None;
    let mut items = Vec::new();
    let mut current: Option<ItemBuilder> = None;

    loop {
        let event = reader.read_event().map_err(|e| ParseError::Malformed {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(e) => {
                let (qname, local) = names(&e);
                let k = *kind.get_or_insert_with(|| FeedKind::from_root(local));
                if current.is_none() {
                    if !stack.is_empty() && k.is_item(local) {
                        current = Some(ItemBuilder::new(stack.len()));
                    }
                } else if let Some(b) = current.as_mut() {
                    if stack.len() == b.depth + 1 {
                        if k == FeedKind::Atom
                            && local == "content"
                            && attr(&e, "type").as_deref() == Some("xhtml")
                        {
                            // Consumes the matching end tag, so the stack is left as is.
                            let raw = reader.read_text(e.name()).map_err(|err| {
                                ParseError::Malformed {
                                    position: reader.buffer_position() as u64,
                                    message: err.to_string(),
                                }
                            })?;
                            b.raw_content(&raw);
                            continue;
                        }
                        b.open(k, &e);
                    }
                }
                stack.push(qname);
            }
            Event::Empty(e) => {
                let (_, local) = names(&e);
                let k = *kind.get_or_insert_with(|| FeedKind::from_root(local));
                if let Some(b) = current.as_mut() {
                    if stack.len() == b.depth + 1 {
                        b.empty(k, &e);
                    }
                }
            }
            Event::End(_) => {
                stack.pop();
                let closes_item = current.as_ref().is_some_and(|b| stack.len() == b.depth);
                if closes_item {
                    if let Some(b) = current.take() {
                        items.push(b.finish());
                    }
                } else if let Some(b) = current.as_mut() {
                    if stack.len() == b.depth + 1 {
                        b.close();
                    }
                }
            }
            Event::Text(t) => {
                if let Some(b) = current.as_mut() {
                    let s = match t.unescape() {
                        Ok(s) => s.into_owned(),
                        Err(_) => decode_html(&t),
                    };
                    b.text(&s);
                }
            }
            Event::CData(c) => {
                if let Some(b) = current.as_mut() {
                    b.text(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(ParseError::Unclosed(open));
    }
    let kind = kind.ok_or(ParseError::NoRootElement)?;
    Ok(ParsedFeed { kind, items })
}

/// RFC 2822 (RSS) or RFC 3339 (Atom, `dc:date`). `None` when unparseable.
pub fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let strict = OffsetDateTime::parse(s, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(s, &Rfc3339))
        .ok()
        .and_then(|dt| DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond()));
    if strict.is_some() {
        return strict;
    }
    // Obsolete zone names ("GMT", "EST") and similar leniencies.
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn kind_is_resolved_from_root() {
        assert_eq!(
            parse_feed("<rss><channel/></rss>").unwrap().kind,
            FeedKind::Rss
        );
        assert_eq!(
            parse_feed(r#"<feed xmlns="http://www.w3.org/2005/Atom"></feed>"#)
                .unwrap()
                .kind,
            FeedKind::Atom
        );
        let unknown = parse_feed("<html><body><item><title>x</title></item></body></html>").unwrap();
        assert_eq!(unknown.kind, FeedKind::Unknown);
        assert!(unknown.items.is_empty());
    }

    #[test]
    fn not_xml_is_an_error() {
        assert_eq!(parse_feed(""), Err(ParseError::NoRootElement));
        assert_eq!(parse_feed("plain text"), Err(ParseError::NoRootElement));
        assert!(parse_feed("<rss><channel><item><title>x</title>").is_err());
        assert!(matches!(
            parse_feed("<rss><channel><item><title>x</channel></rss>"),
            Err(ParseError::Malformed { .. })
        ));
    }

    #[test]
    fn nested_markup_inside_field_is_kept_as_text() {
        let xml = r#"<rss><channel><item><title>A <b>bold</b> move</title></item></channel></rss>"#;
        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.items[0].title.as_deref(), Some("A bold move"));
    }

    #[test]
    fn html_only_entities_are_decoded_with_the_rest() {
        let xml = r#"<rss><channel><item>
            <title>Caf&eacute; opens in Suva &amp; Nadi</title>
            <category>Arts &amp; Caf&eacute;s</category>
        </item></channel></rss>"#;
        let feed = parse_feed(xml).unwrap();
        let it = &feed.items[0];
        assert_eq!(it.title.as_deref(), Some("Café opens in Suva & Nadi"));
        assert_eq!(it.categories, vec!["Arts & Cafés".to_string()]);

        let atom = r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry>
            <category term="Caf&eacute; &amp; Bar"/>
        </entry></feed>"#;
        let feed = parse_feed(atom).unwrap();
        assert_eq!(feed.items[0].categories, vec!["Café & Bar".to_string()]);
    }

    #[test]
    fn atom_xhtml_content_keeps_its_markup() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry>
            <title>Budget</title>
            <content type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml"><p>Talks in <b>Suva</b></p></div></content>
            <id>tag:x,2024:9</id>
        </entry></feed>"#;
        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.items.len(), 1);
        let it = &feed.items[0];
        let content = it.content.as_deref().unwrap();
        assert!(content.starts_with("<div"), "{content}");
        assert!(content.contains("<p>Talks in <b>Suva</b></p>"), "{content}");
        // Fields after the xhtml block still parse.
        assert_eq!(it.guid.as_deref(), Some("tag:x,2024:9"));
        assert_eq!(it.title.as_deref(), Some("Budget"));
    }

    #[test]
    fn rss_dates_with_obsolete_zones() {
        let d = parse_feed_date("Tue, 05 Mar 2024 09:30:00 GMT").unwrap();
        assert_eq!(d, Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap());
        let d = parse_feed_date("Tue, 05 Mar 2024 21:30:00 +1200").unwrap();
        assert_eq!(d, Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap());
        let d = parse_feed_date("2024-03-05T09:30:00Z").unwrap();
        assert_eq!(d, Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap());
        assert!(parse_feed_date("yesterday-ish").is_none());
    }

    #[test]
    fn body_falls_back_in_order() {
        let mut it = RawItem {
            description: Some("desc".into()),
            ..Default::default()
        };
        assert_eq!(it.body(), "desc");
        it.encoded = Some("encoded".into());
        assert_eq!(it.body(), "encoded");
        it.content = Some("content".into());
        assert_eq!(it.body(), "content");
        assert_eq!(RawItem::default().body(), "");
    }
}
