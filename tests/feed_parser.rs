// tests/feed_parser.rs
//
// Feed Parser over publisher-shaped fixtures.

use fiji_news_aggregator::feed::{parse_feed, FeedKind};
use fiji_news_aggregator::ParseError;

const FBC_RSS: &str = include_str!("fixtures/fbcnews_rss.xml");
const ISLANDS_ATOM: &str = include_str!("fixtures/islandsbusiness_atom.xml");
const MALFORMED: &str = include_str!("fixtures/malformed.xml");

#[test]
fn rss_fixture_fields() {
    let feed = parse_feed(FBC_RSS).expect("rss fixture parses");
    assert_eq!(feed.kind, FeedKind::Rss);
    assert_eq!(feed.items.len(), 3);

    let first = &feed.items[0];
    assert_eq!(first.title.as_deref(), Some("Fiji rugby team wins match"));
    assert_eq!(first.categories, vec!["Rugby".to_string()]);
    assert_eq!(first.guid.as_deref(), Some("fbc-1001"));
    assert_eq!(first.description.as_deref(), Some("Short\u{a0}summary"));
    // CDATA kept verbatim (markup is stripped later).
    assert!(first.body().starts_with("<p>The <b>Flying Fijians</b>"));

    // dc:date fills in for a missing pubDate.
    assert_eq!(
        feed.items[1].pub_date.as_deref(),
        Some("2024-05-02T08:30:00+12:00")
    );
    assert!(feed.items[2].pub_date.is_none());
    assert!(feed.items[2].link.is_none());
}

#[test]
fn atom_fixture_fields() {
    let feed = parse_feed(ISLANDS_ATOM).expect("atom fixture parses");
    assert_eq!(feed.kind, FeedKind::Atom);
    assert_eq!(feed.items.len(), 2);

    let e = &feed.items[0];
    assert_eq!(
        e.link.as_deref(),
        Some("https://islandsbusiness.com/news/climate-finance/")
    );
    assert_eq!(e.pub_date.as_deref(), Some("2024-05-02T09:00:00+12:00"));
    assert_eq!(e.categories, vec!["Entertainment".to_string()]);
    assert!(e.body().contains("<b>Suva</b>"));

    assert_eq!(
        feed.items[1].categories,
        vec!["Entertainment".to_string(), "Local".to_string()]
    );
    assert_eq!(feed.items[1].pub_date.as_deref(), Some("2024-05-01T00:00:00Z"));
}

#[test]
fn malformed_fixture_is_a_parse_error() {
    assert!(matches!(
        parse_feed(MALFORMED),
        Err(ParseError::Malformed { .. })
    ));
}

#[test]
fn rdf_feeds_read_as_rss() {
    let xml = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns="http://purl.org/rss/1.0/"
         xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel><title>c</title></channel>
  <item><title>One</title><link>https://a.fj/1</link><dc:date>2024-05-01T00:00:00Z</dc:date></item>
</rdf:RDF>"#;
    let feed = parse_feed(xml).unwrap();
    assert_eq!(feed.kind, FeedKind::Rss);
    assert_eq!(feed.items.len(), 1);
    assert_eq!(feed.items[0].pub_date.as_deref(), Some("2024-05-01T00:00:00Z"));
}
