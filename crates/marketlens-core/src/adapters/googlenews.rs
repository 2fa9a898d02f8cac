use std::sync::Arc;

use quick_xml::events::Event;
use quick_xml::Reader;
use urlencoding::encode;

use super::fetch_body;
use crate::data_source::{CapabilitySet, DataSource, NewsRequest, SourceError, SourceFuture};
use crate::http_client::{HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::{arrange_news, NewsItem, ProviderId, UtcDateTime};

const SEARCH_URL: &str = "https://news.google.com/rss/search";
const LOCALE_PARAMS: &str = "hl=en-IN&gl=IN&ceid=IN:en";

/// Google News RSS search adapter (news only, no credential).
#[derive(Clone)]
pub struct GoogleNewsAdapter {
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
}

impl GoogleNewsAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    async fn fetch_news(&self, req: NewsRequest) -> Result<Vec<NewsItem>, SourceError> {
        let url = format!("{SEARCH_URL}?q={}&{LOCALE_PARAMS}", form_encode(&req.search_query()));
        let request = HttpRequest::get(url)
            .with_header("accept", "application/rss+xml, application/xml")
            .with_timeout_ms(self.timeout_ms);
        let body = fetch_body(self.http_client.as_ref(), ProviderId::Googlenews, request).await?;
        let items = parse_feed(&body)?;
        Ok(arrange_news(items, req.max_items))
    }
}

impl DataSource for GoogleNewsAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Googlenews
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::news_only()
    }

    fn news<'a>(&'a self, req: NewsRequest) -> SourceFuture<'a, Vec<NewsItem>> {
        Box::pin(self.fetch_news(req))
    }
}

/// Query-string encoding with `+` for spaces.
fn form_encode(value: &str) -> String {
    encode(value).replace("%20", "+")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemField {
    Title,
    Link,
    PubDate,
    Source,
}

#[derive(Debug, Default)]
struct ItemDraft {
    title: String,
    link: String,
    pub_date: String,
    publisher: String,
}

impl ItemDraft {
    fn append(&mut self, field: ItemField, text: &str) {
        let target = match field {
            ItemField::Title => &mut self.title,
            ItemField::Link => &mut self.link,
            ItemField::PubDate => &mut self.pub_date,
            ItemField::Source => &mut self.publisher,
        };
        target.push_str(text);
    }

    /// Items without a title or link are dropped.
    fn finish(self) -> Option<NewsItem> {
        let title = self.title.trim();
        let link = self.link.trim();
        if title.is_empty() || link.is_empty() {
            return None;
        }

        let publisher = match self.publisher.trim() {
            "" => "Unknown",
            name => name,
        };

        Some(NewsItem {
            title: title.to_owned(),
            link: link.to_owned(),
            publisher: publisher.to_owned(),
            published_at: UtcDateTime::from_rfc2822(&self.pub_date),
            source: ProviderId::Googlenews,
        })
    }
}

fn parse_feed(body: &str) -> Result<Vec<NewsItem>, SourceError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut draft: Option<ItemDraft> = None;
    let mut field: Option<ItemField> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) => {
                field = None;
                match tag.name().as_ref() {
                    b"item" => draft = Some(ItemDraft::default()),
                    b"title" => field = Some(ItemField::Title),
                    b"link" => field = Some(ItemField::Link),
                    b"pubDate" => field = Some(ItemField::PubDate),
                    b"source" => field = Some(ItemField::Source),
                    _ => {}
                }
            }
            Ok(Event::Text(text)) => {
                if let (Some(item), Some(field)) = (draft.as_mut(), field) {
                    let value = text.unescape().map_err(|error| {
                        SourceError::malformed(format!("googlenews feed has a bad entity: {error}"))
                    })?;
                    item.append(field, &value);
                }
            }
            Ok(Event::CData(data)) => {
                if let (Some(item), Some(field)) = (draft.as_mut(), field) {
                    item.append(field, &String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Ok(Event::End(tag)) => {
                field = None;
                if tag.name().as_ref() == b"item" {
                    items.extend(draft.take().and_then(ItemDraft::finish));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(error) => {
                return Err(SourceError::malformed(format!(
                    "googlenews feed is not valid XML at position {}: {error}",
                    reader.error_position()
                )));
            }
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::testing::ScriptedHttpClient;
    use crate::http_client::HttpResponse;
    use crate::Symbol;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
  <title>"Tata Motors stock India" - Google News</title>
  <item>
    <title>Tata Motors Q4 profit jumps &amp; beats estimates</title>
    <link>https://news.example.test/tata-q4</link>
    <pubDate>Fri, 31 May 2024 06:00:00 GMT</pubDate>
    <source url="https://economictimes.example.test">The Economic Times</source>
  </item>
  <item>
    <title><![CDATA[JLR sales rise]]></title>
    <link>https://news.example.test/jlr</link>
    <pubDate>not a date</pubDate>
  </item>
  <item>
    <link>https://news.example.test/untitled</link>
  </item>
  <item>
    <title>Tata Motors shares hit record</title>
    <link>https://news.example.test/record</link>
    <pubDate>Sat, 01 Jun 2024 09:30:00 +0530</pubDate>
    <source url="https://mint.example.test">Mint</source>
  </item>
</channel></rss>"#;

    fn request(query: Option<&str>, max_items: usize) -> NewsRequest {
        NewsRequest::new(
            Symbol::parse("TATAMOTORS").expect("valid"),
            "Tata Motors",
            query.map(str::to_owned),
            max_items,
        )
        .expect("valid request")
    }

    #[test]
    fn parses_items_and_skips_untitled_ones() {
        let items = parse_feed(FEED).expect("feed parses");

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title, "Tata Motors Q4 profit jumps & beats estimates");
        assert_eq!(items[0].publisher, "The Economic Times");
        assert_eq!(
            items[0].published_at.map(UtcDateTime::format_rfc3339).as_deref(),
            Some("2024-05-31T06:00:00Z")
        );
        assert_eq!(items[1].title, "JLR sales rise");
        assert_eq!(items[1].publisher, "Unknown");
        assert!(items[1].published_at.is_none());
        assert_eq!(
            items[2].published_at.map(UtcDateTime::format_rfc3339).as_deref(),
            Some("2024-06-01T04:00:00Z")
        );
    }

    #[test]
    fn truncated_feed_is_malformed() {
        let error = parse_feed("<rss><channel><item><title>x</title></channel>")
            .expect_err("must fail");
        assert_eq!(error.kind(), SourceErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn builds_default_query_and_orders_newest_first() {
        // Given: a feed with mixed dates
        let client = ScriptedHttpClient::new();
        client.respond("news.google.com", Ok(HttpResponse::ok(FEED)));
        let adapter = GoogleNewsAdapter::new(client.clone());

        // When: searching without an explicit query
        let items = adapter.news(request(None, 2)).await.expect("news");

        // Then: the default query is form-encoded and results are capped
        let url = &client.requests()[0];
        assert!(url.contains("q=Tata+Motors+stock+India&hl=en-IN&gl=IN&ceid=IN:en"));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].link, "https://news.example.test/record");
        assert_eq!(items[1].link, "https://news.example.test/tata-q4");
    }

    #[tokio::test]
    async fn explicit_query_overrides_default() {
        let client = ScriptedHttpClient::new();
        client.respond("news.google.com", Ok(HttpResponse::ok(FEED)));

        GoogleNewsAdapter::new(client.clone())
            .news(request(Some("JLR & Tata"), 5))
            .await
            .expect("news");

        assert!(client.requests()[0].contains("q=JLR+%26+Tata&"));
    }

    #[tokio::test]
    async fn advertises_news_only() {
        let adapter = GoogleNewsAdapter::new(ScriptedHttpClient::new());
        let error = adapter
            .quote(crate::data_source::QuoteRequest::new(
                Symbol::parse("TCS").expect("valid"),
            ))
            .await
            .expect_err("quotes are unsupported");

        assert_eq!(error.kind(), SourceErrorKind::UnsupportedCapability);
        assert!(!adapter.capabilities().quote);
    }
}
