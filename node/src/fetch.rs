use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use reqwest::{header, Client, Url};
use scraper::{Html, Selector};
use search_core::{page_id, Page};
use std::time::Duration;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

lazy_static! {
    static ref TITLE: Selector = Selector::parse("title").expect("valid selector");
    static ref DESCRIPTION: Selector = Selector::parse(r#"meta[name="description"]"#).expect("valid selector");
}

/// Fetches a single URL and turns it into an indexable [`Page`].
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &Url) -> Result<Page> {
        let resp = self.client.get(url.clone()).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("{} returned {}", url, resp.status()));
        }
        if let Some(ct) = resp.headers().get(header::CONTENT_TYPE) {
            if let Ok(v) = ct.to_str() {
                if !v.starts_with("text/html") {
                    return Err(anyhow!("{} is not html ({})", url, v));
                }
            }
        }
        let bytes = resp.bytes().await?;
        if bytes.len() > MAX_BODY_BYTES {
            return Err(anyhow!("{} body too large ({} bytes)", url, bytes.len()));
        }
        let html = String::from_utf8_lossy(&bytes).into_owned();
        Ok(parse_page(url.as_str(), html))
    }
}

/// Build a page from raw HTML: title from `<title>`, description from
/// `<meta name="description">`.
pub fn parse_page(url: &str, html: String) -> Page {
    let doc = Html::parse_document(&html);
    let title = doc.select(&TITLE).next().map(|n| n.text().collect::<String>()).unwrap_or_default();
    let meta_description = doc
        .select(&DESCRIPTION)
        .next()
        .and_then(|n| n.value().attr("content").map(str::to_string))
        .unwrap_or_default();
    Page {
        id: page_id(url),
        url: url.to_string(),
        title: title.trim().to_string(),
        content: html,
        meta_description: meta_description.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_title_and_description() {
        let html = r#"<html><head><title> Rust Search </title>
            <meta name="description" content="A sharded engine"></head>
            <body><p>hello</p></body></html>"#;
        let page = parse_page("https://example.com/", html.to_string());
        assert_eq!(page.title, "Rust Search");
        assert_eq!(page.meta_description, "A sharded engine");
        assert_eq!(page.id, page_id("https://example.com/"));
        assert!(page.content.contains("<p>hello</p>"));
    }

    #[test]
    fn missing_head_fields_are_empty() {
        let page = parse_page("https://example.com/bare", "<p>bare</p>".to_string());
        assert!(page.title.is_empty());
        assert!(page.meta_description.is_empty());
    }
}
