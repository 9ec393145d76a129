//! Web tool: scrape_webpage

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    check_status, parse_args, truncate_chars, ParamKind, ToolDescriptor, ToolError, ToolPayload,
    ToolTrait,
};

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko)";
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const TEXT_WIDTH: usize = 100;

pub struct ScrapeWebpageTool {
    client: reqwest::Client,
    max_chars: usize,
}

impl ScrapeWebpageTool {
    pub fn new(max_chars: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, max_chars }
    }
}

impl Default for ScrapeWebpageTool {
    fn default() -> Self {
        Self::new(20_000)
    }
}

#[derive(Deserialize)]
struct ScrapeArgs {
    url: String,
    max_chars: Option<usize>,
}

/// `<title>` text, if the page has one
pub fn page_title(html: &str) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    Html::parse_document(html)
        .select(&selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Readable plain text of an HTML document
pub fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), TEXT_WIDTH)
        .trim()
        .to_string()
}

#[async_trait]
impl ToolTrait for ScrapeWebpageTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "scrape_webpage",
            "Fetch a web page and return its title and readable text.",
        )
        .param("url", ParamKind::String, "URL to fetch (http or https)")
        .optional(
            "max_chars",
            ParamKind::Integer,
            "Maximum number of characters of text to return",
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolPayload, ToolError> {
        let args: ScrapeArgs = parse_args(args)?;
        if !(args.url.starts_with("http://") || args.url.starts_with("https://")) {
            return Err(ToolError::InvalidArguments(format!(
                "'{}' is not an http(s) URL",
                args.url
            )));
        }
        let max_chars = args.max_chars.unwrap_or(self.max_chars);
        debug!("Scraping {}", args.url);

        let response = check_status(self.client.get(&args.url).send().await?).await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        let body = response.text().await?;

        let (title, text) = if is_json {
            (None, body)
        } else {
            (page_title(&body), html_to_text(&body))
        };
        let (text, truncated) = truncate_chars(&text, max_chars);

        Ok(ToolPayload::Structured(json!({
            "url": args.url,
            "final_url": final_url,
            "status": status,
            "title": title,
            "truncated": truncated,
            "text": text,
        })))
    }
}
