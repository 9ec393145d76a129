//! Search tools: wiki_search, tavily_search and arxiv_search
//!
//! All three return the same document layout so the model sees one format:
//!
//! ```text
//! *Metadata*:
//! Title: ...
//! URL: ...
//!
//! *Content*:
//! ...
//! ```
//!
//! Documents are joined with a dashed separator.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    check_status, decode_entities, http_client, parse_args, truncate_chars, ParamKind,
    ToolDescriptor, ToolError, ToolPayload, ToolTrait,
};

const DOC_SEPARATOR: &str = "\n\n\n--------------\n\n\n";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(20);

const WIKIPEDIA_API: &str = "https://en.wikipedia.org/w/api.php";
const TAVILY_API: &str = "https://api.tavily.com";
const ARXIV_API: &str = "http://export.arxiv.org/api/query";

/// One search hit rendered for the model
#[derive(Debug, Clone, PartialEq)]
pub struct SearchDocument {
    pub title: String,
    pub url: String,
    pub authors: Option<String>,
    pub content: String,
}

impl SearchDocument {
    fn render(&self) -> String {
        let mut out = format!("*Metadata*:\nTitle: {}\nURL: {}\n", self.title, self.url);
        if let Some(authors) = &self.authors {
            out.push_str(&format!("Authors: {}\n", authors));
        }
        out.push_str(&format!("\n*Content*:\n{}", self.content));
        out
    }
}

/// Join documents, or report that nothing matched
pub fn format_documents(query: &str, docs: &[SearchDocument]) -> String {
    if docs.is_empty() {
        return format!("No results for: {}", query);
    }
    docs.iter()
        .map(SearchDocument::render)
        .collect::<Vec<_>>()
        .join(DOC_SEPARATOR)
}

#[derive(Deserialize)]
struct QueryArgs {
    query: String,
}

fn query_descriptor(name: &str, description: &str) -> ToolDescriptor {
    ToolDescriptor::new(name, description).param("query", ParamKind::String, "Search query")
}

fn query_from(args: Value) -> Result<String, ToolError> {
    let QueryArgs { query } = parse_args(args)?;
    let query = query.trim().to_string();
    if query.is_empty() {
        return Err(ToolError::InvalidArguments("query is empty".to_string()));
    }
    Ok(query)
}

/// Wikipedia search through the MediaWiki action API
pub struct WikiSearchTool {
    client: reqwest::Client,
    api_url: String,
    max_docs: usize,
    max_chars: usize,
}

impl WikiSearchTool {
    pub fn new(max_docs: usize, max_chars: usize) -> Self {
        Self::with_api_url(WIKIPEDIA_API, max_docs, max_chars)
    }

    pub fn with_api_url(api_url: impl Into<String>, max_docs: usize, max_chars: usize) -> Self {
        Self {
            client: http_client(SEARCH_TIMEOUT),
            api_url: api_url.into(),
            max_docs,
            max_chars,
        }
    }

    async fn search_titles(&self, query: &str) -> Result<Vec<String>, ToolError> {
        let limit = self.max_docs.to_string();
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?;
        let data: Value = check_status(response).await?.json().await?;

        let hits = data["query"]["search"]
            .as_array()
            .ok_or_else(|| ToolError::Parse("Wikipedia search response".to_string()))?;
        Ok(hits
            .iter()
            .filter_map(|h| h["title"].as_str().map(str::to_string))
            .take(self.max_docs)
            .collect())
    }

    async fn fetch_page(&self, title: &str) -> Result<Option<SearchDocument>, ToolError> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("prop", "extracts|info"),
                ("explaintext", "1"),
                ("inprop", "url"),
                ("redirects", "1"),
                ("titles", title),
                ("format", "json"),
            ])
            .send()
            .await?;
        let data: Value = check_status(response).await?.json().await?;

        let page = data["query"]["pages"]
            .as_object()
            .and_then(|pages| pages.values().next())
            .filter(|page| page.get("missing").is_none());
        let Some(page) = page else {
            return Ok(None);
        };

        let extract = page["extract"].as_str().unwrap_or_default();
        let (content, _) = truncate_chars(extract, self.max_chars);
        Ok(Some(SearchDocument {
            title: page["title"].as_str().unwrap_or(title).to_string(),
            url: page["fullurl"].as_str().unwrap_or_default().to_string(),
            authors: None,
            content,
        }))
    }
}

#[async_trait]
impl ToolTrait for WikiSearchTool {
    fn descriptor(&self) -> ToolDescriptor {
        query_descriptor(
            "wiki_search",
            "Search Wikipedia and return the title, URL and text of the top matching articles.",
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolPayload, ToolError> {
        let query = query_from(args)?;
        debug!("Wikipedia search: {}", query);

        let mut docs = Vec::new();
        for title in self.search_titles(&query).await? {
            if let Some(doc) = self.fetch_page(&title).await? {
                docs.push(doc);
            }
        }
        Ok(ToolPayload::Text(format_documents(&query, &docs)))
    }
}

/// Web search through the Tavily API
pub struct TavilySearchTool {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    max_results: u32,
}

impl TavilySearchTool {
    pub fn new(api_key: Option<String>, max_results: u32) -> Self {
        Self::with_api_url(TAVILY_API, api_key, max_results)
    }

    pub fn with_api_url(
        api_url: impl Into<String>,
        api_key: Option<String>,
        max_results: u32,
    ) -> Self {
        Self {
            client: http_client(SEARCH_TIMEOUT),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            max_results,
        }
    }
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

#[async_trait]
impl ToolTrait for TavilySearchTool {
    fn descriptor(&self) -> ToolDescriptor {
        query_descriptor(
            "tavily_search",
            "Search the web with Tavily and return the title, URL and content of the top results.",
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolPayload, ToolError> {
        let Some(api_key) = &self.api_key else {
            return Err(ToolError::NotConfigured("TAVILY_API_KEY".to_string()));
        };
        let query = query_from(args)?;
        debug!("Tavily search: {}", query);

        let response = self
            .client
            .post(format!("{}/search", self.api_url))
            .json(&json!({
                "api_key": api_key,
                "query": query,
                "max_results": self.max_results,
            }))
            .send()
            .await?;
        let data: TavilyResponse = check_status(response).await?.json().await?;

        let docs: Vec<SearchDocument> = data
            .results
            .into_iter()
            .take(self.max_results as usize)
            .map(|r| SearchDocument {
                title: r.title,
                url: r.url,
                authors: None,
                content: r.content,
            })
            .collect();
        Ok(ToolPayload::Text(format_documents(&query, &docs)))
    }
}

static ENTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<entry>(.*?)</entry>").expect("valid entry regex"));
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title[^>]*>(.*?)</title>").expect("valid title regex"));
static ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<id>(.*?)</id>").expect("valid id regex"));
static SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<summary[^>]*>(.*?)</summary>").expect("valid summary regex")
});
static AUTHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<name>(.*?)</name>").expect("valid author regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

fn clean_text(raw: &str) -> String {
    let text = decode_entities(raw);
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

fn capture(re: &Regex, text: &str) -> String {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| clean_text(m.as_str()))
        .unwrap_or_default()
}

/// Pull entries out of an arXiv Atom feed
pub fn parse_arxiv_feed(feed: &str) -> Vec<SearchDocument> {
    ENTRY_RE
        .captures_iter(feed)
        .filter_map(|c| c.get(1))
        .map(|entry| {
            let entry = entry.as_str();
            let authors: Vec<String> = AUTHOR_RE
                .captures_iter(entry)
                .filter_map(|c| c.get(1))
                .map(|m| clean_text(m.as_str()))
                .collect();
            SearchDocument {
                title: capture(&TITLE_RE, entry),
                url: capture(&ID_RE, entry),
                authors: Some(authors.join(", ")),
                content: capture(&SUMMARY_RE, entry),
            }
        })
        .collect()
}

/// Paper search through the arXiv export API
pub struct ArxivSearchTool {
    client: reqwest::Client,
    api_url: String,
    max_docs: usize,
}

impl ArxivSearchTool {
    pub fn new(max_docs: usize) -> Self {
        Self::with_api_url(ARXIV_API, max_docs)
    }

    pub fn with_api_url(api_url: impl Into<String>, max_docs: usize) -> Self {
        Self {
            client: http_client(SEARCH_TIMEOUT),
            api_url: api_url.into(),
            max_docs,
        }
    }
}

#[async_trait]
impl ToolTrait for ArxivSearchTool {
    fn descriptor(&self) -> ToolDescriptor {
        query_descriptor(
            "arxiv_search",
            "Search arXiv and return the title, authors, URL and abstract of the top matching papers.",
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolPayload, ToolError> {
        let query = query_from(args)?;
        debug!("arXiv search: {}", query);

        let search = format!("all:{}", query);
        let limit = self.max_docs.to_string();
        let response = self
            .client
            .get(&self.api_url)
            .query(&[("search_query", search.as_str()), ("max_results", limit.as_str())])
            .send()
            .await?;
        let feed = check_status(response).await?.text().await?;

        let mut docs = parse_arxiv_feed(&feed);
        docs.truncate(self.max_docs);
        Ok(ToolPayload::Text(format_documents(&query, &docs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:transformer</title>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <title>Attention Is All
      You Need (R&#xE9;sum&#233;)</title>
    <summary>  The dominant sequence transduction models &amp; more.  </summary>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name></author>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_arxiv_feed() {
        let docs = parse_arxiv_feed(FEED);
        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert_eq!(doc.title, "Attention Is All You Need (Résumé)");
        assert_eq!(doc.url, "http://arxiv.org/abs/1706.03762v7");
        assert_eq!(doc.authors.as_deref(), Some("Ashish Vaswani, Noam Shazeer"));
        assert_eq!(doc.content, "The dominant sequence transduction models & more.");
    }

    #[test]
    fn test_format_documents() {
        let docs = vec![
            SearchDocument {
                title: "A".to_string(),
                url: "https://a".to_string(),
                authors: None,
                content: "alpha".to_string(),
            },
            SearchDocument {
                title: "B".to_string(),
                url: "https://b".to_string(),
                authors: Some("X, Y".to_string()),
                content: "beta".to_string(),
            },
        ];
        let text = format_documents("q", &docs);
        assert!(text.starts_with("*Metadata*:\nTitle: A\nURL: https://a\n\n*Content*:\nalpha"));
        assert!(text.contains("\n\n\n--------------\n\n\n*Metadata*:\nTitle: B"));
        assert!(text.contains("Authors: X, Y\n"));
    }

    #[test]
    fn test_format_no_results() {
        assert_eq!(format_documents("zzz", &[]), "No results for: zzz");
    }

    #[tokio::test]
    async fn test_tavily_without_key_not_configured() {
        let tool = TavilySearchTool::new(Some(String::new()), 3);
        let err = tool.execute(json!({"query": "rust"})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotConfigured(ref k) if k == "TAVILY_API_KEY"));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let tool = WikiSearchTool::new(3, 100);
        let err = tool.execute(json!({"query": "   "})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
