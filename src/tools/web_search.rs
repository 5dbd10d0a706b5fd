//! Web search tool
//!
//! Backed by the DuckDuckGo Instant Answer API (unauthenticated GET
//! returning JSON). Results are capped at five and rendered as a
//! title/snippet/source block stamped with the query time.

use super::{banner, parse_args, query_time, Tool, TOOL_TIMEOUT};
use crate::Result;
use serde::Deserialize;
use serde_json::Value;

const SEARCH_ENDPOINT: &str = "https://api.duckduckgo.com/";
const MAX_RESULTS: usize = 5;

#[derive(Debug, Deserialize)]
struct SearchArgs {
    /// The search query to find exchange rates, news, or economic data.
    query: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "Heading", default)]
    heading: String,
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<Topic>,
}

#[derive(Debug, Deserialize)]
struct Topic {
    #[serde(rename = "Text")]
    text: Option<String>,
    #[serde(rename = "FirstURL")]
    first_url: Option<String>,
    // Category groups nest their entries one level down.
    #[serde(rename = "Topics", default)]
    topics: Vec<Topic>,
}

struct SearchHit {
    title: String,
    snippet: String,
    link: String,
}

pub struct WebSearchTool {
    client: reqwest::Client,
    endpoint: String,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self::with_endpoint(SEARCH_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(TOOL_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            endpoint: endpoint.to_string(),
        }
    }

    async fn search(&self, query: &str) -> String {
        let request = self.client.get(&self.endpoint).query(&[
            ("q", query),
            ("format", "json"),
            ("no_html", "1"),
        ]);

        let response: SearchResponse = match request.send().await {
            Ok(response) => match response.error_for_status() {
                Ok(response) => match response.json().await {
                    Ok(body) => body,
                    Err(e) => return format!("Error performing search: {}", e),
                },
                Err(e) => return format!("Error performing search: {}", e),
            },
            Err(e) => return format!("Error performing search: {}", e),
        };

        let hits = collect_hits(&response);
        if hits.is_empty() {
            return "No results found for the query.".to_string();
        }

        let mut output = Vec::new();
        output.push(format!("Search performed on: {}\n", query_time()));
        output.push(format!("Query: {}\n", query));
        output.push(format!("{}\n", banner()));

        for (idx, hit) in hits.iter().enumerate() {
            output.push(format!("\nResult {}:", idx + 1));
            output.push(format!("Title: {}", hit.title));
            output.push(format!("Snippet: {}", hit.snippet));
            output.push(format!("Source: {}", hit.link));
            output.push("-".repeat(80));
        }

        output.join("\n")
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> &'static str {
        "Useful for searching the internet to find real-time information, \
         current USD/MXN exchange rates, and banking fees. Returns recent \
         search results. Input: query (required)."
    }

    async fn invoke(&self, args: Value) -> Result<String> {
        let args: SearchArgs = parse_args(self.name(), args)?;
        Ok(self.search(&args.query).await)
    }
}

fn collect_hits(response: &SearchResponse) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    if !response.abstract_text.is_empty() {
        hits.push(SearchHit {
            title: if response.heading.is_empty() {
                "No title".to_string()
            } else {
                response.heading.clone()
            },
            snippet: response.abstract_text.clone(),
            link: if response.abstract_url.is_empty() {
                "No link".to_string()
            } else {
                response.abstract_url.clone()
            },
        });
    }

    flatten_topics(&response.related_topics, &mut hits);
    hits.truncate(MAX_RESULTS);
    hits
}

fn flatten_topics(topics: &[Topic], hits: &mut Vec<SearchHit>) {
    for topic in topics {
        if hits.len() >= MAX_RESULTS {
            return;
        }
        match (&topic.text, &topic.first_url) {
            (Some(text), Some(url)) if !text.is_empty() => {
                let title = text.split(" - ").next().unwrap_or(text);
                hits.push(SearchHit {
                    title: title.to_string(),
                    snippet: text.clone(),
                    link: url.clone(),
                });
            }
            _ => flatten_topics(&topic.topics, hits),
        }
    }
}
