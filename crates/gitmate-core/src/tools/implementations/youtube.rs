//! Video search tool (YouTube Data API v3)

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::constants::youtube;
use crate::error::ToolInvocationError;
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct SearchVideosTool {
    http: reqwest::Client,
    api_key: String,
    search_url: String,
}

impl SearchVideosTool {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            search_url: youtube::SEARCH_URL.to_string(),
        }
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }
}

#[derive(Deserialize)]
struct Params {
    query: String,
    #[serde(default)]
    max_results: Option<u64>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: VideoId,
    snippet: Snippet,
}

#[derive(Deserialize)]
struct VideoId {
    #[serde(rename = "videoId", default)]
    video_id: Option<String>,
}

#[derive(Deserialize)]
struct Snippet {
    title: String,
    #[serde(rename = "channelTitle", default)]
    channel_title: String,
}

fn service_error(msg: impl std::fmt::Display) -> ToolResult {
    ToolResult::from_error(&ToolInvocationError::Service(msg.to_string()))
}

#[async_trait]
impl Tool for SearchVideosTool {
    fn name(&self) -> &str {
        "search_videos"
    }

    fn description(&self) -> &str {
        "Search YouTube for videos, e.g. tutorials about a library used in the repository. Returns title, channel and URL for each video."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for"
                },
                "max_results": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Number of videos to return (default 5, max 25)"
                }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let query = params.query.trim();
        if query.is_empty() {
            return ToolResult::error("Invalid parameters: query must not be empty");
        }
        let max_results = params
            .max_results
            .unwrap_or(youtube::DEFAULT_RESULTS)
            .clamp(1, youtube::MAX_RESULTS);

        let max_results = max_results.to_string();

        let response = match self
            .http
            .get(&self.search_url)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("q", query),
                ("maxResults", max_results.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return service_error(format!("Video search failed: {}", e)),
        };

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(status = %status, "Video search rejected");
            return service_error(format!("Video search returned {}", status));
        }

        let body: SearchResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => return service_error(format!("Unexpected video search response: {}", e)),
        };

        let videos: Vec<Value> = body
            .items
            .into_iter()
            .filter_map(|item| {
                let id = item.id.video_id?;
                let url = Url::parse_with_params(youtube::WATCH_URL, &[("v", id.as_str())]).ok()?;
                Some(json!({
                    "title": item.snippet.title,
                    "channel": item.snippet.channel_title,
                    "url": url.as_str(),
                }))
            })
            .collect();

        ToolResult::success_data(json!({ "query": query, "videos": videos }))
    }
}
