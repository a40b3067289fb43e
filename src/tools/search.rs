//! Web search through the Brave Search API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{ParamType, Tool, ToolArgs, ToolError, ToolHandler, ToolParam};
use crate::Result;

const SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const RESULT_COUNT: &str = "5";

const SETUP_INSTRUCTIONS: &str = "\
1. Visit https://brave.com/search/api/
2. Sign up for a free or paid Brave Search API subscription
3. Create a new API key in your dashboard
4. Set it as BRAVE_SEARCH_API_TOKEN in your environment or as tools.brave_api_token in config.toml";

/// Build the `brave_search` tool
///
/// Without a token the tool still registers; it then tells the user how to
/// configure search instead of searching.
///
/// # Errors
///
/// Returns error if the HTTP client cannot be built
pub fn tool(token: Option<String>, timeout: Duration) -> Result<Tool> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Tool::new(
        "brave_search",
        BraveSearchTool {
            client,
            token: token.filter(|t| !t.trim().is_empty()),
        },
    ))
}

struct BraveSearchTool {
    client: Client,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BraveSearchResponse {
    web: Option<BraveWebResults>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResults {
    #[serde(default)]
    results: Vec<BraveResult>,
}

/// Single web result
#[derive(Debug, Deserialize)]
pub struct BraveResult {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[async_trait]
impl ToolHandler for BraveSearchTool {
    fn doc(&self) -> &str {
        "Search the web using Brave Search and return a summary of the most relevant results."
    }

    fn params(&self) -> Vec<ToolParam> {
        vec![ToolParam::required("query", ParamType::String).describe("The search query")]
    }

    async fn call(&self, args: ToolArgs) -> std::result::Result<String, ToolError> {
        let query = args.str("query")?;

        let Some(token) = &self.token else {
            return Ok(setup_message(
                "Brave Search is not yet configured on this system",
            ));
        };

        let response = self
            .client
            .get(SEARCH_URL)
            .header("X-Subscription-Token", token)
            .header("Accept", "application/json")
            .query(&[
                ("q", query),
                ("count", RESULT_COUNT),
                ("text_decorations", "false"),
            ])
            .send()
            .await
            .map_err(|e| ToolError::Failed(format!("search request failed: {e}")))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("Brave Search rejected the API token");
            return Ok(setup_message("the Brave Search API token is invalid"));
        }

        let response = response
            .error_for_status()
            .map_err(|e| ToolError::Failed(format!("search failed: {e}")))?;

        let body: BraveSearchResponse = response
            .json()
            .await
            .map_err(|e| ToolError::Failed(format!("invalid search response: {e}")))?;

        let results = body.web.map(|w| w.results).unwrap_or_default();
        tracing::debug!(query, results = results.len(), "search complete");
        Ok(format_results(query, &results))
    }
}

/// Summarize results, one `- title: description` entry per result
#[must_use]
pub fn format_results(query: &str, results: &[BraveResult]) -> String {
    if results.is_empty() {
        return format!("No results found for: {query}");
    }

    results
        .iter()
        .map(|r| format!("- {}: {}", r.title, r.description))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Instruction for the model to relay setup steps instead of answering
#[must_use]
pub fn setup_message(reason: &str) -> String {
    format!(
        "IMPORTANT: Do not provide information from your knowledge base. \
         I cannot search the web because {reason}. \
         You must respond to the user with this message:\n\n\
         I apologize, but I cannot search the web for this information right now. \
         To enable web searching, you'll need to set up Brave Search first. \
         Here are the steps:\n{SETUP_INSTRUCTIONS}\n\n\
         Once you've completed these steps, I'll be able to search the web for you."
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_format_results() {
        let results = vec![
            BraveResult {
                title: "Rust".to_string(),
                description: "A language".to_string(),
            },
            BraveResult {
                title: "Cargo".to_string(),
                description: "The package manager".to_string(),
            },
        ];
        assert_eq!(
            format_results("rust", &results),
            "- Rust: A language\n\n- Cargo: The package manager"
        );
        assert_eq!(format_results("nothing", &[]), "No results found for: nothing");
    }

    #[test]
    fn test_response_without_web_section() {
        let body: BraveSearchResponse = serde_json::from_value(json!({"query": {}})).unwrap();
        assert!(body.web.is_none());
    }

    #[tokio::test]
    async fn test_missing_token_returns_setup_message() {
        let tool = tool(None, Duration::from_secs(5)).unwrap();
        let args = ToolArgs::from_json(r#"{"query": "news"}"#).unwrap();

        let reply = tool.invoke(args).await.unwrap();
        assert!(reply.contains("not yet configured"));
        assert!(reply.contains("BRAVE_SEARCH_API_TOKEN"));
    }

    #[tokio::test]
    async fn test_blank_token_treated_as_missing() {
        let tool = tool(Some("  ".to_string()), Duration::from_secs(5)).unwrap();
        let args = ToolArgs::from_json(r#"{"query": "news"}"#).unwrap();
        assert!(tool.invoke(args).await.unwrap().contains("not yet configured"));
    }
}
