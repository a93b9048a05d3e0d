use color_eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebSearchResult {
	pub title: String,
	pub url: String,
	pub snippet: String,
	pub score: f32,
	pub fetched_date: String,
}

/// One call to the external web-search provider with a hard per-call deadline.
/// Never retries; callers degrade to an empty result set on failure.
pub async fn search(
	cfg: &nuri_config::WebSearchProviderConfig,
	query: &str,
	max_results: u32,
) -> Result<Vec<WebSearchResult>> {
	let body = serde_json::json!({
		"query": query,
		"max_results": max_results,
		"search_depth": "advanced",
	});
	let response = crate::post_json(
		&cfg.api_base,
		&cfg.path,
		&cfg.api_key,
		&cfg.default_headers,
		cfg.timeout_ms,
		&body,
	)
	.await?;
	let fetched_date = today();

	parse_search_response(&response, &fetched_date)
}

fn parse_search_response(response: &Value, fetched_date: &str) -> Result<Vec<WebSearchResult>> {
	let results = response
		.get("results")
		.and_then(Value::as_array)
		.ok_or_else(|| eyre::eyre!("Web search response is missing results array."))?;
	let mut out = Vec::with_capacity(results.len());

	for item in results {
		let url = item.get("url").and_then(Value::as_str).unwrap_or_default();

		if url.is_empty() {
			continue;
		}

		out.push(WebSearchResult {
			title: item.get("title").and_then(Value::as_str).unwrap_or_default().to_string(),
			url: url.to_string(),
			snippet: item.get("content").and_then(Value::as_str).unwrap_or_default().to_string(),
			score: item.get("score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
			fetched_date: fetched_date.to_string(),
		});
	}

	Ok(out)
}

fn today() -> String {
	let format = time::macros::format_description!("[year]-[month]-[day]");

	OffsetDateTime::now_utc().date().format(&format).unwrap_or_default()
}
