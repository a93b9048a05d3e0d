pub mod completion;
pub mod embedding;
pub mod web_search;

use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::{
	Client,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

/// One authenticated POST with the provider's hard per-call deadline. Every
/// provider call in this crate goes through here; retries, if any, belong to
/// the workflows.
pub(crate) async fn post_json(
	api_base: &str,
	path: &str,
	api_key: &str,
	default_headers: &Map<String, Value>,
	timeout_ms: u64,
	body: &Value,
) -> Result<Value> {
	let client = Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?;
	let url = format!("{api_base}{path}");
	let response = client
		.post(url)
		.headers(auth_headers(api_key, default_headers)?)
		.json(body)
		.send()
		.await?;

	Ok(response.error_for_status()?.json().await?)
}

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(eyre::eyre!("Default header values must be strings."));
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}
