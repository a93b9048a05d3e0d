use color_eyre::{Result, eyre};
use serde_json::Value;

/// Embeds `texts` in one batch. The response is validated against the request:
/// one vector per input, every vector at the configured dimensionality, with
/// provider-reported indices deciding the slot each vector lands in.
pub async fn embed(
	cfg: &nuri_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	if texts.is_empty() {
		return Ok(Vec::new());
	}

	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
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

	collect_vectors(&response, texts.len(), cfg.dimensions as usize)
}

fn collect_vectors(
	response: &Value,
	expected_count: usize,
	expected_dim: usize,
) -> Result<Vec<Vec<f32>>> {
	let items = response
		.get("data")
		.and_then(Value::as_array)
		.ok_or_else(|| eyre::eyre!("Embedding response is missing its data array."))?;

	if items.len() != expected_count {
		return Err(eyre::eyre!(
			"Embedding response carries {} vectors for {expected_count} inputs.",
			items.len()
		));
	}

	let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected_count];

	for (position, item) in items.iter().enumerate() {
		let slot = item
			.get("index")
			.and_then(Value::as_u64)
			.map(|index| index as usize)
			.unwrap_or(position);
		let Some(target) = slots.get_mut(slot) else {
			return Err(eyre::eyre!("Embedding index {slot} is out of range."));
		};

		if target.is_some() {
			return Err(eyre::eyre!("Embedding index {slot} appears twice."));
		}

		let vector = item
			.get("embedding")
			.and_then(Value::as_array)
			.ok_or_else(|| eyre::eyre!("Embedding item {slot} is missing its vector."))?
			.iter()
			.map(|component| component.as_f64().map(|value| value as f32))
			.collect::<Option<Vec<f32>>>()
			.ok_or_else(|| eyre::eyre!("Embedding item {slot} holds a non-numeric component."))?;

		if vector.len() != expected_dim {
			return Err(eyre::eyre!(
				"Embedding item {slot} has {} dimensions, expected {expected_dim}.",
				vector.len()
			));
		}

		*target = Some(vector);
	}

	slots
		.into_iter()
		.map(|slot| slot.ok_or_else(|| eyre::eyre!("Embedding response left a slot unfilled.")))
		.collect()
}
