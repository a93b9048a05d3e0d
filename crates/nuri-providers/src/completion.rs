use color_eyre::{Result, eyre};
use serde_json::Value;

/// One chat-completion call. The answer is returned as raw text; citation
/// tokens embedded by the model are not post-processed here.
pub async fn complete(cfg: &nuri_config::LlmProviderConfig, messages: &[Value]) -> Result<String> {
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
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

	answer_text(&response)
}

fn answer_text(response: &Value) -> Result<String> {
	response
		.get("choices")
		.and_then(Value::as_array)
		.and_then(|choices| choices.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|message| message.get("content"))
		.and_then(Value::as_str)
		.map(str::to_string)
		.ok_or_else(|| eyre::eyre!("Completion response is missing message content."))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_the_first_choice_content() {
		let response = serde_json::json!({
			"choices": [
				{ "message": { "role": "assistant", "content": "지원 금액은 최대 8억원입니다 [정책문서 1]." } }
			]
		});

		assert_eq!(
			answer_text(&response).expect("Expected answer text."),
			"지원 금액은 최대 8억원입니다 [정책문서 1]."
		);
	}

	#[test]
	fn rejects_a_payload_without_choices() {
		let response = serde_json::json!({ "choices": [] });

		assert!(answer_text(&response).is_err());
	}
}
