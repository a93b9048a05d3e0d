use serde::{Deserialize, Serialize};

use crate::evidence::Evidence;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
	User,
	Assistant,
}

/// One message of a session's conversation. Assistant turns carry the evidence
/// that was frozen when the answer was generated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatTurn {
	pub role: ChatRole,
	pub content: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub evidence: Vec<Evidence>,
}
impl ChatTurn {
	pub fn user(content: impl Into<String>) -> Self {
		Self { role: ChatRole::User, content: content.into(), evidence: Vec::new() }
	}

	pub fn assistant(content: impl Into<String>, evidence: Vec<Evidence>) -> Self {
		Self { role: ChatRole::Assistant, content: content.into(), evidence }
	}
}
