use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

/// A policy/grant record from the metadata store. Immutable after ingestion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyRecord {
	pub id: i64,
	pub program_name: String,
	pub region: String,
	pub category: String,
	pub program_overview: String,
	pub apply_target: String,
	pub support_description: String,
	pub url: Option<String>,
	pub contact_agency: Option<String>,
	pub application_deadline: Option<String>,
	/// Ingestion-specific overflow attributes.
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub extras: Map<String, Value>,
}
impl PolicyRecord {
	pub fn info(&self) -> PolicyInfo {
		PolicyInfo {
			name: self.program_name.clone(),
			overview: self.program_overview.clone(),
			apply_target: self.apply_target.clone(),
			support_description: self.support_description.clone(),
		}
	}
}

/// The per-session cached subset of a [`PolicyRecord`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PolicyInfo {
	pub name: String,
	pub overview: String,
	pub apply_target: String,
	pub support_description: String,
}
impl PolicyInfo {
	pub fn is_empty(&self) -> bool {
		self.name.trim().is_empty()
	}
}

/// A text segment of a policy document, the unit of retrieval. Vectors stay in the vector store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentChunk {
	pub chunk_id: Uuid,
	pub policy_id: i64,
	pub chunk_index: i32,
	pub doc_type: String,
	pub content: String,
}

/// The per-session materialized view created by init-policy.
#[derive(Clone, Debug)]
pub struct PolicyContext {
	pub policy_id: i64,
	pub policy: PolicyInfo,
	pub documents: Vec<DocumentChunk>,
	pub cached_at: OffsetDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
	Dense,
	Sparse,
	Hybrid,
}

/// A policy-level search hit after fusion, carrying its best-matching chunk.
#[derive(Clone, Debug, Serialize)]
pub struct SearchHit {
	pub policy_id: i64,
	pub score: f32,
	pub match_kind: MatchKind,
	pub matched_excerpt: String,
	pub chunk_index: i32,
	pub doc_type: String,
}
