use std::collections::HashMap;

use qdrant_client::qdrant::{
	Condition, Filter, PointId, Query, QueryPointsBuilder, RetrievedPoint, ScoredPoint,
	ScrollPointsBuilder, point_id::PointIdOptions, value::Kind, Value,
};
use uuid::Uuid;

use crate::{Error, Result};
use nuri_domain::policy::DocumentChunk;

pub const DENSE_VECTOR_NAME: &str = "dense";

const SCROLL_BATCH: u32 = 256;

/// Equality filters over chunk payload fields.
#[derive(Clone, Debug, Default)]
pub struct ChunkFilter {
	pub policy_id: Option<i64>,
	pub region: Option<String>,
	pub category: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ScoredChunk {
	pub chunk: DocumentChunk,
	pub score: f32,
}

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &nuri_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url)
			.timeout(std::time::Duration::from_millis(cfg.timeout_ms))
			.build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Top-k cosine search over the dense vector, sorted descending by score,
	/// each hit at or above `min_score`.
	pub async fn dense_search(
		&self,
		query_vec: &[f32],
		k: u32,
		filter: &ChunkFilter,
		min_score: f32,
	) -> Result<Vec<ScoredChunk>> {
		if query_vec.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Query vector dimension {} does not match collection dimension {}.",
				query_vec.len(),
				self.vector_dim
			)));
		}

		let mut request = QueryPointsBuilder::new(&self.collection)
			.query(Query::new_nearest(query_vec.to_vec()))
			.using(DENSE_VECTOR_NAME)
			.limit(k as u64)
			.score_threshold(min_score)
			.with_payload(true);

		if let Some(filter) = to_filter(filter) {
			request = request.filter(filter);
		}

		let response = self.client.query(request).await?;

		Ok(response.result.into_iter().filter_map(scored_point_to_chunk).collect())
	}

	/// Returns up to `limit` chunks matching the filter, without vectors.
	/// Paginates internally; ordering is whatever the store yields.
	pub async fn scroll(&self, filter: &ChunkFilter, limit: usize) -> Result<Vec<DocumentChunk>> {
		let mut chunks = Vec::new();
		let mut offset: Option<PointId> = None;

		while chunks.len() < limit {
			let batch = SCROLL_BATCH.min((limit - chunks.len()) as u32);
			let mut request = ScrollPointsBuilder::new(&self.collection)
				.limit(batch)
				.with_payload(true)
				.with_vectors(false);

			if let Some(filter) = to_filter(filter) {
				request = request.filter(filter);
			}
			if let Some(offset) = offset.take() {
				request = request.offset(offset);
			}

			let response = self.client.scroll(request).await?;

			chunks.extend(response.result.into_iter().filter_map(retrieved_point_to_chunk));

			match response.next_page_offset {
				Some(next) => offset = Some(next),
				None => break,
			}
		}

		Ok(chunks)
	}
}

fn to_filter(filter: &ChunkFilter) -> Option<Filter> {
	let mut must = Vec::new();

	if let Some(policy_id) = filter.policy_id {
		must.push(Condition::matches("policy_id", policy_id));
	}
	if let Some(region) = &filter.region {
		must.push(Condition::matches("region", region.clone()));
	}
	if let Some(category) = &filter.category {
		must.push(Condition::matches("category", category.clone()));
	}

	if must.is_empty() { None } else { Some(Filter::must(must)) }
}

fn scored_point_to_chunk(point: ScoredPoint) -> Option<ScoredChunk> {
	let chunk_id = point.id.and_then(point_id_to_uuid)?;
	let chunk = payload_to_chunk(chunk_id, &point.payload)?;

	Some(ScoredChunk { chunk, score: point.score })
}

fn retrieved_point_to_chunk(point: RetrievedPoint) -> Option<DocumentChunk> {
	let chunk_id = point.id.and_then(point_id_to_uuid)?;

	payload_to_chunk(chunk_id, &point.payload)
}

fn point_id_to_uuid(id: PointId) -> Option<Uuid> {
	match id.point_id_options? {
		PointIdOptions::Uuid(raw) => Uuid::parse_str(&raw).ok(),
		PointIdOptions::Num(num) => Some(Uuid::from_u128(num as u128)),
	}
}

fn payload_to_chunk(chunk_id: Uuid, payload: &HashMap<String, Value>) -> Option<DocumentChunk> {
	let policy_id = payload_i64(payload, "policy_id")?;
	let content = payload_str(payload, "content")?;

	Some(DocumentChunk {
		chunk_id,
		policy_id,
		chunk_index: payload_i64(payload, "chunk_index").unwrap_or(0) as i32,
		doc_type: payload_str(payload, "doc_type").unwrap_or_default(),
		content,
	})
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	match payload.get(key)?.kind.as_ref()? {
		Kind::StringValue(value) => Some(value.clone()),
		_ => None,
	}
}

fn payload_i64(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
	match payload.get(key)?.kind.as_ref()? {
		Kind::IntegerValue(value) => Some(*value),
		Kind::DoubleValue(value) => Some(*value as i64),
		_ => None,
	}
}
