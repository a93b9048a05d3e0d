use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, NuriService, Result};
use nuri_domain::policy::PolicyContext;
use nuri_storage::qdrant::ChunkFilter;

/// Hard cap on the number of chunks materialized into a session context.
const MAX_CONTEXT_CHUNKS: usize = 1_000;

#[derive(Clone, Debug, Deserialize)]
pub struct InitPolicyRequest {
	pub session_id: String,
	pub policy_id: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct InitPolicyResponse {
	pub session_id: String,
	pub policy_id: i64,
	pub status: String,
	pub documents_count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct WarmIndexReport {
	pub indexed_chunks: usize,
}

impl NuriService {
	/// Materializes the full document set of one policy into the session
	/// cache. A failure on either store leaves no partial context behind.
	pub async fn init_policy(&self, req: InitPolicyRequest) -> Result<InitPolicyResponse> {
		if req.session_id.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "session_id must be non-empty.".to_string() });
		}

		let record = self.db.get_policy(req.policy_id).await?.ok_or_else(|| Error::NotFound {
			message: format!("Policy {} does not exist.", req.policy_id),
		})?;
		let filter = ChunkFilter { policy_id: Some(req.policy_id), ..Default::default() };
		let mut documents = self.qdrant.scroll(&filter, MAX_CONTEXT_CHUNKS).await?;

		documents.sort_by_key(|chunk| chunk.chunk_index);

		let documents_count = documents.len();
		let context = PolicyContext {
			policy_id: req.policy_id,
			policy: record.info(),
			documents,
			cached_at: OffsetDateTime::now_utc(),
		};

		self.caches.policy.set(&req.session_id, context);

		tracing::info!(
			session_id = %req.session_id,
			policy_id = req.policy_id,
			documents_count,
			"Policy context cached."
		);

		Ok(InitPolicyResponse {
			session_id: req.session_id,
			policy_id: req.policy_id,
			status: "initialized".to_string(),
			documents_count,
		})
	}

	/// Backs the `/policy/<id>` links carried by internal evidence.
	pub async fn policy_detail(&self, policy_id: i64) -> Result<nuri_domain::policy::PolicyRecord> {
		self.db.get_policy(policy_id).await?.ok_or_else(|| Error::NotFound {
			message: format!("Policy {policy_id} does not exist."),
		})
	}

	/// Admin pre-warm for the lazily built BM25 index, so the first search
	/// does not pay the build cost.
	pub async fn warm_sparse_index(&self) -> Result<WarmIndexReport> {
		let index = self.sparse_index().await?;

		Ok(WarmIndexReport { indexed_chunks: index.len() })
	}
}
