use serde::{Deserialize, Serialize};

use crate::NuriService;

#[derive(Clone, Debug, Deserialize)]
pub struct CleanupRequest {
	pub session_id: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct CleanupResponse {
	pub session_id: String,
	pub status: String,
}

impl NuriService {
	/// Drops both caches for the session. Idempotent; clearing an unknown
	/// session is a no-op.
	pub fn cleanup(&self, req: CleanupRequest) -> CleanupResponse {
		self.caches.clear_session(&req.session_id);

		tracing::info!(session_id = %req.session_id, "Session caches cleared.");

		CleanupResponse { session_id: req.session_id, status: "cleaned".to_string() }
	}
}
