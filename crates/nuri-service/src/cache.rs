use std::{
	collections::{HashMap, VecDeque},
	sync::{Arc, RwLock},
	time::Duration as StdDuration,
};

use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;

use nuri_domain::{chat::ChatTurn, policy::PolicyContext};

/// The two per-session stores: bounded chat history and the materialized
/// policy context. Cheap to clone; clones share the underlying maps.
#[derive(Clone)]
pub struct SessionCaches {
	pub chat: ChatCache,
	pub policy: PolicyContextCache,
}
impl SessionCaches {
	pub fn new(max_history_turns: usize) -> Self {
		Self { chat: ChatCache::new(max_history_turns), policy: PolicyContextCache::new() }
	}

	pub fn clear_session(&self, session_id: &str) {
		self.chat.clear(session_id);
		self.policy.clear(session_id);
	}

	/// Removes entries untouched for longer than `ttl`. Returns how many
	/// entries were dropped across both caches.
	pub fn sweep_expired(&self, ttl: Duration, now: OffsetDateTime) -> usize {
		self.chat.sweep_expired(ttl, now) + self.policy.sweep_expired(ttl, now)
	}

	pub fn stats(&self) -> CacheStats {
		let chat_sessions = self.chat.len();
		let (policy_sessions, cached_documents) = self.policy.stats();

		CacheStats { chat_sessions, policy_sessions, cached_documents }
	}
}

#[derive(Debug, Serialize)]
pub struct CacheStats {
	pub chat_sessions: usize,
	pub policy_sessions: usize,
	pub cached_documents: usize,
}

struct ChatEntry {
	turns: VecDeque<ChatTurn>,
	touched_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct ChatCache {
	max_messages: usize,
	inner: Arc<RwLock<HashMap<String, ChatEntry>>>,
}
impl ChatCache {
	fn new(max_history_turns: usize) -> Self {
		// One turn is a user/assistant message pair.
		Self { max_messages: max_history_turns * 2, inner: Arc::new(RwLock::new(HashMap::new())) }
	}

	pub fn append(&self, session_id: &str, turn: ChatTurn) {
		let mut inner = self.inner.write().unwrap_or_else(|err| err.into_inner());
		let now = OffsetDateTime::now_utc();
		let entry = inner
			.entry(session_id.to_string())
			.or_insert_with(|| ChatEntry { turns: VecDeque::new(), touched_at: now });

		entry.turns.push_back(turn);

		while entry.turns.len() > self.max_messages {
			entry.turns.pop_front();
		}

		entry.touched_at = now;
	}

	/// Snapshot copy of the session history in insertion order. Callers own
	/// the copy; mutating it never affects the cache.
	pub fn history(&self, session_id: &str) -> Vec<ChatTurn> {
		let inner = self.inner.read().unwrap_or_else(|err| err.into_inner());

		inner.get(session_id).map(|entry| entry.turns.iter().cloned().collect()).unwrap_or_default()
	}

	pub fn clear(&self, session_id: &str) {
		let mut inner = self.inner.write().unwrap_or_else(|err| err.into_inner());

		inner.remove(session_id);
	}

	pub fn len(&self) -> usize {
		let inner = self.inner.read().unwrap_or_else(|err| err.into_inner());

		inner.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn sweep_expired(&self, ttl: Duration, now: OffsetDateTime) -> usize {
		let mut inner = self.inner.write().unwrap_or_else(|err| err.into_inner());
		let before = inner.len();

		inner.retain(|_, entry| now - entry.touched_at <= ttl);

		before - inner.len()
	}
}

struct PolicyEntry {
	context: PolicyContext,
	touched_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct PolicyContextCache {
	inner: Arc<RwLock<HashMap<String, PolicyEntry>>>,
}
impl PolicyContextCache {
	fn new() -> Self {
		Self { inner: Arc::new(RwLock::new(HashMap::new())) }
	}

	/// Overwrites any prior context for this session.
	pub fn set(&self, session_id: &str, context: PolicyContext) {
		let mut inner = self.inner.write().unwrap_or_else(|err| err.into_inner());

		inner.insert(
			session_id.to_string(),
			PolicyEntry { context, touched_at: OffsetDateTime::now_utc() },
		);
	}

	/// Absent is not an error; workflows that require a context fail closed on
	/// `None`.
	pub fn get(&self, session_id: &str) -> Option<PolicyContext> {
		let inner = self.inner.read().unwrap_or_else(|err| err.into_inner());

		inner.get(session_id).map(|entry| entry.context.clone())
	}

	pub fn clear(&self, session_id: &str) {
		let mut inner = self.inner.write().unwrap_or_else(|err| err.into_inner());

		inner.remove(session_id);
	}

	fn stats(&self) -> (usize, usize) {
		let inner = self.inner.read().unwrap_or_else(|err| err.into_inner());
		let documents = inner.values().map(|entry| entry.context.documents.len()).sum();

		(inner.len(), documents)
	}

	fn sweep_expired(&self, ttl: Duration, now: OffsetDateTime) -> usize {
		let mut inner = self.inner.write().unwrap_or_else(|err| err.into_inner());
		let before = inner.len();

		inner.retain(|_, entry| now - entry.touched_at <= ttl);

		before - inner.len()
	}
}

/// Background TTL sweep. The TTL is a safety net for clients that never call
/// cleanup; the normal lifecycle is an explicit clear on session end.
pub fn spawn_ttl_sweeper(caches: SessionCaches, cfg: &nuri_config::Cache) -> JoinHandle<()> {
	let interval = StdDuration::from_secs(cfg.sweep_interval_seconds);
	let ttl = Duration::seconds(cfg.ttl_seconds.min(i64::MAX as u64) as i64);

	tokio::spawn(async move {
		loop {
			tokio::time::sleep(interval).await;

			let removed = caches.sweep_expired(ttl, OffsetDateTime::now_utc());

			if removed > 0 {
				tracing::info!(removed, "Expired session cache entries swept.");
			}
		}
	})
}
