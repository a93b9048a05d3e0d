use serde::{Deserialize, Serialize};

use crate::{Error, NuriService, Providers, Result, SessionCaches, prompt};
use nuri_config::Config;
use nuri_domain::{
	chat::ChatTurn,
	evidence::{Evidence, citations_are_valid},
	policy::{DocumentChunk, PolicyInfo},
};
use nuri_providers::web_search::WebSearchResult;

/// Queries with fewer cached documents than this are treated as insufficient.
const MIN_SUFFICIENT_DOCS: usize = 3;
/// Homepage/link-like requests that slip past the classifier still trigger a
/// web supplement.
const HOMEPAGE_KEYWORDS: [&str; 7] =
	["홈페이지", "주소", "사이트", "링크", "url", "homepage", "website"];

#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
	pub session_id: String,
	pub message: String,
	pub policy_id: Option<i64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatResponse {
	pub session_id: String,
	pub answer: String,
	pub evidence: Vec<Evidence>,
	pub web_sources: Vec<WebSearchResult>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryType {
	PolicyQa,
	WebOnly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum QaError {
	PolicyNotInitialized,
}

/// Request-local workflow state. Nodes consume and return it; nothing here is
/// shared across requests.
pub(crate) struct QaState {
	pub session_id: String,
	pub policy_id: Option<i64>,
	pub current_query: String,
	pub messages: Vec<ChatTurn>,
	pub query_type: QueryType,
	pub policy_info: PolicyInfo,
	pub retrieved_docs: Vec<DocumentChunk>,
	pub web_sources: Vec<WebSearchResult>,
	pub answer: String,
	pub evidence: Vec<Evidence>,
	pub need_web_search: bool,
	pub error: Option<QaError>,
}
impl QaState {
	fn new(req: &ChatRequest, messages: Vec<ChatTurn>) -> Self {
		Self {
			session_id: req.session_id.clone(),
			policy_id: req.policy_id,
			current_query: req.message.clone(),
			messages,
			query_type: QueryType::PolicyQa,
			policy_info: PolicyInfo::default(),
			retrieved_docs: Vec::new(),
			web_sources: Vec::new(),
			answer: String::new(),
			evidence: Vec::new(),
			need_web_search: false,
			error: None,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QaNode {
	ClassifyQueryType,
	LoadCachedDocs,
	CheckSufficiency,
	WebSearchOnly,
	WebSearchSupplement,
	AnswerDocsOnly,
	AnswerWebOnly,
	AnswerHybrid,
}

/// The transition table. A set error short-circuits to END regardless of the
/// current node.
fn next_node(current: QaNode, state: &QaState) -> Option<QaNode> {
	if state.error.is_some() {
		return None;
	}

	match current {
		QaNode::ClassifyQueryType if state.query_type == QueryType::WebOnly =>
			Some(QaNode::WebSearchOnly),
		QaNode::ClassifyQueryType => Some(QaNode::LoadCachedDocs),
		QaNode::LoadCachedDocs => Some(QaNode::CheckSufficiency),
		QaNode::CheckSufficiency if state.need_web_search => Some(QaNode::WebSearchSupplement),
		QaNode::CheckSufficiency => Some(QaNode::AnswerDocsOnly),
		QaNode::WebSearchOnly => Some(QaNode::AnswerWebOnly),
		QaNode::WebSearchSupplement => Some(QaNode::AnswerHybrid),
		QaNode::AnswerDocsOnly | QaNode::AnswerWebOnly | QaNode::AnswerHybrid => None,
	}
}

/// One QA run over the shared caches. Constructed per request; holds no state
/// of its own.
pub(crate) struct QaWorkflow<'a> {
	pub cfg: &'a Config,
	pub caches: &'a SessionCaches,
	pub providers: &'a Providers,
}
impl QaWorkflow<'_> {
	pub(crate) async fn run(&self, mut state: QaState) -> QaState {
		let mut node = QaNode::ClassifyQueryType;

		loop {
			state = self.run_node(node, state).await;

			match next_node(node, &state) {
				Some(next) => node = next,
				None => break,
			}
		}

		state
	}

	async fn run_node(&self, node: QaNode, state: QaState) -> QaState {
		match node {
			QaNode::ClassifyQueryType => self.classify_query_type(state),
			QaNode::LoadCachedDocs => self.load_cached_docs(state),
			QaNode::CheckSufficiency => self.check_sufficiency(state),
			QaNode::WebSearchOnly => self.web_search(state, true).await,
			QaNode::WebSearchSupplement => self.web_search(state, false).await,
			QaNode::AnswerDocsOnly => self.answer_docs_only(state).await,
			QaNode::AnswerWebOnly => self.answer_web_only(state).await,
			QaNode::AnswerHybrid => self.answer_hybrid(state).await,
		}
	}

	fn classify_query_type(&self, mut state: QaState) -> QaState {
		state.query_type =
			classify_query_type(&state.current_query, &self.cfg.chat.web_only_keywords);
		state.need_web_search = false;

		tracing::info!(
			session_id = %state.session_id,
			query_type = ?state.query_type,
			"Query type classified."
		);

		state
	}

	fn load_cached_docs(&self, mut state: QaState) -> QaState {
		let Some(context) = self.caches.policy.get(&state.session_id) else {
			tracing::warn!(session_id = %state.session_id, "Policy context cache miss.");

			state.error = Some(QaError::PolicyNotInitialized);

			return state;
		};

		tracing::info!(
			session_id = %state.session_id,
			policy_id = context.policy_id,
			documents_count = context.documents.len(),
			"Documents loaded from cache."
		);

		state.policy_id = Some(context.policy_id);
		state.policy_info = context.policy;
		state.retrieved_docs = context.documents;

		state
	}

	fn check_sufficiency(&self, mut state: QaState) -> QaState {
		state.need_web_search = needs_web_supplement(
			&state.current_query,
			&state.policy_info,
			state.retrieved_docs.len(),
		);

		tracing::info!(
			session_id = %state.session_id,
			need_web_search = state.need_web_search,
			documents_count = state.retrieved_docs.len(),
			"Sufficiency checked."
		);

		state
	}

	async fn web_search(&self, mut state: QaState, load_context: bool) -> QaState {
		// The WEB_ONLY branch skips load_cached_docs, but the search query is
		// built from the cached policy name, so the context is still required.
		if load_context {
			let Some(context) = self.caches.policy.get(&state.session_id) else {
				tracing::warn!(session_id = %state.session_id, "Policy context cache miss.");

				state.error = Some(QaError::PolicyNotInitialized);

				return state;
			};

			state.policy_id = Some(context.policy_id);
			state.policy_info = context.policy;
		}

		let query = if state.policy_info.name.trim().is_empty() {
			state.current_query.clone()
		} else {
			format!("{} {}", state.policy_info.name, state.current_query)
		};
		let max_results = self.cfg.search.fallback.web_max_results;

		state.web_sources = match self
			.providers
			.web_search
			.search(&self.cfg.providers.web_search, &query, max_results)
			.await
		{
			Ok(sources) => {
				tracing::info!(
					session_id = %state.session_id,
					results_count = sources.len(),
					"Web search completed."
				);

				sources
			},
			Err(err) => {
				tracing::warn!(
					session_id = %state.session_id,
					error = %err,
					"Web search failed; continuing without web sources."
				);

				Vec::new()
			},
		};

		state
	}

	async fn answer_docs_only(&self, state: QaState) -> QaState {
		let messages = prompt::docs_only_messages(
			&state.policy_info,
			&state.retrieved_docs,
			&state.messages,
			&state.current_query,
		);

		self.answer_with(state, messages, true, false).await
	}

	async fn answer_web_only(&self, state: QaState) -> QaState {
		let messages = prompt::web_only_messages(
			&state.policy_info,
			&state.web_sources,
			&state.messages,
			&state.current_query,
		);

		self.answer_with(state, messages, false, true).await
	}

	async fn answer_hybrid(&self, state: QaState) -> QaState {
		let messages = prompt::hybrid_messages(
			&state.policy_info,
			&state.retrieved_docs,
			&state.web_sources,
			&state.messages,
			&state.current_query,
		);

		self.answer_with(state, messages, true, true).await
	}

	async fn answer_with(
		&self,
		mut state: QaState,
		messages: Vec<serde_json::Value>,
		cite_docs: bool,
		cite_web: bool,
	) -> QaState {
		let answer =
			match self.providers.completion.complete(&self.cfg.providers.llm, &messages).await {
				Ok(answer) => answer,
				Err(err) => {
					tracing::warn!(
						session_id = %state.session_id,
						error = %err,
						"Answer generation failed; returning fallback message."
					);

					state.answer = prompt::FALLBACK_ANSWER.to_string();
					state.evidence = Vec::new();

					return state;
				},
			};
		let mut evidence = Vec::new();

		// Internal entries first, then web, in the order they were presented
		// to the model; citation indices are 1-based into these lists.
		if cite_docs {
			evidence.extend(state.retrieved_docs.iter().map(|doc| Evidence::internal(doc, 1.0)));
		}
		if cite_web {
			evidence.extend(state.web_sources.iter().map(|source| {
				Evidence::web(
					&source.title,
					&source.snippet,
					source.score,
					&source.url,
					source.fetched_date.clone(),
				)
			}));
		}

		let internal_count = if cite_docs { state.retrieved_docs.len() } else { 0 };
		let web_count = if cite_web { state.web_sources.len() } else { 0 };

		if !citations_are_valid(&answer, internal_count, web_count) {
			tracing::warn!(
				session_id = %state.session_id,
				"Answer cites evidence outside the provided range."
			);
		}

		tracing::info!(
			session_id = %state.session_id,
			answer_chars = answer.chars().count(),
			evidence_count = evidence.len(),
			"Answer generated."
		);

		state.answer = answer;
		state.evidence = evidence;

		state
	}
}

/// Deterministic containment check of the lowercased query against the
/// configured web-only lexicon.
pub fn classify_query_type(query: &str, web_only_keywords: &[String]) -> QueryType {
	let lowered = query.to_lowercase();

	if web_only_keywords.iter().any(|keyword| lowered.contains(keyword.as_str())) {
		QueryType::WebOnly
	} else {
		QueryType::PolicyQa
	}
}

/// Pure sufficiency decision; never calls external services.
fn needs_web_supplement(query: &str, policy_info: &PolicyInfo, documents_count: usize) -> bool {
	if documents_count == 0 || policy_info.is_empty() {
		return true;
	}

	let lowered = query.to_lowercase();

	if HOMEPAGE_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
		return true;
	}

	documents_count < MIN_SUFFICIENT_DOCS
}

impl NuriService {
	pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
		if req.session_id.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "session_id must be non-empty.".to_string() });
		}
		if req.message.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "message must be non-empty.".to_string() });
		}

		let history = self.caches.chat.history(&req.session_id);
		let workflow =
			QaWorkflow { cfg: &self.cfg, caches: &self.caches, providers: &self.providers };
		let state = workflow.run(QaState::new(&req, history)).await;

		if let Some(QaError::PolicyNotInitialized) = state.error {
			return Err(Error::PolicyNotInitialized);
		}

		self.caches.chat.append(&req.session_id, ChatTurn::user(req.message.as_str()));
		self.caches.chat.append(
			&req.session_id,
			ChatTurn::assistant(state.answer.as_str(), state.evidence.clone()),
		);

		Ok(ChatResponse {
			session_id: req.session_id,
			answer: state.answer,
			evidence: state.evidence,
			web_sources: state.web_sources,
		})
	}
}
