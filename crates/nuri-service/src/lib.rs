pub mod cache;
pub mod chat;
pub mod cleanup;
pub mod init_policy;
pub mod search;
pub mod sparse;

mod error;
mod fusion;
mod prompt;

pub use self::{
	cache::{CacheStats, SessionCaches, spawn_ttl_sweeper},
	chat::{ChatRequest, ChatResponse, QueryType},
	cleanup::{CleanupRequest, CleanupResponse},
	error::{Error, Result},
	init_policy::{InitPolicyRequest, InitPolicyResponse, WarmIndexReport},
	search::{PolicySearchItem, SearchMetrics, SearchQuery, SearchResponse},
};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;
use tokio::sync::OnceCell;

use nuri_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, WebSearchProviderConfig};
use nuri_providers::{completion, embedding, web_search, web_search::WebSearchResult};
use nuri_storage::{db::Db, qdrant::QdrantStore};
use sparse::Bm25Index;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<String>>;
}

pub trait WebSearchProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a WebSearchProviderConfig,
		query: &'a str,
		max_results: u32,
	) -> BoxFuture<'a, Result<Vec<WebSearchResult>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub completion: Arc<dyn CompletionProvider>,
	pub web_search: Arc<dyn WebSearchProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		completion: Arc<dyn CompletionProvider>,
		web_search: Arc<dyn WebSearchProvider>,
	) -> Self {
		Self { embedding, completion, web_search }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), completion: provider.clone(), web_search: provider }
	}
}

pub struct NuriService {
	pub cfg: Config,
	pub db: Db,
	pub qdrant: QdrantStore,
	pub caches: SessionCaches,
	pub providers: Providers,
	sparse: OnceCell<Arc<Bm25Index>>,
}
impl NuriService {
	pub fn new(cfg: Config, db: Db, qdrant: QdrantStore) -> Self {
		Self::with_providers(cfg, db, qdrant, Providers::default())
	}

	pub fn with_providers(cfg: Config, db: Db, qdrant: QdrantStore, providers: Providers) -> Self {
		let caches = SessionCaches::new(cfg.chat.max_history_turns);

		Self { cfg, db, qdrant, caches, providers, sparse: OnceCell::new() }
	}

	/// The BM25 index over the full chunk corpus, built on first use behind a
	/// one-shot gate. Concurrent callers wait for the single build.
	pub(crate) async fn sparse_index(&self) -> Result<Arc<Bm25Index>> {
		self.sparse
			.get_or_try_init(|| async {
				let chunks = self
					.qdrant
					.scroll(&Default::default(), sparse::MAX_INDEX_CHUNKS)
					.await?;
				let boost_terms = self
					.cfg
					.search
					.threshold
					.keyword_adjustments
					.keys()
					.cloned()
					.collect();
				let index = Bm25Index::build(&chunks, &boost_terms);

				tracing::info!(
					documents = index.len(),
					"BM25 index built from chunk corpus."
				);

				Ok(Arc::new(index))
			})
			.await
			.cloned()
	}

	pub(crate) async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
		let input = [query.to_string()];
		let embeddings =
			self.providers.embedding.embed(&self.cfg.providers.embedding, &input).await?;
		let query_vec = embeddings.into_iter().next().ok_or_else(|| Error::Provider {
			message: "Embedding provider returned no vectors.".to_string(),
		})?;

		if query_vec.len() != self.cfg.storage.qdrant.vector_dim as usize {
			return Err(Error::Provider {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		Ok(query_vec)
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			embedding::embed(cfg, texts)
				.await
				.map_err(|err| Error::Provider { message: err.to_string() })
		})
	}
}

impl CompletionProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			completion::complete(cfg, messages)
				.await
				.map_err(|err| Error::Provider { message: err.to_string() })
		})
	}
}

impl WebSearchProvider for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a WebSearchProviderConfig,
		query: &'a str,
		max_results: u32,
	) -> BoxFuture<'a, Result<Vec<WebSearchResult>>> {
		Box::pin(async move {
			web_search::search(cfg, query, max_results)
				.await
				.map_err(|err| Error::WebSearch { message: err.to_string() })
		})
	}
}
