mod acceptance {
	mod fusion_labels;
	mod init_round_trip;
	mod search_fallback;

	use std::{
		collections::HashMap,
		sync::{
			Arc,
			atomic::{AtomicUsize, Ordering},
		},
	};

	use serde_json::Value;
	use uuid::Uuid;

	use nuri_config::{
		Cache, Chat, Config, EmbeddingProviderConfig, LlmProviderConfig, Postgres,
		Providers as ProviderConfigs, Qdrant, Search, Service, Storage, WebSearchProviderConfig,
	};
	use nuri_domain::policy::{DocumentChunk, PolicyRecord};
	use nuri_providers::web_search::WebSearchResult;
	use nuri_service::{
		BoxFuture, CompletionProvider, EmbeddingProvider, NuriService, Providers, Result,
		WebSearchProvider,
	};
	use nuri_storage::{db::Db, qdrant::QdrantStore};
	use nuri_testkit::TestDatabase;

	/// Embeds known texts to fixed vectors; anything else gets the fallback.
	/// Lets a test pin exactly which chunks the dense arm can reach.
	pub struct KeyedEmbedding {
		pub vectors: HashMap<String, Vec<f32>>,
		pub fallback: Vec<f32>,
	}
	impl EmbeddingProvider for KeyedEmbedding {
		fn embed<'a>(
			&'a self,
			_cfg: &'a EmbeddingProviderConfig,
			texts: &'a [String],
		) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
			let vectors = texts
				.iter()
				.map(|text| self.vectors.get(text).cloned().unwrap_or(self.fallback.clone()))
				.collect();

			Box::pin(async move { Ok(vectors) })
		}
	}

	pub struct StubCompletion {
		pub answer: String,
	}
	impl CompletionProvider for StubCompletion {
		fn complete<'a>(
			&'a self,
			_cfg: &'a LlmProviderConfig,
			_messages: &'a [Value],
		) -> BoxFuture<'a, Result<String>> {
			let answer = self.answer.clone();

			Box::pin(async move { Ok(answer) })
		}
	}

	pub struct ScriptedWebSearch {
		pub results: Vec<WebSearchResult>,
		pub calls: Arc<AtomicUsize>,
	}
	impl WebSearchProvider for ScriptedWebSearch {
		fn search<'a>(
			&'a self,
			_cfg: &'a WebSearchProviderConfig,
			_query: &'a str,
			_max_results: u32,
		) -> BoxFuture<'a, Result<Vec<WebSearchResult>>> {
			let results = self.results.clone();

			self.calls.fetch_add(1, Ordering::SeqCst);

			Box::pin(async move { Ok(results) })
		}
	}

	pub fn test_config(
		dsn: String,
		qdrant_url: String,
		vector_dim: u32,
		collection: String,
	) -> Config {
		Config {
			service: Service {
				http_bind: "127.0.0.1:0".to_string(),
				admin_bind: "127.0.0.1:0".to_string(),
				log_level: "info".to_string(),
			},
			storage: Storage {
				postgres: Postgres { dsn, pool_max_conns: 2 },
				qdrant: Qdrant { url: qdrant_url, collection, vector_dim, timeout_ms: 5_000 },
			},
			providers: ProviderConfigs {
				embedding: EmbeddingProviderConfig {
					provider_id: "test".to_string(),
					api_base: "http://127.0.0.1:1".to_string(),
					api_key: "test-key".to_string(),
					path: "/".to_string(),
					model: "test".to_string(),
					dimensions: vector_dim,
					timeout_ms: 1_000,
					default_headers: serde_json::Map::new(),
				},
				llm: LlmProviderConfig {
					provider_id: "test".to_string(),
					api_base: "http://127.0.0.1:1".to_string(),
					api_key: "test-key".to_string(),
					path: "/".to_string(),
					model: "test".to_string(),
					temperature: 0.1,
					timeout_ms: 1_000,
					default_headers: serde_json::Map::new(),
				},
				web_search: WebSearchProviderConfig {
					provider_id: "test".to_string(),
					api_base: "http://127.0.0.1:1".to_string(),
					api_key: "test-key".to_string(),
					path: "/".to_string(),
					timeout_ms: 1_000,
					default_headers: serde_json::Map::new(),
				},
			},
			search: Search::default(),
			chat: Chat::default(),
			cache: Cache::default(),
		}
	}

	pub async fn test_db() -> Option<TestDatabase> {
		let base_dsn = nuri_testkit::env_dsn()?;
		let db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");

		Some(db)
	}

	pub fn test_qdrant_url() -> Option<String> {
		nuri_testkit::env_qdrant_url()
	}

	pub async fn build_service(cfg: Config, providers: Providers) -> NuriService {
		let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

		db.ensure_schema().await.expect("Failed to ensure schema.");

		let qdrant = QdrantStore::new(&cfg.storage.qdrant).expect("Failed to build Qdrant client.");

		NuriService::with_providers(cfg, db, qdrant, providers)
	}

	pub fn policy_record(id: i64, program_name: &str, region: &str, category: &str) -> PolicyRecord {
		PolicyRecord {
			id,
			program_name: program_name.to_string(),
			region: region.to_string(),
			category: category.to_string(),
			program_overview: format!("{program_name} 개요"),
			apply_target: "중소기업 및 예비 창업자".to_string(),
			support_description: "지원 내용 안내".to_string(),
			url: None,
			contact_agency: None,
			application_deadline: None,
			extras: serde_json::Map::new(),
		}
	}

	pub fn chunk(id: u128, policy_id: i64, chunk_index: i32, content: &str) -> DocumentChunk {
		DocumentChunk {
			chunk_id: Uuid::from_u128(id),
			policy_id,
			chunk_index,
			doc_type: "support".to_string(),
			content: content.to_string(),
		}
	}

	/// Seeds the per-test collection and metadata rows for one corpus.
	pub async fn seed_corpus(
		service: &NuriService,
		corpus: &[(PolicyRecord, Vec<(DocumentChunk, Vec<f32>)>)],
	) {
		nuri_testkit::create_chunk_collection(
			&service.qdrant.client,
			&service.qdrant.collection,
			service.qdrant.vector_dim,
		)
		.await
		.expect("Failed to create chunk collection.");

		let mut points = Vec::new();

		for (record, chunks) in corpus {
			service.db.upsert_policy(record).await.expect("Failed to upsert policy.");

			for (chunk, vector) in chunks {
				points.push(nuri_testkit::chunk_point(
					chunk,
					vector.clone(),
					&record.region,
					&record.category,
				));
			}
		}

		nuri_testkit::upsert_chunks(&service.qdrant.client, &service.qdrant.collection, points)
			.await
			.expect("Failed to upsert chunk points.");
	}
}
