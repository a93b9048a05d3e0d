use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};

use nuri_providers::web_search::WebSearchResult;
use nuri_service::{Providers, SearchQuery};

use super::{
	KeyedEmbedding, ScriptedWebSearch, StubCompletion, build_service, chunk, policy_record,
	seed_corpus, test_config, test_db, test_qdrant_url,
};

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set NURI_PG_DSN and NURI_QDRANT_URL to run."]
async fn absent_terms_trigger_the_web_fallback() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping absent_terms_trigger_the_web_fallback; set NURI_PG_DSN to run this test.");

		return;
	};
	let Some(qdrant_url) = test_qdrant_url() else {
		eprintln!(
			"Skipping absent_terms_trigger_the_web_fallback; set NURI_QDRANT_URL to run this test."
		);

		return;
	};
	let collection = test_db.collection_name("nuri_acceptance");
	let cfg = test_config(test_db.dsn().to_string(), qdrant_url, 3, collection);
	// Unknown queries embed along -x, away from every stored vector, so the
	// dense arm returns nothing above the zero score floor.
	let web_calls = Arc::new(AtomicUsize::new(0));
	let providers = Providers::new(
		Arc::new(KeyedEmbedding { vectors: Default::default(), fallback: vec![-1.0, 0.0, 0.0] }),
		Arc::new(StubCompletion { answer: "unused".to_string() }),
		Arc::new(ScriptedWebSearch {
			results: vec![WebSearchResult {
				title: "관련 공고".to_string(),
				url: "https://example.kr/notice".to_string(),
				snippet: "외부 공고 안내".to_string(),
				score: 0.41,
				fetched_date: "2025-11-02".to_string(),
			}],
			calls: web_calls.clone(),
		}),
	);
	let service = build_service(cfg, providers).await;

	seed_corpus(
		&service,
		&[(
			policy_record(1, "청년 창업 지원", "서울", "창업"),
			vec![(chunk(1, 1, 0, "청년 창업 지원금 안내"), vec![1.0, 0.0, 0.0])],
		)],
	)
	.await;

	let response = service
		.search(SearchQuery {
			query: "양자 컴퓨터 보안".to_string(),
			region: None,
			category: None,
			target_group: None,
		})
		.await
		.expect("Search must still return 200-level results.");

	assert!(response.metrics.web_search_triggered);
	assert_eq!(response.metrics.web_search_count, 1);
	assert_eq!(response.metrics.final_count, 0);
	assert_eq!(web_calls.load(Ordering::SeqCst), 1);
	assert_eq!(response.web_sources.len(), 1);
	assert!(response.policies.iter().any(|item| item.source_type == "web"));
	assert!(response.summary.contains("웹 검색"));

	test_db.cleanup().await.expect("Failed to clean up test database.");
}
