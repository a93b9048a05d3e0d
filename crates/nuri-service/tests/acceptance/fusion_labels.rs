use std::{
	collections::HashMap,
	sync::{Arc, atomic::AtomicUsize},
};

use nuri_domain::policy::MatchKind;
use nuri_service::{Providers, SearchQuery};

use super::{
	KeyedEmbedding, ScriptedWebSearch, StubCompletion, build_service, chunk, policy_record,
	seed_corpus, test_config, test_db, test_qdrant_url,
};

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set NURI_PG_DSN and NURI_QDRANT_URL to run."]
async fn hybrid_fusion_labels_sources_per_policy() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping hybrid_fusion_labels_sources_per_policy; set NURI_PG_DSN to run this test.");

		return;
	};
	let Some(qdrant_url) = test_qdrant_url() else {
		eprintln!(
			"Skipping hybrid_fusion_labels_sources_per_policy; set NURI_QDRANT_URL to run this test."
		);

		return;
	};
	let collection = test_db.collection_name("nuri_acceptance");
	let cfg = test_config(test_db.dsn().to_string(), qdrant_url, 3, collection);
	// The query embeds along +x; policy A sits on +x with no matching term,
	// policy B matches the term but sits on -x (below the zero score floor),
	// policy C has both a near vector and the term.
	let vectors = [("지원금".to_string(), vec![1.0, 0.0, 0.0])].into_iter().collect::<HashMap<_, _>>();
	let providers = Providers::new(
		Arc::new(KeyedEmbedding { vectors, fallback: vec![0.0, 0.0, 1.0] }),
		Arc::new(StubCompletion { answer: "unused".to_string() }),
		Arc::new(ScriptedWebSearch { results: Vec::new(), calls: Arc::new(AtomicUsize::new(0)) }),
	);
	let service = build_service(cfg, providers).await;

	seed_corpus(
		&service,
		&[
			(
				policy_record(1, "세액 공제 프로그램", "서울", "세제"),
				vec![(chunk(1, 1, 0, "세액 공제 혜택 안내"), vec![1.0, 0.0, 0.0])],
			),
			(
				policy_record(2, "지원금 신청 안내", "부산", "창업"),
				vec![(chunk(2, 2, 0, "지원금 신청 절차 안내"), vec![-1.0, 0.0, 0.0])],
			),
			(
				policy_record(3, "지원금 지급 일정", "대구", "창업"),
				vec![(chunk(3, 3, 0, "지원금 지급 일정 안내"), vec![0.9, 0.1, 0.0])],
			),
		],
	)
	.await;

	let response = service
		.search(SearchQuery {
			query: "지원금".to_string(),
			region: None,
			category: None,
			target_group: None,
		})
		.await
		.expect("Expected a search response.");
	let match_type_of = |id: i64| {
		response
			.policies
			.iter()
			.find(|item| item.id == id)
			.and_then(|item| item.match_type)
			.expect("Expected an internal hit.")
	};

	assert_eq!(match_type_of(1), MatchKind::Dense);
	assert_eq!(match_type_of(2), MatchKind::Sparse);
	assert_eq!(match_type_of(3), MatchKind::Hybrid);

	// The policy matched by both sources fuses highest.
	assert_eq!(response.policies[0].id, 3);
	assert!(!response.metrics.web_search_triggered);
	assert_eq!(response.metrics.dense_count, 1);
	assert_eq!(response.metrics.sparse_count, 1);
	assert_eq!(response.metrics.hybrid_count, 1);

	test_db.cleanup().await.expect("Failed to clean up test database.");
}
