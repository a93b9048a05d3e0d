use std::sync::{Arc, atomic::AtomicUsize};

use nuri_domain::evidence::Evidence;
use nuri_service::{ChatRequest, Error, InitPolicyRequest, Providers};

use super::{
	KeyedEmbedding, ScriptedWebSearch, StubCompletion, build_service, chunk, policy_record,
	seed_corpus, test_config, test_db, test_qdrant_url,
};

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set NURI_PG_DSN and NURI_QDRANT_URL to run."]
async fn init_materializes_exactly_the_policy_chunks() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping init_materializes_exactly_the_policy_chunks; set NURI_PG_DSN to run this test.");

		return;
	};
	let Some(qdrant_url) = test_qdrant_url() else {
		eprintln!(
			"Skipping init_materializes_exactly_the_policy_chunks; set NURI_QDRANT_URL to run this test."
		);

		return;
	};
	let collection = test_db.collection_name("nuri_acceptance");
	let cfg = test_config(test_db.dsn().to_string(), qdrant_url, 3, collection);
	let providers = Providers::new(
		Arc::new(KeyedEmbedding { vectors: Default::default(), fallback: vec![0.0, 0.0, 1.0] }),
		Arc::new(StubCompletion {
			answer: "지원 금액은 최대 8억원입니다 [정책문서 1].".to_string(),
		}),
		Arc::new(ScriptedWebSearch { results: Vec::new(), calls: Arc::new(AtomicUsize::new(0)) }),
	);
	let service = build_service(cfg, providers).await;

	seed_corpus(
		&service,
		&[
			(
				policy_record(507, "청년 창업 지원", "서울", "창업"),
				vec![
					(chunk(2, 507, 1, "신청 대상은 예비 창업자"), vec![0.0, 1.0, 0.0]),
					(chunk(1, 507, 0, "지원 금액은 최대 8억원"), vec![1.0, 0.0, 0.0]),
					(chunk(3, 507, 2, "제출 서류는 사업계획서"), vec![0.0, 0.0, 1.0]),
				],
			),
			(
				policy_record(508, "수출 바우처", "전국", "수출"),
				vec![(chunk(4, 508, 0, "수출 바우처 내용"), vec![0.5, 0.5, 0.0])],
			),
		],
	)
	.await;

	// Only policy 507's chunks are materialized, in chunk order.
	let response = service
		.init_policy(InitPolicyRequest { session_id: "s1".to_string(), policy_id: 507 })
		.await
		.expect("Expected init to succeed.");

	assert_eq!(response.status, "initialized");
	assert_eq!(response.documents_count, 3);

	let context = service.caches.policy.get("s1").expect("Expected a cached context.");

	assert!(context.documents.iter().all(|doc| doc.policy_id == 507));
	assert_eq!(
		context.documents.iter().map(|doc| doc.chunk_index).collect::<Vec<_>>(),
		vec![0, 1, 2]
	);
	assert_eq!(context.documents[0].content, "지원 금액은 최대 8억원");

	// Scenario: docs-only chat over the materialized context.
	let chat = service
		.chat(ChatRequest {
			session_id: "s1".to_string(),
			message: "지원 금액은 얼마야?".to_string(),
			policy_id: Some(507),
		})
		.await
		.expect("Expected a docs-only answer.");

	assert!(chat.answer.contains("[정책문서 1]"));
	assert!(matches!(&chat.evidence[0], Evidence::Internal { policy_id: 507, .. }));
	assert!(chat.web_sources.is_empty());

	let err = service
		.init_policy(InitPolicyRequest { session_id: "s1".to_string(), policy_id: 9_999 })
		.await
		.expect_err("Expected an unknown policy to fail.");

	assert!(matches!(err, Error::NotFound { .. }));

	test_db.cleanup().await.expect("Failed to clean up test database.");
}
