use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::{Error, NuriService, Result, fusion};
use nuri_config::Search as SearchConfig;
use nuri_domain::{
	evidence::{Evidence, excerpt, EXCERPT_MAX_CHARS},
	policy::{DocumentChunk, MatchKind, PolicyRecord, SearchHit},
	tokenize,
};
use nuri_providers::web_search::WebSearchResult;
use nuri_storage::qdrant::{ChunkFilter, ScoredChunk};

/// Flat threshold deltas applied when a filter narrows the query.
const REGION_FILTER_DELTA: f32 = -0.02;
const CATEGORY_FILTER_DELTA: f32 = -0.02;
/// Adaptive deltas driven by the provisional result count.
const LOW_COUNT_DELTA: f32 = -0.05;
const HIGH_COUNT_DELTA: f32 = 0.03;

const MAX_SEARCH_EVIDENCE: usize = 10;
/// Web fallback hits are reported with synthetic negative ids.
const WEB_RESULT_ID_BASE: i64 = -1_000;

#[derive(Clone, Debug, Deserialize)]
pub struct SearchQuery {
	pub query: String,
	pub region: Option<String>,
	pub category: Option<String>,
	pub target_group: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PolicySearchItem {
	pub id: i64,
	pub program_name: String,
	pub program_overview: String,
	pub region: String,
	pub category: String,
	pub support_description: String,
	pub apply_target: String,
	pub score: f32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub match_type: Option<MatchKind>,
	pub source_type: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SearchMetrics {
	pub total_candidates: usize,
	pub final_count: usize,
	pub top_score: f32,
	pub avg_score: f32,
	pub min_score: f32,
	pub threshold_used: f32,
	pub web_search_triggered: bool,
	pub web_search_count: usize,
	pub search_time_ms: u64,
	pub sufficiency_reason: String,
	pub dense_count: usize,
	pub sparse_count: usize,
	pub hybrid_count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchResponse {
	pub query: String,
	pub summary: String,
	pub policies: Vec<PolicySearchItem>,
	pub total_count: usize,
	pub top_score: f32,
	pub web_sources: Vec<WebSearchResult>,
	pub metrics: SearchMetrics,
	pub evidence: Vec<Evidence>,
}

impl NuriService {
	/// Policy discovery over the full corpus: hybrid retrieval, dynamic
	/// threshold filtering, and a web fallback when internal results are thin.
	pub async fn search(&self, query: SearchQuery) -> Result<SearchResponse> {
		if query.query.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}

		let started = Instant::now();
		let cfg = &self.cfg.search;
		let keywords = tokenize::extract_keywords(&query.query);
		let mut metrics = SearchMetrics::default();

		// Dense and sparse retrieval run concurrently; either arm degrades to
		// an empty list so the other still contributes.
		let filter = ChunkFilter {
			policy_id: None,
			region: query.region.clone(),
			category: query.category.clone(),
		};
		let (dense_hits, sparse_hits) =
			tokio::join!(self.dense_candidates(&query.query, &filter), self.sparse_candidates(&query.query));
		let fused = fusion::fuse(&dense_hits, &sparse_hits, &cfg.fusion);

		metrics.total_candidates = fused.len();

		let hits = fusion::aggregate_by_policy(fused);

		for hit in &hits {
			match hit.match_kind {
				MatchKind::Dense => metrics.dense_count += 1,
				MatchKind::Sparse => metrics.sparse_count += 1,
				MatchKind::Hybrid => metrics.hybrid_count += 1,
			}
		}

		let (threshold, mut filtered) = apply_dynamic_threshold(
			cfg,
			&keywords,
			query.region.as_deref(),
			query.category.as_deref(),
			&hits,
		);

		metrics.threshold_used = threshold;
		filtered.truncate(cfg.final_limit);

		let (mut policies, evidence) = self.resolve_policies(&filtered, &query).await;

		if !policies.is_empty() {
			let scores = policies.iter().map(|item| item.score).collect::<Vec<_>>();

			metrics.top_score = scores.iter().copied().fold(f32::MIN, f32::max);
			metrics.min_score = scores.iter().copied().fold(f32::MAX, f32::min);
			metrics.avg_score = scores.iter().sum::<f32>() / scores.len() as f32;
		}

		metrics.final_count = policies.len();

		let mut web_sources = Vec::new();

		if should_trigger_web_search(cfg, metrics.final_count, metrics.top_score) {
			metrics.web_search_triggered = true;
			metrics.sufficiency_reason = format!(
				"내부 검색 결과 부족 (결과: {}건, 최고 점수: {:.2}). 웹 검색으로 보충합니다.",
				metrics.final_count, metrics.top_score
			);
			web_sources = self.web_fallback(&query, &keywords).await;
			metrics.web_search_count = web_sources.len();
		} else {
			metrics.sufficiency_reason = format!(
				"내부 검색 결과 충분 (결과: {}건, 최고 점수: {:.2}).",
				metrics.final_count, metrics.top_score
			);
		}

		// Web hits cannot honor structured filters, so they are only appended
		// to unfiltered searches.
		if query.region.is_none() && query.category.is_none() {
			for (index, source) in web_sources.iter().enumerate() {
				policies.push(web_item(source, index));
			}
		}

		let summary = build_summary(&query.query, &policies, metrics.top_score);

		metrics.search_time_ms = started.elapsed().as_millis() as u64;

		tracing::info!(
			query = %query.query,
			total_count = policies.len(),
			top_score = metrics.top_score,
			web_search_triggered = metrics.web_search_triggered,
			search_time_ms = metrics.search_time_ms,
			"Search completed."
		);

		Ok(SearchResponse {
			query: query.query,
			summary,
			total_count: policies.len(),
			top_score: metrics.top_score,
			policies,
			web_sources,
			metrics,
			evidence,
		})
	}

	async fn dense_candidates(&self, query: &str, filter: &ChunkFilter) -> Vec<ScoredChunk> {
		let query_vec = match self.embed_query(query).await {
			Ok(vec) => vec,
			Err(err) => {
				tracing::warn!(error = %err, "Query embedding failed; skipping dense search.");

				return Vec::new();
			},
		};

		match self
			.qdrant
			.dense_search(&query_vec, self.cfg.search.candidates_per_source, filter, 0.0)
			.await
		{
			Ok(hits) => hits,
			Err(err) => {
				tracing::warn!(error = %err, "Dense search failed; continuing with sparse only.");

				Vec::new()
			},
		}
	}

	async fn sparse_candidates(&self, query: &str) -> Vec<ScoredChunk> {
		let index = match self.sparse_index().await {
			Ok(index) => index,
			Err(err) => {
				tracing::warn!(error = %err, "BM25 index unavailable; continuing with dense only.");

				return Vec::new();
			},
		};

		index.search(
			query,
			self.cfg.search.candidates_per_source as usize,
			self.cfg.search.fusion.sparse_min_score,
		)
	}

	/// Resolves fused hits against the metadata store and applies the
	/// post-retrieval filters. Hits without a backing record are dropped.
	async fn resolve_policies(
		&self,
		hits: &[SearchHit],
		query: &SearchQuery,
	) -> (Vec<PolicySearchItem>, Vec<Evidence>) {
		let ids = hits.iter().map(|hit| hit.policy_id).collect::<Vec<_>>();
		let records = match self.db.lookup_policies(&ids).await {
			Ok(records) => records,
			Err(err) => {
				tracing::warn!(
					error = %err,
					"Policy metadata lookup failed; returning web results only."
				);

				return (Vec::new(), Vec::new());
			},
		};
		let mut policies = Vec::new();
		let mut evidence = Vec::new();

		for hit in hits {
			let Some(record) = records.get(&hit.policy_id) else {
				tracing::warn!(policy_id = hit.policy_id, "Fused hit has no metadata record.");

				continue;
			};

			if !matches_filters(record, query) {
				continue;
			}

			policies.push(internal_item(record, hit));

			if evidence.len() < MAX_SEARCH_EVIDENCE {
				evidence.push(Evidence::internal(
					&DocumentChunk {
						chunk_id: uuid::Uuid::nil(),
						policy_id: hit.policy_id,
						chunk_index: hit.chunk_index,
						doc_type: hit.doc_type.clone(),
						content: hit.matched_excerpt.clone(),
					},
					hit.score,
				));
			}
		}

		(policies, evidence)
	}

	async fn web_fallback(&self, query: &SearchQuery, keywords: &[String]) -> Vec<WebSearchResult> {
		let mut parts = Vec::new();

		if keywords.is_empty() {
			parts.push(query.query.clone());
		} else {
			parts.extend(keywords.iter().take(3).cloned());
		}
		if let Some(region) = &query.region
			&& region != "전국"
		{
			parts.push(region.clone());
		}
		if let Some(target_group) = &query.target_group {
			parts.push(target_group.clone());
		}

		parts.push("정부 지원 사업".to_string());

		let web_query = parts.join(" ");
		let max_results = self.cfg.search.fallback.web_max_results;

		match self
			.providers
			.web_search
			.search(&self.cfg.providers.web_search, &web_query, max_results)
			.await
		{
			Ok(sources) => sources,
			Err(err) => {
				tracing::warn!(error = %err, "Web fallback failed; returning internal results only.");

				Vec::new()
			},
		}
	}
}

/// Computes the dynamic threshold and filters the fused, policy-aggregated
/// list with it. The adaptive correction is keyed off the pre-filter candidate
/// count, never the survivor count: a survivor-driven correction would let a
/// higher default threshold re-open the floor and grow the final set.
fn apply_dynamic_threshold(
	cfg: &SearchConfig,
	keywords: &[String],
	region: Option<&str>,
	category: Option<&str>,
	hits: &[SearchHit],
) -> (f32, Vec<SearchHit>) {
	let threshold = dynamic_threshold(cfg, keywords, region, category, Some(hits.len()));
	let filtered = hits.iter().filter(|hit| hit.score >= threshold).cloned().collect();

	(threshold, filtered)
}

/// Dynamic similarity threshold for a query, clamped to the configured range.
pub fn dynamic_threshold(
	cfg: &SearchConfig,
	keywords: &[String],
	region: Option<&str>,
	category: Option<&str>,
	provisional_count: Option<usize>,
) -> f32 {
	let mut threshold = cfg.threshold.default;

	for keyword in keywords {
		for (key, delta) in &cfg.threshold.keyword_adjustments {
			if keyword.contains(key.as_str()) {
				threshold += delta;

				break;
			}
		}
	}

	if let Some(region) = region {
		threshold += REGION_FILTER_DELTA;

		if let Some(delta) = cfg.threshold.region_adjustments.get(region) {
			threshold += delta;
		}
	}
	if category.is_some() {
		threshold += CATEGORY_FILTER_DELTA;
	}

	match provisional_count {
		Some(count) if count < cfg.target_min_results => threshold += LOW_COUNT_DELTA,
		Some(count) if count > cfg.target_max_results => threshold += HIGH_COUNT_DELTA,
		_ => {},
	}

	threshold.clamp(cfg.threshold.min, cfg.threshold.max)
}

/// Web search fires iff internal results are too few or too weak.
pub fn should_trigger_web_search(cfg: &SearchConfig, final_count: usize, top_score: f32) -> bool {
	final_count < cfg.fallback.min_results || top_score < cfg.fallback.min_top_score
}

fn matches_filters(record: &PolicyRecord, query: &SearchQuery) -> bool {
	if let Some(region) = &query.region
		&& &record.region != region
	{
		return false;
	}
	if let Some(category) = &query.category
		&& &record.category != category
	{
		return false;
	}
	if let Some(target_group) = &query.target_group
		&& !record.apply_target.contains(target_group.as_str())
	{
		return false;
	}

	true
}

fn internal_item(record: &PolicyRecord, hit: &SearchHit) -> PolicySearchItem {
	PolicySearchItem {
		id: record.id,
		program_name: record.program_name.clone(),
		program_overview: record.program_overview.clone(),
		region: record.region.clone(),
		category: record.category.clone(),
		support_description: record.support_description.clone(),
		apply_target: record.apply_target.clone(),
		score: hit.score,
		match_type: Some(hit.match_kind),
		source_type: "internal".to_string(),
		url: record.url.clone(),
	}
}

fn web_item(source: &WebSearchResult, index: usize) -> PolicySearchItem {
	PolicySearchItem {
		id: WEB_RESULT_ID_BASE - index as i64,
		program_name: source.title.clone(),
		program_overview: excerpt(&source.snippet, EXCERPT_MAX_CHARS),
		region: "웹 검색".to_string(),
		category: "웹 검색 결과".to_string(),
		support_description: source.snippet.clone(),
		apply_target: "웹 검색 결과 - 자세한 내용은 출처 링크를 확인하세요".to_string(),
		score: source.score,
		match_type: None,
		source_type: "web".to_string(),
		url: Some(source.url.clone()),
	}
}

fn build_summary(query: &str, policies: &[PolicySearchItem], top_score: f32) -> String {
	let internal_count = policies.iter().filter(|item| item.source_type == "internal").count();
	let web_count = policies.len() - internal_count;
	let total = policies.len();

	if total == 0 {
		return format!("'{query}'에 대한 검색 결과가 없습니다.");
	}

	if internal_count == 0 {
		return format!("'{query}'에 대한 내부 정책을 찾지 못해 웹 검색 결과 {web_count}건을 제공합니다.");
	}

	let mut summary = if top_score >= 0.5 {
		let top_name = &policies[0].program_name;

		format!(
			"'{query}' 검색 결과 {total}건을 찾았습니다. '{top_name}'이(가) 가장 관련도가 높습니다 (유사도: {:.0}%).",
			top_score * 100.0
		)
	} else {
		format!("'{query}' 검색 결과 {total}건을 찾았습니다.")
	};

	if web_count > 0 {
		summary.push_str(&format!(" 웹 검색으로 {web_count}건의 추가 정보를 확인했습니다."));
	}

	summary
}

#[cfg(test)]
mod tests {
	use super::*;

	fn cfg() -> SearchConfig {
		SearchConfig::default()
	}

	fn keywords(words: &[&str]) -> Vec<String> {
		words.iter().map(|word| word.to_string()).collect()
	}

	#[test]
	fn threshold_starts_from_the_default() {
		assert_eq!(dynamic_threshold(&cfg(), &[], None, None, None), 0.25);
	}

	#[test]
	fn threshold_applies_keyword_deltas_once_per_keyword() {
		// "창업" lowers by 0.05; the containing keyword only matches once.
		let threshold = dynamic_threshold(&cfg(), &keywords(&["창업지원"]), None, None, None);

		assert!((threshold - 0.20).abs() < 1e-6);

		let threshold = dynamic_threshold(&cfg(), &keywords(&["r&d"]), None, None, None);

		assert!((threshold - 0.30).abs() < 1e-6);
	}

	#[test]
	fn threshold_applies_filter_deltas() {
		let threshold = dynamic_threshold(&cfg(), &[], Some("서울"), Some("창업"), None);

		assert!((threshold - 0.21).abs() < 1e-6);

		// "전국" carries an extra configured region delta.
		let threshold = dynamic_threshold(&cfg(), &[], Some("전국"), None, None);

		assert!((threshold - 0.18).abs() < 1e-6);
	}

	#[test]
	fn threshold_adapts_to_provisional_counts() {
		let low = dynamic_threshold(&cfg(), &[], None, None, Some(1));
		let high = dynamic_threshold(&cfg(), &[], None, None, Some(20));
		let mid = dynamic_threshold(&cfg(), &[], None, None, Some(10));

		assert!((low - 0.20).abs() < 1e-6);
		assert!((high - 0.28).abs() < 1e-6);
		assert!((mid - 0.25).abs() < 1e-6);
	}

	#[test]
	fn threshold_is_clamped_to_the_configured_range() {
		let threshold = dynamic_threshold(
			&cfg(),
			&keywords(&["창업", "청년", "지원금", "보조금"]),
			Some("전국"),
			None,
			Some(0),
		);

		assert!((threshold - cfg().threshold.min).abs() < 1e-6);

		let threshold =
			dynamic_threshold(&cfg(), &keywords(&["r&d", "수출", "특허", "특허청"]), None, None, Some(99));

		assert!(threshold <= cfg().threshold.max + 1e-6);
	}

	#[test]
	fn threshold_is_monotone_in_the_default() {
		let mut low_cfg = cfg();
		let mut high_cfg = cfg();

		low_cfg.threshold.default = 0.20;
		high_cfg.threshold.default = 0.30;

		let words = keywords(&["창업", "r&d"]);
		let low = dynamic_threshold(&low_cfg, &words, Some("서울"), None, Some(1));
		let high = dynamic_threshold(&high_cfg, &words, Some("서울"), None, Some(1));

		assert!(low <= high);
	}

	fn hit(policy_id: i64, score: f32) -> SearchHit {
		SearchHit {
			policy_id,
			score,
			match_kind: MatchKind::Hybrid,
			matched_excerpt: format!("발췌 {policy_id}"),
			chunk_index: 0,
			doc_type: "support".to_string(),
		}
	}

	#[test]
	fn filtered_count_is_monotone_in_the_default_threshold() {
		// Scores straddling the 0.20/0.21 boundary; a survivor-driven adaptive
		// pass would keep 3 hits at default 0.20 but re-open to all 7 at 0.21.
		let hits = [0.16, 0.17, 0.18, 0.19, 0.205, 0.22, 0.23]
			.into_iter()
			.enumerate()
			.map(|(index, score)| hit(index as i64 + 1, score))
			.collect::<Vec<_>>();
		let count_at = |default: f32| {
			let mut cfg = cfg();

			cfg.threshold.default = default;

			apply_dynamic_threshold(&cfg, &[], None, None, &hits).1.len()
		};

		assert!(count_at(0.21) <= count_at(0.20));

		let mut previous = usize::MAX;

		for step in 0..=20 {
			let count = count_at(0.15 + step as f32 * 0.0175);

			assert!(count <= previous, "count grew while raising the default threshold");

			previous = count;
		}
	}

	#[test]
	fn sparse_candidate_lists_lower_the_threshold_once() {
		// Two candidates sit below target_min_results, so the low-count delta
		// applies, keyed off the candidate count rather than any filter result.
		let hits = vec![hit(1, 0.21), hit(2, 0.22)];
		let (threshold, filtered) = apply_dynamic_threshold(&cfg(), &[], None, None, &hits);

		assert!((threshold - 0.20).abs() < 1e-6);
		assert_eq!(filtered.len(), 2);

		// A crowded candidate list tightens instead.
		let hits = (0..20).map(|index| hit(index + 1, 0.5)).collect::<Vec<_>>();
		let (threshold, filtered) = apply_dynamic_threshold(&cfg(), &[], None, None, &hits);

		assert!((threshold - 0.28).abs() < 1e-6);
		assert_eq!(filtered.len(), 20);
	}

	#[test]
	fn fallback_triggers_on_count_or_score() {
		let cfg = cfg();

		assert!(should_trigger_web_search(&cfg, 1, 0.9));
		assert!(should_trigger_web_search(&cfg, 10, 0.2));
		assert!(should_trigger_web_search(&cfg, 0, 0.0));
		assert!(!should_trigger_web_search(&cfg, 2, 0.35));
		assert!(!should_trigger_web_search(&cfg, 10, 0.9));
	}

	#[test]
	fn summary_reports_counts_and_top_match() {
		let record = PolicyRecord {
			id: 1,
			program_name: "청년 창업 지원".to_string(),
			region: "서울".to_string(),
			category: "창업".to_string(),
			program_overview: String::new(),
			apply_target: String::new(),
			support_description: String::new(),
			url: None,
			contact_agency: None,
			application_deadline: None,
			extras: Default::default(),
		};
		let hit = SearchHit {
			policy_id: 1,
			score: 0.72,
			match_kind: MatchKind::Hybrid,
			matched_excerpt: "발췌".to_string(),
			chunk_index: 0,
			doc_type: "support".to_string(),
		};
		let policies = vec![internal_item(&record, &hit)];
		let summary = build_summary("창업", &policies, 0.72);

		assert!(summary.contains("1건"));
		assert!(summary.contains("청년 창업 지원"));
		assert!(summary.contains("72%"));

		assert_eq!(build_summary("창업", &[], 0.0), "'창업'에 대한 검색 결과가 없습니다.");
	}

	#[test]
	fn filters_match_on_record_fields() {
		let record = PolicyRecord {
			id: 1,
			program_name: "name".to_string(),
			region: "서울".to_string(),
			category: "창업".to_string(),
			program_overview: String::new(),
			apply_target: "청년 및 예비 창업자".to_string(),
			support_description: String::new(),
			url: None,
			contact_agency: None,
			application_deadline: None,
			extras: Default::default(),
		};
		let query = |region: Option<&str>, category: Option<&str>, target: Option<&str>| SearchQuery {
			query: "창업".to_string(),
			region: region.map(str::to_string),
			category: category.map(str::to_string),
			target_group: target.map(str::to_string),
		};

		assert!(matches_filters(&record, &query(None, None, None)));
		assert!(matches_filters(&record, &query(Some("서울"), Some("창업"), Some("청년"))));
		assert!(!matches_filters(&record, &query(Some("부산"), None, None)));
		assert!(!matches_filters(&record, &query(None, Some("수출"), None)));
		assert!(!matches_filters(&record, &query(None, None, Some("소상공인"))));
	}
}
