use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub chat: Chat,
	#[serde(default)]
	pub cache: Cache,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
	#[serde(default = "default_qdrant_timeout_ms")]
	pub timeout_ms: u64,
}

fn default_qdrant_timeout_ms() -> u64 {
	5_000
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub llm: LlmProviderConfig,
	pub web_search: WebSearchProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct WebSearchProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub candidates_per_source: u32,
	pub final_limit: usize,
	pub target_min_results: usize,
	pub target_max_results: usize,
	pub threshold: SearchThreshold,
	pub fusion: SearchFusion,
	pub fallback: SearchFallback,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			candidates_per_source: 100,
			final_limit: 50,
			target_min_results: 3,
			target_max_results: 15,
			threshold: SearchThreshold::default(),
			fusion: SearchFusion::default(),
			fallback: SearchFallback::default(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchThreshold {
	pub default: f32,
	pub min: f32,
	pub max: f32,
	/// Per-keyword threshold deltas; a key matches when it is contained in a query keyword.
	pub keyword_adjustments: HashMap<String, f32>,
	/// Per-region threshold deltas, matched on the exact region filter value.
	pub region_adjustments: HashMap<String, f32>,
}
impl Default for SearchThreshold {
	fn default() -> Self {
		let keyword_adjustments = [
			("지원금", -0.05),
			("보조금", -0.05),
			("지원사업", -0.05),
			("정책", -0.05),
			("창업", -0.05),
			("청년", -0.05),
			("중소기업", -0.05),
			("소상공인", -0.05),
			("r&d", 0.05),
			("수출", 0.05),
			("특허", 0.05),
		]
		.into_iter()
		.map(|(keyword, delta)| (keyword.to_string(), delta))
		.collect();
		let region_adjustments =
			[("전국", -0.05)].into_iter().map(|(region, delta)| (region.to_string(), delta)).collect();

		Self { default: 0.25, min: 0.15, max: 0.50, keyword_adjustments, region_adjustments }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchFusion {
	pub mode: FusionMode,
	pub rrf_k: u32,
	pub dense_weight: f32,
	pub sparse_weight: f32,
	pub sparse_min_score: f32,
}
impl Default for SearchFusion {
	fn default() -> Self {
		Self {
			mode: FusionMode::Rrf,
			rrf_k: 60,
			dense_weight: 0.7,
			sparse_weight: 0.3,
			sparse_min_score: 0.1,
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FusionMode {
	Rrf,
	Weighted,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchFallback {
	pub min_results: usize,
	pub min_top_score: f32,
	pub web_max_results: u32,
}
impl Default for SearchFallback {
	fn default() -> Self {
		Self { min_results: 2, min_top_score: 0.35, web_max_results: 5 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Chat {
	pub max_history_turns: usize,
	pub web_only_keywords: Vec<String>,
}
impl Default for Chat {
	fn default() -> Self {
		// Homepage-style wording ("홈페이지", "주소") stays out of this lexicon
		// on purpose; those queries route through the policy branch and the
		// sufficiency check adds the web supplement.
		let web_only_keywords = [
			"링크",
			"url",
			"어디서 신청",
			"신청 방법",
			"신청하는 방법",
			"신청서 다운로드",
			"양식 다운로드",
			"접수",
			"접수처",
			"공고문",
			"where to apply",
			"how to apply",
		]
		.into_iter()
		.map(str::to_string)
		.collect();

		Self { max_history_turns: 25, web_only_keywords }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub ttl_seconds: u64,
	pub sweep_interval_seconds: u64,
}
impl Default for Cache {
	fn default() -> Self {
		Self { ttl_seconds: 86_400, sweep_interval_seconds: 300 }
	}
}
