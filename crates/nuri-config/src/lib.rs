mod types;

use std::{fs, path::Path};

use color_eyre::eyre;

pub use types::{
	Cache, Chat, Config, EmbeddingProviderConfig, FusionMode, LlmProviderConfig, Postgres,
	Providers, Qdrant, Search, SearchFallback, SearchFusion, SearchThreshold, Service, Storage,
	WebSearchProviderConfig,
};

pub fn load(path: &Path) -> color_eyre::Result<Config> {
	let raw = fs::read_to_string(path)?;

	let mut cfg: Config = toml::from_str(&raw)?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

fn normalize(cfg: &mut Config) {
	// Keyword deltas are matched against lowercased query tokens.
	let adjustments = std::mem::take(&mut cfg.search.threshold.keyword_adjustments);

	cfg.search.threshold.keyword_adjustments =
		adjustments.into_iter().map(|(keyword, delta)| (keyword.to_lowercase(), delta)).collect();
	cfg.chat.web_only_keywords.iter_mut().for_each(|keyword| *keyword = keyword.to_lowercase());
}

pub fn validate(cfg: &Config) -> color_eyre::Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(eyre::eyre!("service.http_bind must be non-empty."));
	}
	if cfg.service.admin_bind.trim().is_empty() {
		return Err(eyre::eyre!("service.admin_bind must be non-empty."));
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(eyre::eyre!("storage.postgres.pool_max_conns must be greater than zero."));
	}
	if cfg.storage.qdrant.vector_dim == 0 {
		return Err(eyre::eyre!("storage.qdrant.vector_dim must be greater than zero."));
	}
	if cfg.storage.qdrant.timeout_ms == 0 {
		return Err(eyre::eyre!("storage.qdrant.timeout_ms must be greater than zero."));
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(eyre::eyre!(
			"providers.embedding.dimensions must match storage.qdrant.vector_dim."
		));
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("llm", &cfg.providers.llm.api_key),
		("web_search", &cfg.providers.web_search.api_key),
	] {
		if key.trim().is_empty() {
			return Err(eyre::eyre!("Provider {label} api_key must be non-empty."));
		}
	}
	for (label, timeout_ms) in [
		("embedding", cfg.providers.embedding.timeout_ms),
		("llm", cfg.providers.llm.timeout_ms),
		("web_search", cfg.providers.web_search.timeout_ms),
	] {
		if timeout_ms == 0 {
			return Err(eyre::eyre!("Provider {label} timeout_ms must be greater than zero."));
		}
	}

	let threshold = &cfg.search.threshold;

	for (label, value) in
		[("default", threshold.default), ("min", threshold.min), ("max", threshold.max)]
	{
		if !value.is_finite() || !(0.0..=1.0).contains(&value) {
			return Err(eyre::eyre!("search.threshold.{label} must be in the range 0.0-1.0."));
		}
	}
	if threshold.min > threshold.max {
		return Err(eyre::eyre!("search.threshold.min must not exceed search.threshold.max."));
	}

	if cfg.search.candidates_per_source == 0 {
		return Err(eyre::eyre!("search.candidates_per_source must be greater than zero."));
	}
	if cfg.search.final_limit == 0 {
		return Err(eyre::eyre!("search.final_limit must be greater than zero."));
	}
	if cfg.search.target_min_results > cfg.search.target_max_results {
		return Err(eyre::eyre!(
			"search.target_min_results must not exceed search.target_max_results."
		));
	}

	let fusion = &cfg.search.fusion;

	if fusion.rrf_k == 0 {
		return Err(eyre::eyre!("search.fusion.rrf_k must be greater than zero."));
	}
	for (label, weight) in
		[("dense_weight", fusion.dense_weight), ("sparse_weight", fusion.sparse_weight)]
	{
		if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
			return Err(eyre::eyre!("search.fusion.{label} must be in the range 0.0-1.0."));
		}
	}
	if fusion.dense_weight + fusion.sparse_weight <= 0.0 {
		return Err(eyre::eyre!("search.fusion weights must not both be zero."));
	}
	if !fusion.sparse_min_score.is_finite() || fusion.sparse_min_score < 0.0 {
		return Err(eyre::eyre!("search.fusion.sparse_min_score must be zero or greater."));
	}

	if !cfg.search.fallback.min_top_score.is_finite() || cfg.search.fallback.min_top_score < 0.0 {
		return Err(eyre::eyre!("search.fallback.min_top_score must be zero or greater."));
	}
	if cfg.search.fallback.web_max_results == 0 {
		return Err(eyre::eyre!("search.fallback.web_max_results must be greater than zero."));
	}

	if cfg.chat.max_history_turns == 0 {
		return Err(eyre::eyre!("chat.max_history_turns must be greater than zero."));
	}
	if cfg.chat.web_only_keywords.is_empty() {
		return Err(eyre::eyre!("chat.web_only_keywords must be non-empty."));
	}

	if cfg.cache.ttl_seconds == 0 {
		return Err(eyre::eyre!("cache.ttl_seconds must be greater than zero."));
	}
	if cfg.cache.sweep_interval_seconds == 0 {
		return Err(eyre::eyre!("cache.sweep_interval_seconds must be greater than zero."));
	}

	Ok(())
}
