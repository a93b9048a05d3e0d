use std::collections::HashMap;

use uuid::Uuid;

use nuri_config::{FusionMode, SearchFusion};
use nuri_domain::policy::{DocumentChunk, MatchKind, SearchHit};
use nuri_storage::qdrant::ScoredChunk;

pub(crate) struct FusedChunk {
	pub chunk: DocumentChunk,
	pub score: f32,
	pub match_kind: MatchKind,
}

/// Fuses the dense and sparse hit lists into one ranked chunk list. Chunks
/// absent from a source receive no contribution from it.
pub(crate) fn fuse(
	dense: &[ScoredChunk],
	sparse: &[ScoredChunk],
	cfg: &SearchFusion,
) -> Vec<FusedChunk> {
	match cfg.mode {
		FusionMode::Rrf => fuse_rrf(dense, sparse, cfg.rrf_k),
		FusionMode::Weighted => fuse_weighted(dense, sparse, cfg.dense_weight, cfg.sparse_weight),
	}
}

/// Collapses chunk-level hits to policy level, keeping the best-scoring chunk
/// per policy and carrying its excerpt forward.
pub(crate) fn aggregate_by_policy(fused: Vec<FusedChunk>) -> Vec<SearchHit> {
	let mut best: HashMap<i64, FusedChunk> = HashMap::new();

	for candidate in fused {
		match best.get(&candidate.chunk.policy_id) {
			Some(current) if current.score >= candidate.score => {},
			_ => {
				best.insert(candidate.chunk.policy_id, candidate);
			},
		}
	}

	let mut hits = best
		.into_values()
		.map(|fused| SearchHit {
			policy_id: fused.chunk.policy_id,
			score: fused.score,
			match_kind: fused.match_kind,
			matched_excerpt: fused.chunk.content,
			chunk_index: fused.chunk.chunk_index,
			doc_type: fused.chunk.doc_type,
		})
		.collect::<Vec<_>>();

	hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.policy_id.cmp(&b.policy_id)));

	hits
}

struct Accumulator {
	chunk: DocumentChunk,
	score: f32,
	in_dense: bool,
	in_sparse: bool,
}

fn fuse_rrf(dense: &[ScoredChunk], sparse: &[ScoredChunk], rrf_k: u32) -> Vec<FusedChunk> {
	let k = rrf_k as f32;
	// Raw RRF tops out at 2/(k+1); rescale so a rank-1 hit in both sources
	// scores 1.0 and the dynamic threshold applies on the same scale as the
	// weighted mode.
	let scale = (k + 1.0) / 2.0;
	let mut accumulators: HashMap<Uuid, Accumulator> = HashMap::new();
	let mut add = |hit: &ScoredChunk, rank: usize, is_dense: bool| {
		let contribution = scale / (k + (rank + 1) as f32);
		let entry = accumulators.entry(hit.chunk.chunk_id).or_insert_with(|| Accumulator {
			chunk: hit.chunk.clone(),
			score: 0.0,
			in_dense: false,
			in_sparse: false,
		});

		entry.score += contribution;

		if is_dense {
			entry.in_dense = true;
		} else {
			entry.in_sparse = true;
		}
	};

	for (rank, hit) in dense.iter().enumerate() {
		add(hit, rank, true);
	}
	for (rank, hit) in sparse.iter().enumerate() {
		add(hit, rank, false);
	}

	collect_sorted(accumulators)
}

fn fuse_weighted(
	dense: &[ScoredChunk],
	sparse: &[ScoredChunk],
	dense_weight: f32,
	sparse_weight: f32,
) -> Vec<FusedChunk> {
	let dense_norms = min_max_normalize(dense);
	let sparse_norms = min_max_normalize(sparse);
	let mut accumulators: HashMap<Uuid, Accumulator> = HashMap::new();

	for (hit, normalized) in dense.iter().zip(dense_norms) {
		accumulators.insert(
			hit.chunk.chunk_id,
			Accumulator {
				chunk: hit.chunk.clone(),
				score: dense_weight * normalized,
				in_dense: true,
				in_sparse: false,
			},
		);
	}
	for (hit, normalized) in sparse.iter().zip(sparse_norms) {
		accumulators
			.entry(hit.chunk.chunk_id)
			.and_modify(|entry| {
				entry.score += sparse_weight * normalized;
				entry.in_sparse = true;
			})
			.or_insert_with(|| Accumulator {
				chunk: hit.chunk.clone(),
				score: sparse_weight * normalized,
				in_dense: false,
				in_sparse: true,
			});
	}

	collect_sorted(accumulators)
}

fn min_max_normalize(hits: &[ScoredChunk]) -> Vec<f32> {
	let Some(first) = hits.first() else {
		return Vec::new();
	};
	let (min, max) = hits.iter().fold((first.score, first.score), |(min, max), hit| {
		(min.min(hit.score), max.max(hit.score))
	});
	let range = max - min;

	hits.iter()
		.map(|hit| if range > 0.0 { (hit.score - min) / range } else { 1.0 })
		.collect()
}

fn collect_sorted(accumulators: HashMap<Uuid, Accumulator>) -> Vec<FusedChunk> {
	let mut fused = accumulators
		.into_values()
		.map(|entry| {
			let match_kind = match (entry.in_dense, entry.in_sparse) {
				(true, true) => MatchKind::Hybrid,
				(true, false) => MatchKind::Dense,
				_ => MatchKind::Sparse,
			};

			FusedChunk { chunk: entry.chunk, score: entry.score, match_kind }
		})
		.collect::<Vec<_>>();

	fused.sort_by(|a, b| {
		b.score.total_cmp(&a.score).then_with(|| a.chunk.chunk_id.cmp(&b.chunk.chunk_id))
	});

	fused
}
