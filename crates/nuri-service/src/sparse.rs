use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use nuri_domain::{policy::DocumentChunk, tokenize};
use nuri_storage::qdrant::ScoredChunk;

/// Hard cap on the number of chunks pulled into the in-process index.
pub const MAX_INDEX_CHUNKS: usize = 10_000;

const K1: f32 = 1.5;
const B: f32 = 0.75;
/// IDF floor; keeps very common terms from zeroing out entirely.
const IDF_EPSILON: f32 = 0.25;

struct DocEntry {
	chunk: DocumentChunk,
	length: usize,
}

/// In-process BM25 index over document chunks. Built once from a full corpus
/// scroll and treated as immutable afterwards.
pub struct Bm25Index {
	docs: HashMap<Uuid, DocEntry>,
	avg_doc_len: f32,
	// term -> (chunk -> term frequency)
	postings: HashMap<String, HashMap<Uuid, u32>>,
}
impl Bm25Index {
	/// Single pass over the corpus. Terms in `boost_terms` are counted twice,
	/// mirroring the keyword list used for dynamic thresholds.
	pub fn build(chunks: &[DocumentChunk], boost_terms: &HashSet<String>) -> Self {
		let mut docs = HashMap::new();
		let mut postings: HashMap<String, HashMap<Uuid, u32>> = HashMap::new();
		let mut total_length = 0_usize;

		for chunk in chunks {
			if docs.contains_key(&chunk.chunk_id) || chunk.content.trim().is_empty() {
				continue;
			}

			let mut length = 0_usize;
			let mut frequencies: HashMap<String, u32> = HashMap::new();

			for token in tokenize::tokenize(&chunk.content) {
				let weight = if boost_terms.contains(&token) { 2 } else { 1 };

				length += weight as usize;
				*frequencies.entry(token).or_insert(0) += weight;
			}

			if length == 0 {
				continue;
			}

			for (term, frequency) in frequencies {
				postings.entry(term).or_default().insert(chunk.chunk_id, frequency);
			}

			docs.insert(chunk.chunk_id, DocEntry { chunk: chunk.clone(), length });
			total_length += length;
		}

		let avg_doc_len =
			if docs.is_empty() { 0.0 } else { total_length as f32 / docs.len() as f32 };

		Self { docs, avg_doc_len, postings }
	}

	pub fn len(&self) -> usize {
		self.docs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.docs.is_empty()
	}

	/// Top-k chunks by BM25 score, each at or above `min_score`. Ties are
	/// broken by ascending chunk id for determinism.
	pub fn search(&self, query: &str, k: usize, min_score: f32) -> Vec<ScoredChunk> {
		if self.docs.is_empty() {
			return Vec::new();
		}

		let mut scores: HashMap<Uuid, f32> = HashMap::new();

		for term in tokenize::tokenize(query) {
			let Some(posting) = self.postings.get(&term) else {
				continue;
			};
			let idf = self.idf(posting.len());

			for (chunk_id, frequency) in posting {
				let entry = &self.docs[chunk_id];
				let tf = *frequency as f32;
				let denominator =
					tf + K1 * (1.0 - B + B * entry.length as f32 / self.avg_doc_len);

				*scores.entry(*chunk_id).or_insert(0.0) += idf * tf * (K1 + 1.0) / denominator;
			}
		}

		let mut hits = scores
			.into_iter()
			.filter(|(_, score)| *score >= min_score)
			.collect::<Vec<_>>();

		hits.sort_by(|(id_a, score_a), (id_b, score_b)| {
			score_b.total_cmp(score_a).then_with(|| id_a.cmp(id_b))
		});
		hits.truncate(k);

		hits.into_iter()
			.map(|(chunk_id, score)| ScoredChunk { chunk: self.docs[&chunk_id].chunk.clone(), score })
			.collect()
	}

	fn idf(&self, doc_freq: usize) -> f32 {
		let n = self.docs.len() as f32;
		let df = doc_freq as f32;
		let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

		idf.max(IDF_EPSILON)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn chunk(id: u128, policy_id: i64, content: &str) -> DocumentChunk {
		DocumentChunk {
			chunk_id: Uuid::from_u128(id),
			policy_id,
			chunk_index: 0,
			doc_type: "support".to_string(),
			content: content.to_string(),
		}
	}

	fn corpus() -> Vec<DocumentChunk> {
		vec![
			chunk(1, 1, "청년 창업 지원금 최대 8억원 지원"),
			chunk(2, 2, "수출 바우처 해외 판로 개척 지원"),
			chunk(3, 3, "창업 교육 프로그램 운영 안내"),
			chunk(4, 4, "농업인 스마트팜 보조금 안내"),
		]
	}

	#[test]
	fn ranks_matching_chunks_by_score() {
		let index = Bm25Index::build(&corpus(), &HashSet::new());
		let hits = index.search("창업 지원금", 10, 0.0);

		assert!(!hits.is_empty());
		assert_eq!(hits[0].chunk.policy_id, 1);
		assert!(hits.iter().all(|hit| {
			hit.chunk.content.contains("창업") || hit.chunk.content.contains("지원금")
		}));

		for window in hits.windows(2) {
			assert!(window[0].score >= window[1].score);
		}
	}

	#[test]
	fn respects_top_k_and_min_score() {
		let index = Bm25Index::build(&corpus(), &HashSet::new());

		assert_eq!(index.search("창업", 1, 0.0).len(), 1);
		assert!(index.search("창업", 10, f32::MAX).is_empty());
	}

	#[test]
	fn unknown_terms_yield_no_hits() {
		let index = Bm25Index::build(&corpus(), &HashSet::new());

		assert!(index.search("존재하지않는검색어", 10, 0.0).is_empty());
	}

	#[test]
	fn ties_break_by_ascending_chunk_id() {
		let chunks = vec![chunk(9, 1, "동일한 내용 문서"), chunk(3, 2, "동일한 내용 문서")];
		let index = Bm25Index::build(&chunks, &HashSet::new());
		let hits = index.search("동일한 내용", 10, 0.0);

		assert_eq!(hits.len(), 2);
		assert_eq!(hits[0].chunk.chunk_id, Uuid::from_u128(3));
		assert_eq!(hits[1].chunk.chunk_id, Uuid::from_u128(9));
	}

	#[test]
	fn boosted_terms_outscore_unboosted_ones() {
		let chunks = vec![
			chunk(1, 1, "창업 프로그램 모집 공고 안내문"),
			chunk(2, 2, "교육 프로그램 모집 공고 안내문"),
		];
		let boost = ["창업".to_string()].into_iter().collect();
		let plain = Bm25Index::build(&chunks, &HashSet::new());
		let boosted = Bm25Index::build(&chunks, &boost);
		let plain_score = plain.search("창업", 1, 0.0)[0].score;
		let boosted_score = boosted.search("창업", 1, 0.0)[0].score;

		assert!(boosted_score > plain_score);
	}

	#[test]
	fn duplicate_and_empty_chunks_are_skipped() {
		let mut chunks = corpus();

		chunks.push(chunk(1, 1, "중복 청크"));
		chunks.push(chunk(99, 9, "   "));

		let index = Bm25Index::build(&chunks, &HashSet::new());

		assert_eq!(index.len(), 4);
	}
}
