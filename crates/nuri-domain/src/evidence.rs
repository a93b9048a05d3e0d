use serde::{Deserialize, Serialize};

use crate::policy::DocumentChunk;

pub const EXCERPT_MAX_CHARS: usize = 200;

const INTERNAL_CITATION_LABEL: &str = "정책문서";
const WEB_CITATION_LABEL: &str = "웹";

/// Structured source attribution for an answer or a search hit, in wire shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Evidence {
	Internal {
		source: String,
		content: String,
		score: f32,
		policy_id: i64,
		url: String,
		link_type: String,
	},
	Web {
		source: String,
		content: String,
		score: f32,
		url: String,
		fetched_date: String,
		link_type: String,
	},
}
impl Evidence {
	pub fn internal(chunk: &DocumentChunk, score: f32) -> Self {
		Self::Internal {
			source: format!("정책 문서 (섹션: {})", chunk.doc_type),
			content: excerpt(&chunk.content, EXCERPT_MAX_CHARS),
			score,
			policy_id: chunk.policy_id,
			url: format!("/policy/{}", chunk.policy_id),
			link_type: "policy_detail".to_string(),
		}
	}

	pub fn web(
		title: &str,
		snippet: &str,
		score: f32,
		url: &str,
		fetched_date: impl Into<String>,
	) -> Self {
		Self::Web {
			source: title.to_string(),
			content: excerpt(snippet, EXCERPT_MAX_CHARS),
			score,
			url: url.to_string(),
			fetched_date: fetched_date.into(),
			link_type: "external".to_string(),
		}
	}

	pub fn is_internal(&self) -> bool {
		matches!(self, Self::Internal { .. })
	}
}

pub fn excerpt(text: &str, max_chars: usize) -> String {
	if text.chars().count() <= max_chars {
		return text.to_string();
	}

	let mut out = text.chars().take(max_chars).collect::<String>();

	out.push_str("...");

	out
}

/// 1-based citation indices extracted from an answer, one list per evidence kind.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CitationRefs {
	pub internal: Vec<usize>,
	pub web: Vec<usize>,
}

/// Parses `[정책문서 i]` / `[웹 j]` tokens, including comma lists and mixed
/// brackets such as `[정책문서 1, 웹 2]`. A bare number inside a bracket
/// inherits the preceding label of that bracket.
pub fn parse_citations(answer: &str) -> CitationRefs {
	let mut refs = CitationRefs::default();
	let mut rest = answer;

	while let Some(open) = rest.find('[') {
		let after_open = &rest[open + 1..];
		let Some(close) = after_open.find(']') else {
			break;
		};
		let body = &after_open[..close];
		let mut label = None;

		for part in body.split(',') {
			let part = part.trim();

			let (part_label, digits) = if let Some(tail) = part.strip_prefix(INTERNAL_CITATION_LABEL)
			{
				(Some(CitationKind::Internal), tail.trim_start())
			} else if let Some(tail) = part.strip_prefix(WEB_CITATION_LABEL) {
				(Some(CitationKind::Web), tail.trim_start())
			} else {
				(None, part)
			};

			if part_label.is_some() {
				label = part_label;
			}

			let Some(kind) = label else {
				continue;
			};
			let Ok(index) = digits.parse::<usize>() else {
				continue;
			};

			match kind {
				CitationKind::Internal => refs.internal.push(index),
				CitationKind::Web => refs.web.push(index),
			}
		}

		rest = &after_open[close + 1..];
	}

	refs
}

/// True when every citation token in `answer` resolves to an existing evidence
/// entry (`0 < i <= internal_count`, `0 < j <= web_count`).
pub fn citations_are_valid(answer: &str, internal_count: usize, web_count: usize) -> bool {
	let refs = parse_citations(answer);

	refs.internal.iter().all(|index| (1..=internal_count).contains(index))
		&& refs.web.iter().all(|index| (1..=web_count).contains(index))
}

#[derive(Clone, Copy)]
enum CitationKind {
	Internal,
	Web,
}

#[cfg(test)]
mod tests {
	use super::*;
	use uuid::Uuid;

	fn chunk(policy_id: i64, content: &str) -> DocumentChunk {
		DocumentChunk {
			chunk_id: Uuid::new_v4(),
			policy_id,
			chunk_index: 0,
			doc_type: "support".to_string(),
			content: content.to_string(),
		}
	}

	#[test]
	fn internal_evidence_serializes_in_wire_shape() {
		let evidence = Evidence::internal(&chunk(507, "지원 금액은 최대 8억원"), 0.82);
		let json = serde_json::to_value(&evidence).expect("Failed to serialize evidence.");

		assert_eq!(json["type"], "internal");
		assert_eq!(json["policy_id"], 507);
		assert_eq!(json["url"], "/policy/507");
		assert_eq!(json["link_type"], "policy_detail");
		assert_eq!(json["source"], "정책 문서 (섹션: support)");
	}

	#[test]
	fn web_evidence_serializes_in_wire_shape() {
		let evidence = Evidence::web("창업 지원", "snippet", 0.5, "https://example.kr", "2025-11-02");
		let json = serde_json::to_value(&evidence).expect("Failed to serialize evidence.");

		assert_eq!(json["type"], "web");
		assert_eq!(json["url"], "https://example.kr");
		assert_eq!(json["link_type"], "external");
		assert_eq!(json["fetched_date"], "2025-11-02");
	}

	#[test]
	fn excerpt_truncates_on_char_boundaries() {
		let long = "가".repeat(300);
		let out = excerpt(&long, EXCERPT_MAX_CHARS);

		assert_eq!(out.chars().count(), EXCERPT_MAX_CHARS + 3);
		assert!(out.ends_with("..."));
		assert_eq!(excerpt("짧은 내용", EXCERPT_MAX_CHARS), "짧은 내용");
	}

	#[test]
	fn parses_single_citations() {
		let refs = parse_citations("지원 금액은 최대 8억원입니다 [정책문서 1]. 신청은 [웹 2] 참고.");

		assert_eq!(refs.internal, vec![1]);
		assert_eq!(refs.web, vec![2]);
	}

	#[test]
	fn parses_comma_lists_and_mixed_brackets() {
		let refs = parse_citations("근거는 [정책문서 1, 2]와 [정책문서 3, 웹 1] 입니다.");

		assert_eq!(refs.internal, vec![1, 2, 3]);
		assert_eq!(refs.web, vec![1]);
	}

	#[test]
	fn ignores_non_citation_brackets() {
		let refs = parse_citations("[참고] 대괄호 [2024년] 안의 일반 텍스트는 무시합니다.");

		assert_eq!(refs, CitationRefs::default());
	}

	#[test]
	fn validates_citation_ranges() {
		let answer = "금액은 [정책문서 1] 기준이며 링크는 [웹 1] 참고.";

		assert!(citations_are_valid(answer, 1, 1));
		assert!(!citations_are_valid(answer, 0, 1));
		assert!(!citations_are_valid("[정책문서 4]", 3, 0));
		assert!(citations_are_valid("인용 없는 답변입니다.", 0, 0));
	}
}
