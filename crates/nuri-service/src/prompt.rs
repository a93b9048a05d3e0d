use serde_json::Value;

use nuri_domain::{
	chat::{ChatRole, ChatTurn},
	policy::{DocumentChunk, PolicyInfo},
};
use nuri_providers::web_search::WebSearchResult;

/// Returned verbatim when the LLM call fails; the workflow still completes.
pub(crate) const FALLBACK_ANSWER: &str =
	"죄송합니다. 답변 생성 중 오류가 발생했습니다. 잠시 후 다시 시도해주세요.";

const HISTORY_WINDOW: usize = 10;

const DOCS_SYSTEM: &str =
	"당신은 정부 정책 전문 상담사입니다. 제공된 정책 문서를 기반으로 정확하게 답변하세요.";
const WEB_SYSTEM: &str =
	"당신은 정부 정책 전문 상담사입니다. 웹 검색 결과를 바탕으로 링크와 정보를 제공하세요.";
const HYBRID_SYSTEM: &str =
	"당신은 정부 정책 전문 상담사입니다. 정책 문서와 웹 검색 결과를 모두 활용하여 답변하세요.";

const CITATION_CONTRACT: &str = "\
[인용 규칙]
- 정책 문서에서 가져온 사실에는 문장 안에 [정책문서 i] 표기를 붙이세요.
- 웹 검색 결과에서 가져온 사실에는 [웹 j] 표기를 붙이세요.
- i, j는 위 목록의 1부터 시작하는 번호입니다.
- 여러 근거를 함께 인용할 때는 [정책문서 1, 2]처럼 쉼표로 구분하세요.
- 목록에 없는 번호는 인용하지 마세요.";

pub(crate) fn docs_only_messages(
	policy: &PolicyInfo,
	docs: &[DocumentChunk],
	history: &[ChatTurn],
	query: &str,
) -> Vec<Value> {
	let mut prompt = String::new();

	push_policy_info(&mut prompt, policy);
	push_docs(&mut prompt, docs);
	push_history(&mut prompt, history);
	push_question(&mut prompt, query);
	prompt.push_str(CITATION_CONTRACT);

	messages(DOCS_SYSTEM, prompt)
}

pub(crate) fn web_only_messages(
	policy: &PolicyInfo,
	web: &[WebSearchResult],
	history: &[ChatTurn],
	query: &str,
) -> Vec<Value> {
	let mut prompt = String::new();

	if !policy.is_empty() {
		prompt.push_str(&format!("[정책 정보]\n정책명: {}\n\n", policy.name));
	}

	push_web(&mut prompt, web);
	push_history(&mut prompt, history);
	push_question(&mut prompt, query);
	prompt.push_str(CITATION_CONTRACT);

	messages(WEB_SYSTEM, prompt)
}

pub(crate) fn hybrid_messages(
	policy: &PolicyInfo,
	docs: &[DocumentChunk],
	web: &[WebSearchResult],
	history: &[ChatTurn],
	query: &str,
) -> Vec<Value> {
	let mut prompt = String::new();

	push_policy_info(&mut prompt, policy);
	push_docs(&mut prompt, docs);
	push_web(&mut prompt, web);
	push_history(&mut prompt, history);
	push_question(&mut prompt, query);
	prompt.push_str(CITATION_CONTRACT);

	messages(HYBRID_SYSTEM, prompt)
}

fn messages(system: &str, prompt: String) -> Vec<Value> {
	vec![
		serde_json::json!({ "role": "system", "content": system }),
		serde_json::json!({ "role": "user", "content": prompt }),
	]
}

fn push_policy_info(prompt: &mut String, policy: &PolicyInfo) {
	prompt.push_str(&format!(
		"[정책 정보]\n정책명: {}\n개요: {}\n지원 대상: {}\n지원 내용: {}\n\n",
		policy.name, policy.overview, policy.apply_target, policy.support_description
	));
}

fn push_docs(prompt: &mut String, docs: &[DocumentChunk]) {
	prompt.push_str("[정책 문서]\n");

	for (index, doc) in docs.iter().enumerate() {
		prompt.push_str(&format!(
			"[정책문서 {}] (섹션: {})\n{}\n\n",
			index + 1,
			doc.doc_type,
			doc.content
		));
	}
}

fn push_web(prompt: &mut String, web: &[WebSearchResult]) {
	prompt.push_str("[웹 검색 결과]\n");

	for (index, source) in web.iter().enumerate() {
		prompt.push_str(&format!(
			"[웹 {}] {} ({})\n{}\n\n",
			index + 1,
			source.title,
			source.url,
			source.snippet
		));
	}
}

fn push_history(prompt: &mut String, history: &[ChatTurn]) {
	if history.is_empty() {
		return;
	}

	let skip = history.len().saturating_sub(HISTORY_WINDOW);

	prompt.push_str("[대화 이력]\n");

	for turn in &history[skip..] {
		let speaker = match turn.role {
			ChatRole::User => "사용자",
			ChatRole::Assistant => "상담사",
		};

		prompt.push_str(&format!("{speaker}: {}\n", turn.content));
	}

	prompt.push('\n');
}

fn push_question(prompt: &mut String, query: &str) {
	prompt.push_str(&format!("[질문]\n{query}\n\n"));
}
