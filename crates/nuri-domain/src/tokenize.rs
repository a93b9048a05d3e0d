use std::{collections::HashSet, sync::LazyLock};

/// Korean particles, connectives, and other function words dropped during
/// tokenization. The corpus is Korean-dominant; Latin text and digits pass
/// through untouched.
static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
	[
		"은", "는", "이", "가", "을", "를", "의", "에", "에서", "로", "으로", "와", "과", "도",
		"만", "뿐", "부터", "까지", "에게", "한테", "께", "그리고", "그러나", "하지만", "또한",
		"또", "및", "등", "하다", "되다", "있다", "없다", "같다", "위한", "통한", "대한", "것",
		"수", "중", "내", "외",
	]
	.into_iter()
	.collect()
});

/// Index/query tokenization: lowercase, split on whitespace and punctuation,
/// keep tokens of length >= 2, drop stop words.
pub fn tokenize(text: &str) -> Vec<String> {
	let lowered = text.to_lowercase();
	let cleaned = lowered
		.chars()
		.map(|c| if c.is_alphanumeric() || c == '_' || c.is_whitespace() { c } else { ' ' })
		.collect::<String>();

	cleaned
		.split_whitespace()
		.filter(|token| token.chars().count() >= 2 && !STOPWORDS.contains(token))
		.map(str::to_string)
		.collect()
}

/// Query-keyword extraction for threshold tuning: whitespace split only, so
/// compound terms like "R&D" survive intact.
pub fn extract_keywords(query: &str) -> Vec<String> {
	query
		.to_lowercase()
		.split_whitespace()
		.filter(|word| word.chars().count() >= 2 && !STOPWORDS.contains(word))
		.map(str::to_string)
		.collect()
}
