use regex::Regex;
use std::sync::LazyLock;

// A run of terminal punctuation followed by whitespace ends a sentence.
static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.!?]+)\s+").expect("valid sentence regex"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static FILLER: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives: Vec<String> = FILLER_PHRASES.iter().map(|p| regex::escape(p)).collect();
    Regex::new(&format!("(?i){}", alternatives.join("|"))).expect("valid filler regex")
});

static REPEATED_TERMINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("valid punctuation regex"));

static REPEATED_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;]+").expect("valid separator regex"));

/// Phrases video models tend to over-weight; stripped from generated prompts.
const FILLER_PHRASES: &[&str] = &[
    "high quality",
    "professional",
    "cinematic",
    "award winning",
    "stunning",
    "beautiful",
    "amazing",
    "incredible",
    "perfect",
    "best",
    "top quality",
    "premium",
    "4k",
    "8k",
    "ultra hd",
    "high resolution",
];

/// Splits narration into sentences at `.`, `!` or `?` followed by whitespace.
///
/// Runs of punctuation such as `...` or `?!` count as one boundary. No attempt
/// is made to recognise abbreviations, so "Dr. Smith" becomes two sentences.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for cap in SENTENCE_BREAK.captures_iter(text) {
        let (Some(whole), Some(punct)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        push_trimmed(&mut sentences, &text[start..punct.end()]);
        start = whole.end();
    }
    push_trimmed(&mut sentences, &text[start..]);
    sentences
}

fn push_trimmed(out: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        out.push(piece.to_string());
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Normalises a generated video prompt: collapses whitespace, removes filler
/// phrases, folds repeated punctuation and guarantees a trailing period.
pub fn clean_prompt(prompt: &str) -> String {
    let mut cleaned = WHITESPACE.replace_all(prompt.trim(), " ").into_owned();
    if cleaned.is_empty() {
        return cleaned;
    }

    cleaned = FILLER.replace_all(&cleaned, "").into_owned();
    cleaned = REPEATED_TERMINAL.replace_all(&cleaned, ".").into_owned();
    cleaned = REPEATED_SEPARATOR.replace_all(&cleaned, ",").into_owned();
    cleaned = WHITESPACE.replace_all(cleaned.trim(), " ").into_owned();

    if !cleaned.ends_with('.') {
        cleaned.push('.');
    }
    cleaned
}

/// Returns at most `max_chars` characters of `text`, marking the cut with `...`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{head}...")
}

/// Lowercase ASCII identifier built from `text`, e.g. "How DNS works?" -> "how-dns-works".
pub fn slugify(text: &str) -> String {
    let slug = text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}
