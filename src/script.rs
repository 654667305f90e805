use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::utils::truncate_chars;

/// Anything that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct ChatClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

impl ChatClient {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.services.llm_endpoint.clone(),
            model: config.services.llm_model.clone(),
            api_key: std::env::var(&config.services.llm_api_key_env).ok(),
        }
    }
}

#[async_trait]
impl TextGenerator for ChatClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        debug!(
            "[live] chat completion: model={} prompt_len={}",
            self.model,
            prompt.len()
        );
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.7,
            max_tokens: 4000,
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(USER_AGENT, "prompt2video/0.1")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {key}"));
        }

        let response: ChatResponse = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Unexpected chat completion response")?;

        let text = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .context("Chat completion returned no choices")?;
        debug!("Chat completion returned {} characters", text.len());
        Ok(text.trim().to_string())
    }
}

/// Offline generator that echoes the start of each prompt.
pub struct StubGenerator;

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        debug!("[stub] completion for prompt of {} chars", prompt.len());
        let head = prompt.split_whitespace().collect::<Vec<_>>().join(" ");
        Ok(format!("[LLM output for: {}]", truncate_chars(&head, 50)))
    }
}

pub fn script_prompt(topic: &str, config: &Config) -> String {
    format!(
        "Write a {duration}-second narration script explaining \"{topic}\".\n\n\
         Requirements:\n\
         - Exactly {words} words (for {wpm} words per minute pace)\n\
         - Clear, flowing explanation that builds understanding\n\
         - Natural progression from basic to deeper concepts\n\
         - Engaging and easy to understand\n\
         - No jargon unless immediately explained\n\
         - Must work as continuous narration (no scene breaks)\n\n\
         Write ONLY the narration text, no formatting or metadata.",
        duration = config.video.total_duration,
        words = config.target_words(),
        wpm = config.timing.words_per_minute,
    )
}

pub async fn generate_script(
    generator: &dyn TextGenerator,
    topic: &str,
    config: &Config,
) -> anyhow::Result<String> {
    info!(
        "Requesting a {}-word script about {:?}",
        config.target_words(),
        topic
    );
    generator
        .complete(&script_prompt(topic, config))
        .await
        .context("Script generation failed")
}

/// Deterministic offline narration with one sentence per segment, each sized
/// to the per-segment word budget.
pub fn placeholder_script(topic: &str, config: &Config) -> String {
    let words_per_sentence = config.segment_plan().words_per_segment().max(4);
    (1..=config.num_segments())
        .map(|n| {
            let lead = format!("Part {n} about {topic}");
            let mut words: Vec<String> = lead.split_whitespace().map(str::to_string).collect();
            let filler = ["explains", "one", "more", "idea", "in", "plain", "words"];
            let missing = words_per_sentence.saturating_sub(words.len());
            words.extend(filler.iter().cycle().take(missing).map(|w| w.to_string()));
            words.truncate(words_per_sentence);
            format!("{}.", words.join(" "))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::segment_script;
    use crate::utils::{split_sentences, word_count};
    use pretty_assertions::assert_eq;

    #[test]
    fn prompt_states_word_budget() {
        let prompt = script_prompt("how wifi works", &Config::default());
        let opening = "Write a 45-second narration script explaining \"how wifi works\".";
        assert!(prompt.starts_with(opening));
        assert!(prompt.contains("Exactly 112 words (for 150 words per minute pace)"));
    }

    #[test]
    fn placeholder_has_one_sized_sentence_per_segment() {
        let config = Config::default();
        let script = placeholder_script("caching", &config);
        let sentences = split_sentences(&script);
        assert_eq!(sentences.len(), 9);
        assert_eq!(
            sentences[0],
            "Part 1 about caching explains one more idea in plain words."
        );
        for sentence in &sentences {
            assert_eq!(word_count(sentence), 11);
        }
        let segments = segment_script(&script, &config.segment_plan()).unwrap();
        assert_eq!(segments.len(), 9);
    }

    #[tokio::test]
    async fn stub_generator_echoes_prompt_head() {
        let text = StubGenerator
            .complete("Define a   consistent visual style for a video explaining \"dns\".")
            .await
            .unwrap();
        assert_eq!(
            text,
            "[LLM output for: Define a consistent visual style for a video expla...]"
        );
    }
}
