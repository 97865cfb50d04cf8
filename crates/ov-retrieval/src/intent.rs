//! Intent Analyzer (§4.I): turns a session summary, the last few
//! messages, and a user query into 0-5 `TypedQuery` items against an
//! injected `Llm`, with a deterministic chit-chat pre-filter ahead of it.

use async_trait::async_trait;
use ov_core::types::TypedQuery;

const LAST_N_MESSAGES: usize = 5;
const MAX_QUERIES: usize = 5;

#[async_trait]
pub trait Llm: Send + Sync {
    /// Propose candidate `(text, context_type, intent, priority)` tuples
    /// for the given prompt. The analyzer validates and clamps the result;
    /// the trait itself carries no style contract.
    async fn propose_queries(
        &self,
        session_summary: &str,
        recent_messages: &[String],
        query: &str,
    ) -> anyhow::Result<Vec<(String, String, String, u8)>>;
}

/// Short inputs matching a closed set of greeting/acknowledgement
/// patterns, scored the same lowercased-`.contains()` way the reference
/// router's keyword classifier scores its dimensions.
const CHITCHAT_KEYWORDS: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank you", "ok", "okay", "cool",
    "got it", "sounds good", "great", "nice", "bye", "goodbye", "yep", "yes", "no",
];

fn is_chitchat(query: &str) -> bool {
    let trimmed = query.trim().to_lowercase();
    if trimmed.is_empty() {
        return true;
    }
    let word_count = trimmed.split_whitespace().count();
    if word_count > 6 {
        return false;
    }
    let stripped: String = trimmed.chars().filter(|c| c.is_alphanumeric() || c.is_whitespace()).collect();
    CHITCHAT_KEYWORDS.iter().any(|kw| stripped == *kw || stripped.starts_with(&format!("{kw} ")))
}

pub struct IntentAnalyzer {
    llm: std::sync::Arc<dyn Llm>,
}

impl IntentAnalyzer {
    pub fn new(llm: std::sync::Arc<dyn Llm>) -> Self {
        Self { llm }
    }

    pub async fn analyze(
        &self,
        session_summary: &str,
        messages: &[String],
        query: &str,
    ) -> anyhow::Result<Vec<TypedQuery>> {
        if is_chitchat(query) {
            return Ok(Vec::new());
        }
        let recent: Vec<String> = messages.iter().rev().take(LAST_N_MESSAGES).rev().cloned().collect();
        let proposed = self.llm.propose_queries(session_summary, &recent, query).await?;

        let mut queries: Vec<TypedQuery> = proposed
            .into_iter()
            .take(MAX_QUERIES)
            .map(|(text, context_type, intent, priority)| {
                let text = enforce_style(&context_type, &text);
                TypedQuery::new(text, context_type, intent, priority)
            })
            .collect();

        queries.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(queries)
    }
}

/// Enforce §4.I's post-generation style constraints independent of
/// whatever the model actually produced.
fn enforce_style(context_type: &str, text: &str) -> String {
    let text = text.trim();
    match context_type {
        "skill" => {
            if starts_with_imperative_verb(text) {
                text.to_string()
            } else {
                format!("perform {text}")
            }
        }
        "memory" => {
            let lower = text.to_lowercase();
            if lower.starts_with("user") {
                text.to_string()
            } else {
                format!("user {text}")
            }
        }
        _ => text.to_string(),
    }
}

fn starts_with_imperative_verb(text: &str) -> bool {
    const IMPERATIVE_SUFFIXES: &[&str] = &["ate", "ize", "fy"];
    let Some(first) = text.split_whitespace().next() else { return false };
    let first = first.to_lowercase();
    !first.ends_with("ing")
        && !first.ends_with("s")
        || IMPERATIVE_SUFFIXES.iter().any(|s| first.ends_with(s))
}
