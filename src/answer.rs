//! Structured answers returned by the generative step.

use crate::error::{RagError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How sure the model claims to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        };
        f.write_str(label)
    }
}

/// The answer object the model must produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Answer {
    pub answer: String,
    pub confidence: Confidence,
    pub sources: Vec<String>,
    pub follow_up_questions: Vec<String>,
}

/// Produces an [`Answer`] for a query, optionally grounded on document excerpts.
#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn answer(&self, query: &str, context: Option<&str>) -> Result<Answer>;

    /// Model name reported back to callers
    fn model(&self) -> &str;
}

/// Build the prompt sent to the generative model.
pub fn build_prompt(query: &str, context: Option<&str>) -> String {
    let documents = match context {
        Some(context) => format!(
            "\n**Relevant information from uploaded documents:**\n{}\n",
            context
        ),
        None => String::new(),
    };
    let sources_rule = if context.is_some() {
        "Prioritize information from the provided document excerpts and list them in sources."
    } else {
        "Generate 2-3 plausible, specific-sounding document titles or internal references for the sources array."
    };

    format!(
        r#"You are the **Cognitive Search Engine** backend. Your primary function is to analyze a user's query and provide a precise, structured summary of the best available information.
{documents}
**You MUST adhere to these critical rules:**
1.  **Structure:** Always respond with a single, valid JSON object. Do not include any text, thoughts, or markdown (like ```json) outside of the JSON block itself.
2.  **Focus:** Act as if you are summarizing content you've retrieved from documents. Your answers must be factual and directly address the user's request.
3.  **Sources:** {sources_rule}
4.  **Confidence:** Your confidence level must reflect the complexity of the query. Use 'high' for simple fact retrieval, 'medium' for synthesis of multiple concepts, and 'low' if the query is highly speculative.

**JSON Schema Required:**
{{
    "answer": "Your detailed, summarized answer (minimum 50 words) here. Begin with a direct one-sentence summary.",
    "confidence": "[must be 'high', 'medium', or 'low']",
    "sources": ["Source 1", "Source 2"],
    "follow_up_questions": ["Question 1", "Question 2"]
}}


User Query: {query}"#
    )
}

/// Remove code fences the model sometimes wraps around its JSON.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse raw model output into an [`Answer`].
pub fn parse_answer(raw: &str) -> Result<Answer> {
    let text = strip_code_fences(raw);
    serde_json::from_str(text)
        .map_err(|e| RagError::AnswerFormat(format!("{e}: {}", preview(text))))
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "answer": "Chunks overlap so that facts spanning a boundary are still retrievable.",
        "confidence": "high",
        "sources": ["manual.pdf"],
        "follow_up_questions": ["How large is a chunk?"]
    }"#;

    #[test]
    fn parses_plain_json() {
        let answer = parse_answer(VALID).unwrap();
        assert_eq!(answer.confidence, Confidence::High);
        assert_eq!(answer.sources, vec!["manual.pdf"]);
        assert_eq!(answer.follow_up_questions.len(), 1);
    }

    #[test]
    fn strips_fences() {
        let fenced = format!("```json\n{VALID}\n```");
        assert_eq!(parse_answer(&fenced).unwrap(), parse_answer(VALID).unwrap());
        let bare = format!("  ```\n{VALID}```  ");
        assert!(parse_answer(&bare).is_ok());
    }

    #[test]
    fn rejects_missing_fields_and_bad_confidence() {
        let missing = r#"{"answer": "x", "confidence": "low", "sources": []}"#;
        assert!(matches!(parse_answer(missing), Err(RagError::AnswerFormat(_))));

        let bad = r#"{"answer": "x", "confidence": "certain", "sources": [], "follow_up_questions": []}"#;
        assert!(matches!(parse_answer(bad), Err(RagError::AnswerFormat(_))));

        assert!(parse_answer("Sorry, I cannot help with that.").is_err());
    }

    #[test]
    fn prompt_mentions_context_only_when_present() {
        let with = build_prompt("what is rag?", Some("[Document excerpt 1]:\nRAG is..."));
        assert!(with.contains("Relevant information from uploaded documents"));
        assert!(with.contains("[Document excerpt 1]"));
        assert!(with.ends_with("User Query: what is rag?"));

        let without = build_prompt("what is rag?", None);
        assert!(!without.contains("Relevant information"));
        assert!(without.contains("plausible"));
    }
}
