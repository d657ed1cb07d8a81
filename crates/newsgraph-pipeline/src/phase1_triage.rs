use std::collections::HashMap;
use std::sync::Arc;

use newsgraph_core::traits::{ChatMessage, CompletionRequest, LlmClient};
use newsgraph_core::types::InputItem;
use newsgraph_llm::PromptStore;
use serde::Deserialize;
use tracing::warn;

use crate::results::Phase1Result;

/// Above this length, a non-working-language item is carried forward
/// untranslated rather than spending an extra LLM call on it (spec.md §4.5
/// step 2: "if ... length < a configured cap, translate"). No constant name
/// for this appears in spec.md §6, so it's kept as an internal tuning knob
/// rather than promoted to an environment variable.
const TRANSLATION_LENGTH_CAP: usize = 20_000;

#[derive(Debug, Deserialize)]
struct TriageLlmOutput {
    is_relevant: bool,
    justification: String,
    category: String,
    #[serde(default)]
    keywords: Vec<String>,
    confidence: f32,
}

/// Normalizes whitespace, strips control characters, collapses duplicate
/// blank lines (spec.md §4.5 step 1).
pub fn clean_text(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == ' ')
        .collect();

    let mut lines = Vec::new();
    let mut blank_run = false;
    for line in stripped.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            if !blank_run {
                lines.push(String::new());
            }
            blank_run = true;
        } else {
            lines.push(collapsed);
            blank_run = false;
        }
    }
    lines.join("\n").trim().to_string()
}

async fn translate(
    llm: &Arc<dyn LlmClient>,
    text: &str,
    target_language: &str,
    timeout_seconds: u64,
) -> Option<String> {
    let _ = timeout_seconds;
    let request = CompletionRequest {
        messages: vec![
            ChatMessage::system(format!(
                "Translate the user's text to {target_language}. Respond with only the translation, no commentary."
            )),
            ChatMessage::user(text.to_string()),
        ],
        temperature: 0.0,
        max_tokens: 4096,
    };
    match llm.complete(request).await {
        Ok(response) => Some(response.content),
        Err(err) => {
            warn!(support_code = err.support_code(), "translation call failed, proceeding untranslated");
            None
        }
    }
}

/// Runs Phase 1 (spec.md §4.5). Never returns an `Err`: an unrecoverable LLM
/// failure is itself the phase's declared fallback (`is_relevant=true`,
/// confidence 0, a synthetic justification) rather than a propagated error —
/// the controller must never drop an item for infrastructure reasons alone.
pub async fn run(
    item: &InputItem,
    llm: &Arc<dyn LlmClient>,
    prompts: &PromptStore,
    working_language: &str,
    llm_max_tokens: u32,
    llm_temperature: f32,
) -> Phase1Result {
    let cleaned_text = clean_text(item.text());
    let mut warnings = Vec::new();

    if cleaned_text.chars().count() < 50 {
        warnings.push("fragment shorter than 50 characters; extraction may legitimately be empty".to_string());
    }

    let detected_language = item
        .language_hint()
        .map(str::to_string)
        .unwrap_or_else(|| working_language.to_string());

    let translated_text = if detected_language != working_language
        && cleaned_text.chars().count() < TRANSLATION_LENGTH_CAP
    {
        translate(llm, &cleaned_text, working_language, 30).await
    } else {
        None
    };

    let mut values: HashMap<&str, String> = HashMap::new();
    values.insert("TITLE", item.title());
    values.insert("SOURCE_TYPE", item.source_type());
    values.insert("ORIGIN_COUNTRY", item.origin_country());
    values.insert("SOURCE_DATE", item.source_date());
    values.insert(
        "CONTENT",
        translated_text.clone().unwrap_or_else(|| cleaned_text.clone()),
    );

    let prompt = match prompts.render("triage", &values) {
        Ok(p) => p,
        Err(err) => {
            warnings.push(format!("prompt render failed: {err}"));
            return fallback(cleaned_text, detected_language, translated_text, warnings);
        }
    };

    let request = CompletionRequest {
        messages: vec![ChatMessage::user(prompt)],
        temperature: llm_temperature,
        max_tokens: llm_max_tokens,
    };

    let response = match llm.complete(request).await {
        Ok(r) => r,
        Err(err) => {
            warnings.push(format!("triage LLM call failed: {err}"));
            return fallback(cleaned_text, detected_language, translated_text, warnings);
        }
    };

    let parsed: TriageLlmOutput = match serde_json::from_str(&response.content)
        .or_else(|_| {
            newsgraph_llm::json_repair::repair(&response.content)
                .ok_or(())
                .and_then(|v| serde_json::from_value(v).map_err(|_| ()))
        }) {
        Ok(p) => p,
        Err(_) => {
            warnings.push("triage response was not valid JSON even after repair".to_string());
            return fallback(cleaned_text, detected_language, translated_text, warnings);
        }
    };

    Phase1Result {
        is_relevant: parsed.is_relevant,
        justification: parsed.justification,
        category: parsed.category,
        keywords: parsed.keywords,
        confidence: parsed.confidence.clamp(0.0, 1.0),
        cleaned_text,
        detected_language,
        translated_text,
        fallback_used: false,
        warnings,
    }
}

fn fallback(
    cleaned_text: String,
    detected_language: String,
    translated_text: Option<String>,
    mut warnings: Vec<String>,
) -> Phase1Result {
    warnings.push("triage-unavailable, accepted by policy".to_string());
    Phase1Result {
        is_relevant: true,
        justification: "triage-unavailable, accepted by policy".to_string(),
        category: "unknown".to_string(),
        keywords: Vec::new(),
        confidence: 0.0,
        cleaned_text,
        detected_language,
        translated_text,
        fallback_used: true,
        warnings,
    }
}
