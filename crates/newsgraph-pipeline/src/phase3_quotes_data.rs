use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use newsgraph_core::traits::{ChatMessage, CompletionRequest, LlmClient};
use newsgraph_core::types::{QuantitativeCategory, QuantitativeDatum, Quote, SequentialId, Trend};
use newsgraph_core::validation::{validate_indicator, validate_quote_text};
use newsgraph_llm::PromptStore;
use serde::{Deserialize, Serialize};

use crate::fragment_processor::FragmentProcessor;
use crate::results::{Phase2Result, Phase3Result};

#[derive(Debug, Serialize)]
struct Step1Json<'a> {
    facts: Vec<Step1Fact<'a>>,
    entities: Vec<Step1Entity<'a>>,
}

#[derive(Debug, Serialize)]
struct Step1Fact<'a> {
    id: SequentialId,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct Step1Entity<'a> {
    id: SequentialId,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct LlmQuote {
    text: String,
    #[serde(default)]
    emitter_entity_id: Option<SequentialId>,
    #[serde(default)]
    context_fact_id: Option<SequentialId>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    context_snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LlmDatum {
    #[serde(default)]
    fact_id: Option<SequentialId>,
    indicator: String,
    category: String,
    value: f64,
    unit: String,
    #[serde(default)]
    geographic_scope: Vec<String>,
    #[serde(default)]
    reference_period_start: Option<String>,
    #[serde(default)]
    reference_period_end: Option<String>,
    #[serde(default)]
    period_type: Option<String>,
    #[serde(default)]
    previous_value: Option<f64>,
    #[serde(default)]
    trend: Option<String>,
}

/// Records are kept as loose `Value`s at this level and parsed into
/// `LlmQuote`/`LlmDatum` one at a time further down, so one malformed
/// record can't fail the whole array.
#[derive(Debug, Deserialize)]
struct QuotesDataLlmOutput {
    #[serde(default)]
    quotes: Vec<serde_json::Value>,
    #[serde(default, rename = "quantitative_data")]
    data: Vec<serde_json::Value>,
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Runs Phase 3 (spec.md §4.7): quotes and quantitative data, cross-checked
/// against the fact/entity ids Phase 2 allocated. A dangling reference is
/// dropped with a warning rather than persisted as a broken edge.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    text: &str,
    title: &str,
    source_type: &str,
    origin_country: &str,
    source_date: &str,
    phase2: &Phase2Result,
    processor: &mut FragmentProcessor,
    llm: &Arc<dyn LlmClient>,
    prompts: &PromptStore,
    llm_max_tokens: u32,
    llm_temperature: f32,
) -> Phase3Result {
    let mut warnings = Vec::new();

    let known_fact_ids: HashSet<SequentialId> = phase2.facts.iter().map(|f| f.id).collect();
    let known_entity_ids: HashSet<SequentialId> = phase2.entities.iter().map(|e| e.id).collect();

    let step1 = Step1Json {
        facts: phase2
            .facts
            .iter()
            .map(|f| Step1Fact {
                id: f.id,
                content: &f.content,
            })
            .collect(),
        entities: phase2
            .entities
            .iter()
            .map(|e| Step1Entity {
                id: e.id,
                name: &e.surface_text,
            })
            .collect(),
    };
    let step1_json = serde_json::to_string(&step1).unwrap_or_else(|_| "{}".to_string());

    let mut values: HashMap<&str, String> = HashMap::new();
    values.insert("TITLE", title.to_string());
    values.insert("SOURCE_TYPE", source_type.to_string());
    values.insert("ORIGIN_COUNTRY", origin_country.to_string());
    values.insert("SOURCE_DATE", source_date.to_string());
    values.insert("CONTENT", text.to_string());
    values.insert("STEP_1_JSON", step1_json);

    let prompt = match prompts.render("quotes_data", &values) {
        Ok(p) => p,
        Err(err) => {
            warnings.push(format!("prompt render failed: {err}"));
            return Phase3Result {
                fallback_used: true,
                warnings,
                ..Default::default()
            };
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
            warnings.push(format!("quotes/data LLM call failed: {err}"));
            return Phase3Result {
                fallback_used: true,
                warnings,
                ..Default::default()
            };
        }
    };

    let parsed: QuotesDataLlmOutput = match serde_json::from_str(&response.content).or_else(|_| {
        newsgraph_llm::json_repair::repair(&response.content)
            .ok_or(())
            .and_then(|v| serde_json::from_value(v).map_err(|_| ()))
    }) {
        Ok(p) => p,
        Err(_) => {
            warnings.push("quotes/data response was not valid JSON even after repair".to_string());
            return Phase3Result {
                fallback_used: true,
                warnings,
                ..Default::default()
            };
        }
    };

    let mut quotes = Vec::with_capacity(parsed.quotes.len());
    for raw_value in parsed.quotes {
        let raw: LlmQuote = match serde_json::from_value(raw_value) {
            Ok(q) => q,
            Err(err) => {
                warnings.push(format!("quote dropped: malformed record ({err})"));
                continue;
            }
        };
        if validate_quote_text(&raw.text).is_err() {
            warnings.push("quote dropped: text shorter than 5 characters".to_string());
            continue;
        }
        if let Some(id) = raw.emitter_entity_id {
            if !known_entity_ids.contains(&id) {
                warnings.push(format!("quote dropped: emitter_entity_id {id} does not exist"));
                continue;
            }
        }
        if let Some(id) = raw.context_fact_id {
            if !known_fact_ids.contains(&id) {
                warnings.push(format!("quote dropped: context_fact_id {id} does not exist"));
                continue;
            }
        }
        let emitter_entity_id = raw.emitter_entity_id;
        let context_fact_id = raw.context_fact_id;
        quotes.push(Quote {
            id: processor.next_quote_id(),
            text: raw.text,
            emitter_entity_id,
            context_fact_id,
            date: raw.date.as_deref().and_then(parse_date),
            context_snippet: raw.context_snippet,
            relevance: 3,
        });
    }

    let mut data = Vec::with_capacity(parsed.data.len());
    for raw_value in parsed.data {
        let raw: LlmDatum = match serde_json::from_value(raw_value) {
            Ok(d) => d,
            Err(err) => {
                warnings.push(format!("datum dropped: malformed record ({err})"));
                continue;
            }
        };
        if validate_indicator(&raw.indicator).is_err() {
            warnings.push(format!("datum dropped: indicator '{}' shorter than 3 characters", raw.indicator));
            continue;
        }
        let category: QuantitativeCategory = match raw.category.parse() {
            Ok(c) => c,
            Err(_) => {
                warnings.push(format!("datum dropped: unknown category '{}'", raw.category));
                continue;
            }
        };
        let trend = match raw.trend.as_deref() {
            None => None,
            Some(raw_trend) => match raw_trend.parse::<Trend>() {
                Ok(t) => Some(t),
                Err(_) => {
                    warnings.push(format!("datum's trend '{raw_trend}' unrecognized; dropping trend only"));
                    None
                }
            },
        };
        if let Some(id) = raw.fact_id {
            if !known_fact_ids.contains(&id) {
                warnings.push(format!("datum dropped: fact_id {id} does not exist"));
                continue;
            }
        }
        let fact_id = raw.fact_id;
        let percent_variation = match (raw.previous_value, raw.value) {
            (Some(prev), curr) if prev != 0.0 => Some((curr - prev) / prev * 100.0),
            _ => None,
        };
        let absolute_variation = raw.previous_value.map(|prev| raw.value - prev);

        data.push(QuantitativeDatum {
            id: processor.next_datum_id(),
            fact_id,
            indicator: raw.indicator,
            category,
            value: raw.value,
            unit: raw.unit,
            geographic_scope: raw.geographic_scope,
            reference_period_start: raw.reference_period_start.as_deref().and_then(parse_date),
            reference_period_end: raw.reference_period_end.as_deref().and_then(parse_date),
            period_type: raw.period_type,
            previous_value: raw.previous_value,
            absolute_variation,
            percent_variation,
            trend,
        });
    }

    Phase3Result {
        quotes,
        data,
        fallback_used: false,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsgraph_core::types::{Entity, EntityType, Fact, FactType, TemporalPrecision};

    fn sample_phase2() -> Phase2Result {
        Phase2Result {
            facts: vec![Fact {
                id: 1,
                content: "budget approved".into(),
                occurrence: Default::default(),
                temporal_precision: TemporalPrecision::Day,
                fact_type: FactType::Announcement,
                countries: vec![],
                regions: vec![],
                cities: vec![],
                tags: vec![],
                is_future_event: false,
                scheduling_state: None,
                importance: 5,
            }],
            entities: vec![Entity::new(1, "Ministry of Finance", EntityType::Institution)],
            fallback_used: false,
            warnings: vec![],
        }
    }

    #[test]
    fn dangling_references_are_dropped_not_fabricated() {
        let phase2 = sample_phase2();
        let known_fact_ids: HashSet<SequentialId> = phase2.facts.iter().map(|f| f.id).collect();
        assert!(known_fact_ids.contains(&1));
        assert!(!known_fact_ids.contains(&99));
    }

    #[test]
    fn percent_variation_requires_nonzero_previous_value() {
        let prev = Some(0.0_f64);
        let curr = 10.0_f64;
        let result = match (prev, curr) {
            (Some(p), c) if p != 0.0 => Some((c - p) / p * 100.0),
            _ => None,
        };
        assert_eq!(result, None);
    }
}
