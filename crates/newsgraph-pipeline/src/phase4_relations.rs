use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use newsgraph_core::traits::{ChatMessage, CompletionRequest, DirectoryClient, LlmClient};
use newsgraph_core::types::{
    ContradictionKind, ContradictionRelation, DateRange, EntityEntityKind, EntityEntityRelation,
    FactEntityRelation, FactEntityRole, FactFactKind, FactFactRelation, RelationsBundle, SequentialId,
};
use newsgraph_core::validation::validate_score;
use newsgraph_llm::PromptStore;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::results::{Phase2Result, Phase3Result, Phase4Result};

#[derive(Debug, Serialize)]
struct NormalizedFact<'a> {
    id: SequentialId,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct NormalizedEntity<'a> {
    id: SequentialId,
    name: &'a str,
    directory_canonical_name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ComplementaryQuote {
    id: SequentialId,
    text: String,
}

#[derive(Debug, Serialize)]
struct ComplementaryDatum {
    id: SequentialId,
    indicator: String,
}

#[derive(Debug, Deserialize)]
struct LlmFactEntity {
    fact_id: SequentialId,
    entity_id: SequentialId,
    role: String,
    relevance: u8,
}

#[derive(Debug, Deserialize)]
struct LlmFactFact {
    source_fact_id: SequentialId,
    target_fact_id: SequentialId,
    kind: String,
    strength: u8,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct LlmDateRange {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LlmEntityEntity {
    source_entity_id: SequentialId,
    target_entity_id: SequentialId,
    kind: String,
    #[serde(default)]
    date_range: Option<LlmDateRange>,
    strength: u8,
}

#[derive(Debug, Deserialize)]
struct LlmContradiction {
    principal_fact_id: SequentialId,
    contradictory_fact_id: SequentialId,
    kind: String,
    degree: u8,
    #[serde(default)]
    description: String,
}

/// Each relation array is kept as loose `Value`s here and parsed into its
/// typed record one at a time below, so one malformed relation can't fail
/// the whole response.
#[derive(Debug, Deserialize)]
struct RelationsLlmOutput {
    #[serde(default)]
    fact_entity: Vec<serde_json::Value>,
    #[serde(default)]
    fact_fact: Vec<serde_json::Value>,
    #[serde(default)]
    entity_entity: Vec<serde_json::Value>,
    #[serde(default)]
    contradictions: Vec<serde_json::Value>,
}

/// Runs Phase 4 (spec.md §4.8): normalizes each Phase-2 entity against the
/// directory at the configured similarity threshold, then extracts the four
/// relation arrays. Directory lookups enrich entities in place; they never
/// change an entity's sequential id.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    phase2: &Phase2Result,
    phase3: &Phase3Result,
    directory: &Arc<dyn DirectoryClient>,
    llm: &Arc<dyn LlmClient>,
    prompts: &PromptStore,
    llm_max_tokens: u32,
    llm_temperature: f32,
) -> Phase4Result {
    let mut warnings = Vec::new();
    let mut entities = phase2.entities.clone();

    for entity in entities.iter_mut() {
        match directory.find_similar_entity(&entity.surface_text, entity.entity_type).await {
            Ok(Some(link)) => entity.directory = Some(link),
            Ok(None) => {}
            Err(err) => {
                warn!(
                    support_code = err.support_code(),
                    entity = %entity.surface_text,
                    "directory lookup failed, entity left unnormalized"
                );
                warnings.push(format!(
                    "directory lookup failed for entity '{}': {err}",
                    entity.surface_text
                ));
            }
        }
    }

    let known_fact_ids: HashSet<SequentialId> = phase2.facts.iter().map(|f| f.id).collect();
    let known_entity_ids: HashSet<SequentialId> = entities.iter().map(|e| e.id).collect();

    let normalized_facts: Vec<NormalizedFact> = phase2
        .facts
        .iter()
        .map(|f| NormalizedFact {
            id: f.id,
            content: &f.content,
        })
        .collect();
    let normalized_entities: Vec<NormalizedEntity> = entities
        .iter()
        .map(|e| NormalizedEntity {
            id: e.id,
            name: &e.surface_text,
            directory_canonical_name: e.directory.as_ref().map(|d| d.canonical_name.as_str()),
        })
        .collect();
    let basic_elements_normalized = serde_json::to_string(&serde_json::json!({
        "facts": normalized_facts,
        "entities": normalized_entities,
    }))
    .unwrap_or_else(|_| "{}".to_string());

    let complementary_elements = serde_json::to_string(&serde_json::json!({
        "quotes": phase3
            .quotes
            .iter()
            .map(|q| ComplementaryQuote { id: q.id, text: q.text.clone() })
            .collect::<Vec<_>>(),
        "quantitative_data": phase3
            .data
            .iter()
            .map(|d| ComplementaryDatum { id: d.id, indicator: d.indicator.clone() })
            .collect::<Vec<_>>(),
    }))
    .unwrap_or_else(|_| "{}".to_string());

    let mut values: HashMap<&str, String> = HashMap::new();
    values.insert("BASIC_ELEMENTS_NORMALIZED", basic_elements_normalized);
    values.insert("COMPLEMENTARY_ELEMENTS", complementary_elements);

    let prompt = match prompts.render("relations", &values) {
        Ok(p) => p,
        Err(err) => {
            warnings.push(format!("prompt render failed: {err}"));
            return Phase4Result {
                entities,
                relations: RelationsBundle::default(),
                fallback_used: true,
                warnings,
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
            warnings.push(format!("relations LLM call failed: {err}"));
            return Phase4Result {
                entities,
                relations: RelationsBundle::default(),
                fallback_used: true,
                warnings,
            };
        }
    };

    let parsed: RelationsLlmOutput = match serde_json::from_str(&response.content).or_else(|_| {
        newsgraph_llm::json_repair::repair(&response.content)
            .ok_or(())
            .and_then(|v| serde_json::from_value(v).map_err(|_| ()))
    }) {
        Ok(p) => p,
        Err(_) => {
            warnings.push("relations response was not valid JSON even after repair".to_string());
            return Phase4Result {
                entities,
                relations: RelationsBundle::default(),
                fallback_used: true,
                warnings,
            };
        }
    };

    let mut fact_entity = Vec::new();
    for raw_value in parsed.fact_entity {
        let raw: LlmFactEntity = match serde_json::from_value(raw_value) {
            Ok(r) => r,
            Err(err) => {
                warnings.push(format!("fact_entity relation dropped: malformed record ({err})"));
                continue;
            }
        };
        if !known_fact_ids.contains(&raw.fact_id) || !known_entity_ids.contains(&raw.entity_id) {
            warnings.push(format!(
                "fact_entity relation dropped: unknown fact_id {} or entity_id {}",
                raw.fact_id, raw.entity_id
            ));
            continue;
        }
        let role: FactEntityRole = match raw.role.parse() {
            Ok(r) => r,
            Err(_) => {
                warnings.push(format!("fact_entity relation dropped: unknown role '{}'", raw.role));
                continue;
            }
        };
        if validate_score("fact_entity.relevance", raw.relevance, 1, 10).is_err() {
            warnings.push(format!("fact_entity relation dropped: relevance {} out of range", raw.relevance));
            continue;
        }
        fact_entity.push(FactEntityRelation {
            fact_id: raw.fact_id,
            entity_id: raw.entity_id,
            role,
            relevance: raw.relevance,
        });
    }

    let mut fact_fact = Vec::new();
    for raw_value in parsed.fact_fact {
        let raw: LlmFactFact = match serde_json::from_value(raw_value) {
            Ok(r) => r,
            Err(err) => {
                warnings.push(format!("fact_fact relation dropped: malformed record ({err})"));
                continue;
            }
        };
        if raw.source_fact_id == raw.target_fact_id {
            warnings.push(format!("fact_fact relation dropped: self-loop on fact {}", raw.source_fact_id));
            continue;
        }
        if !known_fact_ids.contains(&raw.source_fact_id) || !known_fact_ids.contains(&raw.target_fact_id) {
            warnings.push("fact_fact relation dropped: unknown fact id".to_string());
            continue;
        }
        let kind: FactFactKind = match raw.kind.parse() {
            Ok(k) => k,
            Err(_) => {
                warnings.push(format!("fact_fact relation dropped: unknown kind '{}'", raw.kind));
                continue;
            }
        };
        if validate_score("fact_fact.strength", raw.strength, 1, 10).is_err() {
            warnings.push(format!("fact_fact relation dropped: strength {} out of range", raw.strength));
            continue;
        }
        fact_fact.push(FactFactRelation {
            source_fact_id: raw.source_fact_id,
            target_fact_id: raw.target_fact_id,
            kind,
            strength: raw.strength,
            description: raw.description,
        });
    }

    let mut entity_entity = Vec::new();
    for raw_value in parsed.entity_entity {
        let raw: LlmEntityEntity = match serde_json::from_value(raw_value) {
            Ok(r) => r,
            Err(err) => {
                warnings.push(format!("entity_entity relation dropped: malformed record ({err})"));
                continue;
            }
        };
        if raw.source_entity_id == raw.target_entity_id {
            warnings.push(format!(
                "entity_entity relation dropped: self-loop on entity {}",
                raw.source_entity_id
            ));
            continue;
        }
        if !known_entity_ids.contains(&raw.source_entity_id) || !known_entity_ids.contains(&raw.target_entity_id) {
            warnings.push("entity_entity relation dropped: unknown entity id".to_string());
            continue;
        }
        let kind: EntityEntityKind = match raw.kind.parse() {
            Ok(k) => k,
            Err(_) => {
                warnings.push(format!("entity_entity relation dropped: unknown kind '{}'", raw.kind));
                continue;
            }
        };
        if validate_score("entity_entity.strength", raw.strength, 1, 10).is_err() {
            warnings.push(format!("entity_entity relation dropped: strength {} out of range", raw.strength));
            continue;
        }
        let date_range = raw.date_range.map(|d| DateRange {
            start: d.start.as_deref().and_then(|s| s.parse().ok()),
            end: d.end.as_deref().and_then(|s| s.parse().ok()),
        });
        entity_entity.push(EntityEntityRelation {
            source_entity_id: raw.source_entity_id,
            target_entity_id: raw.target_entity_id,
            kind,
            date_range,
            strength: raw.strength,
        });
    }

    let mut contradictions = Vec::new();
    for raw_value in parsed.contradictions {
        let raw: LlmContradiction = match serde_json::from_value(raw_value) {
            Ok(r) => r,
            Err(err) => {
                warnings.push(format!("contradiction dropped: malformed record ({err})"));
                continue;
            }
        };
        if raw.principal_fact_id == raw.contradictory_fact_id {
            warnings.push(format!(
                "contradiction dropped: self-loop on fact {}",
                raw.principal_fact_id
            ));
            continue;
        }
        if !known_fact_ids.contains(&raw.principal_fact_id) || !known_fact_ids.contains(&raw.contradictory_fact_id) {
            warnings.push("contradiction dropped: unknown fact id".to_string());
            continue;
        }
        let kind: ContradictionKind = match raw.kind.parse() {
            Ok(k) => k,
            Err(_) => {
                warnings.push(format!("contradiction dropped: unknown kind '{}'", raw.kind));
                continue;
            }
        };
        if validate_score("contradiction.degree", raw.degree, 1, 5).is_err() {
            warnings.push(format!("contradiction dropped: degree {} out of range", raw.degree));
            continue;
        }
        contradictions.push(ContradictionRelation {
            principal_fact_id: raw.principal_fact_id,
            contradictory_fact_id: raw.contradictory_fact_id,
            kind,
            degree: raw.degree,
            description: raw.description,
        });
    }

    Phase4Result {
        entities,
        relations: RelationsBundle {
            fact_entity,
            fact_fact,
            entity_entity,
            contradictions,
        },
        fallback_used: false,
        warnings,
    }
}
