use std::collections::HashSet;

use newsgraph_core::error::CoreError;
use newsgraph_core::types::{Article, Fragment, InputItem, SequentialId};
use newsgraph_core::validation::validate_storage_path;
use newsgraph_core::Result;
use serde_json::{json, Value};

use crate::results::{Phase2Result, Phase3Result, Phase4Result};

/// Assembles the nested JSON envelope the downstream store's atomic-insert
/// endpoints expect (spec.md §4.9/§6). A pure function of its inputs: the
/// same phase outputs always produce the same payload.
pub fn build(
    item: &InputItem,
    phase2: &Phase2Result,
    phase3: &Phase3Result,
    phase4: &Phase4Result,
) -> Result<Value> {
    let envelope = match item {
        InputItem::Article(article) => article_envelope(article)?,
        InputItem::Fragment(fragment) => fragment_envelope(fragment),
    };

    let entities: Vec<Value> = phase4
        .entities
        .iter()
        .map(|e| {
            let mut v = json!({
                "id": e.id,
                "surface_text": e.surface_text,
                "type": e.entity_type.to_string(),
                "description": e.description,
                "aliases": e.aliases,
                "birth_date": e.birth_date,
                "dissolution_date": e.dissolution_date,
                "default_relevance": e.default_relevance,
            });
            if let Some(link) = &e.directory {
                v["db_id"] = json!(link.directory_uuid);
                v["directory_uuid"] = json!(link.directory_uuid);
                v["canonical_name"] = json!(link.canonical_name);
                v["similarity_score"] = json!(link.similarity_score);
                v["external_uri"] = json!(link.external_uri);
            }
            v
        })
        .collect();

    let facts: Vec<Value> = phase2
        .facts
        .iter()
        .map(|f| {
            json!({
                "id": f.id,
                "content": f.content,
                "occurrence": {"start": f.occurrence.start, "end": f.occurrence.end},
                "temporal_precision": f.temporal_precision.to_string(),
                "type": f.fact_type.to_string(),
                "countries": f.countries,
                "regions": f.regions,
                "cities": f.cities,
                "tags": f.tags,
                "is_future_event": f.is_future_event,
                "scheduling_state": f.scheduling_state,
                "importance": f.importance,
            })
        })
        .collect();

    let quotes: Vec<Value> = phase3
        .quotes
        .iter()
        .map(|q| {
            json!({
                "id": q.id,
                "text": q.text,
                "emitter_entity_id": q.emitter_entity_id,
                "context_fact_id": q.context_fact_id,
                "date": q.date,
                "context_snippet": q.context_snippet,
                "relevance": q.relevance,
            })
        })
        .collect();

    let quantitative_data: Vec<Value> = phase3
        .data
        .iter()
        .map(|d| {
            json!({
                "id": d.id,
                "fact_id": d.fact_id,
                "indicator": d.indicator,
                "category": d.category.to_string(),
                "value": d.value,
                "unit": d.unit,
                "geographic_scope": d.geographic_scope,
                "reference_period_start": d.reference_period_start,
                "reference_period_end": d.reference_period_end,
                "period_type": d.period_type,
                "previous_value": d.previous_value,
                "absolute_variation": d.absolute_variation,
                "percent_variation": d.percent_variation,
                "trend": d.trend.map(|t| t.to_string()),
            })
        })
        .collect();

    let relations = json!({
        "fact_entity": phase4.relations.fact_entity.iter().map(|r| json!({
            "fact_id": r.fact_id,
            "entity_id": r.entity_id,
            "role": r.role.to_string(),
            "relevance": r.relevance,
        })).collect::<Vec<_>>(),
        "fact_fact": phase4.relations.fact_fact.iter().map(|r| json!({
            "source_fact_id": r.source_fact_id,
            "target_fact_id": r.target_fact_id,
            "kind": r.kind.to_string(),
            "strength": r.strength,
            "description": r.description,
        })).collect::<Vec<_>>(),
        "entity_entity": phase4.relations.entity_entity.iter().map(|r| json!({
            "source_entity_id": r.source_entity_id,
            "target_entity_id": r.target_entity_id,
            "kind": r.kind.to_string(),
            "date_range": r.date_range.as_ref().map(|d| json!({"start": d.start, "end": d.end})),
            "strength": r.strength,
        })).collect::<Vec<_>>(),
        "contradictions": phase4.relations.contradictions.iter().map(|r| json!({
            "principal_fact_id": r.principal_fact_id,
            "contradictory_fact_id": r.contradictory_fact_id,
            "kind": r.kind.to_string(),
            "degree": r.degree,
            "description": r.description,
        })).collect::<Vec<_>>(),
    });

    let mut payload = envelope;
    payload["entities"] = json!(entities);
    payload["facts"] = json!(facts);
    payload["quotes"] = json!(quotes);
    payload["quantitative_data"] = json!(quantitative_data);
    payload["relations"] = relations;
    payload["possible_duplicates"] = json!(Vec::<Value>::new());

    validate_referential_closure(phase2, phase3, phase4)?;

    Ok(payload)
}

fn article_envelope(article: &Article) -> Result<Value> {
    validate_storage_path(&article.storage_path)
        .map_err(|e| CoreError::Validation(e.to_string()))?;
    Ok(json!({
        "kind": "article",
        "url": article.url,
        "storage_path": article.storage_path,
        "outlet": article.outlet,
        "country": article.country,
        "outlet_type": article.outlet_type,
        "headline": article.headline,
        "published_at": article.published_at,
        "author": article.author,
        "language": article.language,
        "section": article.section,
        "source_tags": article.source_tags,
        "is_opinion": article.is_opinion,
        "is_official": article.is_official,
    }))
}

fn fragment_envelope(fragment: &Fragment) -> Value {
    json!({
        "kind": "fragment",
        "fragment_id": fragment.fragment_id,
        "source_document_id": fragment.source_document_id,
        "sequence_position": fragment.sequence_position,
        "section_title": fragment.section_title,
        "page_range": fragment.page_range,
        "metadata": fragment.metadata,
    })
}

/// Every id a quote, datum, or relation references must have been emitted
/// in the same payload (spec.md §4.9/§8 property 4).
fn validate_referential_closure(
    phase2: &Phase2Result,
    phase3: &Phase3Result,
    phase4: &Phase4Result,
) -> Result<()> {
    let fact_ids: HashSet<SequentialId> = phase2.facts.iter().map(|f| f.id).collect();
    let entity_ids: HashSet<SequentialId> = phase4.entities.iter().map(|e| e.id).collect();

    let mut missing = Vec::new();

    for q in &phase3.quotes {
        if let Some(id) = q.emitter_entity_id {
            if !entity_ids.contains(&id) {
                missing.push(format!("quote {} references unknown entity {id}", q.id));
            }
        }
        if let Some(id) = q.context_fact_id {
            if !fact_ids.contains(&id) {
                missing.push(format!("quote {} references unknown fact {id}", q.id));
            }
        }
    }
    for d in &phase3.data {
        if let Some(id) = d.fact_id {
            if !fact_ids.contains(&id) {
                missing.push(format!("datum {} references unknown fact {id}", d.id));
            }
        }
    }
    for r in &phase4.relations.fact_entity {
        if !fact_ids.contains(&r.fact_id) || !entity_ids.contains(&r.entity_id) {
            missing.push(format!(
                "fact_entity relation references unknown fact {} or entity {}",
                r.fact_id, r.entity_id
            ));
        }
    }
    for r in &phase4.relations.fact_fact {
        if !fact_ids.contains(&r.source_fact_id) || !fact_ids.contains(&r.target_fact_id) {
            missing.push("fact_fact relation references an unknown fact".to_string());
        }
    }
    for r in &phase4.relations.entity_entity {
        if !entity_ids.contains(&r.source_entity_id) || !entity_ids.contains(&r.target_entity_id) {
            missing.push("entity_entity relation references an unknown entity".to_string());
        }
    }
    for r in &phase4.relations.contradictions {
        if !fact_ids.contains(&r.principal_fact_id) || !fact_ids.contains(&r.contradictory_fact_id) {
            missing.push("contradiction references an unknown fact".to_string());
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(CoreError::PayloadAssembly(missing.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use newsgraph_core::types::{Entity, EntityType};

    fn sample_article() -> Article {
        Article {
            url: "https://example.test/a".into(),
            storage_path: "lemonde/2026/07/28/budget-vote.html.gz".into(),
            outlet: "Le Monde".into(),
            country: "FR".into(),
            outlet_type: "newspaper".into(),
            headline: "Budget vote".into(),
            published_at: Utc::now(),
            author: None,
            language: "fr".into(),
            section: None,
            source_tags: vec![],
            is_opinion: false,
            is_official: false,
            full_text: "text".into(),
        }
    }

    #[test]
    fn rejects_malformed_storage_path_before_building_anything() {
        let mut article = sample_article();
        article.storage_path = "bad path.html.gz".into();
        let item = InputItem::Article(article);
        let result = build(&item, &Phase2Result::default(), &Phase3Result::default(), &Phase4Result::default());
        assert!(result.is_err());
    }

    #[test]
    fn referential_closure_catches_dangling_relation() {
        let phase2 = Phase2Result::default();
        let phase4 = Phase4Result {
            entities: vec![Entity::new(1, "Someone", EntityType::Person)],
            relations: Default::default(),
            fallback_used: false,
            warnings: vec![],
        };
        let mut phase4_with_relation = phase4.clone();
        phase4_with_relation.relations.fact_entity.push(newsgraph_core::types::FactEntityRelation {
            fact_id: 99,
            entity_id: 1,
            role: newsgraph_core::types::FactEntityRole::Mentioned,
            relevance: 5,
        });
        let err = validate_referential_closure(&phase2, &Phase3Result::default(), &phase4_with_relation);
        assert!(err.is_err());
    }

    #[test]
    fn happy_path_payload_builds_successfully() {
        let item = InputItem::Article(sample_article());
        let phase2 = Phase2Result::default();
        let phase3 = Phase3Result::default();
        let phase4 = Phase4Result::default();
        let payload = build(&item, &phase2, &phase3, &phase4).unwrap();
        assert_eq!(payload["kind"], "article");
        assert!(payload["entities"].as_array().unwrap().is_empty());
    }
}
