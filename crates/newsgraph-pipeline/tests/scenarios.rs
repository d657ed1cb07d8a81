//! End-to-end scenarios against hand-written fake `LlmClient`/`DirectoryClient`
//! implementations — no mocking framework, canned JSON responses consumed in
//! call order per phase.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use newsgraph_core::traits::{CompletionRequest, CompletionResponse, DirectoryClient, LlmClient};
use newsgraph_core::types::{Article, DirectoryLink, EntityType, Fragment, InputItem};
use newsgraph_core::Result;
use newsgraph_pipeline::{controller, PipelineTuning, ProcessingOutcome};
use uuid::Uuid;

enum Scripted {
    Json(&'static str),
    Fail,
}

struct ScriptedLlmClient {
    responses: Mutex<VecDeque<Scripted>>,
}

impl ScriptedLlmClient {
    fn new(responses: Vec<Scripted>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Scripted::Fail);
        match next {
            Scripted::Json(text) => Ok(CompletionResponse {
                content: text.to_string(),
                finish_reason: Some("stop".to_string()),
            }),
            Scripted::Fail => Err(newsgraph_core::CoreError::llm_permanent("simulated outage")),
        }
    }
}

struct FakeDirectoryClient {
    match_surface_text: Option<&'static str>,
}

#[async_trait]
impl DirectoryClient for FakeDirectoryClient {
    async fn find_similar_entity(
        &self,
        surface_text: &str,
        _entity_type: EntityType,
    ) -> Result<Option<DirectoryLink>> {
        if self.match_surface_text == Some(surface_text) {
            Ok(Some(DirectoryLink {
                directory_uuid: Uuid::new_v4(),
                canonical_name: surface_text.to_string(),
                similarity_score: 0.92,
                external_uri: None,
            }))
        } else {
            Ok(None)
        }
    }

    async fn atomic_insert_article(&self, _payload: &serde_json::Value) -> Result<()> {
        Ok(())
    }

    async fn atomic_insert_fragment(&self, _payload: &serde_json::Value) -> Result<()> {
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

fn sample_article(body: &str) -> InputItem {
    InputItem::Article(Article {
        url: "https://example.test/article".into(),
        storage_path: "examplewire/2026/07/28/tax-reform.html.gz".into(),
        outlet: "Example Wire".into(),
        country: "US".into(),
        outlet_type: "newspaper".into(),
        headline: "Government announces tax reform".into(),
        published_at: Utc::now(),
        author: None,
        language: "en".into(),
        section: None,
        source_tags: vec![],
        is_opinion: false,
        is_official: false,
        full_text: body.to_string(),
    })
}

fn tuning() -> PipelineTuning {
    PipelineTuning {
        llm_max_tokens: 1024,
        llm_temperature: 0.0,
        async_processing_threshold_chars: 10_000,
        working_language: "en".to_string(),
    }
}

const TRIAGE_RELEVANT: &str = r#"{"is_relevant":true,"justification":"covers a policy announcement","category":"politics","keywords":["tax","reform"],"confidence":0.95}"#;

const TRIAGE_IRRELEVANT: &str = r#"{"is_relevant":false,"justification":"sports results, not news of record","category":"sports","keywords":[],"confidence":0.8}"#;

#[tokio::test]
async fn scenario_a_happy_path_article() {
    let basic_extraction = r#"{"facts":[{"content":"Government announces tax reform","date":{"start":null,"end":null},"temporal_precision":"day","type":"announcement","countries":[],"regions":[],"cities":[],"tags":[],"is_future_event":false,"scheduling_state":null}],"entities":[{"name":"Ministry of Finance","type":"institution","description":null,"aliases":[],"birth_date":null,"dissolution_date":null},{"name":"President Smith","type":"person","description":null,"aliases":[],"birth_date":null,"dissolution_date":null}]}"#;
    let quotes_data = r#"{"quotes":[],"quantitative_data":[]}"#;
    let relations = r#"{"fact_entity":[{"fact_id":1,"entity_id":1,"role":"protagonist","relevance":8}],"fact_fact":[],"entity_entity":[],"contradictions":[]}"#;

    let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(vec![
        Scripted::Json(TRIAGE_RELEVANT),
        Scripted::Json(basic_extraction),
        Scripted::Json(quotes_data),
        Scripted::Json(relations),
    ]));
    let directory: Arc<dyn DirectoryClient> = Arc::new(FakeDirectoryClient {
        match_surface_text: Some("Ministry of Finance"),
    });

    let item = sample_article(&"Tax reform details. ".repeat(100));
    let outcome = controller::process(&item, &llm, &directory, &tuning(), Uuid::new_v4()).await;

    match outcome {
        ProcessingOutcome::Persisted { partial, payload, .. } => {
            assert!(!partial);
            let entities = payload["entities"].as_array().unwrap();
            assert_eq!(entities.len(), 2);
            let ministry = entities
                .iter()
                .find(|e| e["surface_text"] == "Ministry of Finance")
                .unwrap();
            assert!(ministry.get("directory_uuid").is_some());
            assert_eq!(ministry["id"], 1);
        }
        other => panic!("expected Persisted, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_b_irrelevant_content_short_circuits() {
    let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(vec![Scripted::Json(TRIAGE_IRRELEVANT)]));
    let directory: Arc<dyn DirectoryClient> = Arc::new(FakeDirectoryClient {
        match_surface_text: None,
    });

    let item = sample_article("Sports scores from yesterday's matches.");
    let outcome = controller::process(&item, &llm, &directory, &tuning(), Uuid::new_v4()).await;

    match outcome {
        ProcessingOutcome::Rejected { reason, .. } => assert!(reason.contains("sports")),
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_c_llm_outage_in_phase_3_yields_partial_persistence() {
    let basic_extraction = r#"{"facts":[{"content":"Government announces tax reform","date":{"start":null,"end":null},"temporal_precision":"day","type":"announcement","countries":[],"regions":[],"cities":[],"tags":[],"is_future_event":false,"scheduling_state":null}],"entities":[{"name":"Ministry of Finance","type":"institution","description":null,"aliases":[],"birth_date":null,"dissolution_date":null}]}"#;
    let relations = r#"{"fact_entity":[],"fact_fact":[],"entity_entity":[],"contradictions":[]}"#;

    let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(vec![
        Scripted::Json(TRIAGE_RELEVANT),
        Scripted::Json(basic_extraction),
        Scripted::Fail,
        Scripted::Json(relations),
    ]));
    let directory: Arc<dyn DirectoryClient> = Arc::new(FakeDirectoryClient {
        match_surface_text: None,
    });

    let item = sample_article(&"Tax reform details. ".repeat(100));
    let outcome = controller::process(&item, &llm, &directory, &tuning(), Uuid::new_v4()).await;

    match outcome {
        ProcessingOutcome::Persisted { partial, warnings, .. } => {
            assert!(partial);
            assert!(warnings.iter().any(|w| w == "phase_3_failed"));
        }
        other => panic!("expected partial Persisted, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_d_dangling_reference_is_pruned_not_fabricated() {
    let basic_extraction = r#"{"facts":[{"content":"Fact one","date":{"start":null,"end":null},"temporal_precision":"day","type":"announcement","countries":[],"regions":[],"cities":[],"tags":[],"is_future_event":false,"scheduling_state":null},{"content":"Fact two","date":{"start":null,"end":null},"temporal_precision":"day","type":"announcement","countries":[],"regions":[],"cities":[],"tags":[],"is_future_event":false,"scheduling_state":null}],"entities":[{"name":"Entity One","type":"person","description":null,"aliases":[],"birth_date":null,"dissolution_date":null},{"name":"Entity Two","type":"person","description":null,"aliases":[],"birth_date":null,"dissolution_date":null}]}"#;
    let quotes_data = r#"{"quotes":[{"text":"A quote that references a ghost entity","emitter_entity_id":99,"context_fact_id":null,"date":null,"context_snippet":null},{"text":"A quote that is perfectly valid","emitter_entity_id":1,"context_fact_id":1,"date":null,"context_snippet":null}],"quantitative_data":[]}"#;
    let relations = r#"{"fact_entity":[],"fact_fact":[],"entity_entity":[],"contradictions":[]}"#;

    let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(vec![
        Scripted::Json(TRIAGE_RELEVANT),
        Scripted::Json(basic_extraction),
        Scripted::Json(quotes_data),
        Scripted::Json(relations),
    ]));
    let directory: Arc<dyn DirectoryClient> = Arc::new(FakeDirectoryClient {
        match_surface_text: None,
    });

    let item = sample_article(&"Some facts and quotes. ".repeat(100));
    let outcome = controller::process(&item, &llm, &directory, &tuning(), Uuid::new_v4()).await;

    match outcome {
        ProcessingOutcome::Persisted { payload, warnings, .. } => {
            let quotes = payload["quotes"].as_array().unwrap();
            assert_eq!(quotes.len(), 1);
            assert_eq!(quotes[0]["text"], "A quote that is perfectly valid");
            assert!(warnings.iter().any(|w| w.contains("emitter_entity_id 99")));
        }
        other => panic!("expected Persisted, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_e_long_article_requires_async_dispatch() {
    let item = sample_article(&"x".repeat(15_000));
    assert!(controller::requires_async_dispatch(&item, &tuning()));

    let short_item = sample_article("short body");
    assert!(!controller::requires_async_dispatch(&short_item, &tuning()));
}

#[tokio::test]
async fn scenario_f_bad_storage_path_fails_before_any_insert() {
    let mut article = match sample_article("irrelevant") {
        InputItem::Article(a) => a,
        _ => unreachable!(),
    };
    article.storage_path = "bad path.html.gz".to_string();
    let item = InputItem::Article(article);

    let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(vec![
        Scripted::Json(TRIAGE_RELEVANT),
        Scripted::Json(r#"{"facts":[],"entities":[]}"#),
        Scripted::Json(r#"{"quotes":[],"quantitative_data":[]}"#),
        Scripted::Json(r#"{"fact_entity":[],"fact_fact":[],"entity_entity":[],"contradictions":[]}"#),
    ]));
    let directory: Arc<dyn DirectoryClient> = Arc::new(FakeDirectoryClient {
        match_surface_text: None,
    });

    let outcome = controller::process(&item, &llm, &directory, &tuning(), Uuid::new_v4()).await;

    match outcome {
        ProcessingOutcome::Failed { support_code, .. } => assert_eq!(support_code, "PAYLOAD-0001"),
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn fragment_items_are_accepted_alongside_articles() {
    let item = InputItem::Fragment(Fragment {
        fragment_id: "frag-1".into(),
        source_document_id: "doc-1".into(),
        sequence_position: 0,
        section_title: Some("Introduction".into()),
        page_range: Some((1, 2)),
        text: "A short fragment of a longer document.".to_string(),
        metadata: Default::default(),
    });

    let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(vec![
        Scripted::Json(TRIAGE_RELEVANT),
        Scripted::Json(r#"{"facts":[],"entities":[]}"#),
        Scripted::Json(r#"{"quotes":[],"quantitative_data":[]}"#),
        Scripted::Json(r#"{"fact_entity":[],"fact_fact":[],"entity_entity":[],"contradictions":[]}"#),
    ]));
    let directory: Arc<dyn DirectoryClient> = Arc::new(FakeDirectoryClient {
        match_surface_text: None,
    });

    let outcome = controller::process(&item, &llm, &directory, &tuning(), Uuid::new_v4()).await;
    match outcome {
        ProcessingOutcome::Persisted { payload, .. } => assert_eq!(payload["kind"], "fragment"),
        other => panic!("expected Persisted, got {other:?}"),
    }
}
