use newsgraph_core::types::{Entity, Fact, QuantitativeDatum, Quote, RelationsBundle};

/// Explicit sum-typed phase results (spec.md §9: "re-architect as explicit
/// sum-typed phase results", not exceptions used for control flow). Every
/// phase always returns a well-formed value — either its genuine output or
/// its declared fallback — and records whether the fallback fired plus any
/// warnings accumulated while producing it.
pub trait PhaseResult {
    fn fallback_used(&self) -> bool;
    fn warnings(&self) -> &[String];
}

#[derive(Debug, Clone)]
pub struct Phase1Result {
    pub is_relevant: bool,
    pub justification: String,
    pub category: String,
    pub keywords: Vec<String>,
    pub confidence: f32,
    pub cleaned_text: String,
    pub detected_language: String,
    pub translated_text: Option<String>,
    pub fallback_used: bool,
    pub warnings: Vec<String>,
}

impl Phase1Result {
    /// `texto_para_siguiente_fase` (spec.md §4.6 input): the translated text
    /// when translation happened, otherwise the cleaned text.
    pub fn text_for_next_phase(&self) -> &str {
        self.translated_text
            .as_deref()
            .unwrap_or(&self.cleaned_text)
    }

    /// spec.md §4.5 rejection policy: stop the pipeline only when the model
    /// is confident enough about the irrelevance call.
    pub fn is_rejected(&self) -> bool {
        !self.is_relevant && self.confidence >= 0.5
    }
}

impl PhaseResult for Phase1Result {
    fn fallback_used(&self) -> bool {
        self.fallback_used
    }
    fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

#[derive(Debug, Clone, Default)]
pub struct Phase2Result {
    pub facts: Vec<Fact>,
    pub entities: Vec<Entity>,
    pub fallback_used: bool,
    pub warnings: Vec<String>,
}

impl PhaseResult for Phase2Result {
    fn fallback_used(&self) -> bool {
        self.fallback_used
    }
    fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

#[derive(Debug, Clone, Default)]
pub struct Phase3Result {
    pub quotes: Vec<Quote>,
    pub data: Vec<QuantitativeDatum>,
    pub fallback_used: bool,
    pub warnings: Vec<String>,
}

impl PhaseResult for Phase3Result {
    fn fallback_used(&self) -> bool {
        self.fallback_used
    }
    fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

#[derive(Debug, Clone, Default)]
pub struct Phase4Result {
    /// Phase 2's entity list, mutated in place with directory linkage.
    pub entities: Vec<Entity>,
    pub relations: RelationsBundle,
    pub fallback_used: bool,
    pub warnings: Vec<String>,
}

impl PhaseResult for Phase4Result {
    fn fallback_used(&self) -> bool {
        self.fallback_used
    }
    fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
