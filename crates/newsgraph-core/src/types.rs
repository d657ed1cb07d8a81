use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Integer identifier unique within one item's namespace, allocated by the
/// Fragment Processor (spec.md §3/§4.1). This is the sole cross-reference
/// mechanism between phases; it is never regenerated mid-pipeline.
pub type SequentialId = u64;

// ---------------------------------------------------------------------------
// Input units (spec.md §3 "Input units")
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub storage_path: String,
    pub outlet: String,
    pub country: String,
    pub outlet_type: String,
    pub headline: String,
    pub published_at: DateTime<Utc>,
    pub author: Option<String>,
    pub language: String,
    pub section: Option<String>,
    #[serde(default)]
    pub source_tags: Vec<String>,
    #[serde(default)]
    pub is_opinion: bool,
    #[serde(default)]
    pub is_official: bool,
    pub full_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    pub fragment_id: String,
    pub source_document_id: String,
    pub sequence_position: u32,
    pub section_title: Option<String>,
    pub page_range: Option<(u32, u32)>,
    pub text: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// One article or one document fragment: the atomic unit of pipeline work
/// (GLOSSARY "Item").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputItem {
    Article(Article),
    Fragment(Fragment),
}

impl InputItem {
    pub fn text(&self) -> &str {
        match self {
            InputItem::Article(a) => &a.full_text,
            InputItem::Fragment(f) => &f.text,
        }
    }

    pub fn title(&self) -> String {
        match self {
            InputItem::Article(a) => a.headline.clone(),
            InputItem::Fragment(f) => f
                .section_title
                .clone()
                .unwrap_or_else(|| format!("fragment {}", f.fragment_id)),
        }
    }

    pub fn source_type(&self) -> String {
        match self {
            InputItem::Article(a) => a.outlet_type.clone(),
            InputItem::Fragment(_) => "document_fragment".to_string(),
        }
    }

    pub fn origin_country(&self) -> String {
        match self {
            InputItem::Article(a) => a.country.clone(),
            InputItem::Fragment(_) => "unknown".to_string(),
        }
    }

    pub fn source_date(&self) -> String {
        match self {
            InputItem::Article(a) => a.published_at.to_rfc3339(),
            InputItem::Fragment(_) => String::new(),
        }
    }

    pub fn language_hint(&self) -> Option<&str> {
        match self {
            InputItem::Article(a) => Some(a.language.as_str()),
            InputItem::Fragment(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared small types
// ---------------------------------------------------------------------------

/// A possibly-open date range, used for entity birth/dissolution spans and
/// fact occurrence windows. Either bound may be absent when the source text
/// only commits to one side of the range.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: Some(date),
            end: Some(date),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

macro_rules! fixed_vocabulary_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let s = match self {
                    $($name::$variant => $text),+
                };
                write!(f, "{}", s)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "unknown {} variant: {other}",
                        stringify!($name)
                    )),
                }
            }
        }
    };
}

fixed_vocabulary_enum! {
    /// spec.md §3 "Entities ... type"
    EntityType {
        Person => "person",
        Organization => "organization",
        Institution => "institution",
        Place => "place",
        Event => "event",
        Normative => "normative",
        Concept => "concept",
    }
}

fixed_vocabulary_enum! {
    /// spec.md §3 "Facts ... type"
    FactType {
        Event => "event",
        Announcement => "announcement",
        Statement => "statement",
        Biography => "biography",
        Concept => "concept",
        Normative => "normative",
        ScheduledEvent => "scheduled_event",
    }
}

fixed_vocabulary_enum! {
    /// spec.md §3 "Facts ... temporal precision"
    TemporalPrecision {
        Exact => "exact",
        Day => "day",
        Week => "week",
        Month => "month",
        Quarter => "quarter",
        Year => "year",
        Decade => "decade",
        Period => "period",
    }
}

fixed_vocabulary_enum! {
    /// spec.md §3 "Quantitative data ... category"
    QuantitativeCategory {
        Economic => "economic",
        Demographic => "demographic",
        Electoral => "electoral",
        Social => "social",
        Budgetary => "budgetary",
        Sanitary => "sanitary",
        Environmental => "environmental",
        Conflict => "conflict",
        Other => "other",
    }
}

fixed_vocabulary_enum! {
    /// spec.md §3 "Quantitative data ... trend"
    Trend {
        Increase => "increase",
        Decrease => "decrease",
        Stable => "stable",
    }
}

fixed_vocabulary_enum! {
    /// spec.md §3 "Relations ... Fact-Entity ... role"
    FactEntityRole {
        Protagonist => "protagonist",
        Mentioned => "mentioned",
        Affected => "affected",
        Declarant => "declarant",
        Location => "location",
        Context => "context",
        Victim => "victim",
        Aggressor => "aggressor",
        Organizer => "organizer",
        Participant => "participant",
        Other => "other",
    }
}

fixed_vocabulary_enum! {
    /// spec.md §3 "Relations ... Fact-Fact ... kind"
    FactFactKind {
        Cause => "cause",
        Consequence => "consequence",
        HistoricalContext => "historical_context",
        ResponseTo => "response_to",
        ClarificationOf => "clarification_of",
        AlternativeVersion => "alternative_version",
        FollowUp => "follow_up",
    }
}

fixed_vocabulary_enum! {
    /// spec.md §3 "Relations ... Entity-Entity ... kind"
    EntityEntityKind {
        MemberOf => "member_of",
        SubsidiaryOf => "subsidiary_of",
        AlliedWith => "allied_with",
        OpponentOf => "opponent_of",
        SuccessorOf => "successor_of",
        PredecessorOf => "predecessor_of",
        MarriedTo => "married_to",
        FamilyOf => "family_of",
        EmployeeOf => "employee_of",
    }
}

fixed_vocabulary_enum! {
    /// spec.md §3 "Relations ... Contradiction ... kind"
    ContradictionKind {
        Date => "date",
        Content => "content",
        Entities => "entities",
        Location => "location",
        Value => "value",
        Full => "full",
    }
}

// ---------------------------------------------------------------------------
// Entities, facts, quotes, quantitative data
// ---------------------------------------------------------------------------

/// Directory linkage attached by Phase 4 normalization (spec.md §4.8). This
/// is added to an existing `Entity` in place; it never replaces the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryLink {
    pub directory_uuid: Uuid,
    pub canonical_name: String,
    pub similarity_score: f32,
    pub external_uri: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: SequentialId,
    pub surface_text: String,
    pub entity_type: EntityType,
    pub description: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub birth_date: Option<NaiveDate>,
    pub dissolution_date: Option<NaiveDate>,
    #[serde(default = "default_relevance")]
    pub default_relevance: u8,
    /// Populated by Phase 4 when `find_similar_entity` returns a match ≥ the
    /// configured threshold. `None` means the entity is "new" and the store
    /// will materialize it on insert (spec.md §4.8 step 1).
    pub directory: Option<DirectoryLink>,
}

fn default_relevance() -> u8 {
    5
}

impl Entity {
    pub fn new(id: SequentialId, surface_text: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            id,
            surface_text: surface_text.into(),
            entity_type,
            description: None,
            aliases: Vec::new(),
            birth_date: None,
            dissolution_date: None,
            default_relevance: default_relevance(),
            directory: None,
        }
    }

    pub fn is_normalized(&self) -> bool {
        self.directory.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub id: SequentialId,
    pub content: String,
    #[serde(default)]
    pub occurrence: DateRange,
    pub temporal_precision: TemporalPrecision,
    pub fact_type: FactType,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub cities: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_future_event: bool,
    pub scheduling_state: Option<String>,
    /// Default/pipeline-assigned importance (1-10, default 5). spec.md §9
    /// open question: arbitration against an editorial/ML importance score
    /// is left to downstream consumers; this is only ever the pipeline's
    /// default.
    #[serde(default = "default_importance")]
    pub importance: u8,
}

fn default_importance() -> u8 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub id: SequentialId,
    pub text: String,
    pub emitter_entity_id: Option<SequentialId>,
    pub context_fact_id: Option<SequentialId>,
    pub date: Option<NaiveDate>,
    pub context_snippet: Option<String>,
    #[serde(default = "default_quote_relevance")]
    pub relevance: u8,
}

fn default_quote_relevance() -> u8 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantitativeDatum {
    pub id: SequentialId,
    pub fact_id: Option<SequentialId>,
    pub indicator: String,
    pub category: QuantitativeCategory,
    pub value: f64,
    pub unit: String,
    #[serde(default)]
    pub geographic_scope: Vec<String>,
    pub reference_period_start: Option<NaiveDate>,
    pub reference_period_end: Option<NaiveDate>,
    pub period_type: Option<String>,
    pub previous_value: Option<f64>,
    pub absolute_variation: Option<f64>,
    pub percent_variation: Option<f64>,
    pub trend: Option<Trend>,
}

// ---------------------------------------------------------------------------
// Relations (spec.md §3 "Relations")
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactEntityRelation {
    pub fact_id: SequentialId,
    pub entity_id: SequentialId,
    pub role: FactEntityRole,
    pub relevance: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactFactRelation {
    pub source_fact_id: SequentialId,
    pub target_fact_id: SequentialId,
    pub kind: FactFactKind,
    pub strength: u8,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityEntityRelation {
    pub source_entity_id: SequentialId,
    pub target_entity_id: SequentialId,
    pub kind: EntityEntityKind,
    pub date_range: Option<DateRange>,
    pub strength: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContradictionRelation {
    pub principal_fact_id: SequentialId,
    pub contradictory_fact_id: SequentialId,
    pub kind: ContradictionKind,
    pub degree: u8,
    pub description: String,
}

/// The four relation arrays Phase 4 produces (spec.md §4.8).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationsBundle {
    #[serde(default)]
    pub fact_entity: Vec<FactEntityRelation>,
    #[serde(default)]
    pub fact_fact: Vec<FactFactRelation>,
    #[serde(default)]
    pub entity_entity: Vec<EntityEntityRelation>,
    #[serde(default)]
    pub contradictions: Vec<ContradictionRelation>,
}

impl RelationsBundle {
    pub fn is_empty(&self) -> bool {
        self.fact_entity.is_empty()
            && self.fact_fact.is_empty()
            && self.entity_entity.is_empty()
            && self.contradictions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_round_trips_through_display_and_from_str() {
        for variant in EntityType::ALL {
            let parsed: EntityType = variant.to_string().parse().unwrap();
            assert_eq!(parsed, *variant);
        }
    }

    #[test]
    fn unknown_enum_text_is_rejected() {
        assert!("not-a-real-type".parse::<EntityType>().is_err());
        assert!("PERSON".parse::<EntityType>().is_ok());
    }

    #[test]
    fn new_entity_starts_unnormalized() {
        let e = Entity::new(1, "Ministry of Finance", EntityType::Institution);
        assert!(!e.is_normalized());
        assert_eq!(e.default_relevance, 5);
    }
}
