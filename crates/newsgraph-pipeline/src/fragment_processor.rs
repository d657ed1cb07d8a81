use newsgraph_core::types::SequentialId;

/// One instance per input item (spec.md §4.1). Allocates strictly
/// monotonically increasing ids from four independent namespaces — facts,
/// entities, quotes, quantitative data — each starting at 1. This is the
/// sole mechanism that keeps cross-references stable across the four
/// phases; the *same* instance must be threaded through every phase call
/// for one item (spec.md §9: preserve the mutable per-item processor,
/// do not replace it with a thread-local or implicit context).
#[derive(Debug)]
pub struct FragmentProcessor {
    item_id: String,
    next_fact: SequentialId,
    next_entity: SequentialId,
    next_quote: SequentialId,
    next_datum: SequentialId,
}

impl FragmentProcessor {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            next_fact: 1,
            next_entity: 1,
            next_quote: 1,
            next_datum: 1,
        }
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn next_fact_id(&mut self) -> SequentialId {
        let id = self.next_fact;
        self.next_fact += 1;
        id
    }

    pub fn next_entity_id(&mut self) -> SequentialId {
        let id = self.next_entity;
        self.next_entity += 1;
        id
    }

    pub fn next_quote_id(&mut self) -> SequentialId {
        let id = self.next_quote;
        self.next_quote += 1;
        id
    }

    pub fn next_datum_id(&mut self) -> SequentialId {
        let id = self.next_datum;
        self.next_datum += 1;
        id
    }

    /// Final per-namespace allocation counts, recorded by the controller for
    /// metrics (spec.md §4.1: "records final counts for metrics").
    pub fn counts(&self) -> ProcessorCounts {
        ProcessorCounts {
            facts: self.next_fact - 1,
            entities: self.next_entity - 1,
            quotes: self.next_quote - 1,
            data: self.next_datum - 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorCounts {
    pub facts: SequentialId,
    pub entities: SequentialId,
    pub quotes: SequentialId,
    pub data: SequentialId,
}
