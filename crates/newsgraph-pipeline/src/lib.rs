pub mod controller;
pub mod fragment_processor;
pub mod payload_builder;
pub mod phase1_triage;
pub mod phase2_extraction;
pub mod phase3_quotes_data;
pub mod phase4_relations;
pub mod results;

pub use controller::{process, requires_async_dispatch, PipelineTuning, ProcessingOutcome};
pub use fragment_processor::FragmentProcessor;
pub use results::{Phase1Result, Phase2Result, Phase3Result, Phase4Result, PhaseResult};
