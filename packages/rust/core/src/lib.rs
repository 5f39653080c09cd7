//! Content-synthesis core for TopicDoc.
//!
//! Ties discovery, fetching, the currency oracle, synthesis and normalization
//! into end-to-end runs ([`Pipeline::generate`] and friends). The generative
//! model sits behind [`Generator`]; [`OpenRouterClient`] is the real one.

pub mod llm;
pub mod oracle;
pub mod outline;
pub mod pipeline;
pub mod prompts;
pub mod refine;
pub mod synthesizer;

#[cfg(test)]
mod testing;

pub use llm::{GenerationError, Generator, OpenRouterClient};
pub use oracle::{CurrencyOracle, OracleError};
pub use outline::{generate_outline, parse_outline};
pub use pipeline::{
    GeneratedDocument, Pipeline, PipelineConfig, ProgressReporter, Services, SilentProgress,
};
pub use refine::{Grounding, RefineRequest, Refinement};
pub use synthesizer::{
    LessonPlan, LessonSection, LessonTopic, SynthesisConfig, SynthesisError, SynthesisMode,
    SynthesisOutcome, Synthesizer,
};
pub use topicdoc_markdown::normalize;
