//! Service modules for the address resolution pipeline
//!
//! - Pure address handling: classifier, canonicalizer, sensitive-term filter
//! - Extraction: oracle client, answer parser, batch runner
//! - Linking: identity resolver
//! - Orchestration: one run over a watermark

pub mod address_canonicalizer;
pub mod address_classifier;
pub mod answer_parser;
pub mod extraction_oracle;
pub mod extraction_runner;
pub mod identity_resolver;
pub mod pipeline_orchestrator;
pub mod sensitive_terms;

pub use address_canonicalizer::{AddressCanonicalizer, CanonicalizerConfig};
pub use address_classifier::{AddressClassifier, ClassifierConfig};
pub use answer_parser::{parse_answers, ExtractedAddress, ParsedAnswer};
pub use extraction_oracle::{ChatCompletionOracle, ExtractionOracle, OracleError, OracleInput};
pub use extraction_runner::{ExtractionBatchRunner, ExtractionStats, RunnerConfig};
pub use identity_resolver::{IdentityResolver, ResolutionStats};
pub use pipeline_orchestrator::PipelineOrchestrator;
pub use sensitive_terms::SensitiveTermFilter;
