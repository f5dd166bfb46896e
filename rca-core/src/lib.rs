pub mod config;
pub mod db;
pub mod enrich;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod protocol;

pub use config::RcaConfig;
pub use enrich::{MockStackOverflowEnricher, NoopEnricher, SolutionEnricher};
pub use error::{ErrorKind, RcaError};
pub use llm::{ChatClientConfig, ChatCompletionClient, LlmBackend, LlmError, Provider};
pub use pipeline::AnalysisPipeline;
