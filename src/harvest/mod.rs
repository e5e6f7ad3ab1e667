//! Harvest module - search, fetch, parse and extract pipeline.
//!
//! This module provides the core pieces of the package reference harvester:
//! - **Traits**: [`HarvestStage`] for per-file pipeline stages
//! - **Matching**: [`name_matches`], the single name policy used everywhere
//! - **Formats**: [`ExtractorPlugin`] variants, one per XML dialect
//! - **Registry**: [`PluginRegistry`], building the query and running extraction
//! - **Pipeline**: Async coordinator via [`pipeline::CodeSearchPipeline`]

pub mod document;
pub mod formats;
pub mod matching;
pub mod pipeline;
pub mod registry;
pub mod traits;

// Re-export commonly used types
pub use document::{DocumentError, XmlDocument, XmlElement};
pub use formats::{Capability, ExtractorPlugin};
pub use matching::{name_matches, NameMatcher};
pub use registry::PluginRegistry;
pub use traits::{HarvestStage, StageError, VersionParseError};

pub use pipeline::{CodeSearchPipeline, PipelineConfig, ResultStream};
