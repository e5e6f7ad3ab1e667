//! Core traits and error types shared by the harvest stages.
//!
//! - Per-file processing via [`HarvestStage`]
//! - Per-item failures via [`StageError`]
//! - Version parsing failures via [`VersionParseError`]

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::harvest::document::DocumentError;
use crate::model::FileReference;

// ============================================================================
// Stage Trait
// ============================================================================

/// One per-file transform in the harvest pipeline.
///
/// The executor calls [`HarvestStage::execute`] once for every payload whose
/// contents are still present. Any error is converted into an absent payload
/// for that file; it never aborts the stage or sibling items.
///
/// # Thread Safety
///
/// A single stage instance is shared by all of its workers, so
/// implementations must be `Send + Sync`.
///
/// # Examples
///
/// ```ignore
/// struct Uppercase;
///
/// #[async_trait]
/// impl HarvestStage for Uppercase {
///     type Input = String;
///     type Output = String;
///
///     async fn execute(&self, _file: &FileReference, input: String) -> Result<String, StageError> {
///         Ok(input.to_uppercase())
///     }
///
///     fn stage_name(&self) -> &'static str {
///         "uppercase"
///     }
/// }
/// ```
#[async_trait]
pub trait HarvestStage: Send + Sync + 'static {
    /// Contents consumed by this stage
    type Input: Send + 'static;

    /// Contents produced by this stage
    type Output: Send + 'static;

    /// Transforms the contents of one file.
    ///
    /// # Idempotence
    ///
    /// Implementations SHOULD be deterministic for a given input so that a
    /// rerun over the same document yields the same references.
    async fn execute(
        &self,
        file: &FileReference,
        input: Self::Input,
    ) -> Result<Self::Output, StageError>;

    /// Returns a human-readable name for this stage.
    ///
    /// Used for logging.
    fn stage_name(&self) -> &'static str;
}

// ============================================================================
// Error Types
// ============================================================================

/// Failures isolated to a single file. Never surfaced to the caller.
#[derive(Error, Debug)]
pub enum StageError {
    /// Fetch exceeded its per-item deadline
    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    /// Remote refused or failed to return the file
    #[error("Fetch failed: {0}")]
    Fetch(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// File is not well-formed XML, or is nested too deeply to parse
    #[error("Failed to parse document: {0}")]
    Parse(#[from] DocumentError),

    /// Extraction could not complete
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Transform panicked
    #[error("Stage '{0}' panicked")]
    Panicked(&'static str),
}

/// Errors parsing a four-part assembly version.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("Expected 2 to 4 components in {input:?}, found {count}")]
    ComponentCount { input: String, count: usize },

    #[error("Invalid component {component:?} in {input:?}")]
    InvalidComponent { input: String, component: String },
}
