use crate::model::FileReference;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Largest page the remote search service will return.
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Errors that abort a whole query. None of these are retried.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Remote returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Malformed search response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Remote reported a negative match count: {0}")]
    NegativeCount(i64),
    #[error("Page size {0} is outside 1..=1000")]
    InvalidPageSize(i64),
    #[error("Skip offset {0} is out of range")]
    InvalidSkip(i64),
    #[error("Max records {0} is outside the accepted range")]
    InvalidMaxRecords(usize),
    #[error("Bad package name: {0:?}")]
    InvalidPackageName(String),
    #[error("Invalid organization name or URL: {0:?}")]
    InvalidOrganization(String),
    #[error("Query cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, QueryError>;

/// A validated page request. Construction rejects out-of-range bounds, so
/// an invalid request can never reach the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query_text: String,
    pub skip: u32,
    pub top: u32,
}

impl SearchRequest {
    pub fn new(query_text: impl Into<String>, skip: i64, top: i64) -> Result<Self> {
        if skip < 0 || skip > i64::from(u32::MAX) {
            return Err(QueryError::InvalidSkip(skip));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&top) {
            return Err(QueryError::InvalidPageSize(top));
        }
        Ok(Self {
            query_text: query_text.into(),
            skip: skip as u32,
            top: top as u32,
        })
    }
}

/// One page of search hits.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage {
    /// Total matches reported by the server, across all pages.
    pub count: i64,
    #[serde(default)]
    pub results: Vec<CandidateRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateRecord {
    pub path: String,
    pub project: NamedRecord,
    pub repository: RepositoryRecord,
    #[serde(default)]
    pub versions: Vec<VersionRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedRecord {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionRecord {
    #[serde(rename = "branchName")]
    pub branch_name: String,
}

impl CandidateRecord {
    /// Only git hits with a known branch can be fetched.
    pub fn is_fetchable(&self) -> bool {
        self.repository.kind == "git" && !self.versions.is_empty()
    }

    /// Resolves the hit to a concrete file at its first reported branch.
    pub fn to_file_reference(&self, organization: &str) -> Option<FileReference> {
        let branch = self.versions.first()?;
        Some(FileReference {
            organization: organization.to_string(),
            project: self.project.name.clone(),
            repository: self.repository.name.clone(),
            path: self.path.clone(),
            branch: branch.branch_name.clone(),
        })
    }
}

/// Remote code-search index the pipeline reads from.
///
/// Implementations must be safe to share across concurrent fetch workers.
#[async_trait]
pub trait RemoteIndex: Send + Sync {
    /// Organization every returned file belongs to.
    fn organization(&self) -> &str;

    /// Runs one search page. Transport and HTTP failures propagate.
    async fn search_page(&self, request: &SearchRequest) -> Result<SearchPage>;

    /// Downloads one file as text. The caller applies its own deadline.
    async fn fetch_file_text(
        &self,
        file: &FileReference,
    ) -> std::result::Result<String, Box<dyn std::error::Error + Send + Sync>>;
}
