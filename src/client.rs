//! Azure DevOps implementation of [`RemoteIndex`].

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;
use tracing::{debug, instrument};

use crate::model::FileReference;
use crate::traits::{QueryError, RemoteIndex, Result, SearchPage, SearchRequest};

static BARE_ORG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9-]+$").expect("static pattern is valid"));
static VISUALSTUDIO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(?P<org>[a-zA-Z0-9-]+)\.visualstudio\.com(/.*)?$")
        .expect("static pattern is valid")
});
static DEV_AZURE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://dev\.azure\.com/(?P<org>[a-zA-Z0-9-]+)(/.*)?$")
        .expect("static pattern is valid")
});

/// Extracts the organization from a bare name or an organization URL.
pub fn parse_organization(input: &str) -> Result<String> {
    let input = input.trim();
    if BARE_ORG.is_match(input) {
        return Ok(input.to_string());
    }

    [&*VISUALSTUDIO_URL, &*DEV_AZURE_URL]
        .iter()
        .find_map(|pattern| pattern.captures(input))
        .and_then(|captures| captures.name("org"))
        .map(|org| org.as_str().to_string())
        .ok_or_else(|| QueryError::InvalidOrganization(input.to_string()))
}

pub struct AzdoClient {
    client: reqwest::Client,
    organization: String,
    token: String,
    search_base: String,
    api_base: String,
}

impl AzdoClient {
    /// `organization` may be a bare name or any organization URL.
    /// `token` is a personal access token with code read scope.
    pub fn new(organization: &str, token: impl Into<String>) -> Result<Self> {
        let organization = parse_organization(organization)?;
        Ok(Self {
            client: reqwest::Client::new(),
            search_base: "https://almsearch.dev.azure.com".to_string(),
            api_base: "https://dev.azure.com".to_string(),
            organization,
            token: token.into(),
        })
    }

    /// Reads `AZDO_ORG` and `AZDO_PAT`.
    pub fn from_env() -> Result<Self> {
        let organization = std::env::var("AZDO_ORG").unwrap_or_default();
        let token = std::env::var("AZDO_PAT").unwrap_or_default();
        Self::new(&organization, token)
    }

    /// Points the client at different hosts, e.g. an on-premises server.
    pub fn with_base_urls(
        mut self,
        search_base: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        self.search_base = search_base.into();
        self.api_base = api_base.into();
        self
    }

    pub fn base_url(&self) -> String {
        format!("{}/{}/", self.api_base, self.organization)
    }

    fn search_url(&self) -> String {
        format!(
            "{}/{}/_apis/search/codesearchresults?api-version=7.1-preview.1",
            self.search_base,
            urlencoding::encode(&self.organization)
        )
    }

    fn item_url(&self, file: &FileReference) -> String {
        format!(
            "{}/{}/{}/_apis/git/repositories/{}/items",
            self.api_base,
            urlencoding::encode(&self.organization),
            urlencoding::encode(&file.project),
            urlencoding::encode(&file.repository)
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(QueryError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RemoteIndex for AzdoClient {
    fn organization(&self) -> &str {
        &self.organization
    }

    #[instrument(skip_all, fields(skip = request.skip, top = request.top))]
    async fn search_page(&self, request: &SearchRequest) -> Result<SearchPage> {
        let body = json!({
            "searchText": request.query_text,
            "$skip": request.skip,
            "$top": request.top,
        });

        let response = self
            .client
            .post(self.search_url())
            .basic_auth("", Some(&self.token))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let text = Self::check(response).await?.text().await?;
        let page: SearchPage = serde_json::from_str(&text)?;
        debug!(count = page.count, returned = page.results.len(), "Search page received");
        Ok(page)
    }

    async fn fetch_file_text(
        &self,
        file: &FileReference,
    ) -> std::result::Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let response = self
            .client
            .get(self.item_url(file))
            .basic_auth("", Some(&self.token))
            .query(&[
                ("path", file.path.as_str()),
                ("versionDescriptor.versionType", "branch"),
                ("versionDescriptor.version", file.branch.as_str()),
                ("resolveLfs", "true"),
                ("api-version", "7.1"),
            ])
            .send()
            .await?;

        Ok(Self::check(response).await?.text().await?)
    }
}
