use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use crate::harvest::traits::VersionParseError;
use crate::traits::QueryError;

/// Upper bound on records a single run may request.
pub const MAX_RECORDS_LIMIT: usize = 10_000;

static PACKAGE_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]+(\.[a-zA-Z0-9_-]+)*$").expect("static pattern is valid")
});

/// One file at one branch of one git repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileReference {
    pub organization: String,
    pub project: String,
    pub repository: String,
    pub path: String,
    pub branch: String,
}

impl FileReference {
    /// Human-readable browse URL for this file.
    pub fn to_friendly_url(&self) -> String {
        format!(
            "https://dev.azure.com/{}/{}/_git/{}?path={}&version=GB{}",
            urlencoding::encode(&self.organization),
            urlencoding::encode(&self.project),
            urlencoding::encode(&self.repository),
            query_encode(&self.path),
            query_encode(&self.branch),
        )
    }
}

/// Percent-encodes a query value but keeps `/` readable.
fn query_encode(value: &str) -> String {
    urlencoding::encode(value).replace("%2F", "/")
}

impl fmt::Display for FileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}:{}@{}",
            self.organization, self.project, self.repository, self.path, self.branch
        )
    }
}

/// Payload travelling between pipeline stages.
///
/// `contents` is `None` once any stage has failed for this file. The marker
/// is sticky: stages forward an absent payload without touching it.
#[derive(Debug, Clone, PartialEq)]
pub struct FileContents<T> {
    pub file: FileReference,
    pub contents: Option<T>,
}

impl<T> FileContents<T> {
    pub fn new(file: FileReference, contents: T) -> Self {
        Self {
            file,
            contents: Some(contents),
        }
    }

    /// Failure marker for `file`.
    pub fn absent(file: FileReference) -> Self {
        Self {
            file,
            contents: None,
        }
    }

    pub fn is_absent(&self) -> bool {
        self.contents.is_none()
    }

    /// Maps present contents; absent payloads stay absent.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FileContents<U> {
        FileContents {
            file: self.file,
            contents: self.contents.map(f),
        }
    }
}

/// Four-part ordinal version (`major.minor[.build[.revision]]`).
///
/// Undefined trailing components order before any defined value, so
/// `1.2 < 1.2.0 < 1.2.0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssemblyVersion {
    pub major: u32,
    pub minor: u32,
    pub build: Option<u32>,
    pub revision: Option<u32>,
}

impl AssemblyVersion {
    pub fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build: Some(build),
            revision: Some(revision),
        }
    }
}

impl FromStr for AssemblyVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if !(2..=4).contains(&parts.len()) {
            return Err(VersionParseError::ComponentCount {
                input: s.to_string(),
                count: parts.len(),
            });
        }

        let mut components = [None; 4];
        for (slot, part) in components.iter_mut().zip(&parts) {
            let part = part.trim();
            // Component range matches a signed 32-bit ordinal.
            let value = part
                .parse::<i32>()
                .ok()
                .filter(|v| *v >= 0)
                .ok_or_else(|| VersionParseError::InvalidComponent {
                    input: s.to_string(),
                    component: part.to_string(),
                })?;
            *slot = Some(value as u32);
        }

        Ok(Self {
            major: components[0].unwrap_or_default(),
            minor: components[1].unwrap_or_default(),
            build: components[2],
            revision: components[3],
        })
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(build) = self.build {
            write!(f, ".{}", build)?;
            if let Some(revision) = self.revision {
                write!(f, ".{}", revision)?;
            }
        }
        Ok(())
    }
}

/// Semantic version of a package, compared as an opaque ordered value.
pub type PackageVersion = semver::Version;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssemblyReference {
    pub name: String,
    pub version: AssemblyVersion,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageReference {
    pub name: String,
    pub version: PackageVersion,
}

/// Everything extracted from one successfully processed file.
///
/// Reference order is irrelevant and duplicates are preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub file: FileReference,
    pub assembly_references: Vec<AssemblyReference>,
    pub package_references: Vec<PackageReference>,
}

/// Inputs of one pipeline run.
#[derive(Debug)]
pub struct QueryParameters<C> {
    /// Remote index shared read-only by every fetch worker.
    pub connection: Arc<C>,
    pub package_name: String,
    pub use_wildcard_suffix: bool,
    pub max_records: usize,
}

impl<C> Clone for QueryParameters<C> {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            package_name: self.package_name.clone(),
            use_wildcard_suffix: self.use_wildcard_suffix,
            max_records: self.max_records,
        }
    }
}

impl<C> QueryParameters<C> {
    pub fn new(
        connection: Arc<C>,
        package_name: impl Into<String>,
        use_wildcard_suffix: bool,
        max_records: usize,
    ) -> Result<Self, QueryError> {
        let package_name = package_name.into();
        if !PACKAGE_NAME_PATTERN.is_match(&package_name) {
            return Err(QueryError::InvalidPackageName(package_name));
        }

        let query = Self {
            connection,
            package_name,
            use_wildcard_suffix,
            max_records,
        };
        query.validate()?;
        Ok(query)
    }

    /// Parses a user pattern such as `Newtonsoft.Json` or `Microsoft.Extensions.*`.
    ///
    /// A trailing `.*` enables wildcard suffix matching.
    pub fn from_pattern(
        connection: Arc<C>,
        pattern: &str,
        max_records: usize,
    ) -> Result<Self, QueryError> {
        let pattern = pattern.trim();
        match pattern.strip_suffix(".*") {
            Some(base) => Self::new(connection, base, true, max_records),
            None => Self::new(connection, pattern, false, max_records),
        }
    }

    /// Same query with a different record limit.
    pub fn with_max_records(&self, max_records: usize) -> Result<Self, QueryError> {
        let query = Self {
            max_records,
            ..self.clone()
        };
        query.validate()?;
        Ok(query)
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        if self.max_records == 0 || self.max_records > MAX_RECORDS_LIMIT {
            return Err(QueryError::InvalidMaxRecords(self.max_records));
        }
        Ok(())
    }

    /// The pattern as a user would type it.
    pub fn display_name(&self) -> String {
        if self.use_wildcard_suffix {
            format!("{}.*", self.package_name)
        } else {
            self.package_name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> FileReference {
        FileReference {
            organization: "contoso".to_string(),
            project: "Web Apps".to_string(),
            repository: "portal".to_string(),
            path: "/src/App/App.csproj".to_string(),
            branch: "main".to_string(),
        }
    }

    #[test]
    fn test_friendly_url_encodes_components() {
        let url = file().to_friendly_url();
        assert_eq!(
            url,
            "https://dev.azure.com/contoso/Web%20Apps/_git/portal?path=/src/App/App.csproj&version=GBmain"
        );
    }

    #[test]
    fn test_friendly_url_keeps_slashes_in_query_only() {
        let file = FileReference {
            organization: "contoso".to_string(),
            project: "a/b".to_string(),
            repository: "portal".to_string(),
            path: "/src/My App/a&b.csproj".to_string(),
            branch: "users/me/fix".to_string(),
        };
        assert_eq!(
            file.to_friendly_url(),
            "https://dev.azure.com/contoso/a%2Fb/_git/portal\
             ?path=/src/My%20App/a%26b.csproj&version=GBusers/me/fix"
        );
    }

    #[test]
    fn test_absent_payload_stays_absent() {
        let payload: FileContents<String> = FileContents::absent(file());
        let mapped = payload.map(|s| s.len());
        assert!(mapped.is_absent());
        assert_eq!(mapped.file, file());

        let present = FileContents::new(file(), "abc".to_string()).map(|s| s.len());
        assert_eq!(present.contents, Some(3));
    }

    #[test]
    fn test_assembly_version_parsing() {
        let v: AssemblyVersion = "1.2.3.4".parse().unwrap();
        assert_eq!(v, AssemblyVersion::new(1, 2, 3, 4));
        assert_eq!(v.to_string(), "1.2.3.4");

        let short: AssemblyVersion = "13.0".parse().unwrap();
        assert_eq!(short.build, None);
        assert_eq!(short.to_string(), "13.0");

        assert!("1".parse::<AssemblyVersion>().is_err());
        assert!("1.2.3.4.5".parse::<AssemblyVersion>().is_err());
        assert!("1.x".parse::<AssemblyVersion>().is_err());
        assert!("1.-2".parse::<AssemblyVersion>().is_err());
        assert!("".parse::<AssemblyVersion>().is_err());
        assert!("4294967295.0".parse::<AssemblyVersion>().is_err());
    }

    #[test]
    fn test_assembly_version_ordering() {
        let a: AssemblyVersion = "1.2".parse().unwrap();
        let b: AssemblyVersion = "1.2.0".parse().unwrap();
        let c: AssemblyVersion = "1.2.0.0".parse().unwrap();
        let d: AssemblyVersion = "1.10.0.0".parse().unwrap();
        assert!(a < b && b < c && c < d);
    }

    #[test]
    fn test_query_from_pattern() {
        let conn = Arc::new(());
        let q =
            QueryParameters::from_pattern(conn.clone(), " Microsoft.Extensions.* ", 100).unwrap();
        assert_eq!(q.package_name, "Microsoft.Extensions");
        assert!(q.use_wildcard_suffix);
        assert_eq!(q.display_name(), "Microsoft.Extensions.*");

        let q = QueryParameters::from_pattern(conn.clone(), "Newtonsoft.Json", 100).unwrap();
        assert!(!q.use_wildcard_suffix);

        assert!(matches!(
            QueryParameters::from_pattern(conn.clone(), "Bad Name", 100),
            Err(QueryError::InvalidPackageName(_))
        ));
        assert!(QueryParameters::from_pattern(conn.clone(), ".*", 100).is_err());
        assert!(QueryParameters::from_pattern(conn.clone(), "Foo..Bar", 100).is_err());
    }

    #[test]
    fn test_query_max_records_bounds() {
        let conn = Arc::new(());
        assert!(matches!(
            QueryParameters::new(conn.clone(), "Foo", false, 0),
            Err(QueryError::InvalidMaxRecords(0))
        ));
        assert!(QueryParameters::new(conn.clone(), "Foo", false, MAX_RECORDS_LIMIT + 1).is_err());

        let q = QueryParameters::new(conn, "Foo", false, 1).unwrap();
        let wider = q.with_max_records(MAX_RECORDS_LIMIT).unwrap();
        assert_eq!(wider.max_records, MAX_RECORDS_LIMIT);
        assert!(q.with_max_records(0).is_err());
    }
}
