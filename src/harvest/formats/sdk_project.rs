//! SDK-style project files:
//!
//! ```xml
//! <PackageReference Include="System.Foo" Version="1.2.3" />
//! ```

use super::{collect_references, containment_clause, parse_package_version};
use crate::harvest::document::XmlDocument;
use crate::harvest::matching::NameMatcher;
use crate::model::PackageReference;

/// Target framework prefixes the search is narrowed to. Each entry is a
/// prefix, so `netcoreapp2` covers `netcoreapp2.0`, `netcoreapp2.1`, ...
pub const MATCHING_TARGET_FRAMEWORKS: &[&str] = &[
    "netcoreapp2",
    "netcoreapp3",
    "net5",
    "net462",
    "net47",
    "net471",
    "net472",
    "net48",
    "net481",
];

pub fn search_clause(matcher: &NameMatcher) -> String {
    let frameworks = MATCHING_TARGET_FRAMEWORKS
        .iter()
        .map(|tf| format!("\"<TargetFramework>{tf}\""))
        .collect::<Vec<_>>()
        .join(" OR ");

    format!(
        "{} AND ({})",
        containment_clause("ext:*proj", r#"<PackageReference Include=\""#, matcher),
        frameworks
    )
}

pub fn extract_package_references(
    document: &XmlDocument,
    matcher: &NameMatcher,
) -> Vec<PackageReference> {
    let candidates = document
        .descendants_named(None, "PackageReference")
        .map(|element| (element.attribute("Include"), element.attribute("Version")));

    collect_references(
        candidates,
        matcher,
        parse_package_version,
        |name, version| PackageReference { name, version },
    )
}
