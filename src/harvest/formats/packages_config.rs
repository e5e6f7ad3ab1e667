//! Legacy `packages.config`:
//!
//! ```xml
//! <packages>
//!   <package id="System.Foo" version="1.2.3" targetFramework="..." />
//! </packages>
//! ```

use super::{collect_references, containment_clause, parse_package_version};
use crate::harvest::document::XmlDocument;
use crate::harvest::matching::NameMatcher;
use crate::model::PackageReference;

pub fn search_clause(matcher: &NameMatcher) -> String {
    containment_clause("file:packages.config", r#"<package id=\""#, matcher)
}

pub fn extract_package_references(
    document: &XmlDocument,
    matcher: &NameMatcher,
) -> Vec<PackageReference> {
    let candidates = document
        .descendants_named(None, "packages")
        .flat_map(|packages| packages.children_named(None, "package"))
        .map(|package| (package.attribute("id"), package.attribute("version")));

    collect_references(
        candidates,
        matcher,
        parse_package_version,
        |name, version| PackageReference { name, version },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_direct_package_children_only() {
        let doc = XmlDocument::parse(
            r#"<?xml version="1.0" encoding="utf-8"?>
<packages>
  <package id="EntityFramework" version="6.4.4" targetFramework="net472" />
  <package id="EntityFramework.SqlServer" version="6.4.4" targetFramework="net472" />
  <package id="EntityFramework" version="6.4.4" targetFramework="net472" />
  <group><package id="EntityFramework" version="9.9.9" /></group>
</packages>"#,
        )
        .unwrap();

        let refs = extract_package_references(&doc, &NameMatcher::new("EntityFramework", false));
        assert_eq!(refs.len(), 2, "duplicates are preserved, nested packages ignored");
        assert!(refs.iter().all(|r| r.version == semver::Version::new(6, 4, 4)));

        let wildcard = extract_package_references(&doc, &NameMatcher::new("EntityFramework", true));
        assert_eq!(wildcard.len(), 3);
    }

    #[test]
    fn test_search_clause() {
        assert_eq!(
            search_clause(&NameMatcher::new("EntityFramework", false)),
            r#"file:packages.config AND ("<package id=\"EntityFramework\"")"#
        );
    }
}
