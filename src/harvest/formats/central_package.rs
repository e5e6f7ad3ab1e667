//! Central package management (`Directory.Packages.props`):
//!
//! ```xml
//! <PackageVersion Include="System.Foo" Version="1.2.3" />
//! ```

use super::{collect_references, containment_clause, parse_package_version};
use crate::harvest::document::XmlDocument;
use crate::harvest::matching::NameMatcher;
use crate::model::PackageReference;

pub fn search_clause(matcher: &NameMatcher) -> String {
    containment_clause(
        "file:Directory.Packages.props",
        r#"<PackageVersion Include=\""#,
        matcher,
    )
}

pub fn extract_package_references(
    document: &XmlDocument,
    matcher: &NameMatcher,
) -> Vec<PackageReference> {
    let candidates = document
        .descendants_named(None, "PackageVersion")
        .map(|element| (element.attribute("Include"), element.attribute("Version")));

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

    const PROPS: &str = r#"<Project>
  <PropertyGroup>
    <ManagePackageVersionsCentrally>true</ManagePackageVersionsCentrally>
  </PropertyGroup>
  <ItemGroup>
    <PackageVersion Include="Serilog" Version="3.1.1" />
    <PackageVersion Include="Serilog.Sinks.Console" Version="5.0.0" />
    <PackageVersion Include="Serilog.Sinks.File" Version="$(SinkVersion)" />
    <PackageVersion Include="SerilogAnalyzer" Version="0.15.0" />
    <PackageVersion Include="xunit" Version="2.6.2" />
  </ItemGroup>
</Project>"#;

    #[test]
    fn test_extracts_matching_versions() {
        let doc = XmlDocument::parse(PROPS).unwrap();

        let exact = extract_package_references(&doc, &NameMatcher::new("Serilog", false));
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].version, semver::Version::new(3, 1, 1));

        let wildcard = extract_package_references(&doc, &NameMatcher::new("Serilog", true));
        let names: Vec<&str> = wildcard.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Serilog", "Serilog.Sinks.Console"]);
    }

    #[test]
    fn test_repeated_extraction_is_stable() {
        let doc = XmlDocument::parse(PROPS).unwrap();
        let matcher = NameMatcher::new("serilog", true);
        let mut first = extract_package_references(&doc, &matcher);
        let mut second = extract_package_references(&doc, &matcher);
        first.sort();
        second.sort();
        assert_eq!(first, second);
    }

    #[test]
    fn test_search_clause() {
        assert_eq!(
            search_clause(&NameMatcher::new("Serilog", true)),
            r#"file:Directory.Packages.props AND ("<PackageVersion Include=\"Serilog\"" OR "<PackageVersion Include=\"Serilog.")"#
        );
    }
}
