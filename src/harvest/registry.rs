//! Fixed set of extractor plugins.
//!
//! The same registry builds the remote query and runs local extraction, so
//! the server-side filter always covers everything the plugins can find.

use tracing::debug;

use crate::harvest::document::XmlDocument;
use crate::harvest::formats::{Capability, ExtractorPlugin};
use crate::harvest::matching::NameMatcher;
use crate::model::{ExtractionResult, FileReference};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRegistry {
    plugins: Vec<ExtractorPlugin>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self {
            plugins: ExtractorPlugin::ALL.to_vec(),
        }
    }
}

impl PluginRegistry {
    pub fn plugins(&self) -> &[ExtractorPlugin] {
        &self.plugins
    }

    /// Every plugin's clause, parenthesized and joined with `OR`.
    pub fn query_text(&self, matcher: &NameMatcher) -> String {
        self.plugins
            .iter()
            .map(|plugin| format!("({})", plugin.search_clause(matcher)))
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    /// Runs every applicable plugin against `document` and merges the output.
    pub fn extract(
        &self,
        file: FileReference,
        document: &XmlDocument,
        matcher: &NameMatcher,
    ) -> ExtractionResult {
        let assembly_references: Vec<_> = self
            .plugins
            .iter()
            .filter(|plugin| plugin.supports(Capability::Assemblies))
            .flat_map(|plugin| plugin.extract_assembly_references(document, matcher))
            .collect();

        let package_references: Vec<_> = self
            .plugins
            .iter()
            .filter(|plugin| plugin.supports(Capability::Packages))
            .flat_map(|plugin| plugin.extract_package_references(document, matcher))
            .collect();

        debug!(
            file = %file,
            assemblies = assembly_references.len(),
            packages = package_references.len(),
            "Extracted references"
        );

        ExtractionResult {
            file,
            assembly_references,
            package_references,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> FileReference {
        FileReference {
            organization: "org".to_string(),
            project: "proj".to_string(),
            repository: "repo".to_string(),
            path: "/web.config".to_string(),
            branch: "main".to_string(),
        }
    }

    #[test]
    fn test_query_text_is_union_of_all_plugins() {
        let registry = PluginRegistry::default();
        let matcher = NameMatcher::new("Foo", true);
        let text = registry.query_text(&matcher);

        let expected = ExtractorPlugin::ALL
            .iter()
            .map(|p| format!("({})", p.search_clause(&matcher)))
            .collect::<Vec<_>>()
            .join(" OR ");
        assert_eq!(text, expected);
        assert!(text.starts_with("(ext:config AND "));
        assert!(text.contains(") OR (file:Directory.Packages.props AND "));
        assert!(text.contains(") OR (file:packages.config AND "));
        assert!(text.contains(") OR (ext:*proj AND "));
    }

    #[test]
    fn test_extract_merges_across_dialects() {
        // A document that several dialects can read at once.
        let doc = XmlDocument::parse(
            r#"<configuration>
                 <runtime>
                   <assemblyBinding xmlns="urn:schemas-microsoft-com:asm.v1">
                     <dependentAssembly>
                       <assemblyIdentity name="Foo" />
                       <bindingRedirect newVersion="2.0.0.0" />
                     </dependentAssembly>
                   </assemblyBinding>
                 </runtime>
                 <ItemGroup>
                   <PackageReference Include="Foo" Version="2.0.0" />
                   <PackageVersion Include="Foo.Core" Version="2.1.0" />
                 </ItemGroup>
               </configuration>"#,
        )
        .unwrap();

        let registry = PluginRegistry::default();
        let result = registry.extract(file(), &doc, &NameMatcher::new("foo", true));
        assert_eq!(result.file, file());
        assert_eq!(result.assembly_references.len(), 1);
        let mut packages: Vec<_> = result
            .package_references
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        packages.sort();
        assert_eq!(packages, vec!["Foo", "Foo.Core"]);
    }

    #[test]
    fn test_every_reference_satisfies_matcher() {
        let doc = XmlDocument::parse(
            r#"<Project>
                 <PackageReference Include="Foo" Version="1.0.0" />
                 <PackageReference Include="Foobar" Version="1.0.0" />
                 <PackageReference Include="Foo.X" Version="1.0.0" />
                 <PackageReference Include="Bar.Foo" Version="1.0.0" />
               </Project>"#,
        )
        .unwrap();

        for wildcard in [false, true] {
            let matcher = NameMatcher::new("Foo", wildcard);
            let result = PluginRegistry::default().extract(file(), &doc, &matcher);
            assert!(!result.package_references.is_empty());
            assert!(result
                .package_references
                .iter()
                .all(|r| matcher.matches(&r.name)));
        }
    }
}
