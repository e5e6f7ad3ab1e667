//! File-dialect extractors.
//!
//! Each [`ExtractorPlugin`] variant pairs a remote search clause with local
//! extraction over one on-disk XML dialect:
//! - `binding_redirect` - `<bindingRedirect>` entries in `*.config`
//! - `central_package` - `Directory.Packages.props` (central package management)
//! - `packages_config` - legacy `packages.config`
//! - `sdk_project` - `<PackageReference>` items in SDK-style `*.*proj`

pub mod binding_redirect;
pub mod central_package;
pub mod packages_config;
pub mod sdk_project;

use crate::harvest::document::XmlDocument;
use crate::harvest::matching::NameMatcher;
use crate::model::{AssemblyReference, PackageReference, PackageVersion};

/// What a plugin can pull out of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Assemblies,
    Packages,
}

/// The closed set of supported dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorPlugin {
    BindingRedirect,
    CentralPackageManagement,
    PackagesConfig,
    SdkProject,
}

impl ExtractorPlugin {
    pub const ALL: [ExtractorPlugin; 4] = [
        ExtractorPlugin::BindingRedirect,
        ExtractorPlugin::CentralPackageManagement,
        ExtractorPlugin::PackagesConfig,
        ExtractorPlugin::SdkProject,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ExtractorPlugin::BindingRedirect => "binding_redirect",
            ExtractorPlugin::CentralPackageManagement => "central_package",
            ExtractorPlugin::PackagesConfig => "packages_config",
            ExtractorPlugin::SdkProject => "sdk_project",
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            ExtractorPlugin::BindingRedirect => &[Capability::Assemblies],
            _ => &[Capability::Packages],
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Server-side filter for files this plugin can extract from.
    pub fn search_clause(&self, matcher: &NameMatcher) -> String {
        match self {
            ExtractorPlugin::BindingRedirect => binding_redirect::search_clause(matcher),
            ExtractorPlugin::CentralPackageManagement => central_package::search_clause(matcher),
            ExtractorPlugin::PackagesConfig => packages_config::search_clause(matcher),
            ExtractorPlugin::SdkProject => sdk_project::search_clause(matcher),
        }
    }

    /// Assembly references in `document`; empty for package-only plugins.
    pub fn extract_assembly_references(
        &self,
        document: &XmlDocument,
        matcher: &NameMatcher,
    ) -> Vec<AssemblyReference> {
        match self {
            ExtractorPlugin::BindingRedirect => {
                binding_redirect::extract_assembly_references(document, matcher)
            }
            _ => Vec::new(),
        }
    }

    /// Package references in `document`; empty for assembly-only plugins.
    pub fn extract_package_references(
        &self,
        document: &XmlDocument,
        matcher: &NameMatcher,
    ) -> Vec<PackageReference> {
        match self {
            ExtractorPlugin::BindingRedirect => Vec::new(),
            ExtractorPlugin::CentralPackageManagement => {
                central_package::extract_package_references(document, matcher)
            }
            ExtractorPlugin::PackagesConfig => {
                packages_config::extract_package_references(document, matcher)
            }
            ExtractorPlugin::SdkProject => {
                sdk_project::extract_package_references(document, matcher)
            }
        }
    }
}

/// `{scope} AND ("{marker}{name}\"" [OR "{marker}{name}."])`
///
/// `marker` is the literal text preceding the name, with quotes already
/// escaped for the search syntax. The exact form ends with an escaped quote;
/// the wildcard form ends with the namespace dot.
pub(crate) fn containment_clause(scope: &str, marker: &str, matcher: &NameMatcher) -> String {
    let target = &matcher.target;
    let mut clause = format!("{scope} AND (\"{marker}{target}\\\"\"");
    if matcher.use_wildcard_suffix {
        clause.push_str(&format!(" OR \"{marker}{target}.\""));
    }
    clause.push(')');
    clause
}

/// Shared extraction filter: trim the name, keep it only if it matches,
/// then keep the element only if its version parses.
pub(crate) fn collect_references<'a, V, R>(
    candidates: impl Iterator<Item = (Option<&'a str>, Option<&'a str>)>,
    matcher: &NameMatcher,
    parse_version: impl Fn(&str) -> Option<V>,
    build: impl Fn(String, V) -> R,
) -> Vec<R> {
    candidates
        .filter_map(|(name, version)| {
            let name = name?.trim();
            if !matcher.matches(name) {
                return None;
            }
            let version = parse_version(version?.trim())?;
            Some(build(name.to_string(), version))
        })
        .collect()
}

/// Rejects MSBuild properties like `$(FooVersion)` and floating ranges.
pub(crate) fn parse_package_version(raw: &str) -> Option<PackageVersion> {
    PackageVersion::parse(raw).ok()
}
