//! Assembly binding redirects in `app.config`/`web.config`:
//!
//! ```xml
//! <runtime>
//!   <assemblyBinding xmlns="urn:schemas-microsoft-com:asm.v1">
//!     <dependentAssembly>
//!       <assemblyIdentity name="System.Foo" publicKeyToken="..." culture="..." />
//!       <bindingRedirect oldVersion="0.0.0.0-1.2.3.0" newVersion="1.2.3.0" />
//!     </dependentAssembly>
//!   </assemblyBinding>
//! </runtime>
//! ```

use super::{collect_references, containment_clause};
use crate::harvest::document::XmlDocument;
use crate::harvest::matching::NameMatcher;
use crate::model::{AssemblyReference, AssemblyVersion};

const ASM_V1: Option<&str> = Some("urn:schemas-microsoft-com:asm.v1");

pub fn search_clause(matcher: &NameMatcher) -> String {
    containment_clause("ext:config", r#"<assemblyIdentity name=\""#, matcher)
}

pub fn extract_assembly_references(
    document: &XmlDocument,
    matcher: &NameMatcher,
) -> Vec<AssemblyReference> {
    let candidates = document
        .descendants_named(ASM_V1, "assemblyBinding")
        .flat_map(|binding| binding.children_named(ASM_V1, "dependentAssembly"))
        .map(|dependent| {
            let name = dependent
                .child(ASM_V1, "assemblyIdentity")
                .and_then(|identity| identity.attribute("name"));
            let version = dependent
                .child(ASM_V1, "bindingRedirect")
                .and_then(|redirect| redirect.attribute("newVersion"));
            (name, version)
        });

    collect_references(
        candidates,
        matcher,
        |raw| raw.parse::<AssemblyVersion>().ok(),
        |name, version| AssemblyReference { name, version },
    )
}
