//! Package/assembly name matching.
//!
//! Every extractor filters candidate names through [`name_matches`], and the
//! search clauses are built from the same two forms it accepts (the exact
//! name and `name.` prefix), so the server-side query never excludes a name
//! that local extraction would keep.

/// Returns `true` when `candidate` names the `target` package or assembly.
///
/// The comparison is a case-insensitive prefix test. Equal lengths are an
/// exact match. With `use_wildcard_suffix`, a candidate continuing with `.`
/// right after the shared prefix also matches, so `Foo` matches `Foo.Bar`
/// but never `Foobar`.
pub fn name_matches(candidate: &str, target: &str, use_wildcard_suffix: bool) -> bool {
    if candidate.is_empty() {
        return false;
    }

    let Some(rest) = strip_prefix_ignore_case(candidate, target) else {
        return false;
    };

    if rest.is_empty() {
        return true;
    }

    use_wildcard_suffix && rest.starts_with('.')
}

fn strip_prefix_ignore_case<'a>(candidate: &'a str, prefix: &str) -> Option<&'a str> {
    let mut remaining = candidate.char_indices();
    for expected in prefix.chars() {
        let (_, actual) = remaining.next()?;
        if !chars_eq_ignore_case(actual, expected) {
            return None;
        }
    }
    let offset = remaining.next().map_or(candidate.len(), |(i, _)| i);
    Some(&candidate[offset..])
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_uppercase().eq(b.to_uppercase())
}

/// A target name bound to its matching mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatcher {
    pub target: String,
    pub use_wildcard_suffix: bool,
}

impl NameMatcher {
    pub fn new(target: impl Into<String>, use_wildcard_suffix: bool) -> Self {
        Self {
            target: target.into(),
            use_wildcard_suffix,
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        name_matches(candidate, &self.target, self.use_wildcard_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_exact_match_ignores_case() {
        assert!(name_matches("Newtonsoft.Json", "Newtonsoft.Json", false));
        assert!(name_matches("newtonsoft.json", "Newtonsoft.Json", false));
        assert!(name_matches("NEWTONSOFT.JSON", "newtonsoft.json", true));
    }

    #[test]
    fn test_wildcard_requires_dot_boundary() {
        assert!(!name_matches("Foo.Bar", "Foo", false));
        assert!(name_matches("Foo.Bar", "Foo", true));
        assert!(name_matches("foo.bar.baz", "Foo", true));
        assert!(!name_matches("Foobar", "Foo", true));
        assert!(!name_matches("Foo-Bar", "Foo", true));
        // A bare trailing dot still counts as a namespace continuation.
        assert!(name_matches("Foo.", "Foo", true));
    }

    #[test]
    fn test_non_matches() {
        assert!(!name_matches("", "Foo", true));
        assert!(!name_matches("Fo", "Foo", true));
        assert!(!name_matches("Bar.Foo", "Foo", true));
        assert!(!name_matches("System.Foo", "Foo", true));
    }

    #[test]
    fn test_non_ascii_names() {
        assert!(name_matches("Ünicode.Pkg", "ünicode", true));
        assert!(!name_matches("Ünicodex", "ünicode", true));
    }

    #[test]
    fn test_matcher_delegates() {
        let matcher = NameMatcher::new("Serilog", true);
        assert!(matcher.matches("Serilog.Sinks.Console"));
        assert!(!matcher.matches("SerilogAnalyzer"));
    }

    proptest! {
        #[test]
        fn prop_matches_iff_exact_or_dotted_suffix(
            target in "[A-Za-z0-9_-]{1,8}(\\.[A-Za-z0-9_-]{1,8}){0,2}",
            suffix in "[A-Za-z0-9_.-]{0,8}",
            wildcard in any::<bool>(),
            upper in any::<bool>(),
        ) {
            let base = if upper { target.to_uppercase() } else { target.to_lowercase() };
            let candidate = format!("{base}{suffix}");
            let expected = suffix.is_empty() || (wildcard && suffix.starts_with('.'));
            prop_assert_eq!(name_matches(&candidate, &target, wildcard), expected);
        }
    }
}
