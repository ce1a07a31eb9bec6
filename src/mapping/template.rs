//! URL templates and URI helpers.

/// Placeholder replaced by the mapped value.
pub const PLACEHOLDER: &str = "{value}";

/// A URL pattern such as `http://data.example.io/people/{value}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    pattern: String,
}

impl UrlTemplate {
    /// Creates a template.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// Substitutes every placeholder with `value`.
    #[must_use]
    pub fn render(&self, value: &str) -> String {
        self.pattern.replace(PLACEHOLDER, value)
    }

    /// The raw pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Returns `true` for names that are already qualified (`http://...`, `ns:name`).
#[must_use]
pub fn is_absolute(name: &str) -> bool {
    name.contains(':')
}

/// Qualifies a short name with `base_uri`.
#[must_use]
pub fn expand(base_uri: &str, name: &str) -> String {
    if is_absolute(name) || base_uri.is_empty() {
        name.to_string()
    } else {
        format!("{base_uri}{name}")
    }
}

/// The part of `uri` after its last `/` or `#`.
#[must_use]
pub fn strip_prefix(uri: &str) -> &str {
    uri.rsplit(['/', '#']).next().unwrap_or(uri)
}

/// The name of `key` relative to `base_uri`, or its last path segment.
#[must_use]
pub fn local_name<'a>(base_uri: &str, key: &'a str) -> &'a str {
    if !base_uri.is_empty()
        && let Some(rest) = key.strip_prefix(base_uri)
    {
        return rest;
    }
    strip_prefix(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let template = UrlTemplate::new("http://x/{value}");
        assert_eq!(template.render("acmecorp"), "http://x/acmecorp");
        assert_eq!(UrlTemplate::new("http://x/fixed").render("a"), "http://x/fixed");
    }

    #[test]
    fn test_expand() {
        assert_eq!(expand("http://x/", "name"), "http://x/name");
        assert_eq!(expand("http://x/", "http://y/name"), "http://y/name");
        assert_eq!(expand("http://x/", "ns0:name"), "ns0:name");
        assert_eq!(expand("", "name"), "name");
    }

    #[test]
    fn test_strip_and_local_name() {
        assert_eq!(strip_prefix("http://x/people/1"), "1");
        assert_eq!(strip_prefix("http://x/schema#name"), "name");
        assert_eq!(strip_prefix("plain"), "plain");
        assert_eq!(local_name("http://x/", "http://x/name"), "name");
        assert_eq!(local_name("http://x/", "http://y/other/age"), "age");
        assert_eq!(local_name("", "name"), "name");
    }
}
