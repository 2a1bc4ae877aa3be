//! Utility functions and helpers.

pub mod http;
pub mod prune;

use url::Url;
use url::form_urlencoded::byte_serialize;

pub use prune::prune_empty;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Fill `{key}` placeholders in a path template.
///
/// Values are percent-encoded so they are safe in a path segment or a
/// query string. Spaces become `%20`, never `+`.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |acc, (key, value)| {
        // A literal '+' is serialized as %2B, so every '+' left is a space.
        let encoded = byte_serialize(value.as_bytes())
            .collect::<String>()
            .replace('+', "%20");
        acc.replace(&format!("{{{key}}}"), &encoded)
    })
}
