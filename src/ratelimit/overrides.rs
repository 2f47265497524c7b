//! Resource override lookup.

use super::rules::Override;

/// Find the configured resource that applies to `request_path`.
///
/// Overrides are scanned in configured order and the first `resource` that
/// occurs anywhere in the path, ignoring case, is returned. An empty string
/// means no override matched.
pub fn find_override_path<'a>(request_path: &str, overrides: &'a [Override]) -> &'a str {
    let path = request_path.to_lowercase();

    overrides
        .iter()
        .find(|o| path.contains(&o.resource.to_lowercase()))
        .map(|o| o.resource.as_str())
        .unwrap_or_default()
}
