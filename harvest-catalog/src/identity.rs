//! Identity derivation: a pure function of the locator.

use harvest_core::Identity;

/// Last non-empty path segment of `locator`, prefixed with `prefix`.
///
/// Query strings and fragments are ignored. Returns `None` when the locator has
/// no usable segment.
pub fn identity_from_locator(prefix: &str, locator: &str) -> Option<Identity> {
    let path = locator
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    let path = path
        .split_once("://")
        .map_or(path, |(_, rest)| rest.split_once('/').map_or("", |(_, p)| p));
    let slug = path.trim_end_matches('/').rsplit('/').next()?.trim();
    if slug.is_empty() {
        return None;
    }
    Some(Identity::from(format!("{prefix}{slug}")))
}
