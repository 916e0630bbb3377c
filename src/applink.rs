// AppLink resolution: catalog entry + platform -> launch URI / store URI.

use crate::catalog::CatalogEntry;
use crate::platform::Platform;

/// URI to open for `entry` on `platform`: the platform's custom scheme when the
/// entry has one, otherwise the web URL.
pub fn resolve_launch_uri(entry: &CatalogEntry, platform: Platform) -> String {
    let scheme = match platform {
        Platform::Ios => entry.ios_scheme.as_deref(),
        Platform::Android => entry.android_scheme.as_deref(),
        Platform::Other => None,
    };

    scheme
        .filter(|s| !s.is_empty())
        .unwrap_or(&entry.web_url)
        .to_string()
}

/// Store listing for `entry` on `platform`, if one exists.
pub fn resolve_store_uri(entry: &CatalogEntry, platform: Platform) -> Option<String> {
    let store = match platform {
        Platform::Ios => entry.ios_store_url.as_deref(),
        Platform::Android => entry.android_store_url.as_deref(),
        Platform::Other => None,
    };

    store.filter(|s| !s.is_empty()).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> CatalogEntry {
        CatalogEntry {
            id: "x".to_string(),
            name: "X Pay".to_string(),
            logo_ref: None,
            web_url: "https://x".to_string(),
            ios_scheme: Some("foo://".to_string()),
            android_scheme: None,
            ios_store_url: Some("https://apps.apple.com/x".to_string()),
            android_store_url: None,
            api_available: false,
        }
    }

    #[test]
    fn test_ios_uses_custom_scheme() {
        assert_eq!(resolve_launch_uri(&entry(), Platform::Ios), "foo://");
    }

    #[test]
    fn test_other_uses_web_url() {
        assert_eq!(resolve_launch_uri(&entry(), Platform::Other), "https://x");
    }

    #[test]
    fn test_android_without_scheme_falls_back_to_web_url() {
        assert_eq!(resolve_launch_uri(&entry(), Platform::Android), "https://x");
    }

    #[test]
    fn test_empty_scheme_is_treated_as_missing() {
        let mut e = entry();
        e.ios_scheme = Some(String::new());
        assert_eq!(resolve_launch_uri(&e, Platform::Ios), "https://x");
    }

    #[test]
    fn test_store_uri_matches_platform() {
        let e = entry();
        assert_eq!(
            resolve_store_uri(&e, Platform::Ios).as_deref(),
            Some("https://apps.apple.com/x")
        );
        assert_eq!(resolve_store_uri(&e, Platform::Android), None);
        assert_eq!(resolve_store_uri(&e, Platform::Other), None);
    }
}
