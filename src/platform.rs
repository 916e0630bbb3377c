use serde::{Deserialize, Serialize};

/// The device family a deep link is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Other,
}

/// Platform detection and platform-specific defaults
pub struct PlatformDetector;

impl PlatformDetector {
    /// Classify a browser/webview user agent.
    ///
    /// iPhone, iPad and iPod map to iOS; anything mentioning Android maps to
    /// Android; everything else (desktops, bots, empty strings) is Other.
    pub fn from_user_agent(user_agent: &str) -> Platform {
        let ua = user_agent.to_lowercase();
        if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
            Platform::Ios
        } else if ua.contains("android") {
            Platform::Android
        } else {
            Platform::Other
        }
    }

    /// Platform of the binary itself, for hosts without a user agent.
    pub fn current() -> Platform {
        if cfg!(target_os = "ios") {
            Platform::Ios
        } else if cfg!(target_os = "android") {
            Platform::Android
        } else {
            Platform::Other
        }
    }

    /// Whether deep-link launch detection is meaningful on this platform.
    /// On desktops the web URL is opened directly and nothing intercepts it.
    pub fn supports_deep_links(platform: Platform) -> bool {
        !matches!(platform, Platform::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_user_agent_ios_devices() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15";
        let ipad = "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X)";
        assert_eq!(PlatformDetector::from_user_agent(iphone), Platform::Ios);
        assert_eq!(PlatformDetector::from_user_agent(ipad), Platform::Ios);
    }

    #[test]
    fn test_from_user_agent_android() {
        let ua = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36";
        assert_eq!(PlatformDetector::from_user_agent(ua), Platform::Android);
    }

    #[test]
    fn test_from_user_agent_desktop_and_empty() {
        let mac = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) AppleWebKit/605.1.15";
        assert_eq!(PlatformDetector::from_user_agent(mac), Platform::Other);
        assert_eq!(PlatformDetector::from_user_agent(""), Platform::Other);
    }

    #[test]
    fn test_supports_deep_links() {
        assert!(PlatformDetector::supports_deep_links(Platform::Ios));
        assert!(PlatformDetector::supports_deep_links(Platform::Android));
        assert!(!PlatformDetector::supports_deep_links(Platform::Other));
    }

    #[test]
    fn test_current_is_other_on_desktop_targets() {
        #[cfg(not(any(target_os = "ios", target_os = "android")))]
        assert_eq!(PlatformDetector::current(), Platform::Other);
    }
}
