//! WiFi network selection.
//!
//! Networks are matched by SSID suffix rather than a regular expression,
//! which keeps the matcher allocation free on the device.

/// A network seen during one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkCandidate {
    pub ssid: String,
    /// Signal strength in dBm. Higher is stronger.
    pub rssi: i8,
}

impl NetworkCandidate {
    pub fn new(ssid: impl Into<String>, rssi: i8) -> Self {
        Self {
            ssid: ssid.into(),
            rssi,
        }
    }
}

/// How SSIDs are matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsidRule {
    /// SSID ends with the given bytes. An empty suffix matches everything.
    Suffix(String),
}

impl SsidRule {
    pub fn matches(&self, ssid: &str) -> bool {
        match self {
            SsidRule::Suffix(suffix) => ssid.ends_with(suffix.as_str()),
        }
    }
}

/// Picks one network out of a scan.
#[derive(Debug, Clone)]
pub struct NetworkSelector {
    provisioning_ssid: String,
}

impl NetworkSelector {
    /// `provisioning_ssid` is always eligible, whatever the rule says.
    pub fn new(provisioning_ssid: impl Into<String>) -> Self {
        Self {
            provisioning_ssid: provisioning_ssid.into(),
        }
    }

    pub fn is_provisioning(&self, ssid: &str) -> bool {
        !self.provisioning_ssid.is_empty() && ssid == self.provisioning_ssid
    }

    /// Choose the strongest eligible candidate.
    ///
    /// Ties on signal strength go to the lexicographically smallest SSID, so
    /// the result does not depend on scan order.
    pub fn select<'a>(
        &self,
        candidates: &'a [NetworkCandidate],
        rule: &SsidRule,
    ) -> Option<&'a NetworkCandidate> {
        candidates
            .iter()
            .filter(|c| !c.ssid.is_empty())
            .filter(|c| rule.matches(&c.ssid) || self.is_provisioning(&c.ssid))
            .min_by(|a, b| b.rssi.cmp(&a.rssi).then_with(|| a.ssid.cmp(&b.ssid)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(entries: &[(&str, i8)]) -> Vec<NetworkCandidate> {
        entries
            .iter()
            .map(|(ssid, rssi)| NetworkCandidate::new(*ssid, *rssi))
            .collect()
    }

    #[test]
    fn test_suffix_match_picks_matching_network() {
        let selector = NetworkSelector::new("relay-setup");
        let candidates = scan(&[("HomeNet", -40), ("Office-5G", -70), ("Office-2G", -50)]);

        let picked = selector
            .select(&candidates, &SsidRule::Suffix("-5G".to_string()))
            .unwrap();
        assert_eq!(picked.ssid, "Office-5G");
    }

    #[test]
    fn test_no_match_returns_none() {
        let selector = NetworkSelector::new("relay-setup");
        let candidates = scan(&[("HomeNet", -40), ("Office-2G", -50)]);

        assert!(selector
            .select(&candidates, &SsidRule::Suffix("-5G".to_string()))
            .is_none());
        assert!(selector
            .select(&[], &SsidRule::Suffix(String::new()))
            .is_none());
    }

    #[test]
    fn test_strongest_signal_wins() {
        let selector = NetworkSelector::new("");
        let candidates = scan(&[("Lab-5G", -80), ("Hall-5G", -45), ("Roof-5G", -60)]);

        let picked = selector
            .select(&candidates, &SsidRule::Suffix("-5G".to_string()))
            .unwrap();
        assert_eq!(picked.ssid, "Hall-5G");
    }

    #[test]
    fn test_tie_is_deterministic() {
        let selector = NetworkSelector::new("");
        let forward = scan(&[("b-5G", -50), ("a-5G", -50)]);
        let reverse = scan(&[("a-5G", -50), ("b-5G", -50)]);
        let rule = SsidRule::Suffix("-5G".to_string());

        assert_eq!(selector.select(&forward, &rule).unwrap().ssid, "a-5G");
        assert_eq!(selector.select(&reverse, &rule).unwrap().ssid, "a-5G");
    }

    #[test]
    fn test_provisioning_network_is_always_eligible() {
        let selector = NetworkSelector::new("relay-setup");
        let candidates = scan(&[("HomeNet", -40), ("relay-setup", -60)]);

        let picked = selector
            .select(&candidates, &SsidRule::Suffix("-5G".to_string()))
            .unwrap();
        assert_eq!(picked.ssid, "relay-setup");
        assert!(selector.is_provisioning(&picked.ssid));
    }

    #[test]
    fn test_empty_suffix_matches_any_named_network() {
        let selector = NetworkSelector::new("");
        let candidates = scan(&[("", -10), ("Anything", -70)]);

        let picked = selector
            .select(&candidates, &SsidRule::Suffix(String::new()))
            .unwrap();
        assert_eq!(picked.ssid, "Anything");
    }

    #[test]
    fn test_suffix_is_byte_exact() {
        let rule = SsidRule::Suffix("-5G".to_string());
        assert!(rule.matches("Office-5G"));
        assert!(rule.matches("-5G"));
        assert!(!rule.matches("Office-5g"));
        assert!(!rule.matches("Office-5G-ext"));
    }
}
