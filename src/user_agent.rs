//! Shared User-Agent strings for the probe and sync HTTP clients.

/// Project URL for User-Agent identification (RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/course-offline";

/// User-Agent for connectivity probes.
#[must_use]
pub(crate) fn probe_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("course-offline/{version} (connectivity-probe; +{PROJECT_UA_URL})")
}

/// User-Agent for progress sync submissions.
#[must_use]
pub(crate) fn sync_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("course-offline/{version} (progress-sync; +{PROJECT_UA_URL})")
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agents_share_version_and_url() {
        for ua in [probe_user_agent(), sync_user_agent()] {
            assert!(ua.contains(PROJECT_UA_URL), "missing project URL: {ua}");
            assert_eq!(
                env!("CARGO_PKG_VERSION"),
                ua.strip_prefix("course-offline/")
                    .and_then(|s| s.split(' ').next())
                    .expect("UA has version"),
            );
        }
    }

    #[test]
    fn test_user_agents_name_their_purpose() {
        assert!(probe_user_agent().contains("connectivity-probe"));
        assert!(sync_user_agent().contains("progress-sync"));
    }
}
