//! User-agent screening.
//!
//! Two separate predicates, always composed allow-list first: a known crawler
//! whose name contains a denylisted word (e.g. `Googlebot` and `bot`) must
//! never be refused.

/// User-agent allow-list and denylist.
#[derive(Debug, Clone)]
pub struct UserAgentPolicy {
    allowlist: Vec<String>,
    // Stored lowercased; matched against the lowercased user-agent.
    denylist: Vec<String>,
}

impl UserAgentPolicy {
    pub fn new(allowlist: &[String], denylist: &[String]) -> Self {
        Self {
            allowlist: allowlist.to_vec(),
            denylist: denylist.iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    /// Case-sensitive substring match against the allow-list.
    pub fn is_allowlisted(&self, user_agent: &str) -> bool {
        self.allowlist
            .iter()
            .any(|name| user_agent.contains(name.as_str()))
    }

    /// Case-insensitive substring match against the denylist.
    pub fn is_denylisted(&self, user_agent: &str) -> bool {
        let user_agent = user_agent.to_lowercase();
        self.denylist
            .iter()
            .any(|signature| user_agent.contains(signature.as_str()))
    }

    pub fn is_blocked(&self, user_agent: &str) -> bool {
        if self.is_allowlisted(user_agent) {
            return false;
        }
        self.is_denylisted(user_agent)
    }
}
