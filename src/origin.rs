// Origin/Referer allow-list check.
//
// Header values are client supplied, so this only deters casual cross-site
// use from browsers; it is not access control.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed_origins: Vec<String>,
    trusted_suffixes: Vec<String>,
}

impl OriginPolicy {
    pub fn new(allowed_origins: Vec<String>, trusted_suffixes: Vec<String>) -> Self {
        Self {
            allowed_origins,
            trusted_suffixes,
        }
    }

    pub fn is_allowed(&self, origin: Option<&str>, referer: Option<&str>) -> bool {
        // no declared source: same-origin or server-issued call
        if origin.is_none() && referer.is_none() {
            return true;
        }

        [origin, referer]
            .into_iter()
            .flatten()
            .any(|value| self.matches(value))
    }

    fn matches(&self, value: &str) -> bool {
        self.allowed_origins.iter().any(|o| value.starts_with(o.as_str()))
            || self.trusted_suffixes.iter().any(|s| value.contains(s.as_str()))
    }
}
