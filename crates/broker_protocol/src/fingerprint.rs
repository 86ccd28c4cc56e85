//! Cache fingerprinting: service name concatenated with a cryptographic
//! digest of the request payload (`spec.md` §3 "hash").

use crate::service::ServiceName;

/// A cache key derived from a service name and request payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(service: &ServiceName, payload: &[u8]) -> Self {
        let digest = blake3::hash(payload);
        Self(format!("{}:{}", service.as_str(), digest.to_hex()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_service_and_payload_fingerprint_identically() {
        let svc = ServiceName::new("sum");
        let a = Fingerprint::compute(&svc, b"[1,2]");
        let b = Fingerprint::compute(&svc, b"[1,2]");
        assert_eq!(a, b);
    }

    #[test]
    fn different_service_changes_fingerprint() {
        let a = Fingerprint::compute(&ServiceName::new("sum"), b"[1,2]");
        let b = Fingerprint::compute(&ServiceName::new("avg"), b"[1,2]");
        assert_ne!(a, b);
    }

    #[test]
    fn different_payload_changes_fingerprint() {
        let svc = ServiceName::new("sum");
        let a = Fingerprint::compute(&svc, b"[1,2]");
        let b = Fingerprint::compute(&svc, b"[1,3]");
        assert_ne!(a, b);
    }
}
