//! Resource names that satisfy the platform's DNS-1123 label rules.

/// Lower-cases `value` and replaces underscores with dashes.
pub fn to_dns1123_legal_name(value: &str) -> String {
    value.to_lowercase().replace('_', "-")
}

/// Deterministic Pod name for a server of a domain.
pub fn to_pod_name(domain_uid: &str, server_name: &str) -> String {
    to_dns1123_legal_name(&format!("{}-{}", domain_uid, server_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_name_is_lowercase() {
        assert_eq!(
            to_pod_name("test-domain-uid", "TestManagedServer"),
            "test-domain-uid-testmanagedserver"
        );
    }

    #[test]
    fn test_pod_name_replaces_underscores() {
        assert_eq!(to_pod_name("uid1", "managed_server_1"), "uid1-managed-server-1");
    }
}
