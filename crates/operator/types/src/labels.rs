//! Label and annotation keys stamped on operator-created resources.

/// Schema version of resources written by this operator.
pub const DOMAIN_V1: &str = "domain-v1";

pub const RESOURCE_VERSION_LABEL: &str = "weblogic.resourceVersion";
pub const DOMAINUID_LABEL: &str = "weblogic.domainUID";
pub const DOMAINNAME_LABEL: &str = "weblogic.domainName";
pub const SERVERNAME_LABEL: &str = "weblogic.serverName";
pub const CLUSTERNAME_LABEL: &str = "weblogic.clusterName";
pub const CREATEDBYOPERATOR_LABEL: &str = "weblogic.createdByOperator";
pub const RESTARTED_LABEL: &str = "weblogic.domainRestartVersion";

pub const PROMETHEUS_PATH_ANNOTATION: &str = "prometheus.io/path";
pub const PROMETHEUS_PORT_ANNOTATION: &str = "prometheus.io/port";
pub const PROMETHEUS_SCRAPE_ANNOTATION: &str = "prometheus.io/scrape";

/// Metrics path served by the exporter inside each server.
pub const EXPORTER_METRICS_PATH: &str = "/wls-exporter/metrics";

/// Returns true when `labels` carry the schema version this operator writes.
pub fn matches_resource_version(
    labels: &std::collections::BTreeMap<String, String>,
    version: &str,
) -> bool {
    labels
        .get(RESOURCE_VERSION_LABEL)
        .is_some_and(|v| v == version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_matches_resource_version() {
        let mut labels = BTreeMap::new();
        assert!(!matches_resource_version(&labels, DOMAIN_V1));

        labels.insert(RESOURCE_VERSION_LABEL.to_string(), "domain-v0".to_string());
        assert!(!matches_resource_version(&labels, DOMAIN_V1));

        labels.insert(RESOURCE_VERSION_LABEL.to_string(), DOMAIN_V1.to_string());
        assert!(matches_resource_version(&labels, DOMAIN_V1));
    }
}
