//! Live-vs-desired Pod compatibility
//!
//! Live Pods carry fields the platform fills in (node, defaults, versions).
//! Only the fields the operator controls are compared, and list fields are
//! compared without regard to order.

use operator_types::labels::{matches_resource_version, DOMAIN_V1};
use operator_types::Pod;

/// Whether `live` can be kept in place of `desired`.
///
/// Requires the operator's schema version label on `live`, and for every
/// desired container a live container of the same name with equal image,
/// pull policy, and unordered-equal ports, env and env-from lists.
pub fn is_compatible(desired: &Pod, live: &Pod) -> bool {
    if !matches_resource_version(&live.metadata.labels, DOMAIN_V1) {
        return false;
    }

    desired.spec.containers.iter().all(|want| {
        let Some(have) = live.container(&want.name) else {
            return false;
        };

        have.image == want.image
            && have.image_pull_policy == want.image_pull_policy
            && compare_unordered(&have.ports, &want.ports)
            && compare_unordered(&have.env, &want.env)
            && compare_unordered(&have.env_from, &want.env_from)
    })
}

/// Multiset equality: same length, and every element of `a` can be matched
/// with a distinct equal element of `b`.
pub fn compare_unordered<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut remaining: Vec<&T> = b.iter().collect();
    a.iter().all(|item| {
        match remaining.iter().position(|candidate| *candidate == item) {
            Some(index) => {
                remaining.swap_remove(index);
                true
            }
            None => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use operator_types::labels::RESOURCE_VERSION_LABEL;
    use operator_types::{
        Container, ContainerPort, EnvFromSource, EnvVar, ImagePullPolicy, LocalObjectReference,
        ObjectMeta,
    };
    use proptest::prelude::*;

    fn pod_with_env(env: Vec<EnvVar>) -> Pod {
        let mut metadata = ObjectMeta::named("uid1-ms1", "ns1");
        metadata
            .labels
            .insert(RESOURCE_VERSION_LABEL.into(), DOMAIN_V1.into());

        let mut container = Container::new("weblogic-server");
        container.image = "weblogic:12.2.1.3".into();
        container.image_pull_policy = ImagePullPolicy::IfNotPresent;
        container.ports = vec![ContainerPort::tcp(8001)];
        container.env = env;

        let mut pod = Pod {
            metadata,
            ..Default::default()
        };
        pod.spec.containers.push(container);
        pod
    }

    fn env(pairs: &[(&str, &str)]) -> Vec<EnvVar> {
        pairs.iter().map(|(k, v)| EnvVar::new(*k, *v)).collect()
    }

    #[test]
    fn test_env_order_is_ignored() {
        let desired = pod_with_env(env(&[("A", "1"), ("B", "2")]));
        let live = pod_with_env(env(&[("B", "2"), ("A", "1")]));
        assert!(is_compatible(&desired, &live));
    }

    #[test]
    fn test_missing_env_var_is_incompatible() {
        let desired = pod_with_env(env(&[("A", "1"), ("B", "2")]));
        let live = pod_with_env(env(&[("A", "1")]));
        assert!(!is_compatible(&desired, &live));
    }

    #[test]
    fn test_server_populated_fields_are_ignored() {
        let desired = pod_with_env(env(&[("A", "1")]));
        let mut live = desired.clone();
        live.metadata.uid = Some("4c1d".into());
        live.metadata.resource_version = Some("991".into());
        live.spec.node_name = Some("node-3".into());
        live.spec.containers[0].termination_message_path = Some("/dev/termination-log".into());
        live.metadata.annotations.insert("platform/injected".into(), "x".into());
        assert!(is_compatible(&desired, &live));
    }

    #[test]
    fn test_schema_version_label_required() {
        let desired = pod_with_env(vec![]);
        let mut live = desired.clone();
        live.metadata.labels.remove(RESOURCE_VERSION_LABEL);
        assert!(!is_compatible(&desired, &live));

        live.metadata
            .labels
            .insert(RESOURCE_VERSION_LABEL.into(), "domain-v0".into());
        assert!(!is_compatible(&desired, &live));
    }

    #[test]
    fn test_image_and_pull_policy_compared() {
        let desired = pod_with_env(vec![]);

        let mut live = desired.clone();
        live.spec.containers[0].image = "weblogic:12.2.1.4".into();
        assert!(!is_compatible(&desired, &live));

        let mut live = desired.clone();
        live.spec.containers[0].image_pull_policy = ImagePullPolicy::Always;
        assert!(!is_compatible(&desired, &live));
    }

    #[test]
    fn test_missing_container_is_incompatible() {
        let desired = pod_with_env(vec![]);
        let mut live = desired.clone();
        live.spec.containers[0].name = "sidecar".into();
        assert!(!is_compatible(&desired, &live));
    }

    #[test]
    fn test_ports_and_env_from_compared() {
        let desired = pod_with_env(vec![]);

        let mut live = desired.clone();
        live.spec.containers[0].ports = vec![ContainerPort::tcp(8002)];
        assert!(!is_compatible(&desired, &live));

        let mut live = desired.clone();
        live.spec.containers[0].env_from.push(EnvFromSource {
            config_map_ref: Some(LocalObjectReference::new("extra")),
            ..Default::default()
        });
        assert!(!is_compatible(&desired, &live));
    }

    #[test]
    fn test_compare_unordered_counts_duplicates() {
        assert!(compare_unordered::<u8>(&[], &[]));
        assert!(compare_unordered(&[1, 1, 2], &[2, 1, 1]));
        assert!(!compare_unordered(&[1, 1, 2], &[1, 2, 2]));
        assert!(!compare_unordered(&[1, 2], &[1, 2, 3]));
    }

    proptest! {
        #[test]
        fn prop_env_permutation_is_compatible(
            pairs in proptest::collection::vec(("[A-Z]{1,6}", "[a-z0-9]{0,6}"), 0..8),
            seed in any::<u64>(),
        ) {
            let env: Vec<EnvVar> = pairs
                .iter()
                .map(|(k, v)| EnvVar::new(k.as_str(), v.as_str()))
                .collect();
            let mut shuffled = env.clone();
            if !shuffled.is_empty() {
                let len = shuffled.len();
                shuffled.rotate_left((seed as usize) % len);
                shuffled.reverse();
            }

            let desired = pod_with_env(env);
            let live = pod_with_env(shuffled);
            prop_assert!(is_compatible(&desired, &live));
        }

        #[test]
        fn prop_dropping_an_env_var_is_incompatible(
            pairs in proptest::collection::vec(("[A-Z]{1,6}", "[a-z0-9]{0,6}"), 1..8),
            index in any::<prop::sample::Index>(),
        ) {
            let env: Vec<EnvVar> = pairs
                .iter()
                .map(|(k, v)| EnvVar::new(k.as_str(), v.as_str()))
                .collect();
            let mut fewer = env.clone();
            fewer.remove(index.index(fewer.len()));

            let desired = pod_with_env(env);
            let live = pod_with_env(fewer);
            prop_assert!(!is_compatible(&desired, &live));
        }
    }
}
