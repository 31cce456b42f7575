use super::*;
use quickcheck::{quickcheck, TestResult};
use std::{collections::BTreeMap, net::Ipv4Addr};

fn mk_pods(test: &TestConfig) {
    test.apply_pod(mk_pod("nsA", "pod1", None, "node1", Some("128.0.0.1"), None));
    test.apply_pod(mk_pod("nsA", "pod2", None, "node2", Some("128.0.0.2"), None));
}

#[test]
fn resolves_region_and_zone_of_pod_node() {
    let test = TestConfig::default();
    test.apply_node(mk_node("node1", zone_labels("region1", "zone1")));
    test.apply_node(mk_node("node2", zone_labels("region2", "zone2")));
    mk_pods(&test);

    for (ip, az) in [("128.0.0.1", "region1/zone1"), ("128.0.0.2", "region2/zone2")] {
        assert_eq!(
            test.controller.resolve_az(ip.parse().unwrap()).as_deref(),
            Some(az),
            "{ip}"
        );
    }
}

#[test]
fn unknown_address() {
    let test = TestConfig::default();
    test.apply_node(mk_node("node1", zone_labels("region1", "zone1")));
    mk_pods(&test);

    assert_eq!(test.controller.resolve_az("128.0.0.3".parse().unwrap()), None);
}

#[test]
fn node_without_zone() {
    let test = TestConfig::default();
    test.apply_node(mk_node("node1", [(k8s::REGION_LABEL, "region1")]));
    test.apply_node(mk_node("node2", [(k8s::REGION_LABEL, "region2")]));
    mk_pods(&test);

    assert_eq!(test.controller.resolve_az("128.0.0.1".parse().unwrap()), None);
    assert_eq!(test.controller.resolve_az("128.0.0.2".parse().unwrap()), None);
}

#[test]
fn node_without_region() {
    let test = TestConfig::default();
    test.apply_node(mk_node("node1", [(k8s::ZONE_LABEL, "zone1")]));
    test.apply_node(mk_node("node2", [(k8s::ZONE_LABEL, "zone2")]));
    mk_pods(&test);

    assert_eq!(test.controller.resolve_az("128.0.0.1".parse().unwrap()), None);
    assert_eq!(test.controller.resolve_az("128.0.0.2".parse().unwrap()), None);
}

#[test]
fn unknown_node() {
    let test = TestConfig::default();
    mk_pods(&test);

    assert_eq!(test.controller.resolve_az("128.0.0.1".parse().unwrap()), None);

    // The node may be observed after its pods.
    test.apply_node(mk_node("node1", zone_labels("region1", "zone1")));
    assert_eq!(
        test.controller
            .resolve_az("128.0.0.1".parse().unwrap())
            .as_deref(),
        Some("region1/zone1")
    );
}

quickcheck! {
    fn unindexed_addresses_have_no_zone(ip: Ipv4Addr) -> TestResult {
        let indexed = [Ipv4Addr::new(128, 0, 0, 1), Ipv4Addr::new(128, 0, 0, 2)];
        if indexed.contains(&ip) {
            return TestResult::discard();
        }

        let test = TestConfig::default();
        test.apply_node(mk_node("node1", zone_labels("region1", "zone1")));
        test.apply_node(mk_node("node2", zone_labels("region2", "zone2")));
        mk_pods(&test);

        TestResult::from_bool(test.controller.resolve_az(ip.into()).is_none())
    }

    fn zone_requires_region_and_zone_labels(region: Option<String>, zone: Option<String>) -> bool {
        let test = TestConfig::default();
        let labels = region
            .iter()
            .map(|r| (k8s::REGION_LABEL.to_string(), r.clone()))
            .chain(zone.iter().map(|z| (k8s::ZONE_LABEL.to_string(), z.clone())))
            .collect::<BTreeMap<_, _>>();
        test.apply_node(k8s::Node {
            metadata: k8s::ObjectMeta {
                name: Some("node1".to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            ..Default::default()
        });
        mk_pods(&test);

        let expected = match (
            region.filter(|r| !r.is_empty()),
            zone.filter(|z| !z.is_empty()),
        ) {
            (Some(region), Some(zone)) => Some(format!("{region}/{zone}")),
            _ => None,
        };
        test.controller.resolve_az("128.0.0.1".parse().unwrap()) == expected
    }
}
