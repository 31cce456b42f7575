use super::*;
use std::collections::BTreeSet;

const SVC1: &str = "svc1.nsA.svc.cluster.local";
const SVC2: &str = "svc2.nsA.svc.cluster.local";

fn identities(ids: impl IntoIterator<Item = &'static str>) -> BTreeSet<String> {
    ids.into_iter().map(String::from).collect()
}

#[test]
fn resolves_service_accounts_of_endpoint_pods() {
    let test = TestConfig::default();
    test.apply_service(mk_service("nsA", "svc1", "10.0.0.1", [("test-port", 8080)]));
    test.apply_service(mk_service("nsA", "svc2", "10.0.0.2", [("test-port", 8080)]));
    test.apply_endpoints(mk_endpoints(
        "nsA",
        "svc1",
        ["128.0.0.1", "128.0.0.2"],
        [("test-port", 8080)],
    ));
    test.apply_pod(mk_pod("nsA", "pod1", Some("acct1"), "node1", Some("128.0.0.1"), None));
    test.apply_pod(mk_pod("nsA", "pod2", Some("acct2"), "node2", Some("128.0.0.2"), None));

    let expected = identities([
        "spiffe://company.com/ns/nsA/sa/acct1",
        "spiffe://company.com/ns/nsA/sa/acct2",
    ]);
    assert_eq!(
        test.controller.resolve_identities(SVC1, &["test-port"]),
        expected
    );
    assert_eq!(test.controller.resolve_identities(SVC1, &[]), expected);

    // svc2 has no endpoints.
    assert!(test
        .controller
        .resolve_identities(SVC2, &["test-port"])
        .is_empty());
    assert!(test.controller.resolve_identities(SVC2, &[]).is_empty());
}

#[test]
fn filters_by_port_name() {
    let test = TestConfig::default();
    test.apply_endpoints(mk_endpoints(
        "nsA",
        "svc1",
        ["128.0.0.1"],
        [("test-port", 8080)],
    ));
    test.apply_pod(mk_pod("nsA", "pod1", Some("acct1"), "node1", Some("128.0.0.1"), None));

    assert!(test
        .controller
        .resolve_identities(SVC1, &["other-port"])
        .is_empty());
    assert_eq!(
        test.controller
            .resolve_identities(SVC1, &["other-port", "test-port"]),
        identities(["spiffe://company.com/ns/nsA/sa/acct1"]),
    );
}

#[test]
fn deduplicates_service_accounts() {
    let test = TestConfig::default();
    test.apply_endpoints(mk_endpoints(
        "nsA",
        "svc1",
        ["128.0.0.1", "128.0.0.2"],
        [("test-port", 8080)],
    ));
    test.apply_pod(mk_pod("nsA", "pod1", Some("acct1"), "node1", Some("128.0.0.1"), None));
    test.apply_pod(mk_pod("nsA", "pod2", Some("acct1"), "node2", Some("128.0.0.2"), None));

    assert_eq!(
        test.controller.resolve_identities(SVC1, &["test-port"]),
        identities(["spiffe://company.com/ns/nsA/sa/acct1"]),
    );
}

#[test]
fn skips_unknown_pods_and_missing_accounts() {
    let test = TestConfig::default();
    test.apply_endpoints(mk_endpoints(
        "nsA",
        "svc1",
        ["128.0.0.1", "128.0.0.2", "128.0.0.3"],
        [("test-port", 8080)],
    ));
    test.apply_pod(mk_pod("nsA", "pod1", Some("acct1"), "node1", Some("128.0.0.1"), None));
    test.apply_pod(mk_pod("nsA", "pod2", None, "node1", Some("128.0.0.2"), None));

    assert_eq!(
        test.controller.resolve_identities(SVC1, &["test-port"]),
        identities(["spiffe://company.com/ns/nsA/sa/acct1"]),
    );
}

#[test]
fn invalid_hostname() {
    let test = TestConfig::default();
    test.apply_endpoints(mk_endpoints(
        "nsA",
        "svc1",
        ["128.0.0.1"],
        [("test-port", 8080)],
    ));
    test.apply_pod(mk_pod("nsA", "pod1", Some("acct1"), "node1", Some("128.0.0.1"), None));

    assert!(test.controller.resolve_identities("svc1", &[]).is_empty());
    assert!(test
        .controller
        .resolve_identities("svc1.nsA.example.com", &[])
        .is_empty());
}
