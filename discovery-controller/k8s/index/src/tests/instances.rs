use super::*;
use discovery_controller_core::{Locality, Protocol};
use discovery_controller_k8s_api::Selector;
use maplit::btreemap;

const SVC1: &str = "svc1.nsA.svc.cluster.local";

fn init() -> TestConfig {
    let test = TestConfig::default();
    test.apply_node(mk_node("node1", zone_labels("region1", "zone1")));
    test.apply_service(mk_service(
        "nsA",
        "svc1",
        "10.0.0.1",
        [("http-web", 80), ("grpc-api", 9090)],
    ));
    test.apply_endpoints(mk_endpoints(
        "nsA",
        "svc1",
        ["128.0.0.1", "128.0.0.2", "128.0.0.3"],
        [("http-web", 8080), ("grpc-api", 9090), ("admin", 9990)],
    ));
    test.apply_pod(mk_pod(
        "nsA",
        "pod1",
        Some("acct1"),
        "node1",
        Some("128.0.0.1"),
        [("app", "web"), ("version", "v1")],
    ));
    test.apply_pod(mk_pod(
        "nsA",
        "pod2",
        None,
        "node2",
        Some("128.0.0.2"),
        [("app", "web"), ("version", "v2")],
    ));
    test
}

#[test]
fn lists_instances_of_named_service_ports() {
    let test = init();

    let mut instances = test.controller.instances(SVC1, &[], &[]);
    instances.sort_by_key(|i| (i.endpoint.address, i.endpoint.port));

    // The admin port has no corresponding service port.
    let endpoints = instances
        .iter()
        .map(|i| (i.endpoint.address.to_string(), i.endpoint.port.get()))
        .collect::<Vec<_>>();
    assert_eq!(
        endpoints,
        [
            ("128.0.0.1".to_string(), 8080),
            ("128.0.0.1".to_string(), 9090),
            ("128.0.0.2".to_string(), 8080),
            ("128.0.0.2".to_string(), 9090),
            ("128.0.0.3".to_string(), 8080),
            ("128.0.0.3".to_string(), 9090),
        ]
    );

    let pod1 = &instances[0];
    assert_eq!(pod1.service.hostname, SVC1);
    assert_eq!(pod1.endpoint.service_port.port.get(), 80);
    assert_eq!(pod1.endpoint.service_port.protocol, Protocol::Http);
    assert_eq!(
        pod1.labels,
        btreemap! {
            "app".to_string() => "web".to_string(),
            "version".to_string() => "v1".to_string(),
        }
    );
    assert_eq!(
        pod1.locality,
        Some(Locality {
            region: "region1".to_string(),
            zone: "zone1".to_string(),
        })
    );
    assert_eq!(
        pod1.identity.as_deref(),
        Some("spiffe://company.com/ns/nsA/sa/acct1")
    );

    // pod2 runs on an unknown node without a service account.
    let pod2 = &instances[2];
    assert_eq!(pod2.locality, None);
    assert_eq!(pod2.identity, None);

    // No pod is known for the third address.
    let unknown = &instances[4];
    assert!(unknown.labels.is_empty());
    assert_eq!(unknown.locality, None);
}

#[test]
fn filters_by_port_name() {
    let test = init();

    let instances = test.controller.instances(SVC1, &["grpc-api"], &[]);
    assert_eq!(instances.len(), 3);
    assert!(instances
        .iter()
        .all(|i| i.endpoint.service_port.protocol == Protocol::Grpc));

    assert!(test.controller.instances(SVC1, &["admin"], &[]).is_empty());
}

#[test]
fn filters_by_selector() {
    let test = init();

    let v1 = Selector::from_iter(Some(("version", "v1")));
    let instances = test.controller.instances(SVC1, &["http-web"], &[v1.clone()]);
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].endpoint.address.to_string(), "128.0.0.1");

    let v2 = Selector::from_iter(Some(("version", "v2")));
    let instances = test.controller.instances(SVC1, &["http-web"], &[v1, v2]);
    assert_eq!(instances.len(), 2);

    let web = Selector::from_iter(Some(("app", "web")));
    let instances = test.controller.instances(SVC1, &[], &[web]);
    assert_eq!(instances.len(), 4);
}

#[test]
fn unknown_service() {
    let test = init();
    assert!(test
        .controller
        .instances("svc2.nsA.svc.cluster.local", &[], &[])
        .is_empty());
    assert!(test.controller.instances("svc1", &[], &[]).is_empty());
}

#[test]
fn host_instances() {
    let test = init();

    // Endpoints without a service are not surfaced.
    test.apply_endpoints(mk_endpoints(
        "nsA",
        "orphan",
        ["128.0.0.1"],
        [("http-web", 8080)],
    ));

    let instances = test
        .controller
        .host_instances(&["128.0.0.1".parse().unwrap()]);
    assert_eq!(instances.len(), 2);
    assert!(instances
        .iter()
        .all(|i| i.service.name == "svc1" && i.endpoint.address.to_string() == "128.0.0.1"));

    assert!(test
        .controller
        .host_instances(&["128.0.0.9".parse().unwrap()])
        .is_empty());
    assert!(test.controller.host_instances(&[]).is_empty());
}
