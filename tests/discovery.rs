//! Discovery integration tests
//!
//! Runs several frameworks on an in-process multicast segment and checks
//! what ends up in their registries

use std::collections::BTreeMap;

use beacon_discovery::ExportEndpoint;
use beacon_discovery::discovery::record::endpoint_instance;
use beacon_discovery::value::Value;

mod common;
use common::{LogCapture, MemoryNetwork, peer};

const ENDPOINT_TYPE: &str = "_rs-endpoint._tcp.local.";

fn foo_export(uid: &str) -> ExportEndpoint {
    ExportEndpoint {
        uid: uid.to_string(),
        name: "foo".to_string(),
        interfaces: vec!["svc.Foo".to_string()],
        configurations: vec!["jsonrpc".to_string()],
        properties: BTreeMap::from([
            ("weight".to_string(), Value::Float(0.5)),
            ("grade".to_string(), Value::Char('A')),
        ]),
    }
}

#[test]
fn export_discover_remove_cycle() {
    let network = MemoryNetwork::new();
    let exporter = peer(&network, "F1", "10.0.0.1");
    let importer = peer(&network, "F2", "10.0.0.2");
    exporter.service.start().unwrap();
    importer.service.start().unwrap();
    network.settle();

    exporter.service.endpoints_added(&[foo_export("E1")]);
    network.settle();

    let record = exporter.service.exported_record("E1").unwrap();
    assert_eq!(record.instance, endpoint_instance("E1", "F1"));

    assert_eq!(importer.registry.added(), vec!["E1".to_string()]);
    assert_eq!(importer.service.imported_names(), vec![record.name()]);

    let imported = importer.registry.get("E1").unwrap();
    assert_eq!(imported.framework_uuid(), Some("F1"));
    assert_eq!(imported.configuration(), "jsonrpc");
    assert!(imported.interfaces().contains("svc.Foo"));
    assert_eq!(imported.properties()["weight"], Value::Float(0.5));
    assert_eq!(imported.properties()["grade"], Value::Char('A'));

    // The exporter hears its own advertisement but never imports it
    assert!(exporter.registry.added().is_empty());

    exporter.service.endpoint_removed("E1");
    network.settle();

    assert_eq!(importer.registry.removed(), vec!["E1".to_string()]);
    assert!(importer.service.imported_names().is_empty());
    assert_eq!(importer.registry.live(), 0);
}

#[test]
fn dispatchers_learn_about_each_other() {
    let network = MemoryNetwork::new();
    let first = peer(&network, "F1", "10.0.0.1");
    let second = peer(&network, "F2", "10.0.0.2");
    first.service.start().unwrap();
    second.service.start().unwrap();
    network.settle();

    assert_eq!(
        first.access.discovered(),
        vec![("10.0.0.2".to_string(), 8080, "/dispatcher".to_string())]
    );
    assert_eq!(
        second.access.discovered(),
        vec![("10.0.0.1".to_string(), 8080, "/dispatcher".to_string())]
    );
    assert!(first.registry.added().is_empty());
}

#[test]
fn late_starter_imports_existing_endpoints() {
    let network = MemoryNetwork::new();
    let exporter = peer(&network, "F1", "10.0.0.1");
    exporter.service.start().unwrap();
    exporter
        .service
        .endpoints_added(&[foo_export("E1"), foo_export("E2")]);
    network.settle();

    let importer = peer(&network, "F2", "10.0.0.2");
    importer.service.start().unwrap();
    network.settle();

    let mut added = importer.registry.added();
    added.sort();
    assert_eq!(added, vec!["E1".to_string(), "E2".to_string()]);
}

#[test]
fn numeric_looking_identifiers_survive_discovery() {
    let network = MemoryNetwork::new();
    let exporter = peer(&network, "7", "10.0.0.1");
    let importer = peer(&network, "8", "10.0.0.2");
    exporter.service.start().unwrap();
    importer.service.start().unwrap();
    exporter.service.endpoints_added(&[foo_export("42")]);
    network.settle();

    assert_eq!(importer.registry.added(), vec!["42".to_string()]);
    let imported = importer.registry.get("42").unwrap();
    assert_eq!(imported.framework_uuid(), Some("7"));
    assert_eq!(
        importer.access.discovered(),
        vec![("10.0.0.1".to_string(), 8080, "/dispatcher".to_string())]
    );

    exporter.service.endpoint_removed("42");
    network.settle();
    assert_eq!(importer.registry.removed(), vec!["42".to_string()]);
}

#[test]
fn missing_object_class_is_not_registered() {
    let logs = LogCapture::install();
    let network = MemoryNetwork::new();
    let importer = peer(&network, "F2", "10.0.0.2");
    importer.service.start().unwrap();

    network.inject(
        ENDPOINT_TYPE,
        "broken._rs-endpoint._tcp.local.",
        &[
            ("endpoint-id", "E1"),
            ("framework-uuid", "F1"),
            ("imported-configs", "jsonrpc"),
        ],
    );
    network.settle();

    assert!(importer.registry.added().is_empty());
    assert!(importer.service.imported_names().is_empty());
    let warnings = logs.lines_with("WARN", &["broken._rs-endpoint", "object-class"]);
    assert_eq!(warnings.len(), 1, "{warnings:?}");
}

#[test]
fn foreign_records_are_ignored() {
    let network = MemoryNetwork::new();
    let importer = peer(&network, "F2", "10.0.0.2");
    importer.service.start().unwrap();

    network.inject(
        ENDPOINT_TYPE,
        "printer._rs-endpoint._tcp.local.",
        &[("model", "laser")],
    );
    network.settle();

    assert!(importer.registry.added().is_empty());
}

#[test]
fn duplicate_uid_keeps_one_live_entry() {
    let network = MemoryNetwork::new();
    let importer = peer(&network, "F2", "10.0.0.2");
    importer.service.start().unwrap();

    let properties = [
        ("endpoint-id", "E1"),
        ("framework-uuid", "F1"),
        ("imported-configs", "jsonrpc"),
        ("object-class", "svc.Foo"),
    ];
    network.inject(ENDPOINT_TYPE, "a._rs-endpoint._tcp.local.", &properties);
    network.settle();
    network.inject(ENDPOINT_TYPE, "b._rs-endpoint._tcp.local.", &properties);
    network.settle();

    assert_eq!(importer.registry.added().len(), 2);
    assert_eq!(importer.registry.live(), 1);
    assert_eq!(
        importer.service.imported_names(),
        vec!["a._rs-endpoint._tcp.local.".to_string()]
    );
}

#[test]
fn removal_of_unknown_record_is_harmless() {
    let network = MemoryNetwork::new();
    let importer = peer(&network, "F2", "10.0.0.2");
    importer.service.start().unwrap();

    network.inject(ENDPOINT_TYPE, "ghost._rs-endpoint._tcp.local.", &[("model", "x")]);
    network.settle();
    network.retract("ghost._rs-endpoint._tcp.local.");
    network.retract("never-published._rs-endpoint._tcp.local.");
    network.settle();

    assert!(importer.registry.removed().is_empty());
}

#[test]
fn stopping_withdraws_every_export() {
    let network = MemoryNetwork::new();
    let exporter = peer(&network, "F1", "10.0.0.1");
    let importer = peer(&network, "F2", "10.0.0.2");
    exporter.service.start().unwrap();
    importer.service.start().unwrap();
    exporter
        .service
        .endpoints_added(&[foo_export("E1"), foo_export("E2")]);
    network.settle();
    assert_eq!(importer.registry.live(), 2);

    exporter.service.stop();
    network.settle();

    let mut removed = importer.registry.removed();
    removed.sort();
    assert_eq!(removed, vec!["E1".to_string(), "E2".to_string()]);
    assert!(importer.service.imported_names().is_empty());
    assert!(exporter.service.exported_uids().is_empty());
}
