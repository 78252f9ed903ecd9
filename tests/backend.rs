//! Backend activation integration tests.

mod common;

use std::collections::HashMap;

use observability_client::backend::{OtelConfig, VendorConfig};
use observability_client::{
    ActiveBackend, BackendActivator, BackendError, BackendSelection, Dispatcher,
};

#[tokio::test]
async fn test_vendor_agent_loads_and_attaches_attributes() {
    let (addr, mut captured) = common::start_capture_backend(None).await;
    let activator = BackendActivator::new();
    let dispatcher = Dispatcher::new(reqwest::Client::new());

    let config = VendorConfig {
        script_url: Some(format!("http://{}/agent.js", addr)),
        session_attributes: HashMap::from([("tenant".to_string(), "acme".to_string())]),
    };
    let backend = activator
        .activate(BackendSelection::Vendor(config), &dispatcher)
        .await
        .unwrap();

    let ActiveBackend::Vendor(vendor) = backend else {
        panic!("vendor activation produced a different backend");
    };
    vendor.loaded().await;

    assert_eq!(vendor.script_url().path(), "/agent.js");
    let head = captured.recv().await.unwrap();
    assert!(head.starts_with("GET /agent.js"));
    assert!(activator.is_active());
}

#[tokio::test]
async fn test_vendor_then_otel_is_rejected() {
    let activator = BackendActivator::new();
    let dispatcher = Dispatcher::new(reqwest::Client::new());

    let config = VendorConfig {
        script_url: Some("http://127.0.0.1:9/agent.js".to_string()),
        ..VendorConfig::default()
    };
    activator
        .activate(BackendSelection::Vendor(config), &dispatcher)
        .await
        .unwrap();

    let error = activator
        .activate(BackendSelection::Otel(OtelConfig::default()), &dispatcher)
        .await
        .unwrap_err();
    assert!(matches!(error, BackendError::AlreadyActive));
}

#[tokio::test]
async fn test_otel_pipeline_activates_once() {
    let activator = BackendActivator::new();
    let dispatcher = Dispatcher::new(reqwest::Client::new());

    let backend = activator
        .activate(BackendSelection::Otel(OtelConfig::default()), &dispatcher)
        .await
        .unwrap();
    assert!(activator.is_active());

    let error = activator
        .activate(BackendSelection::Vendor(VendorConfig::default()), &dispatcher)
        .await
        .unwrap_err();
    assert!(matches!(error, BackendError::AlreadyActive));

    if let ActiveBackend::Otel(otel) = backend {
        otel.shutdown();
    }
}
