//! ---
//! cpsim_section: "07-testing"
//! cpsim_subsection: "integration-tests"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "End-to-end control-plane scenarios driven through the harness facade."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
use anyhow::{ensure, Context};
use cpsim_common::cluster::{DISCOVERY_V1, DISCOVERY_V1BETA1};
use cpsim_common::HarnessConfig;
use cpsim_sim::BackendSource;
use cpsim_testharness::{ControlPlaneHarness, HarnessError};
use serde_json::{json, Value};

fn harness(version: &str) -> ControlPlaneHarness {
    let mut harness = ControlPlaneHarness::new(HarnessConfig::new("k8s1", version));
    harness.setup_environment(|_, _| {});
    harness
}

fn service() -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {"name": "db", "namespace": "shop"},
        "spec": {"clusterIP": "10.96.0.20", "ports": [{"port": 5432}]}
    })
}

fn slice(api_version: &str) -> Value {
    json!({
        "apiVersion": api_version,
        "kind": "EndpointSlice",
        "metadata": {
            "name": "db-q8m4r",
            "namespace": "shop",
            "labels": {"kubernetes.io/service-name": "db"}
        },
        "addressType": "IPv4",
        "endpoints": [{"addresses": ["10.0.3.9"]}],
        "ports": [{"port": 5432}]
    })
}

fn programmed_with(
    h: &ControlPlaneHarness,
    source: BackendSource,
    backends: &[&str],
) -> anyhow::Result<()> {
    let datapath = h.datapath()?;
    ensure!(
        datapath.backend_source() == Some(source),
        "backend source is {:?}",
        datapath.backend_source()
    );
    let service = datapath.service("shop", "db").context("shop/db not programmed")?;
    ensure!(service.backends == backends, "backends are {:?}", service.backends);
    Ok(())
}

#[test]
fn v1_slices_win_on_clusters_serving_both_versions() {
    let mut harness = harness("1.24");
    assert!(harness.discovery().serves(DISCOVERY_V1BETA1, "EndpointSlice"));
    assert_eq!(harness.discovery().endpoint_slice_api(), Some(DISCOVERY_V1));
    harness
        .update_objects([service(), slice(DISCOVERY_V1BETA1)])
        .start_agent()
        // A v1beta1-only slice contributes nothing once v1 is selected.
        .eventually(|h| programmed_with(h, BackendSource::EndpointSlicesV1, &[]))
        .stop_agent();
}

#[test]
fn v1beta1_slices_are_ignored_once_v1_is_served() {
    let mut harness = harness("1.25");
    assert!(!harness.discovery().serves(DISCOVERY_V1BETA1, "EndpointSlice"));
    harness
        .update_objects([service(), slice(DISCOVERY_V1BETA1), slice(DISCOVERY_V1)])
        .start_agent()
        .eventually(|h| programmed_with(h, BackendSource::EndpointSlicesV1, &["10.0.3.9:5432"]))
        .stop_agent();
}

#[test]
fn endpoints_are_used_when_slices_are_disabled() {
    let mut harness = harness("1.23");
    harness
        .setup_environment(|agent, _| agent.enable_endpoint_slice = false)
        .update_objects([
            service(),
            json!({
                "apiVersion": "v1",
                "kind": "Endpoints",
                "metadata": {"name": "db", "namespace": "shop"},
                "subsets": [{"addresses": [{"ip": "10.0.3.10"}], "ports": [{"port": 5432}]}]
            }),
        ])
        .start_agent()
        .eventually(|h| programmed_with(h, BackendSource::Endpoints, &["10.0.3.10:5432"]))
        .stop_agent();
}

#[test]
fn every_catalog_version_serves_the_mesh_group() {
    for version in ["1.23", "1.24", "1.25"] {
        let harness = harness(version);
        assert_eq!(harness.discovery().server_version().to_string(), version);
        assert!(harness.discovery().serves("mesh.cpsim.io/v2", "MeshNode"));
    }
}

#[test]
fn unknown_versions_are_rejected() {
    let err = ControlPlaneHarness::try_new(HarnessConfig::new("k8s1", "1.19"))
        .err()
        .expect("1.19 is not in the catalog");
    assert!(matches!(err, HarnessError::UnknownClusterVersion(_)));
}

#[test]
#[should_panic(expected = "cluster version 1.19 not found")]
fn unknown_version_is_fatal() {
    ControlPlaneHarness::new(HarnessConfig::new("k8s1", "1.19"));
}
