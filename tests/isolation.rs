// ABOUTME: Integration tests for the network isolation validator.
// ABOUTME: Uses a scripted inspector in place of the container runtime.

mod support;

use pirollout::isolation::{IsolationValidator, IsolationViolation};
use pirollout::types::{NetworkName, ServiceName};
use std::sync::Arc;
use support::{ScriptedInspector, registry};

const SUPPORT_PHASE: &str = r#"
- name: support
  order: 4
  compose: support.yml
  networks:
    - name: lucid-network-isolated
      internal: true
    - name: lucid-pi-network
  services:
    - name: admin-interface
      port: 8083
      priority: medium
      network: lucid-pi-network
    - name: tron-payment-service
      port: 8096
      priority: high
      network: lucid-network-isolated
      isolated: true
"#;

fn validator(inspector: ScriptedInspector) -> (IsolationValidator, pirollout::registry::PhaseRegistry) {
    let registry = registry(SUPPORT_PHASE);
    let inspector = inspector.declare(&registry);
    (IsolationValidator::new(Arc::new(inspector)), registry)
}

fn svc(name: &str) -> ServiceName {
    ServiceName::new(name).unwrap()
}

fn net(name: &str) -> NetworkName {
    NetworkName::new(name).unwrap()
}

#[tokio::test]
async fn declared_attachments_are_clean() {
    let (validator, registry) = validator(ScriptedInspector::new());
    let phase = registry.get("support").unwrap();

    assert!(validator.validate_phase(phase).await.is_empty());
}

#[tokio::test]
async fn isolated_service_on_a_second_network() {
    let (validator, registry) = validator(
        ScriptedInspector::new().attach(
            "tron-payment-service",
            &["lucid-network-isolated", "lucid-pi-network"],
        ),
    );
    let phase = registry.get("support").unwrap();

    assert_eq!(
        validator.validate_phase(phase).await,
        vec![IsolationViolation::ExtraNetwork {
            service: svc("tron-payment-service"),
            expected: net("lucid-network-isolated"),
            extra: vec!["lucid-pi-network".to_string()],
        }]
    );
}

#[tokio::test]
async fn service_missing_from_its_network() {
    let (validator, registry) =
        validator(ScriptedInspector::new().attach("admin-interface", &["bridge"]));
    let phase = registry.get("support").unwrap();

    let violations = validator.validate_phase(phase).await;
    assert_eq!(
        violations,
        vec![IsolationViolation::WrongNetwork {
            service: svc("admin-interface"),
            expected: net("lucid-pi-network"),
            actual: vec!["bridge".to_string()],
        }]
    );
    assert_eq!(
        violations[0].to_string(),
        "admin-interface is not on lucid-pi-network (attached: bridge)"
    );
}

#[tokio::test]
async fn required_network_absent() {
    let (validator, registry) =
        validator(ScriptedInspector::new().without_network("lucid-network-isolated"));
    let phase = registry.get("support").unwrap();

    let violations = validator.check_networks(&phase.networks).await;
    assert_eq!(
        violations,
        vec![IsolationViolation::MissingNetwork {
            network: net("lucid-network-isolated")
        }]
    );
}

#[tokio::test]
async fn unreadable_network_is_not_reported_missing() {
    let (validator, registry) =
        validator(ScriptedInspector::new().unreadable_network("lucid-network-isolated"));
    let phase = registry.get("support").unwrap();

    let violations = validator.check_networks(&phase.networks).await;
    assert_eq!(
        violations,
        vec![IsolationViolation::NetworkInspectionFailed {
            network: net("lucid-network-isolated"),
            reason: "connection reset by peer".to_string(),
        }]
    );
}

#[tokio::test]
async fn internal_network_created_without_internal_flag() {
    let yaml = SUPPORT_PHASE.replace("lucid-network-isolated", "lucid-tron-network");
    let registry = registry(&yaml);
    let validator = IsolationValidator::new(Arc::new(ScriptedInspector::new().declare(&registry)));
    let phase = registry.get("support").unwrap();

    assert_eq!(
        validator.validate_phase(phase).await,
        vec![IsolationViolation::NotInternal {
            network: net("lucid-tron-network")
        }]
    );
}

#[tokio::test]
async fn inspection_failure_is_recorded_not_raised() {
    let registry = registry(SUPPORT_PHASE);
    // Nothing declared, so every container lookup fails.
    let validator = IsolationValidator::new(Arc::new(ScriptedInspector::new()));
    let phase = registry.get("support").unwrap();

    let violations = validator.validate_phase(phase).await;
    assert_eq!(violations.len(), 2);
    assert!(violations.iter().all(|v| matches!(
        v,
        IsolationViolation::InspectionFailed { reason, .. } if reason.contains("No such object")
    )));
}

#[test]
fn violations_serialize_with_kind_tag() {
    let violation = IsolationViolation::MissingNetwork {
        network: net("lucid-network-isolated"),
    };
    let json = serde_json::to_value(&violation).unwrap();
    assert_eq!(json["kind"], "missing-network");
    assert_eq!(json["network"], "lucid-network-isolated");
}
