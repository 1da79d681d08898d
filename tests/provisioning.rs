//! Provisioner tests against recording IAM/STS mocks.
//!
//! These prove the check-before-create guard: when a policy or role with
//! the configured name already exists, the run aborts without issuing a
//! single create call; when the names are free, creation happens in the
//! order create-policy, create-role, attach.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use opensearch_bootstrap::aws_api::{CallerIdentity, IamApi, PolicySummary, RoleSummary, StsApi};
use opensearch_bootstrap::config::{
    ConnectorRoleConfig, InvokeRoleConfig, CONNECTOR_POLICY_NAME, INVOKE_POLICY_NAME,
    INVOKE_ROLE_NAME,
};
use opensearch_bootstrap::credentials::AwsCredentials;
use opensearch_bootstrap::provision::{provision_connector_role, provision_invoke_role};

const ACCOUNT: &str = "123456789012";
const CALLER_ARN: &str = "arn:aws:iam::123456789012:user/operator";

/// IAM mock that records every call and simulates pre-existing resources.
#[derive(Default)]
struct RecordingIam {
    existing_policy_arns: Vec<String>,
    existing_role_names: Vec<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl RecordingIam {
    fn record(&self, op: &str, detail: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((op.to_string(), detail.to_string()));
    }

    fn ops(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(op, _)| op.clone())
            .collect()
    }

    fn create_calls(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| op.starts_with("create") || op.starts_with("attach"))
            .count()
    }
}

#[async_trait]
impl IamApi for RecordingIam {
    async fn get_policy(&self, policy_arn: &str) -> Result<Option<PolicySummary>> {
        self.record("get_policy", policy_arn);
        Ok(self
            .existing_policy_arns
            .iter()
            .find(|arn| arn.as_str() == policy_arn)
            .map(|arn| PolicySummary { arn: arn.clone() }))
    }

    async fn get_role(&self, role_name: &str) -> Result<Option<RoleSummary>> {
        self.record("get_role", role_name);
        Ok(self
            .existing_role_names
            .iter()
            .find(|name| name.as_str() == role_name)
            .map(|name| RoleSummary {
                arn: format!("arn:aws:iam::{}:role/{}", ACCOUNT, name),
            }))
    }

    async fn create_policy(&self, name: &str, document: &str) -> Result<String> {
        self.record("create_policy", document);
        Ok(format!("arn:aws:iam::{}:policy/{}", ACCOUNT, name))
    }

    async fn create_role(&self, name: &str, trust_document: &str) -> Result<String> {
        self.record("create_role", trust_document);
        Ok(format!("arn:aws:iam::{}:role/{}", ACCOUNT, name))
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        self.record("attach_role_policy", &format!("{} {}", role_name, policy_arn));
        Ok(())
    }
}

struct StubSts;

#[async_trait]
impl StsApi for StubSts {
    async fn get_caller_identity(&self) -> Result<CallerIdentity> {
        Ok(CallerIdentity {
            account: ACCOUNT.to_string(),
            arn: CALLER_ARN.to_string(),
        })
    }

    async fn assume_role(&self, _role_arn: &str, _session_name: &str) -> Result<AwsCredentials> {
        unreachable!("provisioners never assume roles")
    }
}

fn invoke_cfg() -> InvokeRoleConfig {
    InvokeRoleConfig {
        inference_endpoint_arn: "arn:aws:sagemaker:us-west-2:123456789012:endpoint/demo"
            .to_string(),
        region: "us-west-2".to_string(),
    }
}

fn connector_cfg() -> ConnectorRoleConfig {
    ConnectorRoleConfig {
        invoke_role_arn: format!("arn:aws:iam::{}:role/{}", ACCOUNT, INVOKE_ROLE_NAME),
        domain_arn: "arn:aws:es:us-west-2:123456789012:domain/demo".to_string(),
        region: "us-west-2".to_string(),
    }
}

#[tokio::test]
async fn existing_policy_aborts_before_any_create() {
    let iam = RecordingIam {
        existing_policy_arns: vec![format!(
            "arn:aws:iam::{}:policy/{}",
            ACCOUNT, INVOKE_POLICY_NAME
        )],
        ..Default::default()
    };

    let err = provision_invoke_role(&iam, &StubSts, &invoke_cfg())
        .await
        .unwrap_err();
    assert!(err.to_string().contains(INVOKE_POLICY_NAME));
    assert!(err.to_string().contains("already exists"));
    assert_eq!(iam.create_calls(), 0);
}

#[tokio::test]
async fn existing_role_aborts_before_any_create() {
    let iam = RecordingIam {
        existing_role_names: vec![INVOKE_ROLE_NAME.to_string()],
        ..Default::default()
    };

    let err = provision_invoke_role(&iam, &StubSts, &invoke_cfg())
        .await
        .unwrap_err();
    assert!(err.to_string().contains(INVOKE_ROLE_NAME));
    assert_eq!(iam.create_calls(), 0);
}

#[tokio::test]
async fn invoke_role_happy_path_probes_then_creates_in_order() {
    let iam = RecordingIam::default();
    let role = provision_invoke_role(&iam, &StubSts, &invoke_cfg())
        .await
        .unwrap();

    assert_eq!(
        role.policy_arn,
        format!("arn:aws:iam::{}:policy/{}", ACCOUNT, INVOKE_POLICY_NAME)
    );
    assert_eq!(
        role.role_arn,
        format!("arn:aws:iam::{}:role/{}", ACCOUNT, INVOKE_ROLE_NAME)
    );
    assert_eq!(
        iam.ops(),
        vec![
            "get_policy",
            "get_role",
            "create_policy",
            "create_role",
            "attach_role_policy"
        ]
    );

    // The policy is scoped to the inference endpoint; the trust names
    // the OpenSearch service principal.
    let calls = iam.calls.lock().unwrap();
    let policy_doc = &calls.iter().find(|(op, _)| op == "create_policy").unwrap().1;
    assert!(policy_doc.contains("sagemaker:InvokeEndpoint"));
    assert!(policy_doc.contains("arn:aws:sagemaker:us-west-2:123456789012:endpoint/demo"));
    let trust_doc = &calls.iter().find(|(op, _)| op == "create_role").unwrap().1;
    assert!(trust_doc.contains("es.amazonaws.com"));
}

#[tokio::test]
async fn connector_role_trusts_the_current_caller() {
    let iam = RecordingIam::default();
    let role = provision_connector_role(&iam, &StubSts, &connector_cfg())
        .await
        .unwrap();

    assert!(role.policy_arn.contains(CONNECTOR_POLICY_NAME));

    let calls = iam.calls.lock().unwrap();
    let policy_doc = &calls.iter().find(|(op, _)| op == "create_policy").unwrap().1;
    assert!(policy_doc.contains("iam:PassRole"));
    assert!(policy_doc.contains("es:ESHttpPost"));
    let trust_doc = &calls.iter().find(|(op, _)| op == "create_role").unwrap().1;
    assert!(trust_doc.contains(CALLER_ARN));
}

#[tokio::test]
async fn existing_connector_policy_blocks_the_connector_provisioner() {
    let iam = RecordingIam {
        existing_policy_arns: vec![format!(
            "arn:aws:iam::{}:policy/{}",
            ACCOUNT, CONNECTOR_POLICY_NAME
        )],
        ..Default::default()
    };

    let err = provision_connector_role(&iam, &StubSts, &connector_cfg())
        .await
        .unwrap_err();
    assert!(err.to_string().contains(CONNECTOR_POLICY_NAME));
    assert_eq!(iam.create_calls(), 0);
}
