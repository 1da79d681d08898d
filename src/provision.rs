//! IAM role and policy provisioning.
//!
//! Two provisioners share the same shape: probe for name collisions,
//! then create a managed policy, create a role, and attach the policy.
//!
//! The probe is the check-before-create guard: if a policy or role with
//! the configured name already exists the run aborts with a message
//! naming the collision, before any create call is issued. An existing
//! resource is never overwritten; the operator picks a different name
//! instead. Any other provider error is fatal and unrecovered.

use anyhow::{bail, Result};
use serde_json::{json, Value};

use crate::aws_api::{AwsQueryClient, IamApi, StsApi};
use crate::config::{
    ConnectorRoleConfig, InvokeRoleConfig, CONNECTOR_POLICY_NAME, CONNECTOR_ROLE_NAME,
    INVOKE_POLICY_NAME, INVOKE_ROLE_NAME,
};
use crate::credentials::AwsCredentials;
use crate::handoff;

/// ARNs of a freshly created role and its attached policy.
#[derive(Debug, Clone)]
pub struct ProvisionedRole {
    pub policy_arn: String,
    pub role_arn: String,
}

/// Managed-policy ARN for a customer policy name in the given account.
pub fn policy_arn_for(account_id: &str, policy_name: &str) -> String {
    format!("arn:aws:iam::{}:policy/{}", account_id, policy_name)
}

/// The check-before-create guard.
///
/// Probes for an existing policy (by the ARN it would have in the
/// caller's account) and an existing role (by name). Aborts on either
/// hit. A "not found" probe result means it is safe to create.
pub async fn ensure_names_unused(
    iam: &dyn IamApi,
    sts: &dyn StsApi,
    policy_name: &str,
    role_name: &str,
) -> Result<()> {
    let account_id = sts.get_caller_identity().await?.account;
    let policy_arn = policy_arn_for(&account_id, policy_name);

    if iam.get_policy(&policy_arn).await?.is_some() {
        bail!(
            "Policy {} already exists. Please set another policy name",
            policy_name
        );
    }
    if iam.get_role(role_name).await?.is_some() {
        bail!(
            "Role {} already exists. Please set another role name",
            role_name
        );
    }
    Ok(())
}

/// Create the policy, create the role, then attach the policy.
async fn create_role_with_policy(
    iam: &dyn IamApi,
    policy_name: &str,
    role_name: &str,
    policy_document: &Value,
    trust_document: &Value,
) -> Result<ProvisionedRole> {
    let policy_arn = iam
        .create_policy(policy_name, &policy_document.to_string())
        .await?;
    let role_arn = iam
        .create_role(role_name, &trust_document.to_string())
        .await?;
    iam.attach_role_policy(role_name, &policy_arn).await?;

    Ok(ProvisionedRole {
        policy_arn,
        role_arn,
    })
}

/// Policy allowing invocation of the SageMaker inference endpoint.
fn invoke_policy_document(inference_endpoint_arn: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Action": ["sagemaker:InvokeEndpoint"],
                "Resource": [inference_endpoint_arn]
            }
        ]
    })
}

/// Trust document letting OpenSearch Service assume the invoke role.
fn opensearch_trust_document() -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": { "Service": "es.amazonaws.com" },
                "Action": "sts:AssumeRole"
            }
        ]
    })
}

/// Policy allowing connector creation: pass the invoke role to the
/// domain, and POST against the domain itself.
fn connector_policy_document(invoke_role_arn: &str, domain_arn: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Action": "iam:PassRole",
                "Resource": invoke_role_arn
            },
            {
                "Effect": "Allow",
                "Action": "es:ESHttpPost",
                "Resource": domain_arn
            }
        ]
    })
}

/// Trust document letting the current caller assume the connector role.
fn caller_trust_document(caller_arn: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": { "AWS": caller_arn },
                "Action": "sts:AssumeRole"
            }
        ]
    })
}

/// Provision the role OpenSearch Service assumes to invoke the model
/// inference endpoint.
pub async fn provision_invoke_role(
    iam: &dyn IamApi,
    sts: &dyn StsApi,
    cfg: &InvokeRoleConfig,
) -> Result<ProvisionedRole> {
    ensure_names_unused(iam, sts, INVOKE_POLICY_NAME, INVOKE_ROLE_NAME).await?;
    create_role_with_policy(
        iam,
        INVOKE_POLICY_NAME,
        INVOKE_ROLE_NAME,
        &invoke_policy_document(&cfg.inference_endpoint_arn),
        &opensearch_trust_document(),
    )
    .await
}

/// Provision the role assumed by the operator to sign connector-creation
/// requests against the domain.
pub async fn provision_connector_role(
    iam: &dyn IamApi,
    sts: &dyn StsApi,
    cfg: &ConnectorRoleConfig,
) -> Result<ProvisionedRole> {
    ensure_names_unused(iam, sts, CONNECTOR_POLICY_NAME, CONNECTOR_ROLE_NAME).await?;
    let caller_arn = sts.get_caller_identity().await?.arn;
    create_role_with_policy(
        iam,
        CONNECTOR_POLICY_NAME,
        CONNECTOR_ROLE_NAME,
        &connector_policy_document(&cfg.invoke_role_arn, &cfg.domain_arn),
        &caller_trust_document(&caller_arn),
    )
    .await
}

/// `osboot invoke-role` entry point.
pub async fn run_invoke_role(cfg: &InvokeRoleConfig) -> Result<()> {
    let client = AwsQueryClient::new(AwsCredentials::from_env()?, cfg.region.clone());
    let role = provision_invoke_role(&client, &client, cfg).await?;

    println!("Created policy {}", role.policy_arn);
    println!("Created role {}", role.role_arn);
    handoff::print_handoff("INVOKE_MODEL_ROLE_ARN", &role.role_arn);
    Ok(())
}

/// `osboot connector-role` entry point.
pub async fn run_connector_role(cfg: &ConnectorRoleConfig) -> Result<()> {
    let client = AwsQueryClient::new(AwsCredentials::from_env()?, cfg.region.clone());
    let role = provision_connector_role(&client, &client, cfg).await?;

    println!("Created policy {}", role.policy_arn);
    println!("Created role {}", role.role_arn);
    handoff::print_handoff("CREATE_CONNECTOR_ROLE_ARN", &role.role_arn);
    Ok(())
}
