//! Fine-grained access control setup.
//!
//! Maps the connector-creation role and the account's Lambda ML role as
//! backend roles of the `ml_full_access` security role, so signed
//! traffic from those entities reaches the ML plugin. Prints the
//! resulting mapping for the operator to verify.

use anyhow::Result;
use serde_json::{json, Value};

use crate::aws_api::{AwsQueryClient, StsApi};
use crate::config::{SecurityConfig, LAMBDA_ML_COMMONS_ROLE_NAME};
use crate::credentials::AwsCredentials;
use crate::opensearch::{BasicAuthTransport, OpenSearchClient};

const ML_FULL_ACCESS_ROLE: &str = "ml_full_access";

/// Backend-role mapping payload for `ml_full_access`.
pub fn role_mapping_body(connector_role_arn: &str, lambda_role_arn: &str) -> Value {
    json!({
        "backend_roles": [connector_role_arn, lambda_role_arn]
    })
}

/// `osboot security` entry point.
pub async fn run_security_setup(cfg: &SecurityConfig) -> Result<()> {
    let sts = AwsQueryClient::new(AwsCredentials::from_env()?, cfg.region.clone());
    let account_id = sts.get_caller_identity().await?.account;
    let lambda_role_arn = format!(
        "arn:aws:iam::{}:role/{}",
        account_id, LAMBDA_ML_COMMONS_ROLE_NAME
    );

    let client = OpenSearchClient::new(BasicAuthTransport::new(&cfg.domain));
    client
        .put_role_mapping(
            ML_FULL_ACCESS_ROLE,
            &role_mapping_body(&cfg.connector_role_arn, &lambda_role_arn),
        )
        .await?;

    let mapping = client.get_role_mapping(ML_FULL_ACCESS_ROLE).await?;
    println!("{} role mapping is now {}", ML_FULL_ACCESS_ROLE, mapping);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_lists_both_backend_roles() {
        let body = role_mapping_body(
            "arn:aws:iam::1:role/create_connector_role",
            "arn:aws:iam::1:role/LambdaInvokeOpenSearchMLCommonsRole",
        );
        let roles = body["backend_roles"].as_array().unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(roles[0], "arn:aws:iam::1:role/create_connector_role");
    }
}
