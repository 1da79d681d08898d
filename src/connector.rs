//! Remote-model connector registration.
//!
//! Assumes the connector-creation role, signs the request with the
//! temporary credentials, and registers a connector describing how the
//! domain's ML plugin calls the SageMaker inference endpoint. The
//! response post-processing expression is a Painless script executed by
//! OpenSearch; it is carried as an opaque string payload.

use anyhow::Result;
use serde_json::{json, Value};

use crate::aws_api::{AwsQueryClient, StsApi};
use crate::config::ConnectorConfig;
use crate::credentials::AwsCredentials;
use crate::handoff;
use crate::opensearch::{OpenSearchClient, SigV4Transport, Transport};

/// Session name used when assuming the connector-creation role.
pub const CONNECTOR_SESSION_NAME: &str = "create_connector_session";

/// Painless script turning the SageMaker response into the ML plugin's
/// expected `{name, dataAsMap}` shape. Opaque to this tool.
const POST_PROCESS_FUNCTION: &str = r#"
      if (params.result == null || params.result.length == 0) {
        throw new Exception('No response available');
      }

      def completion = params.result[0].generated_text;
      return '{' +
               '"name": "response",'+
               '"dataAsMap": {' +
                  '"completion":"' + escape(completion) + '"}' +
             '}';
    "#;

/// Build the connector descriptor sent to the ML plugin.
///
/// `protocol: aws_sigv4` plus the invoke-role credential lets the domain
/// sign its own calls to SageMaker with the invoke role.
pub fn connector_descriptor(cfg: &ConnectorConfig) -> Value {
    json!({
        "name": "SageMaker text generation connector",
        "description": "Connector for a SageMaker-hosted text generation model",
        "version": "1.0",
        "protocol": "aws_sigv4",
        "credential": {
            "roleArn": cfg.invoke_role_arn
        },
        "parameters": {
            "service_name": "sagemaker",
            "region": cfg.region,
            "do_sample": true,
            "top_p": 0.9,
            "temperature": 0.7,
            "max_new_tokens": 512
        },
        "actions": [
            {
                "action_type": "PREDICT",
                "method": "POST",
                "url": cfg.inference_endpoint_url,
                "headers": {
                    "content-type": "application/json"
                },
                "request_body": "{ \"inputs\": \"${parameters.inputs}\", \"parameters\": {\"do_sample\": ${parameters.do_sample}, \"top_p\": ${parameters.top_p}, \"temperature\": ${parameters.temperature}, \"max_new_tokens\": ${parameters.max_new_tokens}} }",
                "post_process_function": POST_PROCESS_FUNCTION
            }
        ]
    })
}

/// Register the connector and return its `connector_id`.
pub async fn register_connector<T: Transport>(
    client: &OpenSearchClient<T>,
    descriptor: &Value,
) -> Result<String> {
    client.create_connector(descriptor).await
}

/// `osboot connector` entry point.
pub async fn run_create_connector(cfg: &ConnectorConfig) -> Result<()> {
    let sts = AwsQueryClient::new(AwsCredentials::from_env()?, cfg.region.clone());
    let assumed = sts
        .assume_role(&cfg.connector_role_arn, CONNECTOR_SESSION_NAME)
        .await?;

    let transport = SigV4Transport::new(cfg.domain.host.clone(), cfg.region.clone(), assumed);
    let client = OpenSearchClient::new(transport);

    let connector_id = register_connector(&client, &connector_descriptor(cfg)).await?;
    println!("Created connector {}", connector_id);
    handoff::print_handoff("CONNECTOR_ID", &connector_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DomainConfig;

    fn test_cfg() -> ConnectorConfig {
        ConnectorConfig {
            domain: DomainConfig {
                host: "search-demo.us-west-2.es.amazonaws.com".to_string(),
                username: "admin".to_string(),
                password: "secret".to_string(),
            },
            region: "us-west-2".to_string(),
            invoke_role_arn: "arn:aws:iam::1:role/invoke_model_role".to_string(),
            connector_role_arn: "arn:aws:iam::1:role/create_connector_role".to_string(),
            inference_endpoint_url:
                "https://runtime.sagemaker.us-west-2.amazonaws.com/endpoints/demo/invocations"
                    .to_string(),
        }
    }

    #[test]
    fn descriptor_binds_invoke_role_and_endpoint() {
        let doc = connector_descriptor(&test_cfg());
        assert_eq!(doc["protocol"], "aws_sigv4");
        assert_eq!(doc["credential"]["roleArn"], "arn:aws:iam::1:role/invoke_model_role");
        assert_eq!(doc["parameters"]["service_name"], "sagemaker");
        assert_eq!(doc["parameters"]["region"], "us-west-2");
        assert_eq!(
            doc["actions"][0]["url"],
            "https://runtime.sagemaker.us-west-2.amazonaws.com/endpoints/demo/invocations"
        );
        assert_eq!(doc["actions"][0]["action_type"], "PREDICT");
    }

    #[test]
    fn descriptor_carries_the_post_process_script_opaquely() {
        let doc = connector_descriptor(&test_cfg());
        let script = doc["actions"][0]["post_process_function"].as_str().unwrap();
        assert!(script.contains("params.result[0].generated_text"));
        assert!(script.contains("dataAsMap"));
    }
}
