//! Model registration and deployment.
//!
//! Registers a model group, registers a remote model bound to the
//! connector under that group, then deploys it. Deploy is fired after a
//! successful register and its status is checked, but deployed state is
//! not polled afterwards.

use anyhow::Result;
use serde_json::{json, Value};

use crate::config::{ModelConfig, MODEL_GROUP_NAME};
use crate::handoff;
use crate::opensearch::{BasicAuthTransport, OpenSearchClient, Transport};

/// Model-group registration payload.
pub fn model_group_body() -> Value {
    json!({
        "name": MODEL_GROUP_NAME,
        "description": "Remote text generation models served from SageMaker"
    })
}

/// Model registration payload binding the connector, under a group.
pub fn model_registration_body(connector_id: &str, model_group_id: &str) -> Value {
    json!({
        "name": "SageMaker text generation model",
        "function_name": "remote",
        "description": "Remote text generation model on SageMaker",
        "connector_id": connector_id,
        "model_group_id": model_group_id
    })
}

/// Register the model group and model, deploy, and return the `model_id`.
///
/// Deploy only ever runs after the register call has succeeded and
/// returned an ID.
pub async fn register_and_deploy<T: Transport>(
    client: &OpenSearchClient<T>,
    connector_id: &str,
) -> Result<String> {
    let model_group_id = client.register_model_group(&model_group_body()).await?;
    let model_id = client
        .register_model(&model_registration_body(connector_id, &model_group_id))
        .await?;
    client.deploy_model(&model_id).await?;
    Ok(model_id)
}

/// `osboot model` entry point.
pub async fn run_register_model(cfg: &ModelConfig) -> Result<()> {
    let client = OpenSearchClient::new(BasicAuthTransport::new(&cfg.domain));
    let model_id = register_and_deploy(&client, &cfg.connector_id).await?;

    println!("model_id: {}", model_id);
    handoff::print_handoff("MODEL_ID", &model_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_body_is_a_remote_model_in_the_group() {
        let body = model_registration_body("conn-1", "group-1");
        assert_eq!(body["function_name"], "remote");
        assert_eq!(body["connector_id"], "conn-1");
        assert_eq!(body["model_group_id"], "group-1");
    }

    #[test]
    fn model_group_body_uses_configured_name() {
        assert_eq!(model_group_body()["name"], MODEL_GROUP_NAME);
    }
}
