//! Per-step configuration, read once from the environment.
//!
//! Each subcommand builds its own config struct at process start and
//! passes it down explicitly; nothing reads the environment after that.
//! A missing variable is a fatal error naming the variable. Identifiers
//! produced by earlier steps (role ARNs, connector and model IDs) arrive
//! through the environment; each step prints an `export NAME="value"`
//! line for the operator to carry into the next step's shell.

use anyhow::{Context, Result};

/// IAM policy name created by `osboot invoke-role`.
pub const INVOKE_POLICY_NAME: &str = "invoke_model_policy";
/// IAM role name created by `osboot invoke-role`.
pub const INVOKE_ROLE_NAME: &str = "invoke_model_role";
/// IAM policy name created by `osboot connector-role`.
pub const CONNECTOR_POLICY_NAME: &str = "create_connector_policy";
/// IAM role name created by `osboot connector-role`.
pub const CONNECTOR_ROLE_NAME: &str = "create_connector_role";

/// Index holding the demonstration documents.
pub const INDEX_NAME: &str = "population_data";
/// Ingest pipeline that computes embeddings at write time.
pub const INGEST_PIPELINE_ID: &str = "embedding_pipeline";
/// Search pipeline that runs generation over retrieved context.
pub const SEARCH_PIPELINE_ID: &str = "rag_pipeline";
/// Model group the remote model is registered under.
pub const MODEL_GROUP_NAME: &str = "remote_text_generation_group";

/// Role name mapped into `ml_full_access` for Lambda-driven ML calls.
pub const LAMBDA_ML_COMMONS_ROLE_NAME: &str = "LambdaInvokeOpenSearchMLCommonsRole";

fn required_var(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{} environment variable not set", name))
}

/// OpenSearch Service domain coordinates and admin credentials.
#[derive(Debug, Clone)]
pub struct DomainConfig {
    /// Domain host with scheme and trailing slash stripped.
    pub host: String,
    pub username: String,
    pub password: String,
}

impl DomainConfig {
    pub fn from_env() -> Result<Self> {
        let endpoint = required_var("OPENSEARCH_DOMAIN_ENDPOINT")?;
        Ok(Self {
            host: normalize_endpoint(&endpoint),
            username: required_var("OPENSEARCH_ADMIN_USER")?,
            password: required_var("OPENSEARCH_ADMIN_PASSWORD")?,
        })
    }

    /// Base URL for REST calls against the domain.
    pub fn url(&self) -> String {
        format!("https://{}", self.host)
    }
}

/// Strip the scheme prefix and any trailing slash from a domain endpoint,
/// leaving a bare host suitable for both URLs and SigV4 host headers.
pub fn normalize_endpoint(endpoint: &str) -> String {
    endpoint
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

/// Config for the invoke-role provisioner.
#[derive(Debug, Clone)]
pub struct InvokeRoleConfig {
    /// ARN of the SageMaker inference endpoint the policy is scoped to.
    pub inference_endpoint_arn: String,
    pub region: String,
}

impl InvokeRoleConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            inference_endpoint_arn: required_var("SAGEMAKER_INFERENCE_ARN")?,
            region: required_var("AWS_REGION")?,
        })
    }
}

/// Config for the connector-role provisioner.
#[derive(Debug, Clone)]
pub struct ConnectorRoleConfig {
    /// ARN of the invoke role created by the previous step.
    pub invoke_role_arn: String,
    /// ARN of the OpenSearch Service domain the policy is scoped to.
    pub domain_arn: String,
    pub region: String,
}

impl ConnectorRoleConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            invoke_role_arn: required_var("INVOKE_MODEL_ROLE_ARN")?,
            domain_arn: required_var("OPENSEARCH_DOMAIN_ARN")?,
            region: required_var("AWS_REGION")?,
        })
    }
}

/// Config for the security role-mapping step.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub domain: DomainConfig,
    pub connector_role_arn: String,
    pub region: String,
}

impl SecurityConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            domain: DomainConfig::from_env()?,
            connector_role_arn: required_var("CREATE_CONNECTOR_ROLE_ARN")?,
            region: required_var("AWS_REGION")?,
        })
    }
}

/// Config for the connector registrar.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub domain: DomainConfig,
    pub region: String,
    /// Role OpenSearch assumes to invoke the inference endpoint.
    pub invoke_role_arn: String,
    /// Role assumed by this step to sign the connector-creation request.
    pub connector_role_arn: String,
    /// SageMaker inference endpoint invocation URL.
    pub inference_endpoint_url: String,
}

impl ConnectorConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            domain: DomainConfig::from_env()?,
            region: required_var("AWS_REGION")?,
            invoke_role_arn: required_var("INVOKE_MODEL_ROLE_ARN")?,
            connector_role_arn: required_var("CREATE_CONNECTOR_ROLE_ARN")?,
            inference_endpoint_url: required_var("SAGEMAKER_INFERENCE_URL")?,
        })
    }
}

/// Config for the model registrar/deployer.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub domain: DomainConfig,
    pub connector_id: String,
}

impl ModelConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            domain: DomainConfig::from_env()?,
            connector_id: required_var("CONNECTOR_ID")?,
        })
    }
}

/// Config for the data loader.
#[derive(Debug, Clone)]
pub struct LoadDataConfig {
    pub domain: DomainConfig,
    pub embedding_model_id: String,
}

impl LoadDataConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            domain: DomainConfig::from_env()?,
            embedding_model_id: required_var("EMBEDDING_MODEL_ID")?,
        })
    }
}

/// Config for the RAG query runner.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub domain: DomainConfig,
    pub embedding_model_id: String,
    pub generation_model_id: String,
    pub question: String,
}

impl QueryConfig {
    /// `question` falls back to the demonstration question when the CLI
    /// does not override it.
    pub fn from_env(question: Option<String>) -> Result<Self> {
        Ok(Self {
            domain: DomainConfig::from_env()?,
            embedding_model_id: required_var("EMBEDDING_MODEL_ID")?,
            generation_model_id: required_var("MODEL_ID")?,
            question: question.unwrap_or_else(|| crate::rag::DEMO_QUESTION.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_scheme_and_trailing_slash() {
        assert_eq!(
            normalize_endpoint("https://search-demo.us-west-2.es.amazonaws.com/"),
            "search-demo.us-west-2.es.amazonaws.com"
        );
        assert_eq!(normalize_endpoint("http://localhost:9200"), "localhost:9200");
        assert_eq!(normalize_endpoint("host.example.com"), "host.example.com");
    }

    #[test]
    fn domain_url_rebuilds_https() {
        let domain = DomainConfig {
            host: "search-demo.us-west-2.es.amazonaws.com".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(
            domain.url(),
            "https://search-demo.us-west-2.es.amazonaws.com"
        );
    }

    #[test]
    fn missing_variable_names_the_variable() {
        let err = required_var("OSBOOT_DEFINITELY_UNSET_VARIABLE").unwrap_err();
        assert!(err
            .to_string()
            .contains("OSBOOT_DEFINITELY_UNSET_VARIABLE environment variable not set"));
    }
}
