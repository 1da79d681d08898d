//! # OpenSearch RAG Bootstrap CLI (`osboot`)
//!
//! Provisions IAM roles, registers and deploys a SageMaker-backed model
//! in an OpenSearch Service domain, loads a small vector dataset, and
//! runs one retrieval-augmented-generation query.
//!
//! ## Usage
//!
//! Each subcommand reads its inputs from environment variables and, on
//! success, prints an `export NAME="value"` line to paste into the shell
//! before the next step:
//!
//! ```bash
//! osboot invoke-role      # -> export INVOKE_MODEL_ROLE_ARN="..."
//! osboot connector-role   # -> export CREATE_CONNECTOR_ROLE_ARN="..."
//! osboot security         # map backend roles into ml_full_access
//! osboot connector        # -> export CONNECTOR_ID="..."
//! osboot model            # -> export MODEL_ID="..."
//! osboot load-data        # create index + ingest pipeline, bulk load
//! osboot query            # RAG query, prints the raw response
//! ```
//!
//! There is no retry or recovery anywhere: a missing variable, a name
//! collision, or any provider error terminates the step immediately.

use clap::{Parser, Subcommand};

use opensearch_bootstrap::{config, connector, load_data, model, provision, rag, security};

/// Bootstrap a SageMaker-hosted model into an OpenSearch Service domain
/// for retrieval-augmented generation.
///
/// Subcommands are independent steps chained through environment
/// variables; run them in order and export each printed identifier.
#[derive(Parser)]
#[command(
    name = "osboot",
    about = "Bootstrap a SageMaker-hosted model into OpenSearch for RAG",
    version,
    long_about = "Provisions the IAM roles, connector, and model that let an OpenSearch \
    Service domain call a SageMaker inference endpoint, then loads a demonstration vector \
    dataset and runs one retrieval-augmented-generation query. Each subcommand reads \
    environment variables and prints an export line carrying its output to the next step."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Pipeline steps, in execution order.
#[derive(Subcommand)]
enum Commands {
    /// Create the IAM policy and role OpenSearch uses to invoke the
    /// SageMaker inference endpoint.
    ///
    /// Reads SAGEMAKER_INFERENCE_ARN and AWS_REGION. Aborts if a policy
    /// or role with the configured name already exists.
    InvokeRole,

    /// Create the IAM policy and role used to sign connector-creation
    /// requests against the domain.
    ///
    /// Reads INVOKE_MODEL_ROLE_ARN, OPENSEARCH_DOMAIN_ARN, and
    /// AWS_REGION. The trust policy names the current caller.
    ConnectorRole,

    /// Map the connector-creation role (and the account's Lambda ML
    /// role) as backend roles of ml_full_access.
    ///
    /// Reads the domain variables, CREATE_CONNECTOR_ROLE_ARN, and
    /// AWS_REGION.
    Security,

    /// Register the remote-model connector with the domain's ML plugin.
    ///
    /// Assumes CREATE_CONNECTOR_ROLE_ARN, signs the request, and prints
    /// the returned connector ID. Also reads INVOKE_MODEL_ROLE_ARN and
    /// SAGEMAKER_INFERENCE_URL.
    Connector,

    /// Register a model group and model bound to CONNECTOR_ID, then
    /// deploy the model.
    Model,

    /// Create the k-NN index and embedding ingest pipeline, then
    /// bulk-load the demonstration documents.
    ///
    /// Reads EMBEDDING_MODEL_ID. Aborts if the index already exists.
    LoadData,

    /// Run one retrieval-augmented-generation query and print the raw
    /// response.
    ///
    /// Reads EMBEDDING_MODEL_ID and MODEL_ID.
    Query {
        /// Question to ask; defaults to the demonstration question.
        #[arg(long)]
        question: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::InvokeRole => {
            let cfg = config::InvokeRoleConfig::from_env()?;
            provision::run_invoke_role(&cfg).await?;
        }
        Commands::ConnectorRole => {
            let cfg = config::ConnectorRoleConfig::from_env()?;
            provision::run_connector_role(&cfg).await?;
        }
        Commands::Security => {
            let cfg = config::SecurityConfig::from_env()?;
            security::run_security_setup(&cfg).await?;
        }
        Commands::Connector => {
            let cfg = config::ConnectorConfig::from_env()?;
            connector::run_create_connector(&cfg).await?;
        }
        Commands::Model => {
            let cfg = config::ModelConfig::from_env()?;
            model::run_register_model(&cfg).await?;
        }
        Commands::LoadData => {
            let cfg = config::LoadDataConfig::from_env()?;
            load_data::run_load_data(&cfg).await?;
        }
        Commands::Query { question } => {
            let cfg = config::QueryConfig::from_env(question)?;
            rag::run_query(&cfg).await?;
        }
    }

    Ok(())
}
