//! Data loader step.
//!
//! Creates the k-NN index, installs the embedding ingest pipeline, and
//! bulk-loads the demonstration documents through it with a synchronous
//! refresh. Aborts before touching anything if an index with the
//! configured name already exists, the same uniqueness rule the IAM
//! provisioners apply.

use anyhow::{bail, Result};

use crate::config::{LoadDataConfig, INDEX_NAME, INGEST_PIPELINE_ID};
use crate::dataset;
use crate::opensearch::{BasicAuthTransport, OpenSearchClient, Transport};

/// Load the fixed dataset into a fresh index.
pub async fn load_dataset<T: Transport>(
    client: &OpenSearchClient<T>,
    embedding_model_id: &str,
) -> Result<()> {
    if client.index_exists(INDEX_NAME).await? {
        bail!(
            "Index {} already exists. Please choose a different index name \
             (it is also used by the query step)",
            INDEX_NAME
        );
    }

    // Clears any half-removed index left by an interrupted earlier run;
    // a missing index is fine.
    client.delete_index(INDEX_NAME).await?;

    client
        .create_index(INDEX_NAME, &dataset::index_mapping())
        .await?;
    client
        .put_ingest_pipeline(
            INGEST_PIPELINE_ID,
            &dataset::ingest_pipeline_body(embedding_model_id),
        )
        .await?;
    client
        .bulk(INDEX_NAME, dataset::bulk_body(INDEX_NAME), INGEST_PIPELINE_ID)
        .await?;
    Ok(())
}

/// `osboot load-data` entry point.
pub async fn run_load_data(cfg: &LoadDataConfig) -> Result<()> {
    let client = OpenSearchClient::new(BasicAuthTransport::new(&cfg.domain));
    load_dataset(&client, &cfg.embedding_model_id).await?;

    println!(
        "Loaded {} documents into index {} through pipeline {}",
        dataset::DOCUMENTS.len(),
        INDEX_NAME,
        INGEST_PIPELINE_ID
    );
    Ok(())
}
