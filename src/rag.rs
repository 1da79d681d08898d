//! RAG query runner.
//!
//! Installs a search pipeline whose response processor generates an
//! answer over the retrieved context, then issues one neural k-NN query
//! through it and prints the raw response. Fixed literals throughout:
//! k=5, size=2, context size 5, generation timeout 15, request timeout
//! 300 seconds. No pagination, streaming, or client-side ranking.

use std::time::Duration;

use anyhow::Result;
use serde_json::{json, Value};

use crate::config::{QueryConfig, INDEX_NAME, SEARCH_PIPELINE_ID};
use crate::opensearch::{BasicAuthTransport, OpenSearchClient, Transport};

/// Question asked when the CLI does not override it.
pub const DEMO_QUESTION: &str = "What's the population increase of New York City from 2021 to 2023? How is the trending comparing with Miami?";

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const USER_INSTRUCTIONS: &str =
    "Generate a concise and informative answer in less than 100 words for the given question";

/// Request-level timeout for the search call.
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Search pipeline with a retrieval-augmented-generation response
/// processor bound to the generation model.
pub fn search_pipeline_body(generation_model_id: &str) -> Value {
    json!({
        "response_processors": [
            {
                "retrieval_augmented_generation": {
                    "tag": "rag_pipeline",
                    "description": "Generates answers over retrieved population documents",
                    "model_id": generation_model_id,
                    "context_field_list": ["text"],
                    "system_prompt": SYSTEM_PROMPT,
                    "user_instructions": USER_INSTRUCTIONS
                }
            }
        ]
    })
}

/// Neural k-NN query with generation parameters in the `ext` block.
pub fn rag_query(embedding_model_id: &str, question: &str) -> Value {
    json!({
        "query": {
            "neural": {
                "text_embedding": {
                    "query_text": question,
                    "model_id": embedding_model_id,
                    "k": 5
                }
            }
        },
        "size": 2,
        "_source": ["text"],
        "ext": {
            "generative_qa_parameters": {
                "llm_model": "bedrock/claude",
                "llm_question": question,
                "context_size": 5,
                "timeout": 15
            }
        }
    })
}

/// Install the pipeline and run the query, returning the raw response.
pub async fn run_rag_query<T: Transport>(
    client: &OpenSearchClient<T>,
    embedding_model_id: &str,
    generation_model_id: &str,
    question: &str,
) -> Result<String> {
    client
        .put_search_pipeline(SEARCH_PIPELINE_ID, &search_pipeline_body(generation_model_id))
        .await?;
    client
        .search(
            INDEX_NAME,
            &rag_query(embedding_model_id, question),
            SEARCH_PIPELINE_ID,
            SEARCH_TIMEOUT,
        )
        .await
}

/// `osboot query` entry point.
pub async fn run_query(cfg: &QueryConfig) -> Result<()> {
    let client = OpenSearchClient::new(BasicAuthTransport::new(&cfg.domain));
    let response = run_rag_query(
        &client,
        &cfg.embedding_model_id,
        &cfg.generation_model_id,
        &cfg.question,
    )
    .await?;
    println!("{}", response);
    Ok(())
}
