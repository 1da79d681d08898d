//! Demonstration dataset and the payloads that index it.
//!
//! Six metro-area population summaries, a k-NN index mapping, and the
//! ingest pipeline that computes embeddings at write time. All index
//! parameters are fixed constants: one shard, two replicas, 384-dim
//! vectors, HNSW on FAISS with `ef_construction=128` and `m=24`.

use serde_json::{json, Value};

/// Vector dimensionality of the embedding model (all-MiniLM class).
pub const EMBEDDING_DIMENSION: u32 = 384;

/// The fixed document set, one entry per metro area.
pub const DOCUMENTS: [&str; 6] = [
    "Chart and table of population level and growth rate for the Ogden-Layton metro area from 1950 to 2023. United Nations population projections are also included through the year 2035.\nThe current metro area population of Ogden-Layton in 2023 is 750,000, a 1.63% increase from 2022.\nThe metro area population of Ogden-Layton in 2022 was 738,000, a 1.79% increase from 2021.\nThe metro area population of Ogden-Layton in 2021 was 725,000, a 1.97% increase from 2020.\nThe metro area population of Ogden-Layton in 2020 was 711,000, a 2.16% increase from 2019.",
    "Chart and table of population level and growth rate for the New York City metro area from 1950 to 2023. United Nations population projections are also included through the year 2035.\nThe current metro area population of New York City in 2023 is 18,937,000, a 0.37% increase from 2022.\nThe metro area population of New York City in 2022 was 18,867,000, a 0.23% increase from 2021.\nThe metro area population of New York City in 2021 was 18,823,000, a 0.1% increase from 2020.\nThe metro area population of New York City in 2020 was 18,804,000, a 0.01% decline from 2019.",
    "Chart and table of population level and growth rate for the Chicago metro area from 1950 to 2023. United Nations population projections are also included through the year 2035.\nThe current metro area population of Chicago in 2023 is 8,937,000, a 0.4% increase from 2022.\nThe metro area population of Chicago in 2022 was 8,901,000, a 0.27% increase from 2021.\nThe metro area population of Chicago in 2021 was 8,877,000, a 0.14% increase from 2020.\nThe metro area population of Chicago in 2020 was 8,865,000, a 0.03% increase from 2019.",
    "Chart and table of population level and growth rate for the Miami metro area from 1950 to 2023. United Nations population projections are also included through the year 2035.\nThe current metro area population of Miami in 2023 is 6,265,000, a 0.8% increase from 2022.\nThe metro area population of Miami in 2022 was 6,215,000, a 0.78% increase from 2021.\nThe metro area population of Miami in 2021 was 6,167,000, a 0.74% increase from 2020.\nThe metro area population of Miami in 2020 was 6,122,000, a 0.71% increase from 2019.",
    "Chart and table of population level and growth rate for the Austin metro area from 1950 to 2023. United Nations population projections are also included through the year 2035.\nThe current metro area population of Austin in 2023 is 2,228,000, a 2.39% increase from 2022.\nThe metro area population of Austin in 2022 was 2,176,000, a 2.79% increase from 2021.\nThe metro area population of Austin in 2021 was 2,117,000, a 3.12% increase from 2020.\nThe metro area population of Austin in 2020 was 2,053,000, a 3.43% increase from 2019.",
    "Chart and table of population level and growth rate for the Seattle metro area from 1950 to 2023. United Nations population projections are also included through the year 2035.\nThe current metro area population of Seattle in 2023 is 3,519,000, a 0.86% increase from 2022.\nThe metro area population of Seattle in 2022 was 3,489,000, a 0.81% increase from 2021.\nThe metro area population of Seattle in 2021 was 3,461,000, a 0.82% increase from 2020.\nThe metro area population of Seattle in 2020 was 3,433,000, a 0.79% increase from 2019.",
];

/// Index settings and mapping: a `text` source field and a 384-dim
/// `knn_vector` target field.
pub fn index_mapping() -> Value {
    json!({
        "settings": {
            "index": {
                "knn": true,
                "number_of_shards": 1,
                "number_of_replicas": 2
            }
        },
        "mappings": {
            "properties": {
                "text": { "type": "text" },
                "text_embedding": {
                    "type": "knn_vector",
                    "dimension": EMBEDDING_DIMENSION,
                    "method": {
                        "name": "hnsw",
                        "space_type": "l2",
                        "engine": "faiss",
                        "parameters": { "ef_construction": 128, "m": 24 }
                    }
                }
            }
        }
    })
}

/// Ingest pipeline binding the embedding model to the field mapping
/// `text` → `text_embedding`.
pub fn ingest_pipeline_body(embedding_model_id: &str) -> Value {
    json!({
        "processors": [
            {
                "text_embedding": {
                    "model_id": embedding_model_id,
                    "field_map": {
                        "text": "text_embedding"
                    }
                }
            }
        ]
    })
}

/// NDJSON bulk body indexing every document with a stable 1-based ID.
pub fn bulk_body(index: &str) -> String {
    let mut body = String::new();
    for (i, text) in DOCUMENTS.iter().enumerate() {
        let action = json!({ "index": { "_index": index, "_id": (i + 1).to_string() } });
        let doc = json!({ "text": text });
        body.push_str(&action.to_string());
        body.push('\n');
        body.push_str(&doc.to_string());
        body.push('\n');
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_pins_the_vector_parameters() {
        let mapping = index_mapping();
        assert_eq!(mapping["settings"]["index"]["knn"], true);
        assert_eq!(mapping["settings"]["index"]["number_of_shards"], 1);
        assert_eq!(mapping["settings"]["index"]["number_of_replicas"], 2);

        let field = &mapping["mappings"]["properties"]["text_embedding"];
        assert_eq!(field["type"], "knn_vector");
        assert_eq!(field["dimension"], 384);
        assert_eq!(field["method"]["name"], "hnsw");
        assert_eq!(field["method"]["engine"], "faiss");
        assert_eq!(field["method"]["space_type"], "l2");
        assert_eq!(field["method"]["parameters"]["ef_construction"], 128);
        assert_eq!(field["method"]["parameters"]["m"], 24);
    }

    #[test]
    fn pipeline_maps_text_to_vector_field() {
        let body = ingest_pipeline_body("embed-model-1");
        let proc = &body["processors"][0]["text_embedding"];
        assert_eq!(proc["model_id"], "embed-model-1");
        assert_eq!(proc["field_map"]["text"], "text_embedding");
    }

    #[test]
    fn bulk_body_pairs_action_and_document_lines() {
        let body = bulk_body("population_data");
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), DOCUMENTS.len() * 2);

        let first_action: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first_action["index"]["_index"], "population_data");
        assert_eq!(first_action["index"]["_id"], "1");

        let first_doc: Value = serde_json::from_str(lines[1]).unwrap();
        assert!(first_doc["text"].as_str().unwrap().contains("Ogden-Layton"));

        // Bulk requires a trailing newline.
        assert!(body.ends_with('\n'));
    }
}
