//! # OpenSearch RAG Bootstrap
//!
//! Wires a SageMaker-hosted text generation model into a managed
//! OpenSearch Service domain for retrieval-augmented generation. Each
//! step is an independent CLI subcommand; steps hand identifiers to each
//! other only through environment variables and printed
//! `export NAME="value"` lines.
//!
//! ## Pipeline
//!
//! ```text
//! invoke-role ──▶ connector-role ──▶ security ──▶ connector ──▶ model
//!                                                                 │
//!                         query ◀── load-data ◀───────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Per-step configuration from environment variables |
//! | [`credentials`] | AWS credential values for signing |
//! | [`sigv4`] | AWS Signature V4 request signing |
//! | [`aws_api`] | IAM and STS over the signed Query API |
//! | [`provision`] | Check-before-create role/policy provisioning |
//! | [`opensearch`] | Domain client over a transport seam |
//! | [`connector`] | Remote-model connector registration |
//! | [`model`] | Model group/model registration and deployment |
//! | [`dataset`] | Fixed documents, index mapping, ingest pipeline |
//! | [`load_data`] | Index creation and bulk load |
//! | [`rag`] | Search pipeline and the neural RAG query |
//! | [`security`] | `ml_full_access` backend-role mapping |
//! | [`handoff`] | The `export NAME="value"` stdout contract |

pub mod aws_api;
pub mod config;
pub mod connector;
pub mod credentials;
pub mod dataset;
pub mod handoff;
pub mod load_data;
pub mod model;
pub mod opensearch;
pub mod provision;
pub mod rag;
pub mod security;
pub mod sigv4;
