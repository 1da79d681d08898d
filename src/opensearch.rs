//! OpenSearch domain client.
//!
//! All domain traffic goes through the [`Transport`] trait: a thin
//! request/response seam with two production implementations:
//! [`BasicAuthTransport`] for admin-credentialed calls and
//! [`SigV4Transport`] for calls signed with assumed-role credentials
//! (connector creation requires signed traffic so fine-grained access
//! control can map the role). Tests implement the trait with a recording
//! stub.
//!
//! Every operation validates the response status and fails with the
//! status and raw body; nothing is retried.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::config::DomainConfig;
use crate::credentials::AwsCredentials;
use crate::sigv4::{self, SigningParams};

/// One HTTP request against the domain.
#[derive(Debug, Clone)]
pub struct Request {
    /// Uppercase HTTP method (`GET`, `POST`, `PUT`, `HEAD`, `DELETE`).
    pub method: String,
    /// Path starting with `/`, e.g. `/_plugins/_ml/connectors/_create`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
    /// `application/json` for everything except NDJSON bulk bodies.
    pub content_type: &'static str,
    /// Request-level timeout; `None` uses the client default.
    pub timeout: Option<Duration>,
}

impl Request {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            query: Vec::new(),
            body: None,
            content_type: "application/json",
            timeout: None,
        }
    }

    pub fn with_json(mut self, body: &Value) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }
}

/// Status and raw body of a domain response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Seam between the domain client and the wire.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<HttpResponse>;
}

/// Transport authenticating with the domain's admin user and password.
pub struct BasicAuthTransport {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl BasicAuthTransport {
    pub fn new(domain: &DomainConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: domain.url(),
            username: domain.username.clone(),
            password: domain.password.clone(),
        }
    }
}

#[async_trait]
impl Transport for BasicAuthTransport {
    async fn send(&self, request: Request) -> Result<HttpResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())?;
        let url = format!("{}{}", self.base_url, request.path);

        let mut req = self
            .client
            .request(method, &url)
            .basic_auth(&self.username, Some(&self.password))
            .query(&request.query)
            .header("content-type", request.content_type);
        if let Some(body) = request.body {
            req = req.body(body);
        }
        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(HttpResponse { status, body })
    }
}

/// Transport signing each request with SigV4 for the `es` service,
/// typically with temporary credentials from an assumed role.
pub struct SigV4Transport {
    client: reqwest::Client,
    host: String,
    region: String,
    creds: AwsCredentials,
}

impl SigV4Transport {
    pub fn new(host: String, region: String, creds: AwsCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            host,
            region,
            creds,
        }
    }
}

#[async_trait]
impl Transport for SigV4Transport {
    async fn send(&self, request: Request) -> Result<HttpResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())?;
        let body = request.body.unwrap_or_default();

        let signing = SigningParams {
            method: &request.method,
            host: &self.host,
            path: &request.path,
            query: &request.query,
            payload: body.as_bytes(),
            service: "es",
            region: &self.region,
        };
        let headers = sigv4::sign_request(&signing, &self.creds, Utc::now());

        // The signed canonical query string must match the sent one.
        let query_string = sigv4::canonical_query_string(&request.query);
        let url = if query_string.is_empty() {
            format!("https://{}{}", self.host, request.path)
        } else {
            format!("https://{}{}?{}", self.host, request.path, query_string)
        };

        let mut req = self
            .client
            .request(method, &url)
            .header("content-type", request.content_type);
        for (name, value) in &headers {
            req = req.header(name, value);
        }
        if !body.is_empty() {
            req = req.body(body);
        }
        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(HttpResponse { status, body })
    }
}

#[derive(Deserialize)]
struct CreateConnectorResponse {
    connector_id: String,
}

#[derive(Deserialize)]
struct RegisterModelGroupResponse {
    model_group_id: String,
}

#[derive(Deserialize)]
struct RegisterModelResponse {
    model_id: String,
}

/// Typed operations against a single OpenSearch domain.
pub struct OpenSearchClient<T: Transport> {
    transport: T,
}

impl<T: Transport> OpenSearchClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    async fn expect_success(&self, request: Request, context: &str) -> Result<HttpResponse> {
        let resp = self.transport.send(request).await?;
        if !resp.is_success() {
            bail!("{} failed (HTTP {}): {}", context, resp.status, resp.body);
        }
        Ok(resp)
    }

    /// Register a remote-model connector and return its `connector_id`.
    pub async fn create_connector(&self, descriptor: &Value) -> Result<String> {
        let resp = self
            .expect_success(
                Request::new("POST", "/_plugins/_ml/connectors/_create").with_json(descriptor),
                "Connector create",
            )
            .await?;
        let parsed: CreateConnectorResponse = serde_json::from_str(&resp.body)
            .map_err(|e| anyhow::anyhow!("Connector response missing connector_id ({}): {}", e, resp.body))?;
        Ok(parsed.connector_id)
    }

    /// Register a model group and return its `model_group_id`.
    pub async fn register_model_group(&self, body: &Value) -> Result<String> {
        let resp = self
            .expect_success(
                Request::new("POST", "/_plugins/_ml/model_groups/_register").with_json(body),
                "Model group register",
            )
            .await?;
        let parsed: RegisterModelGroupResponse = serde_json::from_str(&resp.body)
            .map_err(|e| anyhow::anyhow!("Model group response missing model_group_id ({}): {}", e, resp.body))?;
        Ok(parsed.model_group_id)
    }

    /// Register a model and return its `model_id`.
    pub async fn register_model(&self, body: &Value) -> Result<String> {
        let resp = self
            .expect_success(
                Request::new("POST", "/_plugins/_ml/models/_register").with_json(body),
                "Model register",
            )
            .await?;
        let parsed: RegisterModelResponse = serde_json::from_str(&resp.body)
            .map_err(|e| anyhow::anyhow!("Model register response missing model_id ({}): {}", e, resp.body))?;
        Ok(parsed.model_id)
    }

    /// Deploy a registered model. Fire-and-forget: the response status is
    /// checked but deployed state is not polled.
    pub async fn deploy_model(&self, model_id: &str) -> Result<()> {
        let path = format!("/_plugins/_ml/models/{}/_deploy", model_id);
        self.expect_success(Request::new("POST", &path), "Model deploy")
            .await?;
        Ok(())
    }

    /// Whether an index with this name exists (HEAD: 200 yes, 404 no).
    pub async fn index_exists(&self, index: &str) -> Result<bool> {
        let path = format!("/{}", index);
        let resp = self.transport.send(Request::new("HEAD", &path)).await?;
        match resp.status {
            200 => Ok(true),
            404 => Ok(false),
            status => bail!("Index existence check failed (HTTP {}): {}", status, resp.body),
        }
    }

    pub async fn create_index(&self, index: &str, body: &Value) -> Result<()> {
        let path = format!("/{}", index);
        self.expect_success(Request::new("PUT", &path).with_json(body), "Index create")
            .await?;
        Ok(())
    }

    /// Delete an index; a missing index (404) is tolerated.
    pub async fn delete_index(&self, index: &str) -> Result<()> {
        let path = format!("/{}", index);
        let resp = self.transport.send(Request::new("DELETE", &path)).await?;
        if !resp.is_success() && resp.status != 404 {
            bail!("Index delete failed (HTTP {}): {}", resp.status, resp.body);
        }
        Ok(())
    }

    pub async fn put_ingest_pipeline(&self, id: &str, body: &Value) -> Result<()> {
        let path = format!("/_ingest/pipeline/{}", id);
        self.expect_success(
            Request::new("PUT", &path).with_json(body),
            "Ingest pipeline put",
        )
        .await?;
        Ok(())
    }

    /// Bulk-load NDJSON through an ingest pipeline with synchronous refresh.
    pub async fn bulk(&self, index: &str, ndjson: String, pipeline: &str) -> Result<()> {
        let path = format!("/{}/_bulk", index);
        let mut request = Request::new("POST", &path)
            .with_query("pipeline", pipeline)
            .with_query("refresh", "true");
        request.body = Some(ndjson);
        request.content_type = "application/x-ndjson";
        let resp = self.expect_success(request, "Bulk ingest").await?;

        // The bulk endpoint reports per-item failures inside a 200.
        let parsed: Value = serde_json::from_str(&resp.body).unwrap_or(Value::Null);
        if parsed["errors"] == Value::Bool(true) {
            bail!("Bulk ingest reported item errors: {}", resp.body);
        }
        Ok(())
    }

    pub async fn put_search_pipeline(&self, id: &str, body: &Value) -> Result<()> {
        let path = format!("/_search/pipeline/{}", id);
        self.expect_success(
            Request::new("PUT", &path).with_json(body),
            "Search pipeline put",
        )
        .await?;
        Ok(())
    }

    /// Run a search through a search pipeline with a request-level timeout,
    /// returning the raw response body.
    pub async fn search(
        &self,
        index: &str,
        body: &Value,
        pipeline: &str,
        timeout: Duration,
    ) -> Result<String> {
        let path = format!("/{}/_search", index);
        let mut request = Request::new("POST", &path)
            .with_json(body)
            .with_query("search_pipeline", pipeline);
        request.timeout = Some(timeout);
        let resp = self.expect_success(request, "Search").await?;
        Ok(resp.body)
    }

    /// Replace the backend-role mapping of a security role.
    pub async fn put_role_mapping(&self, role: &str, body: &Value) -> Result<()> {
        let path = format!("/_plugins/_security/api/rolesmapping/{}", role);
        self.expect_success(Request::new("PUT", &path).with_json(body), "Role mapping put")
            .await?;
        Ok(())
    }

    /// Read back a security role mapping as raw JSON.
    pub async fn get_role_mapping(&self, role: &str) -> Result<String> {
        let path = format!("/_plugins/_security/api/rolesmapping/{}", role);
        let resp = self
            .expect_success(Request::new("GET", &path), "Role mapping get")
            .await?;
        Ok(resp.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_sets_json_body_and_query() {
        let req = Request::new("POST", "/idx/_search")
            .with_json(&serde_json::json!({"size": 2}))
            .with_query("search_pipeline", "rag_pipeline");
        assert_eq!(req.method, "POST");
        assert_eq!(req.body.as_deref(), Some("{\"size\":2}"));
        assert_eq!(
            req.query,
            vec![("search_pipeline".to_string(), "rag_pipeline".to_string())]
        );
        assert_eq!(req.content_type, "application/json");
    }

    #[test]
    fn success_window_is_2xx() {
        assert!(HttpResponse { status: 201, body: String::new() }.is_success());
        assert!(!HttpResponse { status: 404, body: String::new() }.is_success());
        assert!(!HttpResponse { status: 302, body: String::new() }.is_success());
    }
}
