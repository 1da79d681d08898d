//! IAM and STS clients over the AWS Query API.
//!
//! Talks to `iam.amazonaws.com` and `sts.<region>.amazonaws.com` directly
//! with SigV4-signed form posts and parses the XML responses with minimal
//! tag extraction, without an AWS SDK. The [`IamApi`] and [`StsApi`] traits are
//! the seams the provisioners and the connector registrar are written
//! against, so tests can substitute recording mocks.
//!
//! Error behavior: a `NoSuchEntity` error from `GetPolicy`/`GetRole` maps
//! to `Ok(None)` (the probe result the provisioning guard expects); every
//! other non-2xx response is fatal and carries the provider's raw body.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::credentials::AwsCredentials;
use crate::sigv4::{self, SigningParams};

const IAM_HOST: &str = "iam.amazonaws.com";
const IAM_VERSION: &str = "2010-05-08";
const STS_VERSION: &str = "2011-06-15";

/// IAM's global endpoint signs against us-east-1.
const IAM_SIGNING_REGION: &str = "us-east-1";

/// The identity behind the current credentials.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
}

/// Minimal view of an existing IAM policy.
#[derive(Debug, Clone)]
pub struct PolicySummary {
    pub arn: String,
}

/// Minimal view of an existing IAM role.
#[derive(Debug, Clone)]
pub struct RoleSummary {
    pub arn: String,
}

/// IAM operations used by the role/policy provisioners.
#[async_trait]
pub trait IamApi: Send + Sync {
    /// Probe for a policy by ARN. `Ok(None)` means no such policy.
    async fn get_policy(&self, policy_arn: &str) -> Result<Option<PolicySummary>>;
    /// Probe for a role by name. `Ok(None)` means no such role.
    async fn get_role(&self, role_name: &str) -> Result<Option<RoleSummary>>;
    /// Create a managed policy and return its ARN.
    async fn create_policy(&self, name: &str, document: &str) -> Result<String>;
    /// Create a role with the given trust document and return its ARN.
    async fn create_role(&self, name: &str, trust_document: &str) -> Result<String>;
    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()>;
}

/// STS operations used for identity resolution and role assumption.
#[async_trait]
pub trait StsApi: Send + Sync {
    async fn get_caller_identity(&self) -> Result<CallerIdentity>;
    /// Assume a role and return its temporary credentials.
    async fn assume_role(&self, role_arn: &str, session_name: &str) -> Result<AwsCredentials>;
}

/// Signed Query API client implementing both [`IamApi`] and [`StsApi`].
pub struct AwsQueryClient {
    client: reqwest::Client,
    creds: AwsCredentials,
    region: String,
}

impl AwsQueryClient {
    pub fn new(creds: AwsCredentials, region: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            creds,
            region,
        }
    }

    /// POST a signed `Action=...` form body and return the status and
    /// raw XML response without judging the status.
    async fn call(
        &self,
        host: &str,
        service: &str,
        region: &str,
        params: &[(&str, &str)],
    ) -> Result<(reqwest::StatusCode, String)> {
        let body: String = params
            .iter()
            .map(|(k, v)| format!("{}={}", sigv4::uri_encode(k), sigv4::uri_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let signing = SigningParams {
            method: "POST",
            host,
            path: "/",
            query: &[],
            payload: body.as_bytes(),
            service,
            region,
        };
        let headers = sigv4::sign_request(&signing, &self.creds, Utc::now());

        let mut req = self
            .client
            .post(format!("https://{}/", host))
            .header("content-type", "application/x-www-form-urlencoded");
        for (name, value) in &headers {
            req = req.header(name, value);
        }

        let resp = req.body(body).send().await?;
        let status = resp.status();
        let xml = resp.text().await?;
        Ok((status, xml))
    }

    async fn iam_call(&self, params: &[(&str, &str)]) -> Result<(reqwest::StatusCode, String)> {
        self.call(IAM_HOST, "iam", IAM_SIGNING_REGION, params).await
    }

    async fn sts_call(&self, params: &[(&str, &str)]) -> Result<(reqwest::StatusCode, String)> {
        let host = format!("sts.{}.amazonaws.com", self.region);
        self.call(&host, "sts", &self.region, params).await
    }
}

#[async_trait]
impl IamApi for AwsQueryClient {
    async fn get_policy(&self, policy_arn: &str) -> Result<Option<PolicySummary>> {
        let (status, xml) = self
            .iam_call(&[
                ("Action", "GetPolicy"),
                ("Version", IAM_VERSION),
                ("PolicyArn", policy_arn),
            ])
            .await?;

        if status.is_success() {
            let arn = extract_xml_value(&xml, "Arn")
                .ok_or_else(|| anyhow::anyhow!("GetPolicy response missing Arn: {}", xml))?;
            return Ok(Some(PolicySummary { arn }));
        }
        if is_no_such_entity(&xml) {
            return Ok(None);
        }
        bail!("IAM GetPolicy failed (HTTP {}): {}", status, xml);
    }

    async fn get_role(&self, role_name: &str) -> Result<Option<RoleSummary>> {
        let (status, xml) = self
            .iam_call(&[
                ("Action", "GetRole"),
                ("Version", IAM_VERSION),
                ("RoleName", role_name),
            ])
            .await?;

        if status.is_success() {
            let arn = extract_xml_value(&xml, "Arn")
                .ok_or_else(|| anyhow::anyhow!("GetRole response missing Arn: {}", xml))?;
            return Ok(Some(RoleSummary { arn }));
        }
        if is_no_such_entity(&xml) {
            return Ok(None);
        }
        bail!("IAM GetRole failed (HTTP {}): {}", status, xml);
    }

    async fn create_policy(&self, name: &str, document: &str) -> Result<String> {
        let (status, xml) = self
            .iam_call(&[
                ("Action", "CreatePolicy"),
                ("Version", IAM_VERSION),
                ("PolicyName", name),
                ("PolicyDocument", document),
            ])
            .await?;

        if !status.is_success() {
            bail!("IAM CreatePolicy failed (HTTP {}): {}", status, xml);
        }
        extract_xml_value(&xml, "Arn")
            .ok_or_else(|| anyhow::anyhow!("CreatePolicy response missing Arn: {}", xml))
    }

    async fn create_role(&self, name: &str, trust_document: &str) -> Result<String> {
        let (status, xml) = self
            .iam_call(&[
                ("Action", "CreateRole"),
                ("Version", IAM_VERSION),
                ("RoleName", name),
                ("AssumeRolePolicyDocument", trust_document),
            ])
            .await?;

        if !status.is_success() {
            bail!("IAM CreateRole failed (HTTP {}): {}", status, xml);
        }
        extract_xml_value(&xml, "Arn")
            .ok_or_else(|| anyhow::anyhow!("CreateRole response missing Arn: {}", xml))
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        let (status, xml) = self
            .iam_call(&[
                ("Action", "AttachRolePolicy"),
                ("Version", IAM_VERSION),
                ("RoleName", role_name),
                ("PolicyArn", policy_arn),
            ])
            .await?;

        if !status.is_success() {
            bail!("IAM AttachRolePolicy failed (HTTP {}): {}", status, xml);
        }
        Ok(())
    }
}

#[async_trait]
impl StsApi for AwsQueryClient {
    async fn get_caller_identity(&self) -> Result<CallerIdentity> {
        let (status, xml) = self
            .sts_call(&[("Action", "GetCallerIdentity"), ("Version", STS_VERSION)])
            .await?;

        if !status.is_success() {
            bail!("STS GetCallerIdentity failed (HTTP {}): {}", status, xml);
        }
        let account = extract_xml_value(&xml, "Account").ok_or_else(|| {
            anyhow::anyhow!("GetCallerIdentity response missing Account: {}", xml)
        })?;
        let arn = extract_xml_value(&xml, "Arn")
            .ok_or_else(|| anyhow::anyhow!("GetCallerIdentity response missing Arn: {}", xml))?;
        Ok(CallerIdentity { account, arn })
    }

    async fn assume_role(&self, role_arn: &str, session_name: &str) -> Result<AwsCredentials> {
        let (status, xml) = self
            .sts_call(&[
                ("Action", "AssumeRole"),
                ("Version", STS_VERSION),
                ("RoleArn", role_arn),
                ("RoleSessionName", session_name),
            ])
            .await?;

        if !status.is_success() {
            bail!("STS AssumeRole failed (HTTP {}): {}", status, xml);
        }
        let access_key_id = extract_xml_value(&xml, "AccessKeyId")
            .ok_or_else(|| anyhow::anyhow!("AssumeRole response missing AccessKeyId: {}", xml))?;
        let secret_access_key = extract_xml_value(&xml, "SecretAccessKey").ok_or_else(|| {
            anyhow::anyhow!("AssumeRole response missing SecretAccessKey: {}", xml)
        })?;
        let session_token = extract_xml_value(&xml, "SessionToken")
            .ok_or_else(|| anyhow::anyhow!("AssumeRole response missing SessionToken: {}", xml))?;

        Ok(AwsCredentials {
            access_key_id,
            secret_access_key,
            session_token: Some(session_token),
        })
    }
}

/// True when an IAM error response carries the `NoSuchEntity` code.
fn is_no_such_entity(xml: &str) -> bool {
    extract_xml_value(xml, "Code").as_deref() == Some("NoSuchEntity")
}

/// Extract the text content of an XML tag (simple, non-nested).
fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    if let Some(start) = xml.find(&open) {
        let value_start = start + open.len();
        if let Some(end) = xml[value_start..].find(&close) {
            return Some(xml[value_start..value_start + end].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const GET_ROLE_XML: &str = r#"<GetRoleResponse xmlns="https://iam.amazonaws.com/doc/2010-05-08/">
  <GetRoleResult>
    <Role>
      <Path>/</Path>
      <RoleName>invoke_model_role</RoleName>
      <Arn>arn:aws:iam::123456789012:role/invoke_model_role</Arn>
    </Role>
  </GetRoleResult>
</GetRoleResponse>"#;

    const NO_SUCH_ENTITY_XML: &str = r#"<ErrorResponse xmlns="https://iam.amazonaws.com/doc/2010-05-08/">
  <Error>
    <Type>Sender</Type>
    <Code>NoSuchEntity</Code>
    <Message>The role with name missing_role cannot be found.</Message>
  </Error>
</ErrorResponse>"#;

    #[test]
    fn extracts_role_arn() {
        assert_eq!(
            extract_xml_value(GET_ROLE_XML, "Arn").as_deref(),
            Some("arn:aws:iam::123456789012:role/invoke_model_role")
        );
    }

    #[test]
    fn recognizes_no_such_entity() {
        assert!(is_no_such_entity(NO_SUCH_ENTITY_XML));
        assert!(!is_no_such_entity(GET_ROLE_XML));
    }

    #[test]
    fn missing_tag_yields_none() {
        assert_eq!(extract_xml_value(GET_ROLE_XML, "AccessKeyId"), None);
    }

    #[test]
    fn extracts_assume_role_credentials() {
        let xml = r#"<AssumeRoleResponse>
  <AssumeRoleResult>
    <Credentials>
      <AccessKeyId>ASIAEXAMPLE</AccessKeyId>
      <SecretAccessKey>secret</SecretAccessKey>
      <SessionToken>token==</SessionToken>
    </Credentials>
  </AssumeRoleResult>
</AssumeRoleResponse>"#;
        assert_eq!(
            extract_xml_value(xml, "AccessKeyId").as_deref(),
            Some("ASIAEXAMPLE")
        );
        assert_eq!(
            extract_xml_value(xml, "SessionToken").as_deref(),
            Some("token==")
        );
    }
}
