//! HTTP client for the ServiceX control plane.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::error::truncate_body;
use super::{AdapterError, ControlPlane};
use crate::models::{TransformRequest, TransformStatus};
use crate::sanitize::redact_url;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct SubmitResponse {
    request_id: String,
}

#[derive(Deserialize)]
struct TransformList {
    requests: Vec<TransformStatus>,
}

/// Talks to one ServiceX deployment.
pub struct ServiceXAdapter {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl ServiceXAdapter {
    pub fn new(url: &str, token: Option<SecretString>) -> Result<Self, AdapterError> {
        url::Url::parse(url).map_err(|e| AdapterError::InvalidUrl {
            url: redact_url(url),
            reason: e.to_string(),
        })?;
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AdapterError::Http {
                url: redact_url(url),
                source: e,
            })?;
        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    async fn send(&self, url: &str, builder: RequestBuilder) -> Result<Response, AdapterError> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| AdapterError::Http {
                url: redact_url(url),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Status {
                url: redact_url(url),
                status,
                body: truncate_body(body),
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AdapterError> {
        let url = self.endpoint(path);
        let response = self.send(&url, self.client.get(&url)).await?;
        response.json().await.map_err(|e| AdapterError::Decode {
            url: redact_url(&url),
            source: e,
        })
    }

    /// Every transform the deployment knows about.
    pub async fn get_transforms(&self) -> Result<Vec<TransformStatus>, AdapterError> {
        let list: TransformList = self.get_json("/servicex/transformation").await?;
        debug!("Fetched {} transforms", list.requests.len());
        Ok(list.requests)
    }

    /// Code generator names mapped to their service URLs.
    pub async fn get_code_generators(&self) -> Result<BTreeMap<String, String>, AdapterError> {
        self.get_json("/multiple-codegen-list").await
    }
}

#[async_trait]
impl ControlPlane for ServiceXAdapter {
    async fn submit_transform(&self, request: &TransformRequest) -> Result<String, AdapterError> {
        let url = self.endpoint("/servicex/transformation");
        let response = self.send(&url, self.client.post(&url).json(request)).await?;
        let submitted: SubmitResponse = response.json().await.map_err(|e| AdapterError::Decode {
            url: redact_url(&url),
            source: e,
        })?;
        if submitted.request_id.is_empty() {
            return Err(AdapterError::Protocol {
                url: redact_url(&url),
                reason: "empty request_id".to_string(),
            });
        }
        info!("Submitted transform {}", submitted.request_id);
        Ok(submitted.request_id)
    }

    async fn get_transform_status(
        &self,
        request_id: &str,
    ) -> Result<TransformStatus, AdapterError> {
        self.get_json(&format!("/servicex/transformation/{}", request_id)).await
    }
}
