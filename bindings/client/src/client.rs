use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use reqwest::Method;
use url::Url;

use gale_instruments::{OperationRecord, Reporter};

use crate::api::PrepareUploadRequest;
use crate::step::{StepRequest, StepResult};
use crate::urls::{pointcloud_url, prepare_upload_url};

pub const PREPARE_UPLOAD_LABEL: &str = "prepare_upload";
pub const UPLOAD_POINTCLOUD_LABEL: &str = "upload_pointcloud";
pub const GET_POINTCLOUD_LABEL: &str = "get_pointcloud";

/// HTTP step executor for one virtual client.
///
/// Every step issues exactly one request with the configured timeout, reads the full response
/// body, and records a labelled operation for the reporter. There are no retries; deciding what
/// a response means is the scenario's job.
#[derive(Debug, Clone)]
pub struct PointcloudClient {
    http: reqwest::Client,
    reporter: Arc<Reporter>,
}

impl PointcloudClient {
    pub fn new(request_timeout: Duration, reporter: Arc<Reporter>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to create the HTTP client")?;

        Ok(Self { http, reporter })
    }

    /// Issue one request step. Transport failures and timeouts are returned as a failed
    /// [StepResult], never as an error.
    pub async fn execute(&self, request: StepRequest) -> StepResult {
        let mut record = OperationRecord::new(request.label);

        let mut builder = self.http.request(request.method, request.url);
        if let Some(content_type) = request.content_type {
            builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let result = match builder.send().await {
            Ok(response) => {
                let status = response.status();
                // Read the whole body so that a step is only complete once the response is
                // fully transferred.
                match response.bytes().await {
                    Ok(body) => StepResult {
                        status: Some(status),
                        body,
                        error: None,
                    },
                    Err(e) => StepResult {
                        status: Some(status),
                        body: Bytes::new(),
                        error: Some(e.to_string()),
                    },
                }
            }
            Err(e) => {
                log::debug!("Request step {} failed: {e}", request.label);
                StepResult {
                    status: None,
                    body: Bytes::new(),
                    error: Some(e.to_string()),
                }
            }
        };

        record.finish(result.error.is_some());
        self.reporter.add_operation(&record);

        result
    }

    /// Ask the coordination API for an upload placement reservation.
    pub async fn prepare_upload(
        &self,
        api_base: &Url,
        request: &PrepareUploadRequest,
    ) -> anyhow::Result<StepResult> {
        let body = serde_json::to_vec(request).context("Failed to encode the prepare request")?;

        Ok(self
            .execute(StepRequest {
                label: PREPARE_UPLOAD_LABEL,
                method: Method::POST,
                url: prepare_upload_url(api_base)?,
                body: Some(body.into()),
                content_type: Some("application/json"),
            })
            .await)
    }

    /// PUT the sample payload to the storage destination from a reservation.
    pub async fn upload_object(&self, put_url: Url, payload: Bytes) -> StepResult {
        self.execute(StepRequest {
            label: UPLOAD_POINTCLOUD_LABEL,
            method: Method::PUT,
            url: put_url,
            body: Some(payload),
            content_type: Some("application/octet-stream"),
        })
        .await
    }

    /// GET the point cloud stored under a geohash.
    pub async fn fetch_pointcloud(
        &self,
        api_base: &Url,
        geohash: &str,
    ) -> anyhow::Result<StepResult> {
        Ok(self
            .execute(StepRequest {
                label: GET_POINTCLOUD_LABEL,
                method: Method::GET,
                url: pointcloud_url(api_base, geohash)?,
                body: None,
                content_type: None,
            })
            .await)
    }
}
