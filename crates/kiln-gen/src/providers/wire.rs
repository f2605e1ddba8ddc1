//! JSON codec for the Hunyuan 3D (`ai3d`) API
//!
//! Shared by every transport so both speak exactly the same protocol.

use crate::job::{JobHandle, JobResult, JobStatus, ResultFile};
use crate::provider::JobSubmission;
use kiln_core::{KilnError, Result};
use serde::{Deserialize, Serialize};

pub const SERVICE: &str = "ai3d";
pub const DEFAULT_HOST: &str = "ai3d.tencentcloudapi.com";
pub const DEFAULT_REGION: &str = "ap-guangzhou";
pub const API_VERSION: &str = "2025-05-13";
pub const SUBMIT_ACTION: &str = "SubmitHunyuanTo3DJob";
pub const QUERY_ACTION: &str = "QueryHunyuanTo3DJob";
pub const DEFAULT_RESULT_FORMAT: &str = "OBJ";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SubmitPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    multi_view_images: Vec<WireViewImage<'a>>,
    result_format: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct WireViewImage<'a> {
    view_type: &'a str,
    view_image_url: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct QueryPayload<'a> {
    job_id: &'a str,
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(rename = "Response")]
    response: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiError {
    code: String,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SubmitResponse {
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default, rename = "ResultFile3Ds")]
    result_files: Vec<WireResultFile>,
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireResultFile {
    #[serde(default, rename = "Type")]
    kind: Option<String>,
    url: String,
    #[serde(default)]
    preview_image_url: Option<String>,
}

/// Serialize a submit request body
pub fn submit_payload(submission: &JobSubmission, result_format: &str) -> Result<String> {
    let payload = SubmitPayload {
        prompt: submission.prompt.as_deref(),
        image_url: submission.image_url.as_deref(),
        multi_view_images: submission
            .multi_view_images
            .iter()
            .map(|v| WireViewImage {
                view_type: v.view.as_str(),
                view_image_url: &v.image_url,
            })
            .collect(),
        result_format,
    };
    Ok(serde_json::to_string(&payload)?)
}

/// Serialize a status query body
pub fn query_payload(job: &JobHandle) -> Result<String> {
    Ok(serde_json::to_string(&QueryPayload { job_id: job.id() })?)
}

/// Parse a submit response into a job handle
pub fn parse_submit_response(body: &str) -> Result<JobHandle> {
    let envelope: Envelope<SubmitResponse> = serde_json::from_str(body).map_err(|e| {
        KilnError::ProviderSubmit(format!("Unexpected submit response ({}): {}", e, body))
    })?;
    let response = envelope.response;

    if let Some(err) = response.error {
        return Err(KilnError::ProviderSubmit(format!(
            "{}: {}{}",
            err.code,
            err.message,
            request_suffix(response.request_id.as_deref())
        )));
    }

    response
        .job_id
        .filter(|id| !id.is_empty())
        .map(JobHandle::new)
        .ok_or_else(|| KilnError::ProviderSubmit(format!("No JobId in submit response: {}", body)))
}

/// Parse a status query response
pub fn parse_query_response(body: &str) -> Result<JobResult> {
    let envelope: Envelope<QueryResponse> = serde_json::from_str(body).map_err(|e| {
        KilnError::ProviderPoll(format!("Unexpected query response ({}): {}", e, body))
    })?;
    let response = envelope.response;

    if let Some(err) = response.error {
        return Err(KilnError::ProviderPoll(format!(
            "{}: {}{}",
            err.code,
            err.message,
            request_suffix(response.request_id.as_deref())
        )));
    }

    let status = response
        .status
        .as_deref()
        .map(JobStatus::from_wire)
        .unwrap_or(JobStatus::Running);
    let error_code = response.error_code.filter(|c| !c.is_empty());
    let error_message = response
        .error_message
        .filter(|m| !m.is_empty())
        .or_else(|| error_code.clone());

    Ok(JobResult {
        status,
        error_code,
        error_message,
        files: response
            .result_files
            .into_iter()
            .map(|f| ResultFile {
                kind: f.kind.unwrap_or_default(),
                url: f.url,
                preview_image_url: f.preview_image_url.filter(|u| !u.is_empty()),
            })
            .collect(),
    })
}

fn request_suffix(request_id: Option<&str>) -> String {
    request_id
        .map(|id| format!(" (RequestId: {})", id))
        .unwrap_or_default()
}
