use chrono::{DateTime, Utc};
use log::info;
use serde::Deserialize;
use serde_json::Value;

use super::core::BuildkiteClient;
use crate::error::{CITraceError, Result};
use crate::providers::buildkite::decoder::{self, timestamp, JobSchema};
use crate::providers::buildkite::slug::BuildSlug;
use crate::providers::buildkite::types::Build;

/// Build payload of `GET /organizations/{org}/pipelines/{pipeline}/builds/{number}`
#[derive(Debug, Deserialize)]
struct RestBuild {
    id: String,
    web_url: String,
    #[serde(default, deserialize_with = "timestamp::optional")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    scheduled_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    jobs: Vec<Value>,
}

impl BuildkiteClient {
    /// Fetch a build and its jobs through the REST API.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the API answers with a non-success
    /// status, or the payload cannot be decoded.
    pub async fn fetch_build_rest(&self, slug: &BuildSlug) -> Result<Build> {
        let path = format!(
            "organizations/{}/pipelines/{}/builds/{}",
            slug.organization, slug.pipeline, slug.number
        );

        let payload = match self.get_json(&path).await {
            Err(CITraceError::ApiError { status: 404, .. }) => {
                return Err(CITraceError::BuildNotFound(slug.to_string()))
            }
            other => other?,
        };

        build_from_rest(payload, slug)
    }
}

fn build_from_rest(payload: Value, slug: &BuildSlug) -> Result<Build> {
    let raw: RestBuild = serde_json::from_value(payload)
        .map_err(|e| CITraceError::Decode(format!("invalid build {slug}: {e}")))?;

    let jobs = decoder::decode(raw.jobs, JobSchema::Rest)?;

    info!("Found build {}, with {} jobs", raw.id, jobs.len());

    Ok(Build {
        uuid: raw.id,
        slug: slug.clone(),
        url: raw.web_url,
        created_at: raw.created_at,
        scheduled_at: raw.scheduled_at,
        started_at: raw.started_at,
        finished_at: raw.finished_at,
        jobs,
    })
}
