use chrono::{DateTime, Utc};
use graphql_client::QueryBody;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::core::BuildkiteClient;
use crate::error::{CITraceError, Result};
use crate::providers::buildkite::decoder::{self, timestamp, JobSchema};
use crate::providers::buildkite::slug::BuildSlug;
use crate::providers::buildkite::types::Build;

const JOBS_FOR_BUILD: &str = include_str!("build.graphql");

#[derive(Debug, Serialize)]
struct Variables {
    slug: String,
    first: i64,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    build: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBuild {
    uuid: String,
    url: String,
    #[serde(default, deserialize_with = "timestamp::optional")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    scheduled_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    finished_at: Option<DateTime<Utc>>,
    jobs: Option<RawJobConnection>,
}

#[derive(Debug, Deserialize)]
struct RawJobConnection {
    edges: Option<Vec<RawEdge>>,
}

#[derive(Debug, Deserialize)]
struct RawEdge {
    node: Option<Value>,
}

impl BuildkiteClient {
    /// Fetch a build and its jobs through the GraphQL API.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the API reports GraphQL errors,
    /// the build does not exist, or its payload cannot be decoded.
    pub async fn fetch_build_graphql(&self, slug: &BuildSlug) -> Result<Build> {
        #[allow(clippy::cast_possible_wrap)]
        let request_body = QueryBody {
            variables: Variables {
                slug: slug.to_string(),
                first: self.jobs_per_build as i64,
            },
            query: JOBS_FOR_BUILD,
            operation_name: "JobsForBuild",
        };

        let data: ResponseData = self.execute_graphql_request(&request_body).await?;

        let raw = data
            .build
            .ok_or_else(|| CITraceError::BuildNotFound(slug.to_string()))?;

        build_from_graphql(raw, slug)
    }
}

fn build_from_graphql(raw: Value, slug: &BuildSlug) -> Result<Build> {
    let raw: RawBuild = serde_json::from_value(raw)
        .map_err(|e| CITraceError::Decode(format!("invalid build {slug}: {e}")))?;

    let nodes: Vec<Value> = raw
        .jobs
        .and_then(|jobs| jobs.edges)
        .into_iter()
        .flatten()
        .filter_map(|edge| edge.node)
        .collect();

    let jobs = decoder::decode(nodes, JobSchema::GraphQl)?;

    info!("Found build {}, with {} jobs", raw.uuid, jobs.len());

    Ok(Build {
        uuid: raw.uuid,
        slug: slug.clone(),
        url: raw.url,
        created_at: raw.created_at,
        scheduled_at: raw.scheduled_at,
        started_at: raw.started_at,
        finished_at: raw.finished_at,
        jobs,
    })
}
