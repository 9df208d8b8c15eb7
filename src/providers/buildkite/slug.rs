use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use url::Url;

use crate::error::{CITraceError, Result};

/// Build identifier of the form `organization/pipeline/number`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildSlug {
    pub organization: String,
    pub pipeline: String,
    pub number: String,
}

impl BuildSlug {
    pub fn parse(slug: &str) -> Result<Self> {
        let parts: Vec<&str> = slug.split('/').collect();
        match parts.as_slice() {
            [organization, pipeline, number]
                if !organization.is_empty() && !pipeline.is_empty() && !number.is_empty() =>
            {
                Ok(Self {
                    organization: (*organization).to_string(),
                    pipeline: (*pipeline).to_string(),
                    number: (*number).to_string(),
                })
            }
            _ => Err(CITraceError::SlugParse(slug.to_string())),
        }
    }

    /// Resolves a build URL into a slug.
    ///
    /// Accepts web URLs (`https://buildkite.com/acme/app/builds/42`) and REST
    /// URLs (`https://api.buildkite.com/v2/organizations/acme/pipelines/app/builds/42`).
    pub fn from_url(raw: &str) -> Result<Self> {
        let url = Url::parse(raw).map_err(|_| CITraceError::SlugParse(raw.to_string()))?;
        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let (organization, pipeline, number) = match segments.as_slice() {
            [.., "organizations", org, "pipelines", pipe, "builds", number] => (org, pipe, number),
            [org, pipe, "builds", number] => (org, pipe, number),
            _ => return Err(CITraceError::SlugParse(raw.to_string())),
        };

        Self::parse(&format!("{organization}/{pipeline}/{number}"))
            .map_err(|_| CITraceError::SlugParse(raw.to_string()))
    }

    /// `organization/pipeline`, used as the service name of pipeline-scoped tracers.
    pub fn pipeline_slug(&self) -> String {
        format!("{}/{}", self.organization, self.pipeline)
    }
}

impl fmt::Display for BuildSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.organization, self.pipeline, self.number)
    }
}

impl FromStr for BuildSlug {
    type Err = CITraceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for BuildSlug {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
