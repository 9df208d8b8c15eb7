use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::client::BuildkiteClient;
use super::slug::BuildSlug;
use super::types::Build;
use crate::error::Result;

/// Source of historical build records.
#[async_trait]
pub trait BuildFetcher: Send + Sync {
    /// Fetch one build with its decoded, oldest-first job sequence.
    async fn fetch(&self, slug: &BuildSlug) -> Result<Build>;
}

/// Which Buildkite API backs the fetcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ApiSource {
    #[default]
    #[value(name = "graphql")]
    GraphQl,
    Rest,
}

/// Buildkite client bound to one API flavour.
pub struct BuildkiteFetcher {
    client: BuildkiteClient,
    source: ApiSource,
}

impl BuildkiteFetcher {
    pub fn new(client: BuildkiteClient, source: ApiSource) -> Self {
        Self { client, source }
    }
}

#[async_trait]
impl BuildFetcher for BuildkiteFetcher {
    async fn fetch(&self, slug: &BuildSlug) -> Result<Build> {
        match self.source {
            ApiSource::GraphQl => self.client.fetch_build_graphql(slug).await,
            ApiSource::Rest => self.client.fetch_build_rest(slug).await,
        }
    }
}
