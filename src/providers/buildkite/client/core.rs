use graphql_client::Response as GraphQLResponse;
use log::debug;
use reqwest::Client;
use url::Url;

use crate::auth::Token;
use crate::error::{CITraceError, Result};

pub(super) const DEFAULT_JOBS_PER_BUILD: usize = 500;

pub struct BuildkiteClient {
    pub client: Client,
    pub graphql_url: Url,
    pub rest_url: Url,
    pub token: Option<Token>,
    pub jobs_per_build: usize,
}

impl BuildkiteClient {
    pub fn new(graphql_url: &str, rest_url: &str, token: Option<Token>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("citrace/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CITraceError::Config(format!("Failed to create HTTP client: {e}")))?;

        let graphql_url = Url::parse(graphql_url)
            .map_err(|e| CITraceError::Config(format!("Invalid GraphQL URL: {e}")))?;

        // Relative joins drop the last path segment unless it ends in a slash
        let rest_url = if rest_url.ends_with('/') {
            rest_url.to_string()
        } else {
            format!("{rest_url}/")
        };
        let rest_url = Url::parse(&rest_url)
            .map_err(|e| CITraceError::Config(format!("Invalid REST URL: {e}")))?;

        Ok(Self {
            client,
            graphql_url,
            rest_url,
            token,
            jobs_per_build: DEFAULT_JOBS_PER_BUILD,
        })
    }

    #[must_use]
    pub fn with_jobs_per_build(mut self, jobs_per_build: usize) -> Self {
        self.jobs_per_build = jobs_per_build;
        self
    }

    pub fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    /// Execute a GraphQL request and return its data after checking for errors
    pub(super) async fn execute_graphql_request<T>(
        &self,
        request_body: &impl serde::Serialize,
    ) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        debug!("POST {}", self.graphql_url);

        let request = self.auth_request(
            self.client
                .post(self.graphql_url.clone())
                .json(request_body),
        );

        let response = Self::check_status(request.send().await?).await?;

        let response_body: GraphQLResponse<T> = response.json().await?;

        if let Some(errors) = response_body.errors {
            return Err(CITraceError::GraphQLError(
                errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            ));
        }

        response_body.data.ok_or(CITraceError::NoResponseData)
    }

    /// GET a REST resource relative to the REST base URL
    pub(super) async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        let url = self
            .rest_url
            .join(path)
            .map_err(|e| CITraceError::Config(format!("Invalid REST path {path}: {e}")))?;

        debug!("GET {url}");

        let response = Self::check_status(self.auth_request(self.client.get(url)).send().await?)
            .await?;

        Ok(response.json().await?)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        Err(CITraceError::ApiError {
            status: status.as_u16(),
            message,
        })
    }
}
