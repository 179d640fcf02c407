use crate::error::FetchError;
use crate::models::{RateLimitState, RepoRef, StargazerFact, PAGE_SIZE};
use crate::types::{
    ApiMeta, GraphQlRequest, GraphQlResponse, StargazersData, StargazersVariables,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const GRAPHQL_URL: &str = "https://api.github.com/graphql";
pub const API_BASE_URL: &str = "https://api.github.com";

const STARGAZERS_QUERY: &str = r#"
query($owner: String!, $name: String!, $after: String, $first: Int!) {
    repository(owner: $owner, name: $name) {
        stargazers(first: $first, after: $after) {
            edges {
                node {
                    login
                }
                cursor
            }
        }
    }
    rateLimit {
        remaining
        resetAt
    }
}"#;

/// One page of stargazers together with the rate limit snapshot from the
/// same response.
#[derive(Debug, Clone)]
pub struct StargazerPage {
    pub facts: Vec<StargazerFact>,
    pub rate_limit: RateLimitState,
}

/// Upstream that yields stargazers one cursor page at a time.
///
/// Implementations never retry; retry policy belongs to the caller.
#[async_trait]
pub trait StargazerSource: Send + Sync {
    /// Fetches the page after `cursor`. An empty cursor means the first page.
    async fn fetch_page(&self, repo: &RepoRef, cursor: &str) -> Result<StargazerPage, FetchError>;
}

pub struct GitHubClient {
    client: Client,
    token: Option<String>,
    graphql_url: Url,
    api_url: Url,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self, FetchError> {
        Self::with_endpoints(token, Url::parse(GRAPHQL_URL)?, Url::parse(API_BASE_URL)?)
    }

    /// Client pointed at alternative endpoints, e.g. GitHub Enterprise or a test server.
    pub fn with_endpoints(
        token: Option<String>,
        graphql_url: Url,
        api_url: Url,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("starquery-server/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(GitHubClient {
            client,
            token: token.filter(|t| !t.is_empty()),
            graphql_url,
            api_url,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check_status(response: Response) -> Result<Response, FetchError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(FetchError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Fetch a page of stargazers for a repository, plus the current rate limit.
    pub async fn fetch_stargazers_page(
        &self,
        repo: &RepoRef,
        cursor: &str,
    ) -> Result<StargazerPage, FetchError> {
        let request = GraphQlRequest {
            query: STARGAZERS_QUERY,
            variables: StargazersVariables {
                owner: &repo.owner,
                name: &repo.name,
                after: if cursor.is_empty() { None } else { Some(cursor) },
                first: PAGE_SIZE,
            },
        };

        let response = self
            .authorize(self.client.post(self.graphql_url.clone()))
            .json(&request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let body = response.bytes().await?;

        let page = parse_stargazers_response(repo, &body)?;
        debug!(
            repo = %repo,
            count = page.facts.len(),
            rate_limit_remaining = page.rate_limit.remaining,
            "Fetched stargazer page"
        );
        Ok(page)
    }

    /// CIDR blocks GitHub delivers webhooks from, per the REST meta endpoint.
    pub async fn fetch_hook_cidrs(&self) -> Result<Vec<String>, FetchError> {
        let url = self.api_url.join("meta")?;
        let response = self
            .authorize(self.client.get(url))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let body = response.bytes().await?;
        let meta: ApiMeta = serde_json::from_slice(&body)?;
        Ok(meta.hooks)
    }
}

#[async_trait]
impl StargazerSource for GitHubClient {
    async fn fetch_page(&self, repo: &RepoRef, cursor: &str) -> Result<StargazerPage, FetchError> {
        self.fetch_stargazers_page(repo, cursor).await
    }
}

/// Converts a raw GraphQL response body into an ordered page of facts.
pub fn parse_stargazers_response(repo: &RepoRef, body: &[u8]) -> Result<StargazerPage, FetchError> {
    let response: GraphQlResponse<StargazersData> = serde_json::from_slice(body)?;

    let data = match response.data {
        Some(data) => data,
        None if !response.errors.is_empty() => {
            let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(FetchError::GraphQl(messages.join("; ")));
        }
        None => return Err(FetchError::MalformedResponse("missing data")),
    };

    let rate_limit = data
        .rate_limit
        .ok_or(FetchError::MalformedResponse("missing rateLimit"))?;

    let reset_at = parse_reset_at(rate_limit.remaining, rate_limit.reset_at.as_deref())?;

    let repository = match data.repository {
        Some(repository) => repository,
        None if !response.errors.is_empty() => {
            let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(FetchError::GraphQl(messages.join("; ")));
        }
        None => return Err(FetchError::RepositoryNotFound(repo.to_string())),
    };

    let facts = repository
        .stargazers
        .edges
        .into_iter()
        .map(|edge| StargazerFact {
            login: edge.node.login,
            cursor: edge.cursor,
        })
        .collect();

    Ok(StargazerPage {
        facts,
        rate_limit: RateLimitState {
            remaining: rate_limit.remaining,
            reset_at,
        },
    })
}

/// The reset time must parse when the budget is exhausted. Otherwise it is
/// passed through on a best-effort basis.
fn parse_reset_at(remaining: u32, value: Option<&str>) -> Result<Option<DateTime<Utc>>, FetchError> {
    let value = value.unwrap_or_default();
    match DateTime::parse_from_rfc3339(value) {
        Ok(parsed) => Ok(Some(parsed.with_timezone(&Utc))),
        Err(source) if remaining == 0 => Err(FetchError::ResetTime {
            value: value.to_string(),
            source,
        }),
        Err(_) => Ok(None),
    }
}
