use serde::{Deserialize, Serialize};

// GitHub GraphQL request/response structures
#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a, V> {
    pub query: &'a str,
    pub variables: V,
}

#[derive(Debug, Serialize)]
pub struct StargazersVariables<'a> {
    pub owner: &'a str,
    pub name: &'a str,
    pub after: Option<&'a str>,
    pub first: u32,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct StargazersData {
    pub repository: Option<RepositoryNode>,
    #[serde(rename = "rateLimit")]
    pub rate_limit: Option<RateLimitNode>,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryNode {
    pub stargazers: StargazerConnection,
}

#[derive(Debug, Deserialize)]
pub struct StargazerConnection {
    #[serde(default)]
    pub edges: Vec<StargazerEdge>,
}

#[derive(Debug, Deserialize)]
pub struct StargazerEdge {
    pub node: StargazerNode,
    pub cursor: String,
}

#[derive(Debug, Deserialize)]
pub struct StargazerNode {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct RateLimitNode {
    pub remaining: u32,
    #[serde(rename = "resetAt", default)]
    pub reset_at: Option<String>,
}

// GitHub REST /meta response, only the fields we read
#[derive(Debug, Deserialize)]
pub struct ApiMeta {
    #[serde(default)]
    pub hooks: Vec<String>,
}

// Webhook payload structures. Every field is optional so that missing data
// is reported as a validation error instead of a JSON error.
#[derive(Debug, Deserialize)]
pub struct StarEventPayload {
    pub action: Option<String>,
    pub repository: Option<WebhookRepository>,
    pub sender: Option<WebhookUser>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookRepository {
    pub name: Option<String>,
    pub full_name: Option<String>,
    pub owner: Option<WebhookUser>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookUser {
    pub login: Option<String>,
}
