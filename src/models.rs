use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How long a stargazer entry lives without being refreshed (24 hours).
pub const STARGAZER_TTL_SECS: u64 = 24 * 60 * 60;

/// Value written for every stargazer key. Only presence matters.
pub const STARGAZER_SENTINEL: &str = "true";

/// Stargazer edges requested per GraphQL page.
pub const PAGE_SIZE: u32 = 100;

/// Extra wait added after a rate limit reset time.
pub const RATE_LIMIT_MARGIN: Duration = Duration::from_secs(1);

/// Time between full sweeps of every tracked repository.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// A tracked GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Storage key for the (repo, login) relation.
    pub fn key(&self, login: &str) -> String {
        format!("stargazers:{}/{}/{}", self.owner, self.name, login)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
                Ok(RepoRef::new(owner, name))
            }
            _ => Err(format!("Invalid repository name format: {} (expected owner/name)", s)),
        }
    }
}

/// A login that starred a repository, at a position in one fetch pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StargazerFact {
    pub login: String,
    /// Only meaningful within the pass that produced it.
    pub cursor: String,
}

/// Rate limit snapshot returned alongside every page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitState {
    pub remaining: u32,
    /// Whatever the server sent. Only interpreted when `remaining == 0`.
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimitState {
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// How long to suspend pagination, if the limit is exhausted and the
    /// reset lies in the future. Includes the safety margin.
    pub fn exhausted_wait(&self, now: DateTime<Utc>) -> Option<Duration> {
        if !self.is_exhausted() {
            return None;
        }
        let reset_at = self.reset_at?;
        let until_reset = (reset_at - now).to_std().ok()?;
        if until_reset.is_zero() {
            return None;
        }
        Some(until_reset + RATE_LIMIT_MARGIN)
    }
}
