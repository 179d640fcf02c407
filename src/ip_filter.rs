//! Allow-list of the networks GitHub delivers webhooks from.
//!
//! The list comes from the REST `/meta` endpoint and is refreshed
//! periodically. Each refresh swaps in a new immutable snapshot; readers clone
//! the `Arc` out and match without holding the lock.

use async_trait::async_trait;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::FetchError;
use crate::github::GitHubClient;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);
const RETRY_MIN: Duration = Duration::from_secs(1);
const RETRY_MAX: Duration = Duration::from_secs(10);

/// An IPv4 or IPv6 network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    network: IpAddr,
    prefix: u8,
}

impl Cidr {
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.network, to_canonical(addr)) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = prefix_mask_u32(self.prefix);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = prefix_mask_u128(self.prefix);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

fn prefix_mask_u32(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn prefix_mask_u128(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

// IPv4-mapped IPv6 peers (::ffff:a.b.c.d) match IPv4 blocks.
fn to_canonical(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

impl FromStr for Cidr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| format!("missing prefix length in {:?}", s))?;
        let network: IpAddr = addr
            .parse()
            .map_err(|e| format!("invalid address in {:?}: {}", s, e))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|e| format!("invalid prefix length in {:?}: {}", s, e))?;
        let max = if network.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(format!("prefix length {} too long in {:?}", prefix, s));
        }
        Ok(Cidr { network, prefix })
    }
}

/// Source of hook CIDR strings.
#[async_trait]
pub trait HookNetworkSource: Send + Sync {
    async fn hook_cidrs(&self) -> Result<Vec<String>, FetchError>;
}

#[async_trait]
impl HookNetworkSource for GitHubClient {
    async fn hook_cidrs(&self) -> Result<Vec<String>, FetchError> {
        self.fetch_hook_cidrs().await
    }
}

pub struct IpFilter {
    source: Arc<dyn HookNetworkSource>,
    refresh_interval: Duration,
    nets: RwLock<Arc<Vec<Cidr>>>,
}

impl IpFilter {
    pub fn new(source: Arc<dyn HookNetworkSource>, refresh_interval: Duration) -> Self {
        Self {
            source,
            refresh_interval,
            nets: RwLock::new(Arc::new(Vec::new())),
        }
    }

    fn snapshot(&self) -> Arc<Vec<Cidr>> {
        match self.nets.read() {
            Ok(nets) => nets.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace(&self, nets: Vec<Cidr>) {
        let nets = Arc::new(nets);
        match self.nets.write() {
            Ok(mut guard) => *guard = nets,
            Err(poisoned) => *poisoned.into_inner() = nets,
        }
    }

    /// Whether `addr` lies in one of GitHub's hook networks. Nothing is
    /// allowed before the first successful refresh.
    pub fn is_allowed(&self, addr: IpAddr) -> bool {
        self.snapshot().iter().any(|net| net.contains(addr))
    }

    pub fn network_count(&self) -> usize {
        self.snapshot().len()
    }

    /// Fetches the hook networks once, retrying with backoff until it succeeds
    /// or `cancel` fires. Returns `false` when cancelled first.
    pub async fn refresh(&self, cancel: &CancellationToken) -> bool {
        let mut delay = RETRY_MIN;
        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => return false,
                result = self.source.hook_cidrs() => result,
            };

            match result {
                Ok(cidrs) => {
                    let nets: Vec<Cidr> = cidrs
                        .iter()
                        .filter_map(|hook| match hook.parse::<Cidr>() {
                            Ok(net) => Some(net),
                            Err(e) => {
                                error!(hook = %hook, error = %e, "Failed to parse hook CIDR");
                                None
                            }
                        })
                        .collect();
                    info!(count = nets.len(), "Refreshed GitHub hook networks");
                    self.replace(nets);
                    return true;
                }
                Err(e) => {
                    warn!(error = %e, retry_in = ?delay, "Failed to get API meta");
                    tokio::select! {
                        _ = cancel.cancelled() => return false,
                        _ = sleep(delay) => {}
                    }
                    delay = (delay * 2).min(RETRY_MAX);
                }
            }
        }
    }

    /// Refreshes immediately, then every `refresh_interval`, until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            if !self.refresh(&cancel).await {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(self.refresh_interval) => {}
            }
        }
        info!("IP filter refresher stopped");
    }
}

/// Middleware rejecting webhook deliveries from outside GitHub's hook networks.
pub async fn ip_filter_middleware(
    State(filter): State<Arc<IpFilter>>,
    req: Request,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    match peer {
        Some(ip) if filter.is_allowed(ip) => next.run(req).await,
        Some(ip) => {
            warn!(peer = %ip, "Rejected webhook from address outside GitHub hook networks");
            (StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
        None => {
            warn!("Rejected webhook without peer address");
            (StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticHooks(Vec<&'static str>);

    #[async_trait]
    impl HookNetworkSource for StaticHooks {
        async fn hook_cidrs(&self) -> Result<Vec<String>, FetchError> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    struct FlakyHooks {
        failures_left: AtomicUsize,
    }

    #[async_trait]
    impl HookNetworkSource for FlakyHooks {
        async fn hook_cidrs(&self) -> Result<Vec<String>, FetchError> {
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(FetchError::MalformedResponse("meta unavailable"));
            }
            Ok(vec!["10.0.0.0/8".to_string()])
        }
    }

    fn github_hooks() -> StaticHooks {
        StaticHooks(vec![
            "192.30.252.0/22",
            "185.199.108.0/22",
            "140.82.112.0/20",
            "143.55.64.0/20",
            "2a0a:a440::/29",
            "2606:50c0::/32",
            "not-a-cidr",
        ])
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn cidr_parsing() {
        assert!("192.30.252.0/22".parse::<Cidr>().is_ok());
        assert!("2606:50c0::/32".parse::<Cidr>().is_ok());
        assert!("192.30.252.0".parse::<Cidr>().is_err());
        assert!("192.30.252.0/33".parse::<Cidr>().is_err());
        assert!("oskasdfds/8".parse::<Cidr>().is_err());
    }

    #[test]
    fn cidr_matching() {
        let net: Cidr = "192.30.252.0/22".parse().unwrap();
        assert!(net.contains(ip("192.30.252.1")));
        assert!(net.contains(ip("192.30.255.255")));
        assert!(!net.contains(ip("192.30.248.1")));
        assert!(net.contains(ip("::ffff:192.30.252.7")));

        let any: Cidr = "0.0.0.0/0".parse().unwrap();
        assert!(any.contains(ip("1.1.1.1")));
        assert!(!any.contains(ip("2606:50c0::1")));
    }

    #[tokio::test]
    async fn allows_only_hook_networks_after_refresh() {
        let filter = IpFilter::new(Arc::new(github_hooks()), DEFAULT_REFRESH_INTERVAL);
        assert!(!filter.is_allowed(ip("192.30.252.1")));

        assert!(filter.refresh(&CancellationToken::new()).await);
        assert_eq!(filter.network_count(), 6);
        assert!(filter.is_allowed(ip("192.30.252.1")));
        assert!(filter.is_allowed(ip("2606:50c0::1")));
        assert!(!filter.is_allowed(ip("1.1.1.1")));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_retries_until_meta_succeeds() {
        let source = Arc::new(FlakyHooks {
            failures_left: AtomicUsize::new(3),
        });
        let filter = IpFilter::new(source.clone(), DEFAULT_REFRESH_INTERVAL);

        assert!(filter.refresh(&CancellationToken::new()).await);
        assert_eq!(source.failures_left.load(Ordering::SeqCst), 0);
        assert!(filter.is_allowed(ip("10.1.2.3")));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_stops_on_cancel() {
        let source = Arc::new(FlakyHooks {
            failures_left: AtomicUsize::new(usize::MAX),
        });
        let filter = IpFilter::new(source, DEFAULT_REFRESH_INTERVAL);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(30)).await;
            canceller.cancel();
        });

        assert!(!filter.refresh(&cancel).await);
        assert_eq!(filter.network_count(), 0);
    }
}
