// check-if-email-exists
// Copyright (C) 2018-2023 Reacher

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! The MX resolver (§4.3): DNS MX query with cache-aside, returning a
//! priority-sorted host list and a classified error on failure.

use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use serde::{Deserialize, Serialize};

use crate::cache::{Cache, CacheExt, Namespace};
use crate::LOG_TARGET;

/// One MX record: an exchanger host at a given priority (§3 "MXRecord").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MxRecord {
	/// FQDN of the mail exchanger, trailing dot allowed.
	pub host: String,
	/// Lower sorts first.
	pub priority: u16,
}

/// DNS-error classes distinguished per §4.3, feeding the §3 verdict table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MxErrorKind {
	/// The query did not complete before the caller's deadline.
	Timeout,
	/// The query completed but returned no MX records.
	NotFound,
	/// The query failed at the network/protocol level (refused,
	/// unreachable, SERVFAIL, ...).
	Network,
}

/// Outcome of an MX lookup (§3 "MXLookup"). `success` is true iff
/// `records` is non-empty iff `lowest_priority` is `Some`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MxLookup {
	pub success: bool,
	pub records: Vec<MxRecord>,
	pub lowest_priority: Option<MxRecord>,
	pub error_kind: Option<MxErrorKind>,
	pub raw_error: Option<String>,
}

impl MxLookup {
	fn ok(mut records: Vec<MxRecord>) -> Self {
		records.sort_by_key(|r| r.priority);
		let lowest_priority = records.first().cloned();
		MxLookup {
			success: !records.is_empty(),
			records,
			lowest_priority,
			error_kind: None,
			raw_error: None,
		}
	}

	fn err(kind: MxErrorKind, raw: impl std::fmt::Display) -> Self {
		MxLookup {
			success: false,
			records: Vec::new(),
			lowest_priority: None,
			error_kind: Some(kind),
			raw_error: Some(raw.to_string()),
		}
	}
}

/// An injectable DNS client, so tests can substitute a deterministic stub
/// (§8: "the DNS resolver ... [is] injected via interfaces").
#[async_trait]
pub trait MxClient: Send + Sync {
	async fn lookup_mx(&self, domain: &str, timeout: Duration) -> Result<Vec<MxRecord>, (MxErrorKind, String)>;
}

/// Production [`MxClient`] backed by `hickory-resolver`, using the
/// system/OS resolver configuration.
pub struct HickoryMxClient {
	resolver: TokioAsyncResolver,
}

impl HickoryMxClient {
	pub fn new() -> anyhow::Result<Self> {
		let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
		Ok(HickoryMxClient { resolver })
	}

	pub fn from_resolver(resolver: TokioAsyncResolver) -> Self {
		HickoryMxClient { resolver }
	}
}

#[async_trait]
impl MxClient for HickoryMxClient {
	async fn lookup_mx(
		&self,
		domain: &str,
		timeout: Duration,
	) -> Result<Vec<MxRecord>, (MxErrorKind, String)> {
		let fut = self.resolver.mx_lookup(domain);
		match tokio::time::timeout(timeout, fut).await {
			Err(_) => Err((MxErrorKind::Timeout, format!("MX lookup for {domain} timed out"))),
			Ok(Ok(lookup)) => {
				let records = lookup
					.iter()
					.map(|mx| MxRecord {
						host: mx.exchange().to_string(),
						priority: mx.preference(),
					})
					.collect::<Vec<_>>();
				if records.is_empty() {
					Err((MxErrorKind::NotFound, format!("no MX records for {domain}")))
				} else {
					Ok(records)
				}
			}
			Ok(Err(err)) => match err.kind() {
				ResolveErrorKind::NoRecordsFound { .. } => {
					Err((MxErrorKind::NotFound, err.to_string()))
				}
				ResolveErrorKind::Timeout => Err((MxErrorKind::Timeout, err.to_string())),
				_ => Err((MxErrorKind::Network, err.to_string())),
			},
		}
	}
}

/// Resolve MX records for `domain`, consulting the `mx` cache namespace
/// first (§4.3 "cache-aside"). Negative results and transport-class
/// errors are never cached (§4.1: "Never cache negative MX results; never
/// cache transport-class errors").
pub async fn resolve(
	domain: &str,
	client: &dyn MxClient,
	cache: &dyn Cache,
	timeout: Duration,
) -> MxLookup {
	let domain = domain.to_lowercase();

	if let Some(hosts) = cache.get::<Vec<String>>(Namespace::Mx, &domain).await {
		tracing::debug!(target: LOG_TARGET, %domain, "mx cache hit");
		// We only cache hosts (§4.3: "the orchestrator must not depend on
		// priority numeric values beyond ordering"), so reconstruct
		// synthetic, strictly-increasing priorities that preserve order.
		let records = hosts
			.into_iter()
			.enumerate()
			.map(|(i, host)| MxRecord {
				host,
				priority: i as u16,
			})
			.collect();
		return MxLookup::ok(records);
	}

	match client.lookup_mx(&domain, timeout).await {
		Ok(records) => {
			let hosts: Vec<String> = records.iter().map(|r| r.host.clone()).collect();
			cache.set(Namespace::Mx, &domain, &hosts).await;
			MxLookup::ok(records)
		}
		Err((kind, raw)) => MxLookup::err(kind, raw),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::InProcessCache;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	struct StubClient {
		calls: AtomicUsize,
		response: Result<Vec<MxRecord>, (MxErrorKind, String)>,
	}

	#[async_trait]
	impl MxClient for StubClient {
		async fn lookup_mx(
			&self,
			_domain: &str,
			_timeout: Duration,
		) -> Result<Vec<MxRecord>, (MxErrorKind, String)> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.response.clone()
		}
	}

	#[tokio::test]
	async fn success_sorts_by_priority() {
		let client = StubClient {
			calls: AtomicUsize::new(0),
			response: Ok(vec![
				MxRecord { host: "b.example.com".into(), priority: 20 },
				MxRecord { host: "a.example.com".into(), priority: 10 },
			]),
		};
		let cache = InProcessCache::new();
		let result = resolve("example.com", &client, &cache, Duration::from_secs(1)).await;
		assert!(result.success);
		assert_eq!(result.records[0].host, "a.example.com");
		assert_eq!(result.lowest_priority.unwrap().host, "a.example.com");
	}

	#[tokio::test]
	async fn caches_hosts_and_skips_second_dns_call() {
		let client = Arc::new(StubClient {
			calls: AtomicUsize::new(0),
			response: Ok(vec![MxRecord { host: "mx.example.com".into(), priority: 10 }]),
		});
		let cache = InProcessCache::new();
		let _ = resolve("example.com", client.as_ref(), &cache, Duration::from_secs(1)).await;
		let _ = resolve("example.com", client.as_ref(), &cache, Duration::from_secs(1)).await;
		assert_eq!(client.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn not_found_is_not_cached_and_reported() {
		let client = StubClient {
			calls: AtomicUsize::new(0),
			response: Err((MxErrorKind::NotFound, "no records".into())),
		};
		let cache = InProcessCache::new();
		let result = resolve("nonexistent-xyzzy-12345.example", &client, &cache, Duration::from_secs(1)).await;
		assert!(!result.success);
		assert_eq!(result.error_kind, Some(MxErrorKind::NotFound));
		assert!(!cache.has(Namespace::Mx, "nonexistent-xyzzy-12345.example").await);
	}

	#[tokio::test]
	async fn timeout_is_reported_as_timeout_kind() {
		let client = StubClient {
			calls: AtomicUsize::new(0),
			response: Err((MxErrorKind::Timeout, "timed out".into())),
		};
		let cache = InProcessCache::new();
		let result = resolve("slow.example", &client, &cache, Duration::from_millis(50)).await;
		assert_eq!(result.error_kind, Some(MxErrorKind::Timeout));
	}
}
