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

//! The cache fabric (§4.1): a uniform, per-namespace key/value store in
//! front of every expensive step of verification. Backends are pluggable;
//! callers never see a backend-specific error — a failed read is a miss,
//! a failed write is dropped after a debug log.

pub mod lru;
#[cfg(feature = "remote-cache")]
pub mod remote;

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

pub use lru::InProcessCache;
#[cfg(feature = "remote-cache")]
pub use remote::RedisCache;

/// One of the typed namespaces listed in §4.1's table. Each has its own
/// default TTL; namespaces never share keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
	/// lowercased domain -> ordered list of MX hosts.
	Mx,
	/// lowercased domain -> boolean with metadata.
	Disposable,
	/// lowercased domain -> boolean with metadata.
	Free,
	/// lowercased domain -> boolean.
	DomainValid,
	/// `domain|mxHost|local` fingerprint -> SmtpOutcome.
	Smtp,
	/// mxHost -> winning port.
	SmtpPort,
	/// domain -> suggested correction or null.
	DomainSuggestion,
	/// registrable domain -> parsed WHOIS record.
	Whois,
}

impl Namespace {
	/// Default TTL per §4.1's table.
	pub fn default_ttl(self) -> Duration {
		match self {
			Namespace::Mx => Duration::from_secs(60 * 60),
			Namespace::Disposable => Duration::from_secs(24 * 60 * 60),
			Namespace::Free => Duration::from_secs(24 * 60 * 60),
			Namespace::DomainValid => Duration::from_secs(24 * 60 * 60),
			Namespace::Smtp => Duration::from_secs(30 * 60),
			Namespace::SmtpPort => Duration::from_secs(60 * 60),
			Namespace::DomainSuggestion => Duration::from_secs(24 * 60 * 60),
			Namespace::Whois => Duration::from_secs(60 * 60),
		}
	}

	/// Stable string key prefix, used by backends (like Redis) whose keys
	/// must be stable across process restarts (Design Note: "Cache key
	/// shapes ... recommend lowercased components joined by a reserved
	/// separator").
	pub fn prefix(self) -> &'static str {
		match self {
			Namespace::Mx => "mx",
			Namespace::Disposable => "disposable",
			Namespace::Free => "free",
			Namespace::DomainValid => "domain_valid",
			Namespace::Smtp => "smtp",
			Namespace::SmtpPort => "smtp_port",
			Namespace::DomainSuggestion => "domain_suggestion",
			Namespace::Whois => "whois",
		}
	}
}

/// A namespaced, TTL-capable, safe-for-concurrent-callers key/value store.
///
/// Implementations must never propagate backend errors to callers: per
/// §4.1, a failed read is a miss and a failed write is dropped (after a
/// debug-level log). This is why `get_raw`/`set_raw`/`delete`/`has` don't
/// return `Result` — there's nothing for a caller to recover from.
///
/// Kept deliberately free of generic methods so `dyn Cache` stays a valid
/// trait object; the typed `get`/`set` helpers callers actually use live
/// on [`CacheExt`] instead, which any `Cache` (including `dyn Cache`) gets
/// for free via its blanket impl below.
#[async_trait]
pub trait Cache: Send + Sync {
	async fn get_raw(&self, ns: Namespace, key: &str) -> Option<Vec<u8>>;
	async fn set_raw(&self, ns: Namespace, key: &str, value: Vec<u8>, ttl: Option<Duration>);
	async fn delete(&self, ns: Namespace, key: &str) -> bool;
	async fn has(&self, ns: Namespace, key: &str) -> bool;
	async fn clear(&self);
}

/// Typed helpers over [`Cache`], usable on any `&dyn Cache` or concrete
/// cache type alike (blanket-implemented below).
#[async_trait]
pub trait CacheExt: Cache {
	/// Typed get: deserializes the stored JSON. A deserialization failure
	/// (e.g. a stale schema) is treated exactly like a miss.
	async fn get<T: DeserializeOwned + Send>(&self, ns: Namespace, key: &str) -> Option<T> {
		let raw = self.get_raw(ns, key).await?;
		match serde_json::from_slice(&raw) {
			Ok(value) => Some(value),
			Err(err) => {
				tracing::debug!(target: crate::LOG_TARGET, ?err, "cache value failed to deserialize, treating as miss");
				None
			}
		}
	}

	/// Typed set with the namespace's default TTL.
	async fn set<T: Serialize + Send + Sync>(&self, ns: Namespace, key: &str, value: &T) {
		self.set_with_ttl(ns, key, value, ns.default_ttl()).await
	}

	/// Typed set with an explicit per-entry TTL override.
	async fn set_with_ttl<T: Serialize + Send + Sync>(
		&self,
		ns: Namespace,
		key: &str,
		value: &T,
		ttl: Duration,
	) {
		match serde_json::to_vec(value) {
			Ok(raw) => self.set_raw(ns, key, raw, Some(ttl)).await,
			Err(err) => {
				tracing::debug!(target: crate::LOG_TARGET, ?err, "cache value failed to serialize, dropping write");
			}
		}
	}
}

impl<C: Cache + ?Sized> CacheExt for C {}

/// Lowercased-components-joined-by-`|` cache key shape, used for the
/// `smtp` namespace's `domain|mxHost|local` fingerprint (§4.1).
pub fn smtp_fingerprint(domain: &str, mx_host: &str, local: &str) -> String {
	format!(
		"{}|{}|{}",
		domain.to_lowercase(),
		mx_host.to_lowercase(),
		local.to_lowercase()
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;

	#[tokio::test]
	async fn round_trip_and_delete() {
		let cache: Arc<dyn Cache> = Arc::new(InProcessCache::new());
		cache.set(Namespace::Mx, "example.com", &vec!["mx1.example.com".to_string()]).await;
		let got: Option<Vec<String>> = cache.get(Namespace::Mx, "example.com").await;
		assert_eq!(got, Some(vec!["mx1.example.com".to_string()]));

		assert!(cache.delete(Namespace::Mx, "example.com").await);
		let got: Option<Vec<String>> = cache.get(Namespace::Mx, "example.com").await;
		assert_eq!(got, None);
	}

	#[tokio::test]
	async fn namespaces_do_not_collide() {
		let cache: Arc<dyn Cache> = Arc::new(InProcessCache::new());
		cache.set(Namespace::Disposable, "x.com", &true).await;
		let got: Option<bool> = cache.get(Namespace::Free, "x.com").await;
		assert_eq!(got, None);
	}
}
