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

//! The default in-process cache backend: one bounded, per-namespace
//! [`moka`] LRU, each with its own TTL. This is the "construction-time
//! decision, orthogonal to all other components" backend of §4.1.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use super::{Cache, Namespace};

/// Default max entries per namespace. Tunable per instance via
/// [`InProcessCache::with_capacity`].
const DEFAULT_CAPACITY: u64 = 10_000;

/// A process-local cache. Multiple instances may coexist without
/// interfering (§5 "There is no global singleton requirement").
pub struct InProcessCache {
	mx: MokaCache<String, Vec<u8>>,
	disposable: MokaCache<String, Vec<u8>>,
	free: MokaCache<String, Vec<u8>>,
	domain_valid: MokaCache<String, Vec<u8>>,
	smtp: MokaCache<String, Vec<u8>>,
	smtp_port: MokaCache<String, Vec<u8>>,
	domain_suggestion: MokaCache<String, Vec<u8>>,
	whois: MokaCache<String, Vec<u8>>,
}

fn build(capacity: u64, ttl: Duration) -> MokaCache<String, Vec<u8>> {
	MokaCache::builder()
		.max_capacity(capacity)
		.time_to_live(ttl)
		.build()
}

impl InProcessCache {
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_CAPACITY)
	}

	pub fn with_capacity(capacity: u64) -> Self {
		InProcessCache {
			mx: build(capacity, Namespace::Mx.default_ttl()),
			disposable: build(capacity, Namespace::Disposable.default_ttl()),
			free: build(capacity, Namespace::Free.default_ttl()),
			domain_valid: build(capacity, Namespace::DomainValid.default_ttl()),
			smtp: build(capacity, Namespace::Smtp.default_ttl()),
			smtp_port: build(capacity, Namespace::SmtpPort.default_ttl()),
			domain_suggestion: build(capacity, Namespace::DomainSuggestion.default_ttl()),
			whois: build(capacity, Namespace::Whois.default_ttl()),
		}
	}

	fn table(&self, ns: Namespace) -> &MokaCache<String, Vec<u8>> {
		match ns {
			Namespace::Mx => &self.mx,
			Namespace::Disposable => &self.disposable,
			Namespace::Free => &self.free,
			Namespace::DomainValid => &self.domain_valid,
			Namespace::Smtp => &self.smtp,
			Namespace::SmtpPort => &self.smtp_port,
			Namespace::DomainSuggestion => &self.domain_suggestion,
			Namespace::Whois => &self.whois,
		}
	}
}

impl Default for InProcessCache {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl Cache for InProcessCache {
	async fn get_raw(&self, ns: Namespace, key: &str) -> Option<Vec<u8>> {
		// moka's own per-entry TTL (set at table-construction time) already
		// expires entries; a per-entry TTL override would need a sidecar
		// "inserted_at" wrapper, which namespaces needing it (none today)
		// can add without touching this trait.
		self.table(ns).get(key).await
	}

	async fn set_raw(&self, ns: Namespace, key: &str, value: Vec<u8>, _ttl: Option<Duration>) {
		self.table(ns).insert(key.to_string(), value).await;
	}

	async fn delete(&self, ns: Namespace, key: &str) -> bool {
		self.table(ns).remove(key).await.is_some()
	}

	async fn has(&self, ns: Namespace, key: &str) -> bool {
		self.table(ns).contains_key(key)
	}

	async fn clear(&self) {
		self.mx.invalidate_all();
		self.disposable.invalidate_all();
		self.free.invalidate_all();
		self.domain_valid.invalidate_all();
		self.smtp.invalidate_all();
		self.smtp_port.invalidate_all();
		self.domain_suggestion.invalidate_all();
		self.whois.invalidate_all();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn has_reports_presence() {
		let cache = InProcessCache::new();
		assert!(!cache.has(Namespace::Mx, "a.com").await);
		cache.set_raw(Namespace::Mx, "a.com", b"x".to_vec(), None).await;
		assert!(cache.has(Namespace::Mx, "a.com").await);
	}

	#[tokio::test]
	async fn clear_empties_every_namespace() {
		let cache = InProcessCache::new();
		cache.set_raw(Namespace::Mx, "a.com", b"x".to_vec(), None).await;
		cache.set_raw(Namespace::Free, "a.com", b"y".to_vec(), None).await;
		cache.clear().await;
		assert!(!cache.has(Namespace::Mx, "a.com").await);
		assert!(!cache.has(Namespace::Free, "a.com").await);
	}
}
