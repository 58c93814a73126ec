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

//! The out-of-process cache backend: a remote KV store (Redis), reached
//! over the network. Every operation can fail (the connection can drop,
//! the server can be unreachable); per §4.1 those failures are never
//! fatal, just logged and treated as a miss/dropped write.

use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};

use super::{Cache, Namespace};

/// A cache fronting a Redis (or Redis-compatible) server. Keys are
/// `{namespace_prefix}:{key}`, stable across process restarts as required
/// by the Design Notes when a persistent backend is used.
pub struct RedisCache {
	manager: ConnectionManager,
}

impl RedisCache {
	/// Connect to `redis_url` (e.g. `redis://127.0.0.1/`). The connection
	/// manager reconnects transparently on transient failures.
	pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
		let client = Client::open(redis_url)?;
		let manager = client.get_connection_manager().await?;
		Ok(RedisCache { manager })
	}

	fn key(ns: Namespace, key: &str) -> String {
		format!("{}:{}", ns.prefix(), key)
	}
}

#[async_trait]
impl Cache for RedisCache {
	async fn get_raw(&self, ns: Namespace, key: &str) -> Option<Vec<u8>> {
		let mut conn = self.manager.clone();
		match conn.get::<_, Option<Vec<u8>>>(Self::key(ns, key)).await {
			Ok(value) => value,
			Err(err) => {
				tracing::debug!(target: crate::LOG_TARGET, ?err, "redis cache read failed, treating as miss");
				None
			}
		}
	}

	async fn set_raw(&self, ns: Namespace, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
		let mut conn = self.manager.clone();
		let redis_key = Self::key(ns, key);
		let ttl = ttl.unwrap_or_else(|| ns.default_ttl());
		let result: Result<(), redis::RedisError> = conn
			.set_ex(redis_key, value, ttl.as_secs().max(1))
			.await;
		if let Err(err) = result {
			tracing::debug!(target: crate::LOG_TARGET, ?err, "redis cache write failed, dropping");
		}
	}

	async fn delete(&self, ns: Namespace, key: &str) -> bool {
		let mut conn = self.manager.clone();
		conn.del::<_, i64>(Self::key(ns, key)).await.unwrap_or(0) > 0
	}

	async fn has(&self, ns: Namespace, key: &str) -> bool {
		let mut conn = self.manager.clone();
		conn.exists::<_, bool>(Self::key(ns, key))
			.await
			.unwrap_or(false)
	}

	async fn clear(&self) {
		// Deliberately a no-op: a shared Redis instance may be fronting
		// other namespaces/tenants, and `FLUSHDB` is too blunt a hammer for
		// a library-level cache abstraction. Callers that need this should
		// talk to Redis directly.
		tracing::debug!(
			target: crate::LOG_TARGET,
			"RedisCache::clear() is a no-op; use redis-cli if you need a full flush"
		);
	}
}
