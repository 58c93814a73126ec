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

//! The WHOIS collaborator (§1: "consumed as a `lookup(domain) → record`
//! function"): specified here only as an interface. The core depends on
//! it by abstract reference (§9); how a record is actually fetched
//! (network WHOIS client, RDAP, a cached provider) is outside this
//! crate's contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{Cache, CacheExt, Namespace};

/// A parsed WHOIS/RDAP record for a registrable domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhoisRecord {
	pub registrable_domain: String,
	pub registrar: Option<String>,
	pub created_at: Option<DateTime<Utc>>,
	pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum WhoisError {
	#[error("WHOIS lookup failed: {0}")]
	Lookup(String),
	#[error("no WHOIS record found for this domain")]
	NotFound,
}

/// An injectable WHOIS client, mirroring the [`crate::mx::MxClient`]
/// pattern so tests can substitute a deterministic stub.
#[async_trait]
pub trait WhoisClient: Send + Sync {
	async fn lookup(&self, registrable_domain: &str) -> Result<WhoisRecord, WhoisError>;
}

/// Resolve a WHOIS record for `registrable_domain`, cache-aside against
/// `Namespace::Whois` (§4.1).
pub async fn resolve(
	registrable_domain: &str,
	client: &dyn WhoisClient,
	cache: &dyn Cache,
) -> Result<WhoisRecord, WhoisError> {
	let domain = registrable_domain.to_lowercase();
	if let Some(cached) = cache.get::<WhoisRecord>(Namespace::Whois, &domain).await {
		return Ok(cached);
	}

	let record = client.lookup(&domain).await?;
	cache.set(Namespace::Whois, &domain, &record).await;
	Ok(record)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::InProcessCache;

	struct StubClient;

	#[async_trait]
	impl WhoisClient for StubClient {
		async fn lookup(&self, registrable_domain: &str) -> Result<WhoisRecord, WhoisError> {
			Ok(WhoisRecord {
				registrable_domain: registrable_domain.to_string(),
				registrar: Some("Example Registrar".to_string()),
				created_at: None,
				expires_at: None,
			})
		}
	}

	#[tokio::test]
	async fn resolves_and_caches() {
		let cache = InProcessCache::new();
		let record = resolve("example.com", &StubClient, &cache).await.unwrap();
		assert_eq!(record.registrable_domain, "example.com");
		assert!(cache.has(Namespace::Whois, "example.com").await);
	}
}
