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

//! The misc classifier (§4.5): disposable/free-provider lookups, each
//! cache-fronted and run concurrently, plus the derived [`ProviderTag`].

use serde::{Deserialize, Serialize};

use crate::cache::{Cache, CacheExt, Namespace};
use crate::rules::{classify, ProviderTag};

/// Externally-provided disposable/free-domain datasets (§1: "consumed as
/// static `set<domain>` inputs"). Implementations just need to answer
/// domain membership; how the set is built (JSON file, embedded list,
/// remote feed) is outside this core's contract.
pub trait DomainSet: Send + Sync {
	fn contains(&self, domain: &str) -> bool;
}

/// Default disposable-domain set, backed by the `mailchecker` crate's
/// bundled dataset.
pub struct MailcheckerDisposableSet;

impl DomainSet for MailcheckerDisposableSet {
	fn contains(&self, domain: &str) -> bool {
		// `mailchecker::is_valid` treats a disposable domain's address as
		// invalid; we only care about the domain, so a throwaway local
		// part is fine.
		!mailchecker::is_valid(&format!("probe@{domain}"))
	}
}

/// A handful of domains known to offer free consumer email, standing in
/// for the larger externally-provided dataset (§1 Non-goals).
const FREE_DOMAINS: &[&str] = &[
	"gmail.com",
	"googlemail.com",
	"yahoo.com",
	"ymail.com",
	"rocketmail.com",
	"hotmail.com",
	"outlook.com",
	"live.com",
	"msn.com",
	"icloud.com",
	"me.com",
	"aol.com",
	"protonmail.com",
	"proton.me",
	"gmx.com",
	"gmx.net",
	"zoho.com",
	"yandex.com",
	"mail.com",
];

pub struct StaticFreeDomainSet;

impl DomainSet for StaticFreeDomainSet {
	fn contains(&self, domain: &str) -> bool {
		FREE_DOMAINS.contains(&domain.to_lowercase().as_str())
	}
}

/// Metadata about a domain, frozen for the duration of its cache TTL
/// (§3 "MiscFacts").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiscFacts {
	pub is_disposable: bool,
	pub is_free: bool,
	pub provider_tag: Option<ProviderTag>,
}

/// Extract the domain from either a bare domain or a full email address.
fn domain_of(input: &str) -> String {
	input
		.rsplit_once('@')
		.map(|(_, d)| d)
		.unwrap_or(input)
		.trim()
		.to_lowercase()
}

async fn is_disposable(domain: &str, set: &dyn DomainSet, cache: &dyn Cache) -> bool {
	if let Some(cached) = cache.get::<bool>(Namespace::Disposable, domain).await {
		return cached;
	}
	let result = set.contains(domain);
	cache.set(Namespace::Disposable, domain, &result).await;
	result
}

async fn is_free(domain: &str, set: &dyn DomainSet, cache: &dyn Cache) -> bool {
	if let Some(cached) = cache.get::<bool>(Namespace::Free, domain).await {
		return cached;
	}
	let result = set.contains(domain);
	cache.set(Namespace::Free, domain, &result).await;
	result
}

/// Classify `input` (a domain or an email address), consulting the cache
/// first for each of disposable/free, running both concurrently, and
/// deriving a domain-only [`ProviderTag`] fallback (§4.5). The caller's
/// orchestrator (§4.10) overrides `provider_tag` once an MX host is known.
pub async fn check_misc(
	input: &str,
	disposable_set: &dyn DomainSet,
	free_set: &dyn DomainSet,
	cache: &dyn Cache,
) -> MiscFacts {
	let domain = domain_of(input);

	// Run both lookups concurrently; an error in one never blocks the
	// other (§4.5) — in this design neither can actually error (the set
	// lookup is synchronous and the cache never propagates errors), so
	// `tokio::join!` just buys us the concurrency.
	let (disposable, free) = tokio::join!(
		is_disposable(&domain, disposable_set, cache),
		is_free(&domain, free_set, cache)
	);

	MiscFacts {
		is_disposable: disposable,
		is_free: free,
		provider_tag: Some(classify(None, &domain)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::InProcessCache;

	struct AllowSet;
	impl DomainSet for AllowSet {
		fn contains(&self, _domain: &str) -> bool {
			false
		}
	}

	struct DenySet;
	impl DomainSet for DenySet {
		fn contains(&self, _domain: &str) -> bool {
			true
		}
	}

	#[tokio::test]
	async fn extracts_domain_from_email() {
		let cache = InProcessCache::new();
		let facts = check_misc("user@gmail.com", &AllowSet, &StaticFreeDomainSet, &cache).await;
		assert!(!facts.is_disposable);
		assert!(facts.is_free);
		assert_eq!(facts.provider_tag, Some(ProviderTag::Gmail));
	}

	#[tokio::test]
	async fn disposable_set_drives_is_disposable() {
		let cache = InProcessCache::new();
		let facts = check_misc("user@mailinator.com", &DenySet, &StaticFreeDomainSet, &cache).await;
		assert!(facts.is_disposable);
	}

	#[tokio::test]
	async fn results_are_cached() {
		let cache = InProcessCache::new();
		let _ = check_misc("user@example.com", &DenySet, &AllowSet, &cache).await;
		let cached: Option<bool> = cache.get(Namespace::Disposable, "example.com").await;
		assert_eq!(cached, Some(true));
	}
}
