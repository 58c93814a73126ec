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

//! Domain-typo suggestion: a pure string-distance helper (§1 "Explicitly
//! out of scope" lists this as a pure helper; we still implement it since
//! it's cheap, has no I/O, and the orchestrator's `syntax` phase calls it
//! on failure paths).

use levenshtein::levenshtein;
use serde::{Deserialize, Serialize};

/// A handful of domains popular enough that a one- or two-character typo
/// against them is almost certainly a mistake. Stands in for the larger,
/// externally-provided popular-domains dataset (§1 Non-goals).
const POPULAR_DOMAINS: &[&str] = &[
	"gmail.com",
	"yahoo.com",
	"hotmail.com",
	"outlook.com",
	"live.com",
	"msn.com",
	"icloud.com",
	"aol.com",
	"protonmail.com",
	"zoho.com",
	"yandex.com",
	"gmx.com",
];

/// A suggested correction for a likely-mistyped domain, with a confidence
/// in `[0, 1]` derived from the edit distance relative to domain length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSuggestion {
	pub suggested: String,
	pub confidence: f32,
}

/// Suggest a popular-domain correction for `domain`, if the edit distance
/// to some popular domain is small relative to its length. Returns `None`
/// for an exact match (nothing to suggest) or when nothing is close enough.
pub fn suggest_domain(domain: &str) -> Option<DomainSuggestion> {
	if POPULAR_DOMAINS.contains(&domain) {
		return None;
	}

	POPULAR_DOMAINS
		.iter()
		.map(|candidate| (candidate, levenshtein(domain, candidate)))
		.filter(|(candidate, distance)| {
			// Typos worth flagging are small relative to the candidate's
			// length; a distance of 4 against "a.co" would be noise.
			*distance > 0 && *distance <= 2 && *distance < candidate.len()
		})
		.min_by_key(|(_, distance)| *distance)
		.map(|(candidate, distance)| DomainSuggestion {
			suggested: candidate.to_string(),
			confidence: 1.0 - (distance as f32 / candidate.len() as f32),
		})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn suggests_close_typo() {
		let s = suggest_domain("gmial.com").expect("should suggest");
		assert_eq!(s.suggested, "gmail.com");
		assert!(s.confidence > 0.5);
	}

	#[test]
	fn no_suggestion_for_exact_match() {
		assert!(suggest_domain("gmail.com").is_none());
	}

	#[test]
	fn no_suggestion_for_unrelated_domain() {
		assert!(suggest_domain("my-company-intranet.example").is_none());
	}
}
