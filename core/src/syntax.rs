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

//! RFC-5321-flavored syntax validation: trims, lowercases, and checks
//! `local@domain` against length and structural rules, without any I/O.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::suggest::{suggest_domain, DomainSuggestion};

/// Maximum length of the local part, per RFC 5321.
pub const MAX_LOCAL_LEN: usize = 64;
/// Maximum length of the domain, per RFC 5321.
pub const MAX_DOMAIN_LEN: usize = 253;

static LOCAL_RE: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+$").expect("valid regex. qed.")
});

static LABEL_RE: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("valid regex. qed.")
});

/// A syntactically valid, normalized email address (§3 "Address").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
	/// The address exactly as given by the caller.
	pub raw: String,
	/// `local + "@" + domain`, trimmed and lowercased.
	pub normalized: String,
	/// The local part (before `@`), lowercased.
	pub local: String,
	/// The domain part (after `@`), lowercased.
	pub domain: String,
}

/// Reasons a candidate address fails syntax validation (§4.2, §7 "Input").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyntaxError {
	/// The value handed to the validator wasn't textual to begin with.
	NotAString,
	/// Zero or more than one `@` was found.
	MissingAt,
	/// Local part exceeds [`MAX_LOCAL_LEN`].
	LocalTooLong,
	/// Domain exceeds [`MAX_DOMAIN_LEN`].
	DomainTooLong,
	/// Local part fails the structural grammar (or starts/ends with `.`, or
	/// contains `..`).
	BadLocal,
	/// Domain fails the label grammar.
	BadDomain,
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntaxResult {
	/// Whether the address passed validation.
	pub is_valid_syntax: bool,
	/// Present when `is_valid_syntax` is true.
	pub address: Option<Address>,
	/// Present when `is_valid_syntax` is false.
	pub error: Option<SyntaxError>,
	/// A suggested fix for a likely-mistyped domain (e.g. `gmial.com` ->
	/// `gmail.com`). Only populated when verification continues past
	/// syntax (see [`crate::syntax::get_similar_mail_provider`]).
	pub suggestion: Option<DomainSuggestion>,
}

impl SyntaxResult {
	fn invalid(error: SyntaxError) -> Self {
		SyntaxResult {
			is_valid_syntax: false,
			address: None,
			error: Some(error),
			suggestion: None,
		}
	}
}

/// Validate an email address per §4.2. Pure, synchronous, no I/O — cheap
/// enough to run in a hot loop.
pub fn validate(input: &str) -> SyntaxResult {
	let trimmed = input.trim().to_lowercase();

	let at_count = trimmed.matches('@').count();
	if at_count != 1 {
		return SyntaxResult::invalid(SyntaxError::MissingAt);
	}

	// `at_count == 1`, so this split is unambiguous; `rsplit_once` and
	// `split_once` agree here, but we use rsplit to mirror "split at the
	// last @" from the design even though there's only one.
	let (local, domain) = trimmed
		.rsplit_once('@')
		.expect("exactly one '@' checked above. qed.");

	if local.is_empty() || domain.is_empty() {
		return SyntaxResult::invalid(if local.is_empty() {
			SyntaxError::BadLocal
		} else {
			SyntaxError::BadDomain
		});
	}

	if local.len() > MAX_LOCAL_LEN {
		return SyntaxResult::invalid(SyntaxError::LocalTooLong);
	}
	if domain.len() > MAX_DOMAIN_LEN {
		return SyntaxResult::invalid(SyntaxError::DomainTooLong);
	}

	if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
		return SyntaxResult::invalid(SyntaxError::BadLocal);
	}
	if !LOCAL_RE.is_match(local) {
		return SyntaxResult::invalid(SyntaxError::BadLocal);
	}

	if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
		return SyntaxResult::invalid(SyntaxError::BadDomain);
	}
	for label in domain.split('.') {
		if label.is_empty() || label.len() > 63 || !LABEL_RE.is_match(label) {
			return SyntaxResult::invalid(SyntaxError::BadDomain);
		}
	}

	SyntaxResult {
		is_valid_syntax: true,
		address: Some(Address {
			raw: input.to_string(),
			normalized: format!("{}@{}", local, domain),
			local: local.to_string(),
			domain: domain.to_string(),
		}),
		error: None,
		suggestion: None,
	}
}

/// Boundary entry point for dynamically-typed callers (e.g. a JSON API)
/// where the "email" field may not be a string at all. §4.2: "the
/// validator must reject non-string inputs with `kind=NotAString`".
pub fn validate_value(input: &serde_json::Value) -> SyntaxResult {
	match input.as_str() {
		Some(s) => validate(s),
		None => SyntaxResult::invalid(SyntaxError::NotAString),
	}
}

/// Populate `result.suggestion` with a domain-typo suggestion, if any. Only
/// meaningful to call once verification has moved past syntax (mirrors the
/// teacher's `get_similar_mail_provider`, invoked on the MX/SMTP failure
/// paths so a successful, fast verification never pays for it).
pub fn get_similar_mail_provider(result: &mut SyntaxResult) {
	if let Some(address) = &result.address {
		result.suggestion = suggest_domain(&address.domain);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepts_simple_address() {
		let r = validate("user@gmail.com");
		assert!(r.is_valid_syntax);
		let a = r.address.unwrap();
		assert_eq!(a.local, "user");
		assert_eq!(a.domain, "gmail.com");
		assert_eq!(a.normalized, "user@gmail.com");
	}

	#[test]
	fn lowercases_and_trims() {
		let r = validate("  UPPER@Example.COM  ");
		assert!(r.is_valid_syntax);
		let a = r.address.unwrap();
		assert_eq!(a.normalized, "upper@example.com");
		assert_eq!(a.local, "upper");
		assert_eq!(a.domain, "example.com");
	}

	#[test]
	fn rejects_missing_at() {
		let r = validate("not-an-email");
		assert!(!r.is_valid_syntax);
		assert_eq!(r.error, Some(SyntaxError::MissingAt));
	}

	#[test]
	fn rejects_multiple_at() {
		let r = validate("a@b@c.com");
		assert_eq!(r.error, Some(SyntaxError::MissingAt));
	}

	#[test]
	fn rejects_local_too_long() {
		let local = "a".repeat(65);
		let r = validate(&format!("{}@x.com", local));
		assert_eq!(r.error, Some(SyntaxError::LocalTooLong));
	}

	#[test]
	fn rejects_domain_too_long() {
		let domain = format!("{}.com", "a".repeat(254));
		let r = validate(&format!("user@{}", domain));
		assert_eq!(r.error, Some(SyntaxError::DomainTooLong));
	}

	#[test]
	fn rejects_leading_dot_local() {
		assert_eq!(validate(".user@x.com").error, Some(SyntaxError::BadLocal));
	}

	#[test]
	fn rejects_trailing_dot_local() {
		assert_eq!(validate("user.@x.com").error, Some(SyntaxError::BadLocal));
	}

	#[test]
	fn rejects_double_dot_local() {
		assert_eq!(validate("us..er@x.com").error, Some(SyntaxError::BadLocal));
	}

	#[test]
	fn rejects_unicode_local() {
		assert_eq!(validate("usér@x.com").error, Some(SyntaxError::BadLocal));
	}

	#[test]
	fn accepts_punycode_domain() {
		let r = validate("user@xn--nxasmq6b.com");
		assert!(r.is_valid_syntax);
	}

	#[test]
	fn rejects_bad_domain_label() {
		assert_eq!(
			validate("user@-bad.com").error,
			Some(SyntaxError::BadDomain)
		);
		assert_eq!(
			validate("user@bad-.com").error,
			Some(SyntaxError::BadDomain)
		);
	}

	#[test]
	fn accepts_hyphenated_labels() {
		let r = validate("user@my-domain.example.com");
		assert!(r.is_valid_syntax);
	}

	#[test]
	fn rejects_non_string_value() {
		let r = validate_value(&serde_json::json!(42));
		assert_eq!(r.error, Some(SyntaxError::NotAString));
	}

	#[test]
	fn accepts_string_value() {
		let r = validate_value(&serde_json::json!("user@gmail.com"));
		assert!(r.is_valid_syntax);
	}
}
