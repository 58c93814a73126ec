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

//! The provider classifier (§4.4): maps an MX hostname, or as a fallback
//! the email's domain, to a closed set of provider tags that drive SMTP
//! tuning (§4.6) and side-channel selection (§4.9).
//!
//! `hotmailB2B` must be tested before `hotmailB2C`: both match
//! `*.protection.outlook.com`, and B2B is the more specific pattern.

use serde::{Deserialize, Serialize};

/// A closed enumeration of mail-provider families (§3 "ProviderTag").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderTag {
	Gmail,
	Yahoo,
	HotmailB2B,
	HotmailB2C,
	Proofpoint,
	Mimecast,
	EverythingElse,
}

const GMAIL_DOMAINS: &[&str] = &["gmail.com", "googlemail.com"];
const YAHOO_DOMAINS: &[&str] = &["yahoo.com", "ymail.com", "rocketmail.com"];
const HOTMAIL_DOMAINS: &[&str] = &["hotmail.com", "outlook.com", "live.com", "msn.com"];

fn ends_with_any(host: &str, suffixes: &[&str]) -> bool {
	suffixes.iter().any(|s| host.ends_with(s))
}

/// Is `host` a Gmail/Google Workspace exchanger?
pub fn is_gmail(host: &str) -> bool {
	let host = host.to_lowercase();
	host.ends_with("l.google.com")
		|| host == "gmail-smtp-in.l.google.com"
		|| host == "aspmx.l.google.com"
		|| ends_with_any(&host, &[".gmail.com", "googlemail.com", ".google.com"])
}

/// Is `host` a Yahoo exchanger (including ymail/rocketmail aliases)?
pub fn is_yahoo(host: &str) -> bool {
	let host = host.to_lowercase();
	static MTA_RE: once_cell::sync::Lazy<regex::Regex> =
		once_cell::sync::Lazy::new(|| regex::Regex::new(r"^mta\d+\.am0\.yahoodns\.net\.?$").expect("valid regex. qed."));

	MTA_RE.is_match(&host)
		|| host == "mx-eu.mail.am0.yahoodns.net."
		|| host == "mx-eu.mail.am0.yahoodns.net"
		|| ends_with_any(&host, &[".yahoo.com", ".ymail.com", ".rocketmail.com", "yahoodns.net"])
}

/// Is `host` an Exchange Online / Microsoft 365 *business* (B2B) exchanger?
/// Must be checked before [`is_hotmail_b2c`].
pub fn is_hotmail_b2b(host: &str) -> bool {
	let host = host.to_lowercase();
	static B2B_RE: once_cell::sync::Lazy<regex::Regex> = once_cell::sync::Lazy::new(|| {
		regex::Regex::new(r"^([a-z0-9-]+\.)?mail\.protection\.outlook\.com\.?$|^[a-z0-9-]+\.protection\.outlook\.com\.?$")
			.expect("valid regex. qed.")
	});
	B2B_RE.is_match(&host)
}

/// Is `host` a *consumer* (B2C) Hotmail/Outlook.com exchanger? Excludes
/// anything [`is_hotmail_b2b`] already matched.
pub fn is_hotmail_b2c(host: &str) -> bool {
	if is_hotmail_b2b(host) {
		return false;
	}
	let host = host.to_lowercase();
	matches!(
		host.trim_end_matches('.'),
		"hotmail-com.olc.protection.outlook.com"
			| "outlook-com.olc.protection.outlook.com"
			| "eur.olc.protection.outlook.com"
	)
}

/// Is `host` a Proofpoint-hosted exchanger?
pub fn is_proofpoint(host: &str) -> bool {
	let host = host.to_lowercase();
	host.contains("pphosted.com") || host.contains("ppe-hosted.com") || host.contains("proofpoint")
}

/// Is `host` a Mimecast-hosted exchanger?
pub fn is_mimecast(host: &str) -> bool {
	let host = host.to_lowercase();
	host.contains("smtp.mimecast.com") || host.contains("eu.mimecast.com") || host.contains("mimecast")
}

/// Classify a known-good MX hostname into a [`ProviderTag`] (§4.4). The
/// first matching family wins, in the normative order below.
pub fn classify_by_mx_host(host: &str) -> ProviderTag {
	if is_gmail(host) {
		ProviderTag::Gmail
	} else if is_yahoo(host) {
		ProviderTag::Yahoo
	} else if is_hotmail_b2b(host) {
		ProviderTag::HotmailB2B
	} else if is_hotmail_b2c(host) {
		ProviderTag::HotmailB2C
	} else if is_proofpoint(host) {
		ProviderTag::Proofpoint
	} else if is_mimecast(host) {
		ProviderTag::Mimecast
	} else {
		ProviderTag::EverythingElse
	}
}

/// Weaker fallback used only when no MX host is available at all: an
/// *exact* match against the small known-provider domain lists.
/// Subdomains never match (`mail.gmail.com` is `everythingElse`).
pub fn classify_by_domain(domain: &str) -> ProviderTag {
	let domain = domain.to_lowercase();
	let domain = domain.as_str();
	if GMAIL_DOMAINS.contains(&domain) {
		ProviderTag::Gmail
	} else if YAHOO_DOMAINS.contains(&domain) {
		ProviderTag::Yahoo
	} else if HOTMAIL_DOMAINS.contains(&domain) {
		// The domain-only fallback can't distinguish B2B from B2C; default
		// to the more common consumer case.
		ProviderTag::HotmailB2C
	} else {
		ProviderTag::EverythingElse
	}
}

/// Classify a provider from the winning MX host when available, falling
/// back to the domain-based classifier only when there is no MX host at
/// all (§4.4, §4.10 step 3).
pub fn classify(mx_host: Option<&str>, domain: &str) -> ProviderTag {
	match mx_host {
		Some(host) => classify_by_mx_host(host),
		None => classify_by_domain(domain),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn gmail_hosts() {
		assert_eq!(classify_by_mx_host("aspmx.l.google.com"), ProviderTag::Gmail);
		assert_eq!(classify_by_mx_host("alt1.gmail-smtp-in.l.google.com"), ProviderTag::Gmail);
		assert_eq!(classify_by_domain("mail.gmail.com"), ProviderTag::EverythingElse);
	}

	#[test]
	fn yahoo_hosts() {
		assert_eq!(classify_by_mx_host("mta7.am0.yahoodns.net"), ProviderTag::Yahoo);
		assert_eq!(classify_by_mx_host("mx-eu.mail.am0.yahoodns.net"), ProviderTag::Yahoo);
		assert_eq!(classify_by_mx_host("foo.ymail.com"), ProviderTag::Yahoo);
	}

	#[test]
	fn hotmail_b2b_wins_over_b2c_when_both_match() {
		// Both patterns can match a `*.protection.outlook.com` host; B2B
		// must win (§4.4, §8 "Provider tag precedence").
		let host = "contoso-com.mail.protection.outlook.com";
		assert!(is_hotmail_b2b(host));
		assert!(!is_hotmail_b2c(host));
		assert_eq!(classify_by_mx_host(host), ProviderTag::HotmailB2B);
	}

	#[test]
	fn hotmail_b2c_consumer_hosts() {
		assert_eq!(
			classify_by_mx_host("outlook-com.olc.protection.outlook.com"),
			ProviderTag::HotmailB2C
		);
		assert_eq!(
			classify_by_mx_host("eur.olc.protection.outlook.com"),
			ProviderTag::HotmailB2C
		);
	}

	#[test]
	fn proofpoint_and_mimecast() {
		assert_eq!(classify_by_mx_host("mx1-us1.ppe-hosted.com"), ProviderTag::Proofpoint);
		assert_eq!(classify_by_mx_host("some.pphosted.com"), ProviderTag::Proofpoint);
		assert_eq!(classify_by_mx_host("eu.mimecast.com"), ProviderTag::Mimecast);
	}

	#[test]
	fn domain_fallback_exact_match_only() {
		assert_eq!(classify_by_domain("gmail.com"), ProviderTag::Gmail);
		assert_eq!(classify_by_domain("yahoo.com"), ProviderTag::Yahoo);
		assert_eq!(classify_by_domain("outlook.com"), ProviderTag::HotmailB2C);
		assert_eq!(classify_by_domain("sub.gmail.com"), ProviderTag::EverythingElse);
	}

	#[test]
	fn classify_prefers_mx_host_over_domain() {
		assert_eq!(classify(Some("aspmx.l.google.com"), "example.com"), ProviderTag::Gmail);
		assert_eq!(classify(None, "gmail.com"), ProviderTag::Gmail);
		assert_eq!(classify(None, "example.com"), ProviderTag::EverythingElse);
	}

	#[test]
	fn tag_is_deterministic() {
		for _ in 0..5 {
			assert_eq!(classify_by_mx_host("aspmx.l.google.com"), ProviderTag::Gmail);
		}
	}
}
