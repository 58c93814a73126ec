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

//! The SMTP error classifier (§4.8): maps a transport failure or a server
//! reply to one of the closed `SmtpErrorKind` buckets the §3 verdict table
//! keys off, plus the provider-specific overlay substrings (§9 Open
//! Question: later entries win when more than one substring matches, since
//! they're checked in order from least to most specific).

use serde::{Deserialize, Serialize};

use super::connect::{ProtocolError, SmtpReply};
use super::error::SmtpError;
use crate::rules::ProviderTag;

/// The closed bucket an SMTP-level failure falls into (§3 "SmtpErrorKind").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SmtpErrorKind {
	Disabled,
	FullInbox,
	Invalid,
	CatchAll,
	RateLimited,
	Blocked,
	Transient,
	Unknown,
}

/// How serious a classified error is, coarser than [`SmtpErrorKind`] (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
	/// The target mailbox itself is confirmed bad/good; safe to trust.
	Definitive,
	/// The *server* refused to answer (rate limit, block, transient); the
	/// mailbox's real status is unknown.
	Inconclusive,
}

impl SmtpErrorKind {
	pub fn severity(self) -> Severity {
		match self {
			SmtpErrorKind::Disabled
			| SmtpErrorKind::FullInbox
			| SmtpErrorKind::Invalid
			| SmtpErrorKind::CatchAll => Severity::Definitive,
			SmtpErrorKind::RateLimited
			| SmtpErrorKind::Blocked
			| SmtpErrorKind::Transient
			| SmtpErrorKind::Unknown => Severity::Inconclusive,
		}
	}
}

/// Substrings that flag a specific, known server-side condition. Checked
/// in order; a later, more specific match overrides an earlier generic one
/// (§9).
const RATE_LIMITED_MARKERS: &[&str] = &[
	"rate limit",
	"too many requests",
	"421 too many",
	"try again later",
];
const BLOCKED_MARKERS: &[&str] = &[
	"blocked",
	"blacklisted",
	"spamhaus",
	"access denied",
	"reputation",
];
const FULL_INBOX_MARKERS: &[&str] = &["mailbox full", "quota exceeded", "over quota", "insufficient storage"];
const DISABLED_MARKERS: &[&str] = &["disabled", "suspended", "account inactive"];
const INVALID_MARKERS: &[&str] = &[
	"no such user",
	"user unknown",
	"does not exist",
	"invalid recipient",
	"mailbox unavailable",
	"recipient rejected",
];
const RDNS_MARKERS: &[&str] = &["reverse dns", "rdns", "ptr record", "fcrdns"];
const IP_BLACKLIST_MARKERS: &[&str] = &["blacklisted", "listed in", "spamhaus", "ip address.*blocked"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
	let haystack = haystack.to_lowercase();
	needles.iter().any(|n| haystack.contains(n))
}

/// Classify a completed `RCPT TO` reply into an [`SmtpErrorKind`] (§4.8).
/// A positive reply (`2xx`) is never passed here: that's a successful
/// verification, not an error.
pub fn classify_reply(reply: &SmtpReply) -> SmtpErrorKind {
	let message = reply.message();

	// Reply-code rules take priority over phrase matching (§4.8).
	match reply.code {
		550 | 551 | 553 => return SmtpErrorKind::Invalid,
		452 | 552 => return SmtpErrorKind::FullInbox,
		421 | 450 | 451 => return SmtpErrorKind::RateLimited,
		_ => {}
	}

	if reply.is_permanent_failure() {
		if contains_any(&message, INVALID_MARKERS) {
			return SmtpErrorKind::Invalid;
		}
		if contains_any(&message, DISABLED_MARKERS) {
			return SmtpErrorKind::Disabled;
		}
		if contains_any(&message, BLOCKED_MARKERS) {
			return SmtpErrorKind::Blocked;
		}
		if contains_any(&message, FULL_INBOX_MARKERS) {
			return SmtpErrorKind::FullInbox;
		}
		return SmtpErrorKind::Invalid;
	}

	if reply.is_transient_failure() {
		if contains_any(&message, RATE_LIMITED_MARKERS) {
			return SmtpErrorKind::RateLimited;
		}
		if contains_any(&message, BLOCKED_MARKERS) {
			return SmtpErrorKind::Blocked;
		}
		if contains_any(&message, FULL_INBOX_MARKERS) {
			return SmtpErrorKind::FullInbox;
		}
		return SmtpErrorKind::Transient;
	}

	SmtpErrorKind::Unknown
}

/// Classify a transport-level (non-reply) failure, carrying forward the
/// inconclusive-by-default posture of anything that isn't a clean server
/// reply (§3: "a transport error never proves non-existence").
pub fn classify_protocol_error(error: &ProtocolError) -> SmtpErrorKind {
	match error {
		ProtocolError::Timeout => SmtpErrorKind::Transient,
		ProtocolError::UnexpectedReply { message, .. } if contains_any(message, BLOCKED_MARKERS) => SmtpErrorKind::Blocked,
		ProtocolError::UnexpectedReply { message, .. } if contains_any(message, RATE_LIMITED_MARKERS) => {
			SmtpErrorKind::RateLimited
		}
		_ => SmtpErrorKind::Unknown,
	}
}

/// Optional provider-specific overlay note, layered on top of the generic
/// kind once a [`ProviderTag`] is known (§4.9's side-channel results feed
/// back in here too).
pub fn overlay_note(kind: SmtpErrorKind, provider: ProviderTag) -> Option<&'static str> {
	match (kind, provider) {
		(SmtpErrorKind::Blocked, ProviderTag::Gmail) => {
			Some("Gmail often blocks unfamiliar sending IPs outright; this is not proof the mailbox is invalid")
		}
		(SmtpErrorKind::RateLimited, ProviderTag::Yahoo) => {
			Some("Yahoo throttles aggressively per sending IP; retry with backoff or a different egress")
		}
		(SmtpErrorKind::Unknown, ProviderTag::HotmailB2B) | (SmtpErrorKind::Unknown, ProviderTag::HotmailB2C) => {
			Some("Outlook/Exchange Online frequently returns ambiguous 250s for unknown recipients (catch-all-like behavior)")
		}
		_ => None,
	}
}

/// Does `error` indicate the connecting IP is blacklisted by the remote
/// server? Used by [`SmtpError::get_description`].
pub fn is_err_ip_blacklisted(error: &SmtpError) -> bool {
	match error {
		SmtpError::ProtocolError(ProtocolError::UnexpectedReply { message, .. }) => {
			contains_any(message, IP_BLACKLIST_MARKERS)
		}
		_ => false,
	}
}

/// Does `error` indicate the remote server demands a reverse-DNS entry for
/// the connecting IP? Used by [`SmtpError::get_description`].
pub fn is_err_needs_rdns(error: &SmtpError) -> bool {
	match error {
		SmtpError::ProtocolError(ProtocolError::UnexpectedReply { message, .. }) => contains_any(message, RDNS_MARKERS),
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn reply(code: u16, message: &str) -> SmtpReply {
		SmtpReply { code, lines: vec![message.to_string()] }
	}

	#[test]
	fn invalid_recipient_is_classified_invalid() {
		let r = reply(550, "5.1.1 No such user here");
		assert_eq!(classify_reply(&r), SmtpErrorKind::Invalid);
		assert_eq!(classify_reply(&r).severity(), Severity::Definitive);
	}

	#[test]
	fn full_inbox_beats_generic_permanent_failure() {
		let r = reply(552, "5.2.2 Mailbox full, quota exceeded");
		assert_eq!(classify_reply(&r), SmtpErrorKind::FullInbox);
	}

	#[test]
	fn rate_limited_transient() {
		let r = reply(450, "4.7.0 Too many requests, try again later");
		assert_eq!(classify_reply(&r), SmtpErrorKind::RateLimited);
		assert_eq!(classify_reply(&r).severity(), Severity::Inconclusive);
	}

	#[test]
	fn timeout_is_transient() {
		assert_eq!(classify_protocol_error(&ProtocolError::Timeout), SmtpErrorKind::Transient);
	}

	#[test]
	fn ip_blacklist_detection() {
		let err = SmtpError::from(ProtocolError::UnexpectedReply {
			code: 550,
			message: "Your IP is blacklisted, see spamhaus.org".to_string(),
		});
		assert!(is_err_ip_blacklisted(&err));
		assert!(!is_err_needs_rdns(&err));
	}

	#[test]
	fn rdns_detection() {
		let err = SmtpError::from(ProtocolError::UnexpectedReply {
			code: 550,
			message: "Client host rejected: cannot find your reverse dns".to_string(),
		});
		assert!(is_err_needs_rdns(&err));
	}
}
