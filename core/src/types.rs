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

//! Result types and the error taxonomy (§3, §7, C12): the shape every
//! `verify` call returns, regardless of which phases ran.

use serde::{Deserialize, Serialize};

use crate::misc::MiscFacts;
use crate::mx::MxLookup;
use crate::smtp::SmtpOutcome;
use crate::syntax::Address;

/// The overall reachability verdict (§3's decision table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reachability {
	Safe,
	Risky,
	Invalid,
	Unknown,
}

/// The full error taxonomy (§7), flattened into one enum so a
/// [`VerificationResult`] can carry a single `error_kind` regardless of
/// which phase produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
	// Input (§4.2)
	NotAString,
	MissingAt,
	LocalTooLong,
	DomainTooLong,
	BadLocal,
	BadDomain,
	// DNS (§4.3)
	MxTimeout,
	MxNotFound,
	MxNetwork,
	// Transport (§5)
	ConnectTimeout,
	ConnectRefused,
	ConnectReset,
	TlsFailure,
	ReadTimeout,
	WriteFailure,
	Cancelled,
	// SMTP semantic (§4.8)
	Disabled,
	Invalid,
	FullInbox,
	CatchAll,
	RateLimited,
	Blocked,
	UnknownReply,
	// Provider side-channel (§4.9)
	HttpProbeError,
	HeadlessScriptError,
	// Overall deadline exceeded (§4.10)
	Timeout,
}

/// The aggregate result of one `verify` call (§3 "VerificationResult").
/// Immutable once returned; created fresh per call and discarded after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
	pub address: Address,
	pub mx: Option<MxLookup>,
	pub smtp: Option<SmtpOutcome>,
	pub misc: Option<MiscFacts>,
	pub reachability: Reachability,
	pub duration_ms: u64,
	pub error_kind: Option<ErrorKind>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reachability_serializes_lowercase() {
		let json = serde_json::to_string(&Reachability::Safe).unwrap();
		assert_eq!(json, "\"safe\"");
	}
}
