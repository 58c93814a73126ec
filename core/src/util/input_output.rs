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

//! The caller-facing options struct (§6), built with `derive_builder` so
//! unknown fields are a compile-time error rather than a silently ignored
//! typo in a dynamically-shaped config object (§9).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use derive_builder::Builder;

use crate::cache::{Cache, InProcessCache};
use crate::smtp::verif_method::{HeadlessOptions, VerifMethod};
use crate::types::VerificationResult;

/// Per-call options recognized by [`crate::verify`] (§6's option table).
#[derive(Builder, Clone)]
#[builder(setter(into))]
pub struct VerifyOptions {
	/// The address to verify. Required.
	pub email_address: String,

	/// Overall deadline for the whole call (§4.10).
	#[builder(default = "Duration::from_millis(5_000)")]
	pub timeout: Duration,

	/// Run the MX resolver (C3).
	#[builder(default = "true")]
	pub verify_mx: bool,

	/// Run the SMTP state machine (C6).
	#[builder(default = "false")]
	pub verify_smtp: bool,

	/// Run the disposable-domain check (C5).
	#[builder(default = "true")]
	pub check_disposable: bool,

	/// Run the free-provider check (C5).
	#[builder(default = "true")]
	pub check_free: bool,

	/// Used in the `MAIL FROM:` command.
	#[builder(default = "\"test@example.com\".to_string()")]
	pub from_email: String,

	/// Used in the `EHLO` command.
	#[builder(default = "\"example.com\".to_string()")]
	pub hello_name: String,

	/// Apply the §4.6 per-provider tuning table.
	#[builder(default = "false")]
	pub enable_provider_optimizations: bool,

	/// Use the Yahoo HTTP registration-availability probe (§4.9).
	#[builder(default = "false")]
	pub use_yahoo_api: bool,

	/// Use the generic WebDriver recovery-flow runner for Yahoo (§4.9).
	#[builder(default = "false")]
	pub use_yahoo_headless: bool,

	/// WebDriver endpoint configuration, required if any headless
	/// side-channel is enabled.
	#[builder(default)]
	pub headless_options: Option<HeadlessOptions>,

	/// Proxy pool and per-provider verification-method selection.
	#[builder(default)]
	pub verif_method: VerifMethod,

	/// Cache fabric instance; defaults to a fresh in-process LRU, per §6
	/// "process default".
	#[builder(default = "Arc::new(InProcessCache::new())")]
	pub cache: Arc<dyn Cache>,

	/// Emit structured debug logs for this call.
	#[builder(default = "false")]
	pub debug: bool,
}

impl std::fmt::Debug for VerifyOptions {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("VerifyOptions")
			.field("email_address", &self.email_address)
			.field("timeout", &self.timeout)
			.field("verify_mx", &self.verify_mx)
			.field("verify_smtp", &self.verify_smtp)
			.field("check_disposable", &self.check_disposable)
			.field("check_free", &self.check_free)
			.field("enable_provider_optimizations", &self.enable_provider_optimizations)
			.field("use_yahoo_api", &self.use_yahoo_api)
			.field("use_yahoo_headless", &self.use_yahoo_headless)
			.field("debug", &self.debug)
			.finish()
	}
}

/// Options for [`crate::verify_batch`] (§4.11): a list of addresses plus a
/// bounded concurrency limit, sharing every other [`VerifyOptions`] field.
#[derive(Builder, Clone)]
#[builder(setter(into))]
pub struct BatchOptions {
	pub email_addresses: Vec<String>,

	/// Worker pool size; small by default (§4.11: "e.g., 5").
	#[builder(default = "5")]
	pub concurrency: usize,

	/// Template applied to every address in the batch (its own
	/// `email_address` field is ignored; each worker overrides it).
	pub template: VerifyOptions,
}

/// Aggregate counters over a batch run (§4.11).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct BatchSummary {
	pub total: usize,
	pub valid: usize,
	pub invalid: usize,
	pub errors: usize,
	pub duration_ms: u64,
}

/// Result of [`crate::verify_batch`]: exactly one entry per input address,
/// regardless of whether that address's verification errored (§8: "the
/// result map has exactly `|E|` entries").
#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchResult {
	pub results: HashMap<String, VerificationResult>,
	pub summary: BatchSummary,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builder_applies_defaults() {
		let options = VerifyOptionsBuilder::default()
			.email_address("user@example.com")
			.build()
			.unwrap();
		assert_eq!(options.from_email, "test@example.com");
		assert_eq!(options.hello_name, "example.com");
		assert!(options.verify_mx);
		assert!(!options.verify_smtp);
		assert_eq!(options.timeout, Duration::from_millis(5_000));
	}

	#[test]
	fn builder_requires_email_address() {
		let result = VerifyOptionsBuilder::default().build();
		assert!(result.is_err());
	}
}
