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

//! Configuration types for the SMTP state machine (§4.6): per-provider
//! tuning, TLS policy, and the optional SOCKS5 proxy pool.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::rules::ProviderTag;

use super::outlook::microsoft365::GraphAppCredentials;

/// How to rotate through a pool of proxies (used by [`super::proxy_rotator::ProxyRotator`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProxyRotationStrategy {
	RoundRobin,
	Random,
}

/// A single SOCKS5 proxy the SMTP dialer may connect through (§6
/// "smtpOptions").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
	pub host: String,
	pub port: u16,
	pub username: Option<String>,
	pub password: Option<String>,
	pub timeout_ms: Option<u64>,
}

/// How the SMTP dialer applies TLS to the connection (§4.6 STARTTLS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsPolicy {
	/// Never attempt STARTTLS.
	None,
	/// Attempt STARTTLS when offered; on failure, fall back to plaintext
	/// for the same session (§4.6: "if the caller allows lenient TLS").
	Opportunistic,
	/// Attempt STARTTLS when offered; on failure, abort the session.
	Required,
}

impl Default for TlsPolicy {
	fn default() -> Self {
		TlsPolicy::Opportunistic
	}
}

/// How to verify a Gmail address beyond plain SMTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GmailVerifMethod {
	/// The generic SMTP state machine (§4.6), tuned per §4.6's table.
	Smtp,
	/// The generic WebDriver recovery-flow runner (§4.9), when a headless
	/// endpoint is configured.
	Headless,
}

impl Default for GmailVerifMethod {
	fn default() -> Self {
		GmailVerifMethod::Smtp
	}
}

/// How to verify a Yahoo address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YahooVerifMethod {
	Smtp,
	/// The §4.9 HTTP registration-availability probe.
	Api,
	/// The §4.9 WebDriver recovery-flow runner.
	Headless,
}

impl Default for YahooVerifMethod {
	fn default() -> Self {
		YahooVerifMethod::Smtp
	}
}

/// How to verify a Hotmail/Outlook (B2B or B2C) address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HotmailVerifMethod {
	Smtp,
	/// The supplemented Microsoft 365/Graph API probe (see SPEC_FULL.md).
	Microsoft365Api,
	Headless,
}

impl Default for HotmailVerifMethod {
	fn default() -> Self {
		HotmailVerifMethod::Smtp
	}
}

/// Endpoint configuration for the generic WebDriver runner (§4.9, §6
/// `headlessOptions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadlessOptions {
	/// e.g. `http://localhost:4444` (chromedriver recommended over
	/// geckodriver: it allows parallel sessions).
	pub webdriver_endpoint: String,
	pub navigation_timeout: Duration,
	pub screenshot_on_error: bool,
}

impl Default for HeadlessOptions {
	fn default() -> Self {
		HeadlessOptions {
			webdriver_endpoint: "http://localhost:4444".to_string(),
			navigation_timeout: Duration::from_secs(30),
			screenshot_on_error: false,
		}
	}
}

/// Per-call verification-method selection and proxy table (mirrors the
/// teacher's `VerifMethod`, gathered from `CheckEmailInput`/`ReacherConfig`
/// in the original).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifMethod {
	pub gmail: GmailVerifMethod,
	pub yahoo: YahooVerifMethod,
	pub hotmailb2b: HotmailVerifMethod,
	pub hotmailb2c: HotmailVerifMethod,
	pub proxies: HashMap<String, ProxyConfig>,
	pub proxy_rotation: ProxyRotationStrategy,
	/// Application credentials for the supplemented Microsoft 365/Graph
	/// side-channel (SPEC_FULL.md), required when `hotmailb2b`/`hotmailb2c`
	/// select [`HotmailVerifMethod::Microsoft365Api`]. Never serialized —
	/// it carries a client secret.
	#[serde(skip)]
	pub graph_credentials: Option<GraphAppCredentials>,
}

impl Default for ProxyRotationStrategy {
	fn default() -> Self {
		ProxyRotationStrategy::RoundRobin
	}
}

/// Per-provider SMTP tuning (§4.6's normative defaults table).
#[derive(Debug, Clone)]
pub struct ProviderTuning {
	pub ports: Vec<u16>,
	pub connect_timeout: Duration,
	pub retries: usize,
	pub attempt_starttls: bool,
}

/// Look up the normative tuning defaults for a provider tag.
pub fn tuning_for(tag: ProviderTag) -> ProviderTuning {
	match tag {
		ProviderTag::Gmail => ProviderTuning {
			ports: vec![587, 465, 25],
			connect_timeout: Duration::from_secs(15),
			retries: 1,
			attempt_starttls: true,
		},
		ProviderTag::Yahoo => ProviderTuning {
			ports: vec![587, 25],
			connect_timeout: Duration::from_secs(20),
			retries: 2,
			attempt_starttls: true,
		},
		ProviderTag::HotmailB2C | ProviderTag::HotmailB2B => ProviderTuning {
			ports: vec![587, 25],
			connect_timeout: Duration::from_secs(15),
			retries: 2,
			attempt_starttls: true,
		},
		ProviderTag::Proofpoint | ProviderTag::Mimecast => ProviderTuning {
			ports: vec![25, 587],
			connect_timeout: Duration::from_secs(20),
			retries: 2,
			attempt_starttls: true,
		},
		ProviderTag::EverythingElse => ProviderTuning {
			ports: vec![25, 587],
			connect_timeout: Duration::from_secs(10),
			retries: 2,
			attempt_starttls: true, // opportunistic: failures here never abort the session.
		},
	}
}

/// The policy the SMTP state machine runs under for one verification
/// call: timeouts, TLS posture, and identity used in `EHLO`/`MAIL FROM`.
#[derive(Debug, Clone)]
pub struct SmtpPolicy {
	pub hello_name: String,
	pub from_email: String,
	pub connect_timeout: Duration,
	pub command_timeout: Duration,
	pub session_timeout: Duration,
	pub tls_policy: TlsPolicy,
	pub enable_vrfy: bool,
	pub retries: usize,
}

impl Default for SmtpPolicy {
	fn default() -> Self {
		SmtpPolicy {
			hello_name: "example.com".to_string(),
			from_email: "test@example.com".to_string(),
			connect_timeout: Duration::from_secs(10),
			command_timeout: Duration::from_secs(15),
			session_timeout: Duration::from_secs(30),
			tls_policy: TlsPolicy::Opportunistic,
			enable_vrfy: false,
			retries: 2,
		}
	}
}

impl SmtpPolicy {
	/// Apply a provider's tuning defaults on top of this policy (§4.6).
	///
	/// Deliberately leaves `retries` alone: whether the provider's tuned
	/// retry count or the caller's own `policy.retries` governs the retry
	/// loop is decided by `enableProviderOptimizations` (§6), not by this
	/// method — see `check_smtp`.
	pub fn tuned_for(mut self, tuning: &ProviderTuning) -> Self {
		self.connect_timeout = tuning.connect_timeout;
		if !tuning.attempt_starttls {
			self.tls_policy = TlsPolicy::None;
		}
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tuning_matches_table_for_gmail() {
		let t = tuning_for(ProviderTag::Gmail);
		assert_eq!(t.ports, vec![587, 465, 25]);
		assert_eq!(t.connect_timeout, Duration::from_secs(15));
		assert_eq!(t.retries, 1);
	}

	#[test]
	fn tuning_matches_table_for_yahoo() {
		let t = tuning_for(ProviderTag::Yahoo);
		assert_eq!(t.ports, vec![587, 25]);
		assert_eq!(t.connect_timeout, Duration::from_secs(20));
		assert_eq!(t.retries, 2);
	}

	#[test]
	fn tuned_for_does_not_touch_caller_set_retries() {
		let mut policy = SmtpPolicy::default();
		policy.retries = 0;
		let tuning = tuning_for(ProviderTag::Yahoo);
		let tuned = policy.tuned_for(&tuning);
		assert_eq!(tuned.retries, 0);
		assert_eq!(tuned.connect_timeout, tuning.connect_timeout);
	}
}
