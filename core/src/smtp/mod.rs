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

//! The SMTP state machine (§4.6): opens a session against a target mail
//! exchanger, probes for a catch-all policy, then probes the target
//! mailbox, applying the provider tuning table and the §4.6 retry policy.
//! Provider side-channels (§4.9) live alongside in [`yahoo`], [`gmail`],
//! [`headless`], and [`outlook`], dispatched by the orchestrator (C10) when
//! SMTP alone is unreliable for a given provider.

pub mod connect;
pub mod error;
pub mod gmail;
pub mod headless;
pub mod outlook;
pub mod parser;
pub mod port_prober;
pub mod proxy_rotator;
pub mod verif_method;
pub mod yahoo;

use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cache::{smtp_fingerprint, Cache, CacheExt, Namespace};
use crate::rules::ProviderTag;
use crate::LOG_TARGET;

use error::SmtpError;
use parser::{classify_reply, overlay_note, Severity, SmtpErrorKind};
use verif_method::{tuning_for, ProxyConfig, SmtpPolicy};

/// Which path produced an [`SmtpOutcome`] (§3 "providerUsed"): the generic
/// SMTP state machine, or one of the §4.9 provider side-channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VerificationMethod {
	Smtp,
	YahooApi,
	YahooHeadless,
	GmailHeadless,
	HotmailHeadless,
	Microsoft365Api,
}

impl Default for VerificationMethod {
	fn default() -> Self {
		VerificationMethod::Smtp
	}
}

/// The result of probing one mailbox over SMTP (§3 "SmtpOutcome").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpOutcome {
	pub is_deliverable: bool,
	pub is_catch_all: bool,
	pub error_kind: Option<SmtpErrorKind>,
	pub severity: Option<Severity>,
	pub provider_note: Option<String>,
	pub used_tls: bool,
	pub port: Option<u16>,
	pub raw_error: Option<String>,
	/// Which verifier actually produced this outcome (§4.9/§4.10 "convert
	/// its outcome into an SMTPOutcome-shaped result with `providerUsed`
	/// set").
	pub method: VerificationMethod,
}

impl SmtpOutcome {
	fn deliverable(port: u16, used_tls: bool) -> Self {
		SmtpOutcome {
			is_deliverable: true,
			is_catch_all: false,
			error_kind: None,
			severity: None,
			provider_note: None,
			used_tls,
			port: Some(port),
			raw_error: None,
			method: VerificationMethod::Smtp,
		}
	}

	fn catch_all(port: u16, used_tls: bool) -> Self {
		SmtpOutcome {
			is_deliverable: true,
			is_catch_all: true,
			error_kind: None,
			severity: None,
			provider_note: None,
			used_tls,
			port: Some(port),
			raw_error: None,
			method: VerificationMethod::Smtp,
		}
	}

	fn rejected(port: u16, used_tls: bool, kind: SmtpErrorKind, provider: ProviderTag, raw: String) -> Self {
		SmtpOutcome {
			is_deliverable: false,
			is_catch_all: false,
			severity: Some(kind.severity()),
			provider_note: overlay_note(kind, provider).map(str::to_string),
			error_kind: Some(kind),
			used_tls,
			port: Some(port),
			raw_error: Some(raw),
			method: VerificationMethod::Smtp,
		}
	}

	fn unresolved(kind: SmtpErrorKind, raw: String) -> Self {
		SmtpOutcome {
			is_deliverable: false,
			is_catch_all: false,
			error_kind: Some(kind),
			severity: Some(kind.severity()),
			provider_note: None,
			used_tls: false,
			port: None,
			raw_error: Some(raw),
			method: VerificationMethod::Smtp,
		}
	}

	/// Convert the Yahoo HTTP registration-availability probe (§4.9) into
	/// an `SmtpOutcome`-shaped result: the absence of a
	/// `IDENTIFIER_.*` error means the id is available, i.e. unregistered,
	/// i.e. not deliverable.
	pub fn from_yahoo_probe(outcome: yahoo::YahooProbeOutcome) -> Self {
		match outcome {
			yahoo::YahooProbeOutcome::Exists => SmtpOutcome {
				is_deliverable: true,
				is_catch_all: false,
				error_kind: None,
				severity: Some(Severity::Definitive),
				provider_note: Some("confirmed via Yahoo's registration-availability endpoint".to_string()),
				used_tls: true,
				port: None,
				raw_error: None,
				method: VerificationMethod::YahooApi,
			},
			yahoo::YahooProbeOutcome::Available => SmtpOutcome {
				is_deliverable: false,
				is_catch_all: false,
				error_kind: Some(SmtpErrorKind::Invalid),
				severity: Some(Severity::Definitive),
				provider_note: Some("Yahoo's registration endpoint reports this id as available (unregistered)".to_string()),
				used_tls: true,
				port: None,
				raw_error: None,
				method: VerificationMethod::YahooApi,
			},
		}
	}

	/// Convert a [`headless::HeadlessResult`] into an `SmtpOutcome`. A
	/// `None` `email_exists` (neither marker matched) never reaches here —
	/// [`headless::run_recovery_script`] returns `Err(Inconclusive)` for
	/// that case instead, which the caller maps to `unknown` directly.
	pub fn from_headless(result: headless::HeadlessResult, method: VerificationMethod) -> Self {
		match result.email_exists {
			Some(true) => SmtpOutcome {
				is_deliverable: true,
				is_catch_all: false,
				error_kind: None,
				severity: Some(Severity::Definitive),
				provider_note: Some("confirmed via headless account-recovery flow".to_string()),
				used_tls: true,
				port: None,
				raw_error: None,
				method,
			},
			_ => SmtpOutcome {
				is_deliverable: false,
				is_catch_all: false,
				error_kind: Some(SmtpErrorKind::Invalid),
				severity: Some(Severity::Definitive),
				provider_note: Some("headless account-recovery flow reports no such account".to_string()),
				used_tls: true,
				port: None,
				raw_error: None,
				method,
			},
		}
	}

	/// Convert the supplemented Microsoft 365/Graph API lookup into an
	/// `SmtpOutcome` (SPEC_FULL.md "Supplemented features").
	pub fn from_microsoft365(exists: bool) -> Self {
		SmtpOutcome {
			is_deliverable: exists,
			is_catch_all: false,
			error_kind: if exists { None } else { Some(SmtpErrorKind::Invalid) },
			severity: Some(Severity::Definitive),
			provider_note: Some("resolved via Microsoft Graph user directory lookup".to_string()),
			used_tls: true,
			port: None,
			raw_error: None,
			method: VerificationMethod::Microsoft365Api,
		}
	}
}

/// 15-char lowercase-alphanumeric random local part for the catch-all
/// probe (§4.6: "unlikely to collide with real users"). Regenerated every
/// call — it must never be cached.
fn random_catch_all_local() -> String {
	rand::thread_rng()
		.sample_iter(&Alphanumeric)
		.filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
		.take(15)
		.map(char::from)
		.collect()
}

/// Drive one full probe attempt: open the session, run the catch-all
/// probe, then (if not caught all) the target probe. Returns the outcome
/// or a transport-class [`connect::ProtocolError`] the caller may retry.
async fn attempt(
	local: &str,
	domain: &str,
	mx_host: &str,
	provider_tag: ProviderTag,
	policy: &SmtpPolicy,
	proxy: Option<&ProxyConfig>,
	cache: &dyn Cache,
) -> Result<SmtpOutcome, connect::ProtocolError> {
	let tuning = tuning_for(provider_tag);
	let (mut session, port) =
		port_prober::open_with_port_probe(mx_host, &tuning.ports, policy, proxy, cache).await?;

	let from_email = policy.from_email.clone();
	session.mail_from(&from_email).await?;

	let catch_all_local = random_catch_all_local();
	let catch_all_target = format!("{catch_all_local}@{domain}");
	let catch_all_reply = session.rcpt_to(&catch_all_target).await?;

	if catch_all_reply.is_positive() {
		let _ = session.quit().await;
		return Ok(SmtpOutcome::catch_all(port, session.using_tls));
	}

	let target = format!("{local}@{domain}");
	let target_reply = session.rcpt_to(&target).await?;

	if policy.enable_vrfy && session.offers("VRFY") {
		let _ = session.vrfy(local).await;
	}

	let _ = session.quit().await;

	if target_reply.is_positive() {
		return Ok(SmtpOutcome::deliverable(port, session.using_tls));
	}

	let kind = classify_reply(&target_reply);
	Ok(SmtpOutcome::rejected(port, session.using_tls, kind, provider_tag, target_reply.message()))
}

/// Does this transport error warrant a retry (§4.6: "On transport-class
/// failure ... retry with exponential backoff")? A clean 5xx rejection of
/// the target mailbox is terminal and never reaches this path — it's
/// already folded into `Ok(..)` by [`attempt`].
fn is_retryable(error: &connect::ProtocolError) -> bool {
	!matches!(error, connect::ProtocolError::UnexpectedReply { code, .. } if *code >= 500)
}

/// How many retries to budget for this call (§6 `enableProviderOptimizations`):
/// the §4.6 tuning table's count when optimizations are requested, otherwise
/// whatever the caller's own `policy.retries` says.
fn effective_max_retries(provider_optimizations: bool, tuning_retries: usize, policy_retries: usize) -> usize {
	if provider_optimizations {
		tuning_retries
	} else {
		policy_retries
	}
}

/// Verify one mailbox over SMTP, consulting the `smtp` cache namespace
/// first (§4.1 `domain|mxHost|local` fingerprint), then retrying
/// transport-class failures with exponential backoff (base 1s, §4.6).
///
/// `provider_optimizations` gates whether the §4.6 tuning table's retry
/// count applies at all (§6 `enableProviderOptimizations`, default
/// `false`): when it's false the caller's own `policy.retries` is the
/// retry budget, not the per-provider default.
pub async fn check_smtp(
	local: &str,
	domain: &str,
	mx_host: &str,
	provider_tag: ProviderTag,
	policy: SmtpPolicy,
	provider_optimizations: bool,
	proxy: Option<&ProxyConfig>,
	cache: &dyn Cache,
) -> Result<SmtpOutcome, SmtpError> {
	let fingerprint = smtp_fingerprint(domain, mx_host, local);
	if let Some(cached) = cache.get::<SmtpOutcome>(Namespace::Smtp, &fingerprint).await {
		tracing::debug!(target: LOG_TARGET, %fingerprint, "smtp cache hit");
		return Ok(cached);
	}

	let tuning = tuning_for(provider_tag);
	let max_retries = effective_max_retries(provider_optimizations, tuning.retries, policy.retries);
	let policy = policy.tuned_for(&tuning);

	let mut last_err: Option<connect::ProtocolError> = None;
	for attempt_no in 0..=max_retries {
		match attempt(local, domain, mx_host, provider_tag, &policy, proxy, cache).await {
			Ok(outcome) => {
				cache.set(Namespace::Smtp, &fingerprint, &outcome).await;
				return Ok(outcome);
			}
			Err(err) => {
				if attempt_no == max_retries || !is_retryable(&err) {
					last_err = Some(err);
					break;
				}
				let backoff = Duration::from_secs(1) * 2u32.pow(attempt_no as u32);
				tracing::debug!(target: LOG_TARGET, %mx_host, attempt_no, ?backoff, %err, "retrying smtp attempt");
				tokio::time::sleep(backoff).await;
				last_err = Some(err);
			}
		}
	}

	let err = last_err.expect("loop always assigns last_err before breaking. qed.");
	let kind = parser::classify_protocol_error(&err);
	tracing::debug!(target: LOG_TARGET, %mx_host, %err, "smtp attempt exhausted retries");
	// Transport-class failures never produce a definitive verdict; report
	// the unresolved outcome rather than bubbling a hard error, so the
	// orchestrator can still apply its verdict table.
	Ok(SmtpOutcome::unresolved(kind, err.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn catch_all_local_has_expected_shape() {
		let local = random_catch_all_local();
		assert_eq!(local.len(), 15);
		assert!(local.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
	}

	#[test]
	fn catch_all_local_is_not_constant() {
		let a = random_catch_all_local();
		let b = random_catch_all_local();
		// Not a hard guarantee, but 15 random chars colliding is negligible;
		// this documents the "regenerated per session" requirement.
		assert_ne!(a, b);
	}

	#[test]
	fn permanent_failure_reply_is_not_retryable() {
		let err = connect::ProtocolError::UnexpectedReply { code: 550, message: "no".into() };
		assert!(!is_retryable(&err));
	}

	#[test]
	fn timeout_is_retryable() {
		assert!(is_retryable(&connect::ProtocolError::Timeout));
	}

	#[test]
	fn max_retries_uses_tuning_only_when_optimizations_enabled() {
		assert_eq!(effective_max_retries(true, 2, 0), 2);
		assert_eq!(effective_max_retries(false, 2, 0), 0);
		assert_eq!(effective_max_retries(false, 2, 5), 5);
	}

	#[test]
	fn outcome_deliverable_has_no_error_kind() {
		let outcome = SmtpOutcome::deliverable(587, true);
		assert!(outcome.is_deliverable);
		assert!(outcome.error_kind.is_none());
	}
}
