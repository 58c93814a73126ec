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

//! `mailverify-core` checks whether an email address is deliverable
//! without sending any email.
//!
//! Under the hood, it validates the address's syntax, resolves its
//! domain's MX records, classifies the domain (disposable, free provider,
//! known provider family), and — when enabled — connects to the mail
//! exchanger over SMTP, walking the protocol far enough to learn whether
//! the mailbox exists, without ever completing a `DATA` command.
//!
//! ```rust
//! use mailverify_core::util::input_output::VerifyOptionsBuilder;
//! use mailverify_core::verify;
//!
//! async fn check() {
//!     let options = VerifyOptionsBuilder::default()
//!         .email_address("someone@gmail.com")
//!         .verify_smtp(true)
//!         .build()
//!         .unwrap();
//!
//!     let result = verify(options).await;
//!     println!("{:?}", result.reachability);
//! }
//! ```

pub mod batch;
pub mod cache;
pub mod misc;
pub mod mx;
pub mod rules;
pub mod smtp;
pub mod suggest;
pub mod syntax;
pub mod types;
pub mod util;
pub mod whois;

pub use batch::verify_batch;

use std::sync::Once;
use std::time::{Duration, Instant};

use misc::{check_misc, MailcheckerDisposableSet, StaticFreeDomainSet};
use mx::{HickoryMxClient, MxErrorKind};
use rules::{classify, ProviderTag};
use smtp::outlook::{hotmail, microsoft365};
use smtp::parser::SmtpErrorKind;
use smtp::verif_method::{GmailVerifMethod, HotmailVerifMethod, SmtpPolicy};
use smtp::{gmail, headless, yahoo, SmtpOutcome, VerificationMethod};
use syntax::SyntaxError;
use types::{ErrorKind, Reachability, VerificationResult};
use util::input_output::VerifyOptions;

/// The target where this crate's `tracing` events are emitted.
pub const LOG_TARGET: &str = "reacher";

static INIT: Once = Once::new();

/// This crate uses rustls for its TLS connections (STARTTLS, and the
/// provider HTTP side-channels). This installs the default crypto
/// provider for rustls, once per process.
pub fn initialize_crypto_provider() {
	INIT.call_once(|| {
		rustls::crypto::ring::default_provider()
			.install_default()
			.expect("no other crypto provider is installed before this call. qed.");
	});
}

fn mx_error_kind_to_error_kind(kind: MxErrorKind) -> ErrorKind {
	match kind {
		MxErrorKind::Timeout => ErrorKind::MxTimeout,
		MxErrorKind::NotFound => ErrorKind::MxNotFound,
		MxErrorKind::Network => ErrorKind::MxNetwork,
	}
}

fn smtp_error_kind_to_error_kind(kind: SmtpErrorKind) -> ErrorKind {
	match kind {
		SmtpErrorKind::Disabled => ErrorKind::Disabled,
		SmtpErrorKind::FullInbox => ErrorKind::FullInbox,
		SmtpErrorKind::Invalid => ErrorKind::Invalid,
		SmtpErrorKind::CatchAll => ErrorKind::CatchAll,
		SmtpErrorKind::RateLimited => ErrorKind::RateLimited,
		SmtpErrorKind::Blocked => ErrorKind::Blocked,
		SmtpErrorKind::Transient | SmtpErrorKind::Unknown => ErrorKind::UnknownReply,
	}
}

fn syntax_error_to_error_kind(error: SyntaxError) -> ErrorKind {
	match error {
		SyntaxError::NotAString => ErrorKind::NotAString,
		SyntaxError::MissingAt => ErrorKind::MissingAt,
		SyntaxError::LocalTooLong => ErrorKind::LocalTooLong,
		SyntaxError::DomainTooLong => ErrorKind::DomainTooLong,
		SyntaxError::BadLocal => ErrorKind::BadLocal,
		SyntaxError::BadDomain => ErrorKind::BadDomain,
	}
}

/// Apply §3's decision table (top match wins) to whichever phases ran. A
/// `None` phase was skipped by the caller's options and contributes
/// nothing to the verdict.
fn compute_reachability(
	mx: &Option<mx::MxLookup>,
	misc: &Option<misc::MiscFacts>,
	smtp: &Option<SmtpOutcome>,
) -> (Reachability, Option<ErrorKind>) {
	if let Some(mx) = mx {
		if !mx.success {
			return match mx.error_kind {
				Some(MxErrorKind::Timeout) | Some(MxErrorKind::Network) => {
					(Reachability::Unknown, mx.error_kind.map(mx_error_kind_to_error_kind))
				}
				_ => (Reachability::Invalid, mx.error_kind.map(mx_error_kind_to_error_kind)),
			};
		}
	}

	if let Some(smtp) = smtp {
		// No port was ever reached: a transport-class failure never yields
		// a definitive verdict (§4.6, §7).
		if smtp.port.is_none() {
			let kind = smtp.error_kind.map(smtp_error_kind_to_error_kind).unwrap_or(ErrorKind::ConnectTimeout);
			return (Reachability::Unknown, Some(kind));
		}
	}

	if let Some(misc) = misc {
		if misc.is_disposable {
			return (Reachability::Risky, None);
		}
	}

	if let Some(smtp) = smtp {
		if smtp.is_deliverable {
			return (Reachability::Safe, None);
		}
		return (Reachability::Invalid, smtp.error_kind.map(smtp_error_kind_to_error_kind));
	}

	(Reachability::Unknown, None)
}

fn placeholder_address(raw: &str) -> syntax::Address {
	syntax::Address {
		raw: raw.to_string(),
		normalized: raw.trim().to_lowercase(),
		local: String::new(),
		domain: String::new(),
	}
}

fn elapsed_ms(duration: Duration) -> u64 {
	duration.as_millis() as u64
}

/// Shared `reqwest` client for the HTTP-backed side-channels (§4.9): the
/// Yahoo probe needs cookies carried from its landing-page `GET` to its
/// validation `POST`, so the cookie jar must persist across calls.
fn http_client() -> reqwest::Client {
	use once_cell::sync::Lazy;
	static CLIENT: Lazy<reqwest::Client> =
		Lazy::new(|| reqwest::Client::builder().cookie_store(true).build().unwrap_or_default());
	CLIENT.clone()
}

/// Outcome of attempting a §4.9 provider side-channel instead of (or ahead
/// of) the generic SMTP state machine.
enum SideChannel {
	/// A definitive, SmtpOutcome-shaped result (§4.10 step 4: "convert its
	/// outcome into an SMTPOutcome-shaped result with `providerUsed` set").
	Outcome(SmtpOutcome),
	/// The side-channel isn't usable right now (not configured, or — for
	/// the supplemented Microsoft 365 probe only — errored); fall back to
	/// plain SMTP rather than failing the whole call (§4.9: "never replace
	/// the SMTP path globally").
	FallThroughToSmtp,
	/// The side-channel ran and failed outright; this is final, the
	/// verdict downgrades to `unknown` and SMTP is not attempted (§4.9:
	/// "Any HTTP non-2xx, abort, or unparsable body maps to an `unknown`
	/// verdict with `errorKind` set").
	HardError(ErrorKind),
}

async fn run_headless_side_channel(
	script: headless::RecoveryScript,
	method: VerificationMethod,
	address: &syntax::Address,
	options: &VerifyOptions,
) -> SideChannel {
	let Some(headless_options) = &options.headless_options else {
		return SideChannel::FallThroughToSmtp;
	};
	match headless::run_recovery_script(headless_options, &script, &address.local, &address.domain).await {
		Ok(result) => SideChannel::Outcome(SmtpOutcome::from_headless(result, method)),
		Err(err) => {
			tracing::debug!(target: LOG_TARGET, %err, ?method, "headless side-channel failed");
			SideChannel::HardError(ErrorKind::HeadlessScriptError)
		}
	}
}

async fn run_microsoft365_side_channel(address: &syntax::Address, options: &VerifyOptions) -> SideChannel {
	let Some(creds) = &options.verif_method.graph_credentials else {
		return SideChannel::FallThroughToSmtp;
	};
	let client = http_client();
	match microsoft365::probe_mailbox(&client, creds, &address.normalized).await {
		Ok(exists) => SideChannel::Outcome(SmtpOutcome::from_microsoft365(exists)),
		Err(err) => {
			tracing::debug!(target: LOG_TARGET, %err, "microsoft365 probe failed, falling back to smtp");
			SideChannel::FallThroughToSmtp
		}
	}
}

/// Decide and run a provider side-channel for this address, if the caller's
/// options select one and it applies to `provider_tag` (§4.9, §4.10 step
/// 4). Returns `None` when no side-channel is applicable at all, meaning
/// the orchestrator should just run plain SMTP.
async fn maybe_side_channel(
	provider_tag: ProviderTag,
	address: &syntax::Address,
	options: &VerifyOptions,
) -> Option<SideChannel> {
	match provider_tag {
		ProviderTag::Yahoo if options.use_yahoo_api => {
			let client = http_client();
			Some(match yahoo::probe_yahoo_username(&client, &address.local).await {
				Ok(outcome) => SideChannel::Outcome(SmtpOutcome::from_yahoo_probe(outcome)),
				Err(err) => {
					tracing::debug!(target: LOG_TARGET, %err, "yahoo http probe failed");
					SideChannel::HardError(ErrorKind::HttpProbeError)
				}
			})
		}
		ProviderTag::Yahoo if options.use_yahoo_headless => Some(
			run_headless_side_channel(yahoo::recovery_script(), VerificationMethod::YahooHeadless, address, options).await,
		),
		ProviderTag::Gmail if matches!(options.verif_method.gmail, GmailVerifMethod::Headless) => Some(
			run_headless_side_channel(gmail::recovery_script(), VerificationMethod::GmailHeadless, address, options).await,
		),
		ProviderTag::HotmailB2B if matches!(options.verif_method.hotmailb2b, HotmailVerifMethod::Microsoft365Api) => {
			Some(run_microsoft365_side_channel(address, options).await)
		}
		ProviderTag::HotmailB2C if matches!(options.verif_method.hotmailb2c, HotmailVerifMethod::Microsoft365Api) => {
			Some(run_microsoft365_side_channel(address, options).await)
		}
		ProviderTag::HotmailB2B if matches!(options.verif_method.hotmailb2b, HotmailVerifMethod::Headless) => Some(
			run_headless_side_channel(hotmail::recovery_script(), VerificationMethod::HotmailHeadless, address, options)
				.await,
		),
		ProviderTag::HotmailB2C if matches!(options.verif_method.hotmailb2c, HotmailVerifMethod::Headless) => Some(
			run_headless_side_channel(hotmail::recovery_script(), VerificationMethod::HotmailHeadless, address, options)
				.await,
		),
		_ => None,
	}
}

/// Pick a proxy for this call from the configured pool (§4.6's SOCKS5
/// support), if any are configured. The rotator is rebuilt per call: true
/// cross-call rotation would need a rotator shared across an entire batch
/// run, which `VerifyOptions` doesn't carry (see DESIGN.md).
fn selected_proxy(options: &VerifyOptions) -> Option<smtp::verif_method::ProxyConfig> {
	let proxies = &options.verif_method.proxies;
	if proxies.is_empty() {
		return None;
	}
	let mut ids: Vec<&String> = proxies.keys().collect();
	ids.sort();
	let rotator = smtp::proxy_rotator::ProxyRotator::new(
		ids.into_iter().cloned().collect(),
		options.verif_method.proxy_rotation,
	);
	rotator.get_next_proxy_id().and_then(|id| proxies.get(id)).cloned()
}

/// Verify a single email address (§4.10, C10): run syntax first, then
/// misc classification and MX resolution concurrently, classify the
/// provider, and — if requested — run the SMTP state machine, before
/// computing the final verdict. The whole call is bounded by
/// `options.timeout`; exceeding it aborts in-flight I/O and reports
/// `unknown`/`timeout` rather than blocking forever.
pub async fn verify(options: VerifyOptions) -> VerificationResult {
	initialize_crypto_provider();
	let start = Instant::now();
	let timeout = options.timeout;

	tracing::debug!(target: LOG_TARGET, email = %options.email_address, "verifying email");

	let mut result = match tokio::time::timeout(timeout, run_phases(&options)).await {
		Ok(result) => result,
		Err(_) => VerificationResult {
			address: placeholder_address(&options.email_address),
			mx: None,
			smtp: None,
			misc: None,
			reachability: Reachability::Unknown,
			duration_ms: 0,
			error_kind: Some(ErrorKind::Timeout),
		},
	};
	result.duration_ms = elapsed_ms(start.elapsed());
	result
}

async fn run_phases(options: &VerifyOptions) -> VerificationResult {
	// Phase 1: syntax. No DNS or SMTP I/O is issued if this fails (§4.10
	// step 1, §8).
	let mut syntax_result = syntax::validate(&options.email_address);
	if !syntax_result.is_valid_syntax {
		let error = syntax_result.error.expect("invalid syntax result always carries an error. qed.");
		return VerificationResult {
			address: placeholder_address(&options.email_address),
			mx: None,
			smtp: None,
			misc: None,
			reachability: Reachability::Invalid,
			duration_ms: 0,
			error_kind: Some(syntax_error_to_error_kind(error)),
		};
	}
	let address = syntax_result.address.clone().expect("valid syntax result always carries an address. qed.");

	// Phase 2: misc classification and MX resolution run concurrently
	// (§4.10 step 2).
	let disposable_set = MailcheckerDisposableSet;
	let free_set = StaticFreeDomainSet;
	let mx_client = HickoryMxClient::new().ok();

	let misc_fut = async {
		if options.check_disposable || options.check_free {
			Some(check_misc(&address.normalized, &disposable_set, &free_set, options.cache.as_ref()).await)
		} else {
			None
		}
	};

	let mx_fut = async {
		if options.verify_mx {
			match &mx_client {
				Some(client) => {
					Some(mx::resolve(&address.domain, client, options.cache.as_ref(), options.timeout).await)
				}
				None => None,
			}
		} else {
			None
		}
	};

	let (misc, mx) = tokio::join!(misc_fut, mx_fut);

	if let Some(mx_lookup) = &mx {
		if !mx_lookup.success {
			syntax::get_similar_mail_provider(&mut syntax_result);
			let (reachability, error_kind) = compute_reachability(&mx, &misc, &None);
			return VerificationResult { address, mx, smtp: None, misc, reachability, duration_ms: 0, error_kind };
		}
	}

	// Phase 3: classify the provider from the winning MX host, falling back
	// to the domain only when MX wasn't resolved at all (§4.4, §4.10 step 3).
	// This supersedes the domain-only fallback `check_misc` computed on its
	// own, which never sees the resolved MX host.
	let mx_host = mx.as_ref().and_then(|lookup| lookup.lowest_priority.as_ref()).map(|r| r.host.as_str());
	let provider_tag = classify(mx_host, &address.domain);
	let mut misc = misc;
	if mx_host.is_some() {
		if let Some(facts) = misc.as_mut() {
			facts.provider_tag = Some(provider_tag);
		}
	}

	// Phase 4: SMTP (§4.10 step 4), only against a host we actually
	// resolved. A configured provider side-channel (§4.9) is tried first;
	// it either settles the verdict on its own, fails outright, or defers
	// to the generic SMTP state machine.
	let smtp_outcome = match (options.verify_smtp, mx_host) {
		(true, Some(host)) => {
			match maybe_side_channel(provider_tag, &address, options).await {
				Some(SideChannel::Outcome(outcome)) => Some(outcome),
				Some(SideChannel::HardError(error_kind)) => {
					return VerificationResult {
						address,
						mx,
						smtp: None,
						misc,
						reachability: Reachability::Unknown,
						duration_ms: 0,
						error_kind: Some(error_kind),
					};
				}
				Some(SideChannel::FallThroughToSmtp) | None => {
					let policy = SmtpPolicy {
						hello_name: options.hello_name.clone(),
						from_email: options.from_email.clone(),
						..SmtpPolicy::default()
					};
					let proxy = selected_proxy(options);
					match smtp::check_smtp(
						&address.local,
						&address.domain,
						host,
						provider_tag,
						policy,
						options.enable_provider_optimizations,
						proxy.as_ref(),
						options.cache.as_ref(),
					)
					.await
					{
						Ok(outcome) => Some(outcome),
						Err(err) => Some(SmtpOutcome {
							is_deliverable: false,
							is_catch_all: false,
							error_kind: None,
							severity: None,
							provider_note: None,
							used_tls: false,
							port: None,
							raw_error: Some(err.to_string()),
							method: VerificationMethod::Smtp,
						}),
					}
				}
			}
		}
		_ => None,
	};

	if smtp_outcome.as_ref().is_some_and(|outcome| !outcome.is_deliverable) {
		syntax::get_similar_mail_provider(&mut syntax_result);
	}

	let (reachability, error_kind) = compute_reachability(&mx, &misc, &smtp_outcome);

	VerificationResult { address, mx, smtp: smtp_outcome, misc, reachability, duration_ms: 0, error_kind }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::util::input_output::VerifyOptionsBuilder;

	#[tokio::test]
	async fn invalid_syntax_short_circuits() {
		let local = "a".repeat(65);
		let options = VerifyOptionsBuilder::default()
			.email_address(format!("{local}@x.com"))
			.verify_mx(false)
			.verify_smtp(false)
			.build()
			.unwrap();
		let result = verify(options).await;
		assert_eq!(result.reachability, Reachability::Invalid);
		assert_eq!(result.error_kind, Some(ErrorKind::LocalTooLong));
		assert!(result.mx.is_none());
	}

	#[tokio::test]
	async fn syntax_only_call_classifies_provider_without_mx_io() {
		let options = VerifyOptionsBuilder::default()
			.email_address("user@gmail.com")
			.verify_mx(false)
			.verify_smtp(false)
			.build()
			.unwrap();
		let result = verify(options).await;
		assert_eq!(result.address.local, "user");
		assert_eq!(result.address.domain, "gmail.com");
		assert!(result.mx.is_none());
		assert_eq!(result.misc.unwrap().provider_tag, Some(rules::ProviderTag::Gmail));
	}

	#[tokio::test]
	async fn uppercase_address_is_normalized() {
		let options = VerifyOptionsBuilder::default()
			.email_address("UPPER@Example.COM")
			.verify_mx(false)
			.verify_smtp(false)
			.build()
			.unwrap();
		let result = verify(options).await;
		assert_eq!(result.address.normalized, "upper@example.com");
		assert_eq!(result.address.local, "upper");
		assert_eq!(result.address.domain, "example.com");
	}
}
