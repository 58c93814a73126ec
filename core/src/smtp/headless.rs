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

//! The generic WebDriver-script runner (§4.9): a small step interpreter
//! that drives a password-recovery flow on a provider's login page and
//! inspects the resulting page text for success/error markers. Used by
//! Yahoo and Gmail recovery flows when a headless endpoint is configured.

use fantoccini::{Client, ClientBuilder};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use super::verif_method::HeadlessOptions;

#[derive(Debug, Error, Serialize)]
pub enum HeadlessError {
	#[error("could not connect to the WebDriver endpoint: {0}")]
	#[serde(serialize_with = "crate::util::ser_with_display::ser_with_display")]
	Connect(String),
	#[error("WebDriver command failed: {0}")]
	#[serde(serialize_with = "crate::util::ser_with_display::ser_with_display")]
	Command(String),
	#[error("navigation timed out")]
	Timeout,
	#[error("recovery flow produced neither a success nor an error indicator")]
	Inconclusive,
}

/// One step of a provider-specific recovery-flow script (§4.9).
#[derive(Debug, Clone)]
pub enum Step {
	Navigate(String),
	WaitFor(String),
	Type { selector: String, text: String },
	Click(String),
	/// Raw JS to run in-page, e.g. reading `document.body.innerText`.
	Execute(String),
}

/// A named recovery-flow script plus the text markers that decide its
/// outcome, e.g. Yahoo's or Gmail's "account recovery" pages.
pub struct RecoveryScript {
	pub steps: Vec<Step>,
	pub success_markers: Vec<&'static str>,
	pub error_markers: Vec<&'static str>,
}

/// Outcome of running a [`RecoveryScript`] (§3 "HeadlessResult").
#[derive(Debug, Clone, Serialize)]
pub struct HeadlessResult {
	pub success: bool,
	pub email_exists: Option<bool>,
}

/// Run `script` against a fresh WebDriver session, substituting `local` and
/// `domain` into any step text that mentions them via `{local}`/`{domain}`.
pub async fn run_recovery_script(
	options: &HeadlessOptions,
	script: &RecoveryScript,
	local: &str,
	domain: &str,
) -> Result<HeadlessResult, HeadlessError> {
	let client = ClientBuilder::native()
		.connect(&options.webdriver_endpoint)
		.await
		.map_err(|e| HeadlessError::Connect(e.to_string()))?;

	let result = run_steps(&client, script, local, domain, options).await;

	// Always try to close the session, even on error, to avoid leaking
	// WebDriver sessions across calls.
	let _ = client.close().await;

	result
}

async fn run_steps(
	client: &Client,
	script: &RecoveryScript,
	local: &str,
	domain: &str,
	options: &HeadlessOptions,
) -> Result<HeadlessResult, HeadlessError> {
	use fantoccini::Locator;

	for step in &script.steps {
		match step {
			Step::Navigate(url) => {
				let url = substitute(url, local, domain);
				tokio::time::timeout(options.navigation_timeout, client.goto(&url))
					.await
					.map_err(|_| HeadlessError::Timeout)?
					.map_err(|e| HeadlessError::Command(e.to_string()))?;
			}
			Step::WaitFor(selector) => {
				client
					.wait()
					.for_element(Locator::Css(selector))
					.await
					.map_err(|e| HeadlessError::Command(e.to_string()))?;
			}
			Step::Type { selector, text } => {
				let text = substitute(text, local, domain);
				let mut el = client
					.find(Locator::Css(selector))
					.await
					.map_err(|e| HeadlessError::Command(e.to_string()))?;
				el.send_keys(&text).await.map_err(|e| HeadlessError::Command(e.to_string()))?;
			}
			Step::Click(selector) => {
				let el = client
					.find(Locator::Css(selector))
					.await
					.map_err(|e| HeadlessError::Command(e.to_string()))?;
				el.click().await.map_err(|e| HeadlessError::Command(e.to_string()))?;
			}
			Step::Execute(script_src) => {
				client
					.execute(script_src, vec![])
					.await
					.map_err(|e| HeadlessError::Command(e.to_string()))?;
			}
		}
	}

	let body_text: String = client
		.execute("return document.body.innerText;", vec![])
		.await
		.map_err(|e| HeadlessError::Command(e.to_string()))?
		.as_str()
		.unwrap_or_default()
		.to_string();

	interpret_page_text(&body_text, script)
}

fn substitute(template: &str, local: &str, domain: &str) -> String {
	template.replace("{local}", local).replace("{domain}", domain)
}

fn interpret_page_text(body_text: &str, script: &RecoveryScript) -> Result<HeadlessResult, HeadlessError> {
	let lower = body_text.to_lowercase();
	let found_success = script.success_markers.iter().any(|m| lower.contains(&m.to_lowercase()));
	let found_error = script.error_markers.iter().any(|m| lower.contains(&m.to_lowercase()));

	match (found_success, found_error) {
		(true, false) => Ok(HeadlessResult { success: true, email_exists: Some(true) }),
		(false, true) => Ok(HeadlessResult { success: true, email_exists: Some(false) }),
		(true, true) => Ok(HeadlessResult { success: true, email_exists: None }),
		(false, false) => Err(HeadlessError::Inconclusive),
	}
}

/// An optional screenshot captured for audit on error (§4.9), kept
/// separate from the pass/fail result so callers can opt out cheaply.
pub async fn capture_screenshot(client: &Client) -> Option<Vec<u8>> {
	client.screenshot().await.ok()
}

/// Build the JSON the optional Sentry/audit trail records for a failed
/// headless run, without embedding page content that might hold PII.
pub fn audit_payload(endpoint: &str, error: &HeadlessError) -> serde_json::Value {
	json!({ "endpoint": endpoint, "error": error.to_string() })
}

#[cfg(test)]
mod tests {
	use super::*;

	fn script() -> RecoveryScript {
		RecoveryScript {
			steps: vec![],
			success_markers: vec!["we found your account"],
			error_markers: vec!["we couldn't find your account"],
		}
	}

	#[test]
	fn success_marker_means_exists() {
		let result = interpret_page_text("We found your account, please continue", &script()).unwrap();
		assert!(result.success);
		assert_eq!(result.email_exists, Some(true));
	}

	#[test]
	fn error_marker_means_not_exists() {
		let result = interpret_page_text("Sorry, we couldn't find your account", &script()).unwrap();
		assert_eq!(result.email_exists, Some(false));
	}

	#[test]
	fn neither_marker_is_inconclusive() {
		let err = interpret_page_text("Please wait while we process your request", &script()).unwrap_err();
		assert!(matches!(err, HeadlessError::Inconclusive));
	}

	#[test]
	fn substitution_fills_placeholders() {
		assert_eq!(substitute("https://x/{local}@{domain}", "jdoe", "example.com"), "https://x/jdoe@example.com");
	}
}
