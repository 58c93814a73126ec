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

//! The Yahoo HTTP side-channel (§4.9): a two-step GET-then-POST against
//! Yahoo's account-module registration-availability endpoints, used when
//! SMTP verification for a Yahoo mailbox is unreliable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::headless::{RecoveryScript, Step};

const RECOVERY_URL: &str = "https://login.yahoo.com/forgot";

/// The Yahoo account-recovery script (§4.9), used when `use_yahoo_headless`
/// is set instead of the HTTP probe above: enter the local part as the
/// username and look for Yahoo's distinct "couldn't find" vs. "verify your
/// identity" pages.
pub fn recovery_script() -> RecoveryScript {
	RecoveryScript {
		steps: vec![
			Step::Navigate(RECOVERY_URL.to_string()),
			Step::WaitFor("#login-username".to_string()),
			Step::Type { selector: "#login-username".to_string(), text: "{local}@{domain}".to_string() },
			Step::Click("#login-signin".to_string()),
			Step::WaitFor("body".to_string()),
		],
		success_markers: vec!["verify your identity", "we sent a confirmation code", "recover your account"],
		error_markers: vec!["we couldn't find your account", "sign-in name isn't registered"],
	}
}

const LANDING_URL: &str = "https://login.yahoo.com/account/module/create?validateField=yid";
const VALIDATE_URL: &str = "https://login.yahoo.com/account/module/create?validateField=yid";
const USER_AGENT: &str =
	"Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Error, Serialize)]
pub enum YahooError {
	#[error("HTTP request to Yahoo failed: {0}")]
	#[serde(serialize_with = "crate::util::ser_with_display::ser_with_display")]
	Reqwest(reqwest::Error),
	#[error("could not parse Yahoo's JSON response: {0}")]
	#[serde(serialize_with = "crate::util::ser_with_display::ser_with_display")]
	InvalidResponse(serde_json::Error),
	#[error("Yahoo returned a non-2xx status: {0}")]
	UnexpectedStatus(u16),
}

impl From<reqwest::Error> for YahooError {
	fn from(e: reqwest::Error) -> Self {
		YahooError::Reqwest(e)
	}
}

#[derive(Debug, Deserialize)]
struct YahooErrorEntry {
	name: String,
}

#[derive(Debug, Deserialize)]
struct YahooValidateResponse {
	#[serde(default)]
	errors: Vec<YahooErrorEntry>,
}

/// Whether the probed Yahoo username is already registered, per the
/// `errors[].name` values Yahoo's validation endpoint returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YahooProbeOutcome {
	/// `IDENTIFIER_NOT_AVAILABLE` or `IDENTIFIER_ALREADY_EXISTS`/`IDENTIFIER_EXISTS`: the mailbox exists.
	Exists,
	/// None of the above errors were present: the id is available, i.e. unregistered.
	Available,
}

fn interpret(response: &YahooValidateResponse) -> YahooProbeOutcome {
	let taken = response.errors.iter().any(|e| {
		matches!(
			e.name.as_str(),
			"IDENTIFIER_NOT_AVAILABLE" | "IDENTIFIER_ALREADY_EXISTS" | "IDENTIFIER_EXISTS"
		)
	});
	if taken {
		YahooProbeOutcome::Exists
	} else {
		YahooProbeOutcome::Available
	}
}

/// Probe whether `local` is already a registered Yahoo username: fetch the
/// landing page first to acquire cookies, then POST the validation form
/// carrying them (§4.9, §6 "Yahoo HTTP probe").
pub async fn probe_yahoo_username(client: &reqwest::Client, local: &str) -> Result<YahooProbeOutcome, YahooError> {
	let landing = client.get(LANDING_URL).header("User-Agent", USER_AGENT).send().await?;
	if !landing.status().is_success() {
		return Err(YahooError::UnexpectedStatus(landing.status().as_u16()));
	}

	let response = client
		.post(VALIDATE_URL)
		.header("User-Agent", USER_AGENT)
		.form(&[("specId", "yidReg"), ("yid", local)])
		.send()
		.await?;

	if !response.status().is_success() {
		return Err(YahooError::UnexpectedStatus(response.status().as_u16()));
	}

	let body = response.text().await?;
	let parsed: YahooValidateResponse = serde_json::from_str(&body).map_err(YahooError::InvalidResponse)?;
	Ok(interpret(&parsed))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn not_available_means_exists() {
		let resp = YahooValidateResponse {
			errors: vec![YahooErrorEntry { name: "IDENTIFIER_NOT_AVAILABLE".to_string() }],
		};
		assert_eq!(interpret(&resp), YahooProbeOutcome::Exists);
	}

	#[test]
	fn already_exists_means_exists() {
		let resp = YahooValidateResponse {
			errors: vec![YahooErrorEntry { name: "IDENTIFIER_ALREADY_EXISTS".to_string() }],
		};
		assert_eq!(interpret(&resp), YahooProbeOutcome::Exists);
	}

	#[test]
	fn no_matching_errors_means_available() {
		let resp = YahooValidateResponse {
			errors: vec![YahooErrorEntry { name: "SOME_OTHER_ERROR".to_string() }],
		};
		assert_eq!(interpret(&resp), YahooProbeOutcome::Available);
	}

	#[test]
	fn empty_errors_means_available() {
		let resp = YahooValidateResponse { errors: vec![] };
		assert_eq!(interpret(&resp), YahooProbeOutcome::Available);
	}

	#[test]
	fn recovery_script_navigates_and_types_identifier() {
		let script = recovery_script();
		assert!(matches!(&script.steps[0], Step::Navigate(url) if url == RECOVERY_URL));
		assert!(script
			.steps
			.iter()
			.any(|s| matches!(s, Step::Type { text, .. } if text.contains("{local}"))));
	}
}
