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

//! Gmail's headless recovery-flow script (§4.9): used only when a headless
//! endpoint is configured and SMTP verification is considered unreliable
//! for this mailbox.

use serde::Serialize;
use thiserror::Error;

use super::headless::{HeadlessError, RecoveryScript, Step};

#[derive(Debug, Error, Serialize)]
pub enum GmailError {
	#[error("Gmail headless verification failed: {0}")]
	Headless(#[from] HeadlessError),
}

const RECOVERY_URL: &str = "https://accounts.google.com/signin/recovery";

/// The Gmail account-recovery script: enter the local part as the
/// identifier and look for Google's distinct "couldn't find" vs.
/// "let's verify it's you" pages.
pub fn recovery_script() -> RecoveryScript {
	RecoveryScript {
		steps: vec![
			Step::Navigate(RECOVERY_URL.to_string()),
			Step::WaitFor("input[type=\"email\"]".to_string()),
			Step::Type { selector: "input[type=\"email\"]".to_string(), text: "{local}@{domain}".to_string() },
			Step::Click("#identifierNext".to_string()),
			Step::WaitFor("body".to_string()),
		],
		success_markers: vec!["let's verify it's you", "verify your identity", "enter your password"],
		error_markers: vec!["couldn't find your google account", "couldn't find your account"],
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn script_navigates_to_recovery_and_types_identifier() {
		let script = recovery_script();
		assert!(matches!(&script.steps[0], Step::Navigate(url) if url == RECOVERY_URL));
		assert!(script
			.steps
			.iter()
			.any(|s| matches!(s, Step::Type { text, .. } if text.contains("{local}"))));
	}
}
