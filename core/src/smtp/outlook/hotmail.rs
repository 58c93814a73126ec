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

//! The B2C Hotmail/Outlook.com headless recovery script (§4.9), used as a
//! last resort after the Microsoft 365 side-channel is unavailable or not
//! configured.

use super::super::headless::{RecoveryScript, Step};

const RECOVERY_URL: &str = "https://account.live.com/acsr";

/// The consumer Outlook.com account-recovery script.
pub fn recovery_script() -> RecoveryScript {
	RecoveryScript {
		steps: vec![
			Step::Navigate(RECOVERY_URL.to_string()),
			Step::WaitFor("input[type=\"email\"]".to_string()),
			Step::Type { selector: "input[type=\"email\"]".to_string(), text: "{local}@{domain}".to_string() },
			Step::Click("#usernameSubmit, button[type=\"submit\"]".to_string()),
			Step::WaitFor("body".to_string()),
		],
		success_markers: vec!["enter the characters", "verify your identity"],
		error_markers: vec!["that microsoft account doesn't exist", "couldn't find that account"],
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn script_targets_outlook_recovery_endpoint() {
		let script = recovery_script();
		assert!(matches!(&script.steps[0], Step::Navigate(url) if url == RECOVERY_URL));
	}
}
