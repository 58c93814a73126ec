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

//! Port selection for the SMTP dialer (§4.7): try the cached winning port
//! for a host first, then fall back to the provider's tuned port list in
//! order, caching whichever one succeeds.

use super::connect::{open_session, ProtocolError, SmtpSession};
use super::verif_method::{ProxyConfig, SmtpPolicy};
use crate::cache::{Cache, CacheExt, Namespace};
use crate::LOG_TARGET;

/// Reject ports outside the registered-port range; a caller-supplied port
/// of `0` or anything beyond `u16::MAX` (impossible in the type, but a
/// defensively-checked `1..=65535` window) is never dialed (§4.7: "invalid
/// ports are rejected before any connection attempt").
fn is_valid_port(port: u16) -> bool {
	port != 0
}

/// Open an SMTP session against `mx_host`, trying the cached winning port
/// first and otherwise `candidate_ports` in order. The first port that
/// completes a full `open_session` is cached under [`Namespace::SmtpPort`]
/// for next time.
pub async fn open_with_port_probe(
	mx_host: &str,
	candidate_ports: &[u16],
	policy: &SmtpPolicy,
	proxy: Option<&ProxyConfig>,
	cache: &dyn Cache,
) -> Result<(SmtpSession, u16), ProtocolError> {
	let mut ordered: Vec<u16> = Vec::new();
	if let Some(cached_port) = cache.get::<u16>(Namespace::SmtpPort, mx_host).await {
		if is_valid_port(cached_port) {
			ordered.push(cached_port);
		}
	}
	for &port in candidate_ports {
		if is_valid_port(port) && !ordered.contains(&port) {
			ordered.push(port);
		}
	}

	let mut last_err: Option<ProtocolError> = None;
	for port in ordered {
		match open_session(mx_host, port, policy, proxy).await {
			Ok(session) => {
				cache.set(Namespace::SmtpPort, mx_host, &port).await;
				return Ok((session, port));
			}
			Err(err) => {
				tracing::debug!(target: LOG_TARGET, %mx_host, port, %err, "port probe failed, trying next");
				last_err = Some(err);
			}
		}
	}

	Err(last_err.unwrap_or(ProtocolError::Closed))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn zero_port_is_invalid() {
		assert!(!is_valid_port(0));
		assert!(is_valid_port(25));
		assert!(is_valid_port(587));
	}
}
