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

//! Integration fixtures, one per concrete scenario in §8. No real network
//! I/O runs here: MX lookups use a stub [`MxClient`], and the catch-all
//! scenario drives a minimal in-process SMTP server over a loopback socket
//! rather than a real mail exchanger.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use mailverify_core::cache::{CacheExt, InProcessCache, Namespace};
use mailverify_core::mx::{self, MxClient, MxErrorKind, MxRecord};
use mailverify_core::rules::ProviderTag;
use mailverify_core::smtp::verif_method::SmtpPolicy;
use mailverify_core::smtp::check_smtp;

struct StubMxClient {
	response: Result<Vec<MxRecord>, (MxErrorKind, String)>,
}

#[async_trait]
impl MxClient for StubMxClient {
	async fn lookup_mx(
		&self,
		_domain: &str,
		_timeout: Duration,
	) -> Result<Vec<MxRecord>, (MxErrorKind, String)> {
		self.response.clone()
	}
}

/// Scenario 4: an MX lookup that resolves but finds nothing is reported as
/// `notFound`, never cached.
#[tokio::test]
async fn mx_lookup_not_found_is_reported_and_not_cached() {
	let client = StubMxClient { response: Err((MxErrorKind::NotFound, "no records".to_string())) };
	let cache = InProcessCache::new();
	let lookup = mx::resolve("nonexistent-xyzzy-12345.example", &client, &cache, Duration::from_secs(1)).await;

	assert!(!lookup.success);
	assert_eq!(lookup.error_kind, Some(MxErrorKind::NotFound));
	assert!(!cache.has(Namespace::Mx, "nonexistent-xyzzy-12345.example").await);
}

/// Scenario 5: a DNS server that never replies is reported as `MxTimeout`,
/// distinct from a completed-but-empty lookup.
#[tokio::test]
async fn mx_lookup_timeout_is_distinguished_from_not_found() {
	let client = StubMxClient { response: Err((MxErrorKind::Timeout, "timed out".to_string())) };
	let cache = InProcessCache::new();
	let lookup = mx::resolve("slow.example", &client, &cache, Duration::from_millis(50)).await;

	assert!(!lookup.success);
	assert_eq!(lookup.error_kind, Some(MxErrorKind::Timeout));
}

/// A minimal fake SMTP server: greets, accepts `EHLO`/`MAIL FROM`
/// unconditionally, and accepts every `RCPT TO` (the shape §8 scenario 6
/// describes as "a mock MX host that accepts `RCPT TO:<random@d>`").
async fn spawn_accept_all_smtp_server() -> u16 {
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("loopback bind never fails in test env. qed.");
	let port = listener.local_addr().unwrap().port();

	tokio::spawn(async move {
		let (stream, _) = listener.accept().await.expect("test client always connects. qed.");
		let (read_half, mut write_half) = stream.into_split();
		let mut reader = BufReader::new(read_half);

		write_half.write_all(b"220 fake.example ESMTP\r\n").await.unwrap();

		loop {
			let mut line = String::new();
			let n = reader.read_line(&mut line).await.unwrap_or(0);
			if n == 0 {
				break;
			}
			let upper = line.to_uppercase();
			if upper.starts_with("EHLO") {
				write_half.write_all(b"250-fake.example\r\n250 PIPELINING\r\n").await.unwrap();
			} else if upper.starts_with("MAIL FROM") || upper.starts_with("RCPT TO") {
				write_half.write_all(b"250 OK\r\n").await.unwrap();
			} else if upper.starts_with("QUIT") {
				write_half.write_all(b"221 bye\r\n").await.unwrap();
				break;
			} else {
				write_half.write_all(b"500 unrecognized\r\n").await.unwrap();
			}
		}
	});

	port
}

/// Scenario 6: a mail exchanger that accepts every `RCPT TO`, including the
/// random catch-all probe, is reported as a catch-all, deliverable mailbox.
///
/// The fake server binds an OS-assigned ephemeral port rather than one of
/// `EverythingElse`'s tuned ports (25, 587), so the winning port is seeded
/// into the `SmtpPort` cache namespace ahead of the call — exactly the path
/// `open_with_port_probe` takes on a warm cache (§4.7).
#[tokio::test]
async fn catch_all_host_is_reported_deliverable_and_catch_all() {
	let port = spawn_accept_all_smtp_server().await;
	let cache = InProcessCache::new();
	cache.set(Namespace::SmtpPort, "127.0.0.1", &port).await;

	let mut policy = SmtpPolicy::default();
	policy.retries = 0;

	let outcome = check_smtp(
		"anyone",
		"example.com",
		"127.0.0.1",
		ProviderTag::EverythingElse,
		policy,
		false,
		None,
		&cache,
	)
	.await
	.expect("fake server always answers positively. qed.");

	assert!(outcome.is_deliverable);
	assert!(outcome.is_catch_all);
	assert_eq!(outcome.port, Some(port));
}

/// A fake legacy server: rejects `EHLO` with a 5xx, but speaks plain `HELO`
/// and then accepts every `RCPT TO`, same as [`spawn_accept_all_smtp_server`].
async fn spawn_helo_only_smtp_server() -> u16 {
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("loopback bind never fails in test env. qed.");
	let port = listener.local_addr().unwrap().port();

	tokio::spawn(async move {
		let (stream, _) = listener.accept().await.expect("test client always connects. qed.");
		let (read_half, mut write_half) = stream.into_split();
		let mut reader = BufReader::new(read_half);

		write_half.write_all(b"220 legacy.example SMTP\r\n").await.unwrap();

		loop {
			let mut line = String::new();
			let n = reader.read_line(&mut line).await.unwrap_or(0);
			if n == 0 {
				break;
			}
			let upper = line.to_uppercase();
			if upper.starts_with("EHLO") {
				write_half.write_all(b"500 command not recognized\r\n").await.unwrap();
			} else if upper.starts_with("HELO") {
				write_half.write_all(b"250 legacy.example\r\n").await.unwrap();
			} else if upper.starts_with("MAIL FROM") || upper.starts_with("RCPT TO") {
				write_half.write_all(b"250 OK\r\n").await.unwrap();
			} else if upper.starts_with("QUIT") {
				write_half.write_all(b"221 bye\r\n").await.unwrap();
				break;
			} else {
				write_half.write_all(b"500 unrecognized\r\n").await.unwrap();
			}
		}
	});

	port
}

/// §4.6: "on 5xx fall back to HELO". A server that rejects `EHLO` outright
/// must still be driven to a definitive verdict over plain `HELO`, rather
/// than being reported `unknown`.
#[tokio::test]
async fn ehlo_rejection_falls_back_to_helo() {
	let port = spawn_helo_only_smtp_server().await;
	let cache = InProcessCache::new();
	cache.set(Namespace::SmtpPort, "127.0.0.1", &port).await;

	let mut policy = SmtpPolicy::default();
	policy.retries = 0;

	let outcome = check_smtp(
		"anyone",
		"example.com",
		"127.0.0.1",
		ProviderTag::EverythingElse,
		policy,
		false,
		None,
		&cache,
	)
	.await
	.expect("legacy server falls back to HELO instead of failing. qed.");

	assert!(outcome.is_deliverable);
	assert!(outcome.is_catch_all);
	assert_eq!(outcome.port, Some(port));
}
