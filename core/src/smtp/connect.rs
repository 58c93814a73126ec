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

//! The unified SMTP state machine (§4.6): a single dial-path that opens a
//! TCP (optionally SOCKS5-proxied) connection, reads the greeting, sends
//! `EHLO`, opportunistically upgrades to TLS via `STARTTLS`, and drives
//! `MAIL FROM`/`RCPT TO` against the target mailbox.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use fast_socks5::client::{Config as Socks5Config, Socks5Stream};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

use super::verif_method::{ProxyConfig, SmtpPolicy, TlsPolicy};
use crate::LOG_TARGET;

/// Any duplex byte stream the state machine can drive: a plain TCP
/// connection, a SOCKS5-tunneled one, or either wrapped in TLS after
/// `STARTTLS`.
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

pub type BoxedStream = Box<dyn Stream>;

/// Errors from driving the wire protocol itself, as opposed to errors the
/// *server* reports over SMTP (those become part of an [`SmtpReply`]).
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
	#[error("TLS error: {0}")]
	Tls(String),
	#[error("SOCKS5 error: {0}")]
	Socks5(#[from] fast_socks5::SocksError),
	#[error("unexpected reply {code}: {message}")]
	UnexpectedReply { code: u16, message: String },
	#[error("connection closed unexpectedly")]
	Closed,
	#[error("malformed reply line: {0:?}")]
	Malformed(String),
	#[error("operation timed out")]
	Timeout,
}

/// A parsed multi-line SMTP reply (RFC 5321 §4.2): a 3-digit code shared
/// by every line, the last line marked with a space instead of a `-`.
#[derive(Debug, Clone)]
pub struct SmtpReply {
	pub code: u16,
	pub lines: Vec<String>,
}

impl SmtpReply {
	/// 2xx/3xx: the command succeeded or more input is expected.
	pub fn is_positive(&self) -> bool {
		self.code < 400
	}

	/// 5xx: permanent failure.
	pub fn is_permanent_failure(&self) -> bool {
		self.code >= 500
	}

	/// 4xx: transient failure, the caller may retry.
	pub fn is_transient_failure(&self) -> bool {
		(400..500).contains(&self.code)
	}

	pub fn message(&self) -> String {
		self.lines.join(" ")
	}
}

async fn read_reply<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> Result<SmtpReply, ProtocolError> {
	let mut code = None;
	let mut lines = Vec::new();

	loop {
		let mut line = String::new();
		let n = reader.read_line(&mut line).await?;
		if n == 0 {
			return Err(ProtocolError::Closed);
		}
		let line = line.trim_end_matches(['\r', '\n']).to_string();
		if line.len() < 4 {
			return Err(ProtocolError::Malformed(line));
		}
		let (code_str, rest) = line.split_at(3);
		let this_code: u16 = code_str
			.parse()
			.map_err(|_| ProtocolError::Malformed(line.clone()))?;
		let separator = rest.chars().next().unwrap_or(' ');
		let text = rest.get(1..).unwrap_or("").to_string();

		if code.is_none() {
			code = Some(this_code);
		}
		lines.push(text);

		if separator == ' ' {
			break;
		}
		// '-' means more lines follow with the same code.
	}

	Ok(SmtpReply {
		code: code.expect("at least one reply line was read. qed."),
		lines,
	})
}

/// A single, already-greeted SMTP session. Owns the buffered stream and the
/// capabilities advertised by the server's `EHLO` response.
pub struct SmtpSession {
	reader: BufReader<BoxedStream>,
	pub capabilities: Vec<String>,
	pub using_tls: bool,
}

impl SmtpSession {
	async fn send_command(&mut self, command: &str) -> Result<(), ProtocolError> {
		tracing::debug!(target: LOG_TARGET, %command, "smtp >>");
		self.reader.get_mut().write_all(command.as_bytes()).await?;
		self.reader.get_mut().write_all(b"\r\n").await?;
		self.reader.get_mut().flush().await?;
		Ok(())
	}

	async fn read_reply(&mut self) -> Result<SmtpReply, ProtocolError> {
		let reply = read_reply(&mut self.reader).await?;
		tracing::debug!(target: LOG_TARGET, code = reply.code, message = %reply.message(), "smtp <<");
		Ok(reply)
	}

	/// Send a command and read back its reply in one step.
	pub async fn command(&mut self, command: &str) -> Result<SmtpReply, ProtocolError> {
		self.send_command(command).await?;
		self.read_reply().await
	}

	/// `EHLO`, recording the advertised capability lines.
	pub async fn ehlo(&mut self, hello_name: &str) -> Result<SmtpReply, ProtocolError> {
		let reply = self.command(&format!("EHLO {hello_name}")).await?;
		if reply.is_positive() {
			self.capabilities = reply.lines.iter().skip(1).cloned().collect();
		}
		Ok(reply)
	}

	/// `HELO`, the non-extended fallback for a server that rejects `EHLO`
	/// with a 5xx (§4.6: "on 5xx fall back to `HELO`"). `HELO` advertises no
	/// capabilities, so `STARTTLS` is simply unavailable for the rest of
	/// this session.
	pub async fn helo(&mut self, hello_name: &str) -> Result<SmtpReply, ProtocolError> {
		let reply = self.command(&format!("HELO {hello_name}")).await?;
		self.capabilities.clear();
		Ok(reply)
	}

	pub fn offers(&self, capability: &str) -> bool {
		self.capabilities
			.iter()
			.any(|line| line.to_uppercase().starts_with(&capability.to_uppercase()))
	}

	/// `MAIL FROM:<...>`.
	pub async fn mail_from(&mut self, from_email: &str) -> Result<SmtpReply, ProtocolError> {
		self.command(&format!("MAIL FROM:<{from_email}>")).await
	}

	/// `RCPT TO:<...>`, the step whose reply actually reveals mailbox
	/// existence (§4.6, §4.8).
	pub async fn rcpt_to(&mut self, to_email: &str) -> Result<SmtpReply, ProtocolError> {
		self.command(&format!("RCPT TO:<{to_email}>")).await
	}

	/// `VRFY <local>`, used opportunistically when a server advertises it
	/// (§4.6 Open Question: most modern servers disable it).
	pub async fn vrfy(&mut self, local: &str) -> Result<SmtpReply, ProtocolError> {
		self.command(&format!("VRFY {local}")).await
	}

	pub async fn quit(&mut self) -> Result<(), ProtocolError> {
		let _ = self.command("QUIT").await;
		Ok(())
	}
}

fn tls_connector() -> Result<TlsConnector, ProtocolError> {
	let mut roots = tokio_rustls::rustls::RootCertStore::empty();
	roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
	let config = tokio_rustls::rustls::ClientConfig::builder()
		.with_root_certificates(roots)
		.with_no_client_auth();
	Ok(TlsConnector::from(Arc::new(config)))
}

/// Build the TLS server-name for `STARTTLS`. IP-literal hosts must not
/// carry SNI (RFC 6066 §3: SNI is for DNS names only), so we use
/// `ServerName::IpAddress` there and skip hostname verification pitfalls
/// that come from sending an SNI extension a CA never signed for.
fn server_name(host: &str) -> Result<tokio_rustls::rustls::pki_types::ServerName<'static>, ProtocolError> {
	use tokio_rustls::rustls::pki_types::ServerName;

	let trimmed = host.trim_end_matches('.');
	if let Ok(ip) = trimmed.parse::<IpAddr>() {
		Ok(ServerName::IpAddress(ip.into()))
	} else {
		ServerName::try_from(trimmed.to_string()).map_err(|_| ProtocolError::Tls(format!("invalid server name: {host}")))
	}
}

async fn connect_tcp(host: &str, port: u16, connect_timeout: Duration) -> Result<TcpStream, ProtocolError> {
	let addr = format!("{host}:{port}");
	let stream = timeout(connect_timeout, TcpStream::connect(&addr))
		.await
		.map_err(|_| ProtocolError::Timeout)??;
	Ok(stream)
}

async fn connect_socks5(
	host: &str,
	port: u16,
	proxy: &ProxyConfig,
	connect_timeout: Duration,
) -> Result<Socks5Stream<TcpStream>, ProtocolError> {
	let proxy_addr = format!("{}:{}", proxy.host, proxy.port);
	let config = Socks5Config::default();

	let connect_fut = async {
		match (&proxy.username, &proxy.password) {
			(Some(user), Some(pass)) => {
				Socks5Stream::connect_with_password(&proxy_addr, host.to_string(), port, user.clone(), pass.clone(), config)
					.await
			}
			_ => Socks5Stream::connect(&proxy_addr, host.to_string(), port, config).await,
		}
	};

	let stream = timeout(connect_timeout, connect_fut)
		.await
		.map_err(|_| ProtocolError::Timeout)??;
	Ok(stream)
}

/// Open a fresh SMTP session against `host:port`: connect (optionally
/// through `proxy`), read the greeting, `EHLO` (falling back to `HELO` on
/// a 5xx reply), and opportunistically `STARTTLS` per `policy.tls_policy`
/// (§4.6).
pub async fn open_session(
	host: &str,
	port: u16,
	policy: &SmtpPolicy,
	proxy: Option<&ProxyConfig>,
) -> Result<SmtpSession, ProtocolError> {
	let boxed: BoxedStream = match proxy {
		Some(proxy) => Box::new(connect_socks5(host, port, proxy, policy.connect_timeout).await?),
		None => Box::new(connect_tcp(host, port, policy.connect_timeout).await?),
	};

	let mut reader = BufReader::new(boxed);
	let greeting = timeout(policy.command_timeout, read_reply(&mut reader))
		.await
		.map_err(|_| ProtocolError::Timeout)??;
	if !greeting.is_positive() {
		return Err(ProtocolError::UnexpectedReply {
			code: greeting.code,
			message: greeting.message(),
		});
	}

	let mut session = SmtpSession {
		reader,
		capabilities: Vec::new(),
		using_tls: false,
	};

	let ehlo_reply = timeout(policy.command_timeout, session.ehlo(&policy.hello_name))
		.await
		.map_err(|_| ProtocolError::Timeout)??;
	if !ehlo_reply.is_positive() {
		if !ehlo_reply.is_permanent_failure() {
			return Err(ProtocolError::UnexpectedReply {
				code: ehlo_reply.code,
				message: ehlo_reply.message(),
			});
		}
		// §4.6: "on 5xx fall back to HELO". A HELO-only server advertises no
		// capabilities, so the STARTTLS branch below is skipped naturally.
		let helo_reply = timeout(policy.command_timeout, session.helo(&policy.hello_name))
			.await
			.map_err(|_| ProtocolError::Timeout)??;
		if !helo_reply.is_positive() {
			return Err(ProtocolError::UnexpectedReply {
				code: helo_reply.code,
				message: helo_reply.message(),
			});
		}
	}

	if policy.tls_policy != TlsPolicy::None && session.offers("STARTTLS") {
		match upgrade_starttls(session, host, policy).await {
			Ok(upgraded) => session = upgraded,
			Err(err) if policy.tls_policy == TlsPolicy::Opportunistic => {
				tracing::debug!(target: LOG_TARGET, %err, "starttls failed, continuing in plaintext");
				return open_session_plaintext_fallback(host, port, policy, proxy).await;
			}
			Err(err) => return Err(err),
		}
	}

	Ok(session)
}

/// Re-dial without attempting TLS at all, used when `STARTTLS` itself
/// failed mid-handshake and the policy allows a lenient retry.
async fn open_session_plaintext_fallback(
	host: &str,
	port: u16,
	policy: &SmtpPolicy,
	proxy: Option<&ProxyConfig>,
) -> Result<SmtpSession, ProtocolError> {
	let mut plaintext_policy = policy.clone();
	plaintext_policy.tls_policy = TlsPolicy::None;

	let boxed: BoxedStream = match proxy {
		Some(proxy) => Box::new(connect_socks5(host, port, proxy, policy.connect_timeout).await?),
		None => Box::new(connect_tcp(host, port, policy.connect_timeout).await?),
	};
	let mut reader = BufReader::new(boxed);
	let greeting = timeout(policy.command_timeout, read_reply(&mut reader))
		.await
		.map_err(|_| ProtocolError::Timeout)??;
	if !greeting.is_positive() {
		return Err(ProtocolError::UnexpectedReply {
			code: greeting.code,
			message: greeting.message(),
		});
	}
	let mut session = SmtpSession {
		reader,
		capabilities: Vec::new(),
		using_tls: false,
	};
	timeout(policy.command_timeout, session.ehlo(&policy.hello_name))
		.await
		.map_err(|_| ProtocolError::Timeout)??;
	Ok(session)
}

async fn upgrade_starttls(mut session: SmtpSession, host: &str, policy: &SmtpPolicy) -> Result<SmtpSession, ProtocolError> {
	let reply = session.command("STARTTLS").await?;
	if !reply.is_positive() {
		return Err(ProtocolError::UnexpectedReply {
			code: reply.code,
			message: reply.message(),
		});
	}

	let connector = tls_connector()?;
	let name = server_name(host)?;
	let inner = session.reader.into_inner();
	let tls_stream = timeout(policy.command_timeout, connector.connect(name, inner))
		.await
		.map_err(|_| ProtocolError::Timeout)?
		.map_err(|e| ProtocolError::Tls(e.to_string()))?;

	let boxed: BoxedStream = Box::new(tls_stream);
	let mut upgraded = SmtpSession {
		reader: BufReader::new(boxed),
		capabilities: Vec::new(),
		using_tls: true,
	};
	// RFC 3207: capabilities must be re-negotiated inside the encrypted
	// channel, a pre-STARTTLS EHLO response is untrusted.
	upgraded.ehlo(&policy.hello_name).await?;
	Ok(upgraded)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;
	use tokio::io::BufReader as TokioBufReader;

	#[tokio::test]
	async fn parses_single_line_reply() {
		let data = b"250 OK\r\n".to_vec();
		let mut reader = TokioBufReader::new(Cursor::new(data));
		let reply = read_reply(&mut reader).await.unwrap();
		assert_eq!(reply.code, 250);
		assert_eq!(reply.message(), "OK");
		assert!(reply.is_positive());
	}

	#[tokio::test]
	async fn parses_multiline_reply() {
		let data = b"250-example.com at your service\r\n250-PIPELINING\r\n250 STARTTLS\r\n".to_vec();
		let mut reader = TokioBufReader::new(Cursor::new(data));
		let reply = read_reply(&mut reader).await.unwrap();
		assert_eq!(reply.code, 250);
		assert_eq!(reply.lines.len(), 3);
		assert_eq!(reply.lines[2], "STARTTLS");
	}

	#[tokio::test]
	async fn empty_stream_is_closed_error() {
		let data: Vec<u8> = Vec::new();
		let mut reader = TokioBufReader::new(Cursor::new(data));
		let err = read_reply(&mut reader).await.unwrap_err();
		assert!(matches!(err, ProtocolError::Closed));
	}

	#[tokio::test]
	async fn malformed_reply_line_is_rejected() {
		let data = b"nope\r\n".to_vec();
		let mut reader = TokioBufReader::new(Cursor::new(data));
		let err = read_reply(&mut reader).await.unwrap_err();
		assert!(matches!(err, ProtocolError::Malformed(_)));
	}

	#[test]
	fn reply_severity_classification() {
		let ok = SmtpReply { code: 250, lines: vec!["OK".into()] };
		assert!(ok.is_positive());
		let transient = SmtpReply { code: 450, lines: vec!["busy".into()] };
		assert!(transient.is_transient_failure());
		let permanent = SmtpReply { code: 550, lines: vec!["no such user".into()] };
		assert!(permanent.is_permanent_failure());
	}

	#[test]
	fn ip_literal_uses_ip_server_name() {
		let name = server_name("203.0.113.5").unwrap();
		assert!(matches!(name, tokio_rustls::rustls::pki_types::ServerName::IpAddress(_)));
	}

	#[test]
	fn hostname_uses_dns_server_name() {
		let name = server_name("mx.example.com.").unwrap();
		assert!(matches!(name, tokio_rustls::rustls::pki_types::ServerName::DnsName(_)));
	}
}
