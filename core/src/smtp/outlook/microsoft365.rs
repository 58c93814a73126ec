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

//! The Microsoft 365 / Graph API side-channel (supplemented feature, see
//! SPEC_FULL.md §4.9): a tenant-scoped Graph API lookup, tried before the
//! generic WebDriver recovery flow for `hotmailB2B`/`hotmailB2C` mailboxes
//! when the caller has configured application credentials.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const TOKEN_URL_TEMPLATE: &str = "https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token";
const GRAPH_USERS_URL: &str = "https://graph.microsoft.com/v1.0/users";

#[derive(Debug, Error, Serialize)]
pub enum Microsoft365Error {
	#[error("HTTP request to Microsoft Graph failed: {0}")]
	#[serde(serialize_with = "crate::util::ser_with_display::ser_with_display")]
	Reqwest(reqwest::Error),
	#[error("failed to acquire an application access token: {0}")]
	TokenAcquisition(String),
	#[error("Microsoft Graph returned a non-2xx status: {0}")]
	UnexpectedStatus(u16),
	#[error("no application credentials configured for this tenant")]
	NotConfigured,
}

impl From<reqwest::Error> for Microsoft365Error {
	fn from(e: reqwest::Error) -> Self {
		Microsoft365Error::Reqwest(e)
	}
}

/// Application (client-credentials) registration for one Microsoft 365
/// tenant, needed to call Graph's `/users` endpoint.
#[derive(Debug, Clone)]
pub struct GraphAppCredentials {
	pub tenant_id: String,
	pub client_id: String,
	pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
	access_token: String,
}

#[derive(Debug, Deserialize)]
struct GraphUserLookup {
	#[serde(default)]
	value: Vec<serde_json::Value>,
}

async fn acquire_token(client: &reqwest::Client, creds: &GraphAppCredentials) -> Result<String, Microsoft365Error> {
	let url = TOKEN_URL_TEMPLATE.replace("{tenant}", &creds.tenant_id);
	let response = client
		.post(&url)
		.form(&[
			("client_id", creds.client_id.as_str()),
			("client_secret", creds.client_secret.as_str()),
			("scope", "https://graph.microsoft.com/.default"),
			("grant_type", "client_credentials"),
		])
		.send()
		.await?;

	if !response.status().is_success() {
		return Err(Microsoft365Error::TokenAcquisition(format!(
			"token endpoint returned {}",
			response.status()
		)));
	}

	let parsed: TokenResponse = response
		.json()
		.await
		.map_err(|e| Microsoft365Error::TokenAcquisition(e.to_string()))?;
	Ok(parsed.access_token)
}

/// Query the tenant's user directory via the Graph API for `email`; the
/// user exists iff Graph returns at least one matching entry (§4.9
/// supplemented feature).
pub async fn probe_mailbox(
	client: &reqwest::Client,
	creds: &GraphAppCredentials,
	email: &str,
) -> Result<bool, Microsoft365Error> {
	let token = acquire_token(client, creds).await?;

	let filter = format!("mail eq '{email}' or userPrincipalName eq '{email}'");
	let response = client
		.get(GRAPH_USERS_URL)
		.bearer_auth(token)
		.query(&[("$filter", filter.as_str())])
		.send()
		.await?;

	if !response.status().is_success() {
		return Err(Microsoft365Error::UnexpectedStatus(response.status().as_u16()));
	}

	let parsed: GraphUserLookup = response.json().await?;
	Ok(!parsed.value.is_empty())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lookup_filter_matches_mail_or_upn() {
		let email = "user@example.com";
		let filter = format!("mail eq '{email}' or userPrincipalName eq '{email}'");
		assert!(filter.contains("mail eq"));
		assert!(filter.contains("userPrincipalName eq"));
	}

	#[test]
	fn empty_value_list_means_no_match() {
		let lookup = GraphUserLookup { value: vec![] };
		assert!(lookup.value.is_empty());
	}
}
