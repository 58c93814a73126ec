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

//! Thin command-line harness over `mailverify-core`: parses flags, builds
//! a `VerifyOptions`/`BatchOptions`, and prints the result as JSON.

use std::time::Duration;

use clap::Parser;
use mailverify_core::util::input_output::{BatchOptionsBuilder, VerifyOptionsBuilder};
use mailverify_core::{verify, verify_batch};

#[derive(Parser, Debug)]
#[clap(name = "mailverify", about = "Check if an email address is deliverable, without sending any email.")]
struct Cli {
	/// Email address(es) to verify. Pass more than one to run a batch.
	#[clap(required = true)]
	emails: Vec<String>,

	/// Run the MX resolver.
	#[clap(long, default_value = "true")]
	verify_mx: bool,

	/// Run the SMTP state machine against the domain's mail exchanger.
	#[clap(long)]
	verify_smtp: bool,

	/// Apply the per-provider SMTP tuning table and allow retries.
	#[clap(long)]
	enable_provider_optimizations: bool,

	/// Overall deadline per address, in milliseconds.
	#[clap(long, default_value = "5000")]
	timeout_ms: u64,

	/// Number of addresses verified concurrently when more than one is given.
	#[clap(long, default_value = "5")]
	concurrency: usize,

	/// Pretty-print the JSON output.
	#[clap(long)]
	pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt::init();

	let cli = Cli::parse();

	let template = VerifyOptionsBuilder::default()
		.email_address("")
		.timeout(Duration::from_millis(cli.timeout_ms))
		.verify_mx(cli.verify_mx)
		.verify_smtp(cli.verify_smtp)
		.enable_provider_optimizations(cli.enable_provider_optimizations)
		.build()?;

	let output = if cli.emails.len() == 1 {
		let mut options = template;
		options.email_address = cli.emails[0].clone();
		serde_json::to_value(verify(options).await)?
	} else {
		let batch = BatchOptionsBuilder::default()
			.email_addresses(cli.emails)
			.concurrency(cli.concurrency)
			.template(template)
			.build()?;
		serde_json::to_value(verify_batch(batch).await)?
	};

	if cli.pretty {
		println!("{}", serde_json::to_string_pretty(&output)?);
	} else {
		println!("{}", serde_json::to_string(&output)?);
	}

	Ok(())
}
