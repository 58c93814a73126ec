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

//! The batch runner (§4.11): fans a list of addresses out over a bounded
//! worker pool, collecting one result per input regardless of whether
//! that input's verification errored.

use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};

use crate::util::input_output::{BatchOptions, BatchResult, BatchSummary};
use crate::{verify, LOG_TARGET};

/// Run `options.template` against every address in `options.email_addresses`,
/// with at most `options.concurrency` verifications in flight at once
/// (§4.11, §5 "Backpressure"). A panic in one worker's verification never
/// affects the others: each is an independent `verify` call.
pub async fn verify_batch(options: BatchOptions) -> BatchResult {
	let start = Instant::now();
	let concurrency = options.concurrency.max(1);

	let results = stream::iter(options.email_addresses.clone())
		.map(|address| {
			let mut call_options = options.template.clone();
			call_options.email_address = address.clone();
			async move {
				let result = verify(call_options).await;
				(address, result)
			}
		})
		.buffer_unordered(concurrency)
		.collect::<Vec<_>>()
		.await;

	let mut summary = BatchSummary {
		total: results.len(),
		valid: 0,
		invalid: 0,
		errors: 0,
		duration_ms: 0,
	};

	let mut map = std::collections::HashMap::with_capacity(results.len());
	for (address, result) in results {
		use crate::types::Reachability;
		match result.reachability {
			Reachability::Safe | Reachability::Risky => summary.valid += 1,
			Reachability::Invalid => summary.invalid += 1,
			Reachability::Unknown => summary.errors += 1,
		}
		map.insert(address, result);
	}

	summary.duration_ms = elapsed_ms(start.elapsed());
	tracing::debug!(target: LOG_TARGET, total = summary.total, valid = summary.valid, invalid = summary.invalid, "batch complete");

	BatchResult { results: map, summary }
}

fn elapsed_ms(duration: Duration) -> u64 {
	duration.as_millis() as u64
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::util::input_output::VerifyOptionsBuilder;

	#[tokio::test]
	async fn every_input_produces_exactly_one_result() {
		let addresses = vec![
			"a".repeat(65) + "@x.com", // syntactically invalid, short-circuits
			"user@[invalid".to_string(),
		];
		let template = VerifyOptionsBuilder::default()
			.email_address("placeholder@example.com")
			.verify_mx(false)
			.verify_smtp(false)
			.build()
			.unwrap();
		let options = BatchOptions { email_addresses: addresses.clone(), concurrency: 2, template };
		let batch = verify_batch(options).await;
		assert_eq!(batch.results.len(), addresses.len());
		assert_eq!(batch.summary.total, addresses.len());
		for address in &addresses {
			assert!(batch.results.contains_key(address));
		}
	}
}
