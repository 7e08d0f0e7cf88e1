// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stable percentage bucketing.
//!
//! A subject is mapped to a bucket in `0..100` from the first four bytes of the
//! SHA-256 digest of its identifier. The bucket never changes for a given
//! identifier, so raising the rollout percentage only ever adds subjects.

use sha2::{Digest, Sha256};

/// Number of buckets a subject can fall into.
pub const BUCKET_COUNT: u32 = 100;

/// Returns the stable bucket (`0..100`) for a subject identifier.
///
/// An empty identifier hashes the empty string, so every anonymous caller
/// lands in the same bucket.
pub fn bucket_for(subject_id: &str) -> u32 {
	let digest = Sha256::digest(subject_id.as_bytes());
	let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
	prefix % BUCKET_COUNT
}

/// Returns true when `subject_id` falls inside a rollout of `percentage`.
///
/// `100` admits everyone and `0` nobody, neither touching the hash. Values
/// outside `0..=100` are treated as `0`.
pub fn is_in_rollout(subject_id: &str, percentage: i64) -> bool {
	match percentage {
		100 => true,
		p if p <= 0 || p > 100 => false,
		p => i64::from(bucket_for(subject_id)) < p,
	}
}
