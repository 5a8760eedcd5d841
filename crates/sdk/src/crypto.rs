// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Adaptive password hashing (Argon2id). The work factor is configurable
//! (§6 environment surface: "KDF work factor") so it can be lowered in tests.

use argon2::{
	Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
	password_hash::{SaltString, rand_core::OsRng},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
	#[error("failed to hash password")]
	HashFailed,
	#[error("failed to verify password")]
	VerifyFailed,
}

/// Hashes `password` with Argon2id using the default parameter set scaled by
/// `work_factor` memory cost (KiB). Returns the PHC string format, storable
/// directly as the user's password digest.
pub fn hash_password(password: &str, work_factor_kib: u32) -> Result<String, PasswordError> {
	let salt = SaltString::generate(&mut OsRng);
	let params = argon2::Params::new(work_factor_kib, 2, 1, None)
		.map_err(|_| PasswordError::HashFailed)?;
	let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
	argon2
		.hash_password(password.as_bytes(), &salt)
		.map(|h| h.to_string())
		.map_err(|_| PasswordError::HashFailed)
}

/// Verifies `password` against a digest produced by [`hash_password`].
/// Returns `Ok(false)` (not an error) on mismatch so callers can fold
/// "wrong password" and "user not found" into one indistinguishable branch,
/// per §4.1's account-enumeration guard.
pub fn verify_password(password: &str, digest: &str) -> Result<bool, PasswordError> {
	let parsed = PasswordHash::new(digest).map_err(|_| PasswordError::VerifyFailed)?;
	Ok(Argon2::default()
		.verify_password(password.as_bytes(), &parsed)
		.is_ok())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hash_then_verify_round_trips() {
		let digest = hash_password("securePass123", 8).unwrap();
		assert!(verify_password("securePass123", &digest).unwrap());
		assert!(!verify_password("wrongPass", &digest).unwrap());
	}
}
