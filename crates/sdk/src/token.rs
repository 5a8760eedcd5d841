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

//! Bearer token issuance and verification.
//!
//! Tokens are opaque to clients: a base64url-encoded claims payload, a dot,
//! and a base64url-encoded HMAC-SHA256 signature over the payload. Structurally
//! similar to a JWT but deliberately not a JWT implementation — there is no
//! algorithm negotiation, only the one symmetric scheme §4.1.1 specifies.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

use crate::types::{Claims, Role, TokenType};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum TokenError {
	#[error("malformed token")]
	Malformed,
	#[error("signature mismatch")]
	BadSignature,
	#[error("token expired")]
	Expired,
	#[error("issuer or audience mismatch")]
	WrongAudience,
	#[error("wrong token type")]
	WrongType,
	#[error("signing key error: {0}")]
	Key(String),
}

pub struct TokenSigner {
	secret: Vec<u8>,
	issuer: String,
	audience: String,
	access_ttl_secs: i64,
	refresh_ttl_secs: i64,
}

impl TokenSigner {
	pub fn new(
		secret: impl Into<Vec<u8>>,
		issuer: impl Into<String>,
		audience: impl Into<String>,
		access_ttl_secs: i64,
		refresh_ttl_secs: i64,
	) -> Self {
		Self {
			secret: secret.into(),
			issuer: issuer.into(),
			audience: audience.into(),
			access_ttl_secs,
			refresh_ttl_secs,
		}
	}

	fn ttl_for(&self, token_type: TokenType) -> i64 {
		match token_type {
			TokenType::Access => self.access_ttl_secs,
			TokenType::Refresh => self.refresh_ttl_secs,
		}
	}

	/// Issues one token of the given type for `subject` with `roles`, at
	/// instant `now` (epoch seconds — passed in so callers control clock
	/// source, keeping this function deterministic for tests).
	pub fn issue(
		&self,
		subject: &str,
		roles: &[Role],
		token_type: TokenType,
		now: i64,
	) -> Result<(String, String), TokenError> {
		let jti = generate_jti();
		let claims = Claims {
			sub: subject.to_string(),
			roles: roles.to_vec(),
			jti: jti.clone(),
			token_type,
			iat: now,
			exp: now + self.ttl_for(token_type),
			iss: self.issuer.clone(),
			aud: self.audience.clone(),
		};
		let token = self.encode(&claims)?;
		Ok((token, jti))
	}

	fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
		let payload =
			serde_json::to_vec(claims).map_err(|e| TokenError::Key(e.to_string()))?;
		let payload_b64 = URL_SAFE_NO_PAD.encode(&payload);
		let sig = self.sign(payload_b64.as_bytes())?;
		Ok(format!("{payload_b64}.{}", URL_SAFE_NO_PAD.encode(&sig)))
	}

	fn sign(&self, data: &[u8]) -> Result<Vec<u8>, TokenError> {
		let mut mac = HmacSha256::new_from_slice(&self.secret)
			.map_err(|e| TokenError::Key(e.to_string()))?;
		mac.update(data);
		Ok(mac.finalize().into_bytes().to_vec())
	}

	/// Verifies signature, issuer, audience and expiry. Does not consult any
	/// revocation store — callers check the refresh-token live set themselves
	/// (revocation is a stateful concern layered on top of this stateless check).
	pub fn verify(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
		let (payload_b64, sig_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;
		let expected_sig = self.sign(payload_b64.as_bytes())?;
		let given_sig = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| TokenError::Malformed)?;
		if !constant_time_eq(&expected_sig, &given_sig) {
			return Err(TokenError::BadSignature);
		}
		let payload = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|_| TokenError::Malformed)?;
		let claims: Claims =
			serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
		if claims.iss != self.issuer || claims.aud != self.audience {
			return Err(TokenError::WrongAudience);
		}
		if claims.exp < now {
			return Err(TokenError::Expired);
		}
		Ok(claims)
	}

	/// Verifies and additionally requires `claims.token_type == expected`.
	pub fn verify_type(
		&self,
		token: &str,
		expected: TokenType,
		now: i64,
	) -> Result<Claims, TokenError> {
		let claims = self.verify(token, now)?;
		if claims.token_type != expected {
			return Err(TokenError::WrongType);
		}
		Ok(claims)
	}
}

fn generate_jti() -> String {
	uuid::Uuid::new_v4().to_string()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
	if a.len() != b.len() {
		return false;
	}
	let mut diff = 0u8;
	for (x, y) in a.iter().zip(b.iter()) {
		diff |= x ^ y;
	}
	diff == 0
}

/// Generates a cryptographically random 6-digit OTP (always zero-padded).
pub fn generate_otp() -> String {
	let mut rng = rand::thread_rng();
	let value = rng.next_u32() % 1_000_000;
	format!("{value:06}")
}

#[cfg(test)]
mod tests {
	use super::*;

	fn signer() -> TokenSigner {
		TokenSigner::new(
			b"01234567890123456789012345678901".to_vec(),
			"control-plane",
			"control-plane-clients",
			900,
			2_592_000,
		)
	}

	#[test]
	fn round_trips_and_verifies() {
		let s = signer();
		let (token, jti) = s
			.issue("user_1", &[Role::Customer], TokenType::Access, 1_000)
			.unwrap();
		let claims = s.verify_type(&token, TokenType::Access, 1_500).unwrap();
		assert_eq!(claims.sub, "user_1");
		assert_eq!(claims.jti, jti);
		assert_eq!(claims.exp, 1_000 + 900);
	}

	#[test]
	fn rejects_expired() {
		let s = signer();
		let (token, _) = s
			.issue("user_1", &[Role::Customer], TokenType::Access, 1_000)
			.unwrap();
		let err = s.verify(&token, 1_000 + 901).unwrap_err();
		assert!(matches!(err, TokenError::Expired));
	}

	#[test]
	fn rejects_wrong_type() {
		let s = signer();
		let (token, _) = s
			.issue("user_1", &[Role::Customer], TokenType::Refresh, 1_000)
			.unwrap();
		let err = s.verify_type(&token, TokenType::Access, 1_500).unwrap_err();
		assert!(matches!(err, TokenError::WrongType));
	}

	#[test]
	fn rejects_tampered_signature() {
		let s = signer();
		let (mut token, _) = s
			.issue("user_1", &[Role::Customer], TokenType::Access, 1_000)
			.unwrap();
		token.push('x');
		assert!(s.verify(&token, 1_500).is_err());
	}

	#[test]
	fn otp_is_six_digits() {
		for _ in 0..100 {
			let otp = generate_otp();
			assert_eq!(otp.len(), 6);
			assert!(otp.chars().all(|c| c.is_ascii_digit()));
		}
	}
}
