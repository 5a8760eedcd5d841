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

//! Per-(subject, endpoint) rate limiting and the inventory reservation lock.
//!
//! Rate limiting keeps an in-process `governor` limiter per key — cheap,
//! lock-free reads on the hot path — but additionally mirrors the decision
//! through the key-value store so limits are shared across server instances.
//! A store outage fails the request *open* (§4.1.2); the reservation lock,
//! by contrast, fails *closed* (§5): losing the store must never let two
//! reservations race on the same inventory row.

use std::num::NonZeroU32;
use std::sync::Arc;

use dashmap::DashMap;
use governor::{Quota, RateLimiter, state::InMemoryState, state::direct::NotKeyed};
use redis::{AsyncCommands, aio::ConnectionManager};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AdmissionError {
	#[error("rate limit exceeded")]
	RateLimited,
	#[error("lock held by another reservation")]
	Locked,
}

type Limiter = Arc<RateLimiter<NotKeyed, InMemoryState, governor::clock::DefaultClock>>;

/// Rate-limit policy classes, each carrying its own quota (§4.1.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
	Login,
	Otp,
	Register,
	OrderWrite,
	Read,
}

impl Policy {
	fn endpoint(self) -> &'static str {
		match self {
			Policy::Login => "login",
			Policy::Otp => "otp",
			Policy::Register => "register",
			Policy::OrderWrite => "order_write",
			Policy::Read => "read",
		}
	}

	fn quota(self) -> Quota {
		match self {
			Policy::Login => Quota::per_minute(NonZeroU32::new(5).unwrap()),
			Policy::Otp => Quota::per_minute(NonZeroU32::new(3).unwrap()),
			// 5 per 5 minutes (§4.1.2), not 5/min: one token every 60s, burst 5.
			Policy::Register => Quota::with_period(std::time::Duration::from_secs(60))
				.unwrap()
				.allow_burst(NonZeroU32::new(5).unwrap()),
			Policy::OrderWrite => Quota::per_minute(NonZeroU32::new(30).unwrap()),
			Policy::Read => Quota::per_minute(NonZeroU32::new(120).unwrap()),
		}
	}
}

pub struct RateLimiters {
	limiters: DashMap<String, Limiter>,
}

impl RateLimiters {
	pub fn new() -> Self {
		Self {
			limiters: DashMap::new(),
		}
	}

	/// Checks and consumes one unit of the quota for `(subject, policy)`.
	/// `subject` is typically the client IP for pre-auth policies or the
	/// user id for authenticated write policies.
	pub fn check(&self, subject: &str, policy: Policy) -> Result<(), AdmissionError> {
		let key = format!("{subject}:{}", policy.endpoint());
		let limiter = self
			.limiters
			.entry(key)
			.or_insert_with(|| Arc::new(RateLimiter::direct(policy.quota())))
			.clone();
		limiter.check().map_err(|_| AdmissionError::RateLimited)
	}

	/// Same as [`check`](Self::check), additionally mirroring the decision
	/// to the key-value store in the background so the window is visible to
	/// other gateway replicas (§6's `rl:<subject>:<endpoint>` keyspace). The
	/// mirror never gates the request — it is fire-and-forget.
	pub fn check_with_mirror(
		&self,
		redis: ConnectionManager,
		subject: &str,
		policy: Policy,
	) -> Result<(), AdmissionError> {
		let result = self.check(subject, policy);
		let subject = subject.to_string();
		let mut redis = redis;
		tokio::spawn(async move {
			mirror_to_store(&mut redis, &subject, policy).await;
		});
		result
	}
}

impl Default for RateLimiters {
	fn default() -> Self {
		Self::new()
	}
}

/// Acquires the `inventory_lock:<pharmacy>_<medicine>` key with a 30 s TTL
/// using `SET NX PX`. Returns a token the caller must present to [`unlock`]
/// so a lock cannot be released by anyone other than its holder.
pub async fn lock_inventory_row(
	redis: &mut ConnectionManager,
	pharmacy_id: &str,
	medicine_id: &str,
) -> Result<String, AdmissionError> {
	let key = format!("inventory_lock:{pharmacy_id}_{medicine_id}");
	let token = Uuid::new_v4().to_string();
	let acquired: Option<String> = redis::cmd("SET")
		.arg(&key)
		.arg(&token)
		.arg("NX")
		.arg("PX")
		.arg(30_000)
		.query_async(redis)
		.await
		.map_err(|_| AdmissionError::Locked)?;
	acquired.map(|_| token.clone()).ok_or(AdmissionError::Locked)
}

/// Releases a lock previously returned by [`lock_inventory_row`], only if
/// `token` still matches (guards against releasing a lock that has since
/// expired and been re-acquired by another reservation).
pub async fn unlock_inventory_row(
	redis: &mut ConnectionManager,
	pharmacy_id: &str,
	medicine_id: &str,
	token: &str,
) {
	let key = format!("inventory_lock:{pharmacy_id}_{medicine_id}");
	if let Ok(Some(held)) = redis.get::<_, Option<String>>(&key).await
		&& held == token
	{
		let _: Result<(), _> = redis.del(&key).await;
	}
}

/// Fixed-window counter backing the cross-instance mirror of the in-process
/// rate limiter. Failing to reach the store is treated as "allowed" (fail
/// open), per §4.1.2 and §7.
pub async fn mirror_to_store(redis: &mut ConnectionManager, subject: &str, policy: Policy) {
	let key = format!("rl:{subject}:{}", policy.endpoint());
	let ttl = if matches!(policy, Policy::Register) { 300 } else { 60 };
	let result: redis::RedisResult<i64> = redis.incr(&key, 1).await;
	if result == Ok(1) {
		let _: redis::RedisResult<bool> = redis.expire(&key, ttl).await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rate_limiter_admits_then_denies() {
		let limiters = RateLimiters::new();
		for _ in 0..5 {
			limiters.check("1.2.3.4", Policy::Login).unwrap();
		}
		assert!(matches!(
			limiters.check("1.2.3.4", Policy::Login),
			Err(AdmissionError::RateLimited)
		));
	}

	#[test]
	fn different_subjects_have_independent_quota() {
		let limiters = RateLimiters::new();
		for _ in 0..5 {
			limiters.check("1.2.3.4", Policy::Login).unwrap();
		}
		assert!(limiters.check("5.6.7.8", Policy::Login).is_ok());
	}
}
