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

//! Idempotency-key anchor for order creation (§4.3, §8 invariant 4): at most
//! one order exists per key. Backed by the orders collection itself rather
//! than a separate journal — the order document *is* the anchor.

use mongodb::bson::doc;
use pharma_sdk::{ApiError, ErrorCode, Order};
use tracing::error;

use crate::store::Collections;

/// Looks up a pre-existing order created under `key` for `customer_id`. A
/// hit here short-circuits order creation entirely: the full prior response
/// is reproduced, including the original delivery OTP (§4.3 step 1).
pub async fn find_existing(
	db: &Collections,
	customer_id: &str,
	key: &str,
) -> Result<Option<Order>, ApiError> {
	db.orders
		.find_one(doc! { "customer_id": customer_id, "idempotency_key": key })
		.await
		.map_err(|e| {
			error!(error = %e, "document store error during idempotency lookup");
			ApiError::new(ErrorCode::DatabaseError, "idempotency lookup failed")
		})
}
