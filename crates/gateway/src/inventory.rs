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

//! Inventory Coordinator (§4.4): reserve, release and commit against one
//! `(pharmacy, medicine)` row, guarded by the distributed lock in
//! [`crate::admission`] plus a conditional atomic update as the TOCTOU
//! safety net described in §5.

use chrono::Utc;
use mongodb::bson::doc;
use mongodb::options::ReturnDocument;
use pharma_sdk::{ApiError, ErrorCode, InventoryRow};
use redis::aio::ConnectionManager;
use tracing::error;

use crate::admission::{self, AdmissionError};
use crate::events::EventOutbox;
use crate::store::Collections;

/// A successful reservation: the batch and price captured onto the order
/// line, plus everything [`release`] needs to undo exactly this reservation.
pub struct Reservation {
	pub batch_number: String,
	pub selling_price: f64,
	pub pharmacy_id: String,
	pub medicine_id: String,
	pub qty: u32,
}

pub async fn reserve(
	db: &Collections,
	redis: &mut ConnectionManager,
	pharmacy_id: &str,
	medicine_id: &str,
	qty: u32,
) -> Result<Reservation, ApiError> {
	let lock_token = admission::lock_inventory_row(redis, pharmacy_id, medicine_id)
		.await
		.map_err(|e| match e {
			AdmissionError::Locked => {
				ApiError::new(ErrorCode::InventoryLocked, "inventory row is locked")
			}
			AdmissionError::RateLimited => unreachable!("lock_inventory_row never rate-limits"),
		})?;

	let result = reserve_inner(db, pharmacy_id, medicine_id, qty).await;
	admission::unlock_inventory_row(redis, pharmacy_id, medicine_id, &lock_token).await;
	result
}

async fn reserve_inner(
	db: &Collections,
	pharmacy_id: &str,
	medicine_id: &str,
	qty: u32,
) -> Result<Reservation, ApiError> {
	let now = Utc::now();
	let filter = doc! {
		"pharmacy_id": pharmacy_id,
		"medicine_id": medicine_id,
		"expiry_date": { "$gt": now },
		"available_qty": { "$gte": qty as i64 },
	};
	let candidate = db
		.inventory
		.find_one(filter)
		.sort(doc! { "expiry_date": 1 })
		.await
		.map_err(|e| {
			error!(error = %e, "document store error selecting inventory batch");
			ApiError::new(ErrorCode::DatabaseError, "inventory lookup failed")
		})?
		.ok_or_else(|| ApiError::new(ErrorCode::InsufficientStock, "no viable batch"))?;

	let update_filter = doc! {
		"id": &candidate.id,
		"available_qty": { "$gte": qty as i64 },
	};
	let update = doc! {
		"$inc": { "available_qty": -(qty as i64), "reserved_qty": qty as i64 },
	};
	let updated: Option<InventoryRow> = db
		.inventory
		.find_one_and_update(update_filter, update)
		.return_document(ReturnDocument::After)
		.await
		.map_err(|e| {
			error!(error = %e, "document store error committing reservation");
			ApiError::new(ErrorCode::DatabaseError, "reservation update failed")
		})?;

	match updated {
		Some(row) => Ok(Reservation {
			batch_number: row.batch_number,
			selling_price: row.selling_price,
			pharmacy_id: pharmacy_id.to_string(),
			medicine_id: medicine_id.to_string(),
			qty,
		}),
		None => Err(ApiError::new(
			ErrorCode::InsufficientStock,
			"concurrent reservation won the race",
		)),
	}
}

/// Releases a reservation made by [`reserve`], keyed by the exact batch
/// captured at reservation time — never a different batch for the same row.
pub async fn release(db: &Collections, reservation: &Reservation) {
	let filter = doc! {
		"pharmacy_id": &reservation.pharmacy_id,
		"medicine_id": &reservation.medicine_id,
		"batch_number": &reservation.batch_number,
	};
	let update = doc! {
		"$inc": { "available_qty": reservation.qty as i64, "reserved_qty": -(reservation.qty as i64) },
	};
	if let Err(e) = db.inventory.update_one(filter, update).await {
		error!(error = %e, "failed to release inventory reservation");
	}
}

/// Commits a reservation on successful delivery: decrements `reserved_qty`
/// only (`available_qty` already moved at reservation time). Emits
/// `inventory.updated`; a publish failure is logged, never surfaced to the
/// caller (§4.4).
pub async fn commit(
	db: &Collections,
	events: &EventOutbox,
	pharmacy_id: &str,
	medicine_id: &str,
	batch_number: &str,
	qty: u32,
) {
	let filter = doc! {
		"pharmacy_id": pharmacy_id,
		"medicine_id": medicine_id,
		"batch_number": batch_number,
	};
	let update = doc! { "$inc": { "reserved_qty": -(qty as i64) } };
	if let Err(e) = db.inventory.update_one(filter, update).await {
		error!(error = %e, "failed to commit inventory reservation");
		return;
	}
	events.emit(
		pharma_sdk::Topic::Inventory,
		pharma_sdk::RoutingKey::Updated,
		serde_json::json!({ "pharmacy_id": pharmacy_id, "medicine_id": medicine_id }),
	);
}
