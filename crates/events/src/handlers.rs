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

//! Per-topic fan-out (§4.8). Notification delivery (SMS/email/push) and
//! full-text re-indexing are external collaborators (§1, non-goals): these
//! handlers do the in-scope part — deciding *that* a notification or
//! re-index signal is owed — and log the decision where a real system would
//! enqueue onto those external queues.

use anyhow::{Context, Result};
use chrono::Utc;
use mongodb::bson::doc;
use pharma_sdk::EventEnvelope;
use serde_json::Value;
use tracing::{info, warn};

use crate::store::EventsState;

pub async fn order_created(state: &EventsState, envelope: &EventEnvelope<Value>) -> Result<()> {
	let order_id = field(&envelope.payload, "order_id")?;
	let user_id = field(&envelope.payload, "user_id")?;
	let pharmacy_id = field(&envelope.payload, "pharmacy_id")?;
	info!(order_id, user_id, pharmacy_id, "order confirmation queued for customer and pharmacy");
	Ok(())
}

pub async fn order_paid(_state: &EventsState, envelope: &EventEnvelope<Value>) -> Result<()> {
	let order_id = field(&envelope.payload, "order_id")?;
	let delivery_id = field(&envelope.payload, "delivery_id")?;
	info!(order_id, delivery_id, "order paid, delivery already created by producer");
	Ok(())
}

pub async fn order_cancelled(_state: &EventsState, envelope: &EventEnvelope<Value>) -> Result<()> {
	let order_id = field(&envelope.payload, "order_id")?;
	let user_id = field(&envelope.payload, "user_id")?;
	info!(order_id, user_id, "cancellation notice queued for customer");
	Ok(())
}

pub async fn delivery_created(state: &EventsState, envelope: &EventEnvelope<Value>) -> Result<()> {
	let delivery_id = field(&envelope.payload, "delivery_id")?;
	let pharmacy_id = field(&envelope.payload, "pharmacy_id")?;
	let driver_count = state
		.db
		.users
		.count_documents(doc! { "roles": "driver", "verified": true })
		.await
		.context("counting verified drivers")?;
	info!(delivery_id, pharmacy_id, candidate_drivers = driver_count, "delivery broadcast queued for eligible drivers");
	Ok(())
}

pub async fn delivery_updated(_state: &EventsState, envelope: &EventEnvelope<Value>) -> Result<()> {
	let delivery_id = field(&envelope.payload, "delivery_id")?;
	let status = field(&envelope.payload, "status")?;
	let user_id = field(&envelope.payload, "user_id")?;
	info!(delivery_id, status, user_id, "status-change notice queued for customer");
	Ok(())
}

pub async fn inventory_updated(state: &EventsState, envelope: &EventEnvelope<Value>) -> Result<()> {
	let pharmacy_id = field(&envelope.payload, "pharmacy_id")?;
	let medicine_id = field(&envelope.payload, "medicine_id")?;

	let row = state
		.db
		.inventory
		.find_one(doc! { "pharmacy_id": pharmacy_id, "medicine_id": medicine_id })
		.await
		.context("loading inventory row for low-stock/expiry check")?;

	let Some(row) = row else {
		warn!(pharmacy_id, medicine_id, "inventory row vanished before re-index check ran");
		return Ok(());
	};

	if row.available_qty < state.low_stock_threshold {
		warn!(
			pharmacy_id,
			medicine_id,
			available_qty = row.available_qty,
			threshold = state.low_stock_threshold,
			"low stock"
		);
	}

	let days_to_expiry = (row.expiry_date - Utc::now()).num_days();
	if days_to_expiry <= state.expiry_warning_days {
		warn!(pharmacy_id, medicine_id, days_to_expiry, "batch nearing expiry");
	}

	info!(pharmacy_id, medicine_id, "re-index signal emitted");
	Ok(())
}

fn field<'a>(payload: &'a Value, name: &str) -> Result<&'a str> {
	payload
		.get(name)
		.and_then(Value::as_str)
		.with_context(|| format!("event payload missing string field `{name}`"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn field_reads_present_string() {
		let payload = serde_json::json!({ "order_id": "ord_1" });
		assert_eq!(field(&payload, "order_id").unwrap(), "ord_1");
	}

	#[test]
	fn field_rejects_missing_key() {
		let payload = serde_json::json!({ "order_id": "ord_1" });
		assert!(field(&payload, "user_id").is_err());
	}

	#[test]
	fn field_rejects_non_string_value() {
		let payload = serde_json::json!({ "order_id": 42 });
		assert!(field(&payload, "order_id").is_err());
	}
}
