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

//! Payment intake (§4.5): webhook-shaped external party drives the order's
//! payment status; a `pending -> paid` transition materializes a Delivery.

use actix_web::{HttpResponse, web};
use chrono::Utc;
use mongodb::bson::doc;
use pharma_sdk::{ApiError, Delivery, DeliveryStatus, ErrorCode, PaymentStatus, RoutingKey, Topic};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use crate::response::ApiResponse;
use crate::store::AppState;

#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
	pub order_id: String,
	pub payment_status: String,
	pub transaction_id: String,
}

pub async fn webhook(state: web::Data<AppState>, body: web::Json<WebhookRequest>) -> Result<HttpResponse, ApiError> {
	let payment_status = parse_payment_status(&body.payment_status)?;
	apply_payment(&state, &body.order_id, payment_status, &body.transaction_id).await
}

#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
	pub order_id: String,
}

/// Dev-only endpoint that drives the same path as [`webhook`] with a
/// synthesized transaction id (§4.5).
pub async fn simulate(state: web::Data<AppState>, body: web::Json<SimulateRequest>) -> Result<HttpResponse, ApiError> {
	let transaction_id = format!("sim_{}", Uuid::new_v4());
	apply_payment(&state, &body.order_id, PaymentStatus::Paid, &transaction_id).await
}

async fn apply_payment(
	state: &AppState,
	order_id: &str,
	payment_status: PaymentStatus,
	transaction_id: &str,
) -> Result<HttpResponse, ApiError> {
	let order = state
		.db
		.orders
		.find_one(doc! { "id": order_id })
		.await
		.map_err(db_err)?
		.ok_or_else(|| ApiError::new(ErrorCode::OrderNotFound, "order not found"))?;

	state
		.db
		.orders
		.update_one(
			doc! { "id": order_id },
			doc! { "$set": { "payment_status": payment_status_str(payment_status) } },
		)
		.await
		.map_err(db_err)?;

	if order.payment_status != PaymentStatus::Paid && payment_status == PaymentStatus::Paid {
		let now = Utc::now();
		let delivery = Delivery {
			id: format!("delivery_{}", Uuid::new_v4()),
			order_id: order.id.clone(),
			driver_id: None,
			status: DeliveryStatus::Assigned,
			pickup_location: None,
			delivery_location: None,
			current_location: None,
			notes: None,
			assigned_at: now,
			picked_up_at: None,
			delivered_at: None,
		};
		// The unique index on deliveries.order_id (§8 invariant 6), not this
		// read-then-write check, is what arbitrates two racing webhooks for the
		// same order: only one insert wins, the loser adopts the winner's row.
		let delivery = match state.db.deliveries.insert_one(&delivery).await {
			Ok(_) => delivery,
			Err(e) if crate::store::is_duplicate_key(&e) => state
				.db
				.deliveries
				.find_one(doc! { "order_id": order_id })
				.await
				.map_err(db_err)?
				.ok_or_else(|| ApiError::new(ErrorCode::DeliveryNotFound, "delivery disappeared after conflict"))?,
			Err(e) => return Err(db_err(e)),
		};
		state
			.db
			.orders
			.update_one(doc! { "id": order_id }, doc! { "$set": { "delivery_id": &delivery.id } })
			.await
			.map_err(db_err)?;

		state.events.emit(
			Topic::Orders,
			RoutingKey::Paid,
			serde_json::json!({
				"order_id": order.id,
				"delivery_id": delivery.id,
				"pharmacy_id": order.pharmacy_id,
				"total": order.total_amount,
			}),
		);
	}

	Ok(ApiResponse::ok(serde_json::json!({
		"order_id": order_id,
		"payment_status": body_status_str(payment_status),
		"transaction_id": transaction_id,
	})))
}

fn parse_payment_status(raw: &str) -> Result<PaymentStatus, ApiError> {
	match raw {
		"pending" => Ok(PaymentStatus::Pending),
		"paid" => Ok(PaymentStatus::Paid),
		"failed" => Ok(PaymentStatus::Failed),
		"refunded" => Ok(PaymentStatus::Refunded),
		_ => Err(ApiError::new(ErrorCode::ValidationError, "unrecognized payment status")),
	}
}

fn payment_status_str(status: PaymentStatus) -> &'static str {
	body_status_str(status)
}

fn body_status_str(status: PaymentStatus) -> &'static str {
	match status {
		PaymentStatus::Pending => "pending",
		PaymentStatus::Paid => "paid",
		PaymentStatus::Failed => "failed",
		PaymentStatus::Refunded => "refunded",
	}
}

fn db_err(e: mongodb::error::Error) -> ApiError {
	error!(error = %e, "document store error");
	ApiError::new(ErrorCode::DatabaseError, "document store error")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_known_statuses() {
		assert_eq!(parse_payment_status("paid").unwrap(), PaymentStatus::Paid);
		assert!(parse_payment_status("bogus").is_err());
	}
}
