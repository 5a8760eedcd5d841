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

//! Order Service (§4.2, §4.3): creation, listing, cancellation and rating.

use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::doc;
use pharma_sdk::{
	Address, ApiError, ErrorCode, Order, OrderItem, OrderStatus, PaymentStatus, RoutingKey, Topic,
	token::generate_otp,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::admission::Policy;
use crate::auth::AuthContext;
use crate::idempotency;
use crate::inventory;
use crate::response::ApiResponse;
use crate::state_machine;
use crate::store::AppState;

const TAX_RATE: f64 = 0.18;
const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Deserialize)]
pub struct CreateOrderItem {
	pub medicine_id: String,
	pub pharmacy_id: String,
	pub qty: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
	pub items: Vec<CreateOrderItem>,
	pub shipping_address: Address,
}

impl CreateOrderRequest {
	fn validate(&self) -> Result<(), ApiError> {
		if self.items.is_empty() {
			return Err(ApiError::new(ErrorCode::ValidationError, "at least one item is required"));
		}
		for item in &self.items {
			if item.qty == 0 || item.qty > 100 {
				return Err(ApiError::new(ErrorCode::ValidationError, "qty must be between 1 and 100"));
			}
		}
		Ok(())
	}
}

pub async fn create_order(
	state: web::Data<AppState>,
	req: HttpRequest,
	auth: AuthContext,
	body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, ApiError> {
	state
		.rate_limiters
		.check_with_mirror(state.redis.clone(), &auth.user_id, Policy::OrderWrite)
		.map_err(|_| ApiError::new(ErrorCode::RateLimited, "too many order writes"))?;
	body.validate()?;

	let idempotency_key = req
		.headers()
		.get(IDEMPOTENCY_HEADER)
		.and_then(|v| v.to_str().ok())
		.map(|s| s.chars().take(100).collect::<String>());

	if let Some(key) = &idempotency_key
		&& let Some(existing) = idempotency::find_existing(&state.db, &auth.user_id, key).await?
	{
		return Ok(ApiResponse::created(existing));
	}

	let pharmacy_id = body.items[0].pharmacy_id.clone();
	if body.items.iter().any(|i| i.pharmacy_id != pharmacy_id) {
		return Err(ApiError::new(ErrorCode::BadRequest, "orders may only contain one pharmacy"));
	}

	let pharmacy = state
		.db
		.pharmacies
		.find_one(doc! { "id": &pharmacy_id })
		.await
		.map_err(db_err)?
		.ok_or_else(|| ApiError::new(ErrorCode::PharmacyNotFound, "pharmacy not found"))?;
	if !pharmacy.active {
		return Err(ApiError::new(ErrorCode::PharmacyNotFound, "pharmacy is not active"));
	}

	let mut redis = state.redis.clone();
	let mut reservations = Vec::with_capacity(body.items.len());
	let mut order_items = Vec::with_capacity(body.items.len());
	let mut total_amount = 0.0;

	for item in &body.items {
		match inventory::reserve(&state.db, &mut redis, &pharmacy_id, &item.medicine_id, item.qty).await {
			Ok(reservation) => {
				let line_subtotal = reservation.selling_price * item.qty as f64;
				let tax = line_subtotal * TAX_RATE;
				total_amount += line_subtotal + tax;
				order_items.push(OrderItem {
					medicine_id: item.medicine_id.clone(),
					batch_number: reservation.batch_number.clone(),
					qty: item.qty,
					unit_price: reservation.selling_price,
					tax,
				});
				reservations.push(reservation);
			}
			Err(e) => {
				// All-or-nothing at order granularity (§4.3): undo everything
				// reserved so far before surfacing the failure, with line-level
				// detail identifying which item could not be reserved.
				for r in &reservations {
					inventory::release(&state.db, r).await;
				}
				return Err(e.with_details(serde_json::json!({
					"medicine_id": item.medicine_id,
					"pharmacy_id": pharmacy_id,
					"qty": item.qty,
				})));
			}
		}
	}

	let now = Utc::now();
	let order = Order {
		id: format!("order_{}", Uuid::new_v4()),
		customer_id: auth.user_id.clone(),
		pharmacy_id: pharmacy_id.clone(),
		items: order_items,
		total_amount: (total_amount * 100.0).round() / 100.0,
		status: OrderStatus::Created,
		payment_status: PaymentStatus::Pending,
		shipping_address: body.shipping_address.clone(),
		idempotency_key: idempotency_key.clone(),
		otp_for_delivery: generate_otp(),
		delivery_id: None,
		rating: None,
		review: None,
		cancellation_reason: None,
		created_at: now,
		updated_at: now,
	};

	if let Err(e) = state.db.orders.insert_one(&order).await {
		for r in &reservations {
			inventory::release(&state.db, r).await;
		}
		// The unique index on `idempotency_key` is the real arbiter (§5, §8
		// invariant 4): a racing identical create that won the insert means
		// this one lost it, so replay that winner's order instead of erroring.
		if crate::store::is_duplicate_key(&e)
			&& let Some(key) = &idempotency_key
			&& let Some(existing) = idempotency::find_existing(&state.db, &auth.user_id, key).await?
		{
			return Ok(ApiResponse::created(existing));
		}
		return Err(db_err(e));
	}

	state.events.emit(
		Topic::Orders,
		RoutingKey::Created,
		serde_json::json!({
			"order_id": order.id,
			"user_id": order.customer_id,
			"pharmacy_id": order.pharmacy_id,
			"items": order.items,
			"total": order.total_amount,
		}),
	);

	Ok(ApiResponse::created(order))
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
	pub page: Option<u64>,
	pub size: Option<u64>,
	pub status: Option<String>,
}

pub async fn list_orders(
	state: web::Data<AppState>,
	auth: AuthContext,
	query: web::Query<ListOrdersQuery>,
) -> Result<HttpResponse, ApiError> {
	state
		.rate_limiters
		.check_with_mirror(state.redis.clone(), &auth.user_id, Policy::Read)
		.map_err(|_| ApiError::new(ErrorCode::RateLimited, "too many reads"))?;

	let mut filter = doc! { "customer_id": &auth.user_id };
	if let Some(status) = &query.status {
		filter.insert("status", status);
	}
	let size = query.size.unwrap_or(20).min(100);
	let page = query.page.unwrap_or(1).max(1);
	let skip = (page - 1) * size;

	let cursor = state
		.db
		.orders
		.find(filter)
		.skip(skip)
		.limit(size as i64)
		.sort(doc! { "created_at": -1 })
		.await
		.map_err(db_err)?;
	let orders: Vec<Order> = cursor.try_collect().await.map_err(db_err)?;
	Ok(ApiResponse::ok(orders))
}

pub async fn get_order(
	state: web::Data<AppState>,
	auth: AuthContext,
	path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
	let order = find_owned_order(&state, &auth.user_id, &path).await?;
	Ok(ApiResponse::ok(order))
}

pub async fn cancel_order(
	state: web::Data<AppState>,
	auth: AuthContext,
	path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
	let order_id = path.into_inner();
	let order = find_owned_order(&state, &auth.user_id, &order_id).await?;

	if !state_machine::customer_may_cancel(order.status) {
		return Err(ApiError::new(ErrorCode::OrderCannotCancel, "order can no longer be cancelled"));
	}

	let result = state
		.db
		.orders
		.update_one(
			doc! { "id": &order_id, "status": status_str(order.status) },
			doc! { "$set": { "status": "cancelled" } },
		)
		.await
		.map_err(db_err)?;
	if result.modified_count == 0 {
		return Err(ApiError::new(ErrorCode::InvalidTransition, "order status changed concurrently"));
	}

	for item in &order.items {
		let reservation = inventory::Reservation {
			batch_number: item.batch_number.clone(),
			selling_price: item.unit_price,
			pharmacy_id: order.pharmacy_id.clone(),
			medicine_id: item.medicine_id.clone(),
			qty: item.qty,
		};
		inventory::release(&state.db, &reservation).await;
	}

	state.events.emit(
		Topic::Orders,
		RoutingKey::Cancelled,
		serde_json::json!({ "order_id": order.id, "user_id": order.customer_id, "pharmacy_id": order.pharmacy_id }),
	);

	Ok(ApiResponse::ok(serde_json::json!({ "id": order_id, "status": "cancelled" })))
}

#[derive(Debug, Deserialize)]
pub struct RateOrderRequest {
	pub rating: u8,
	pub review: Option<String>,
}

pub async fn rate_order(
	state: web::Data<AppState>,
	auth: AuthContext,
	path: web::Path<String>,
	body: web::Json<RateOrderRequest>,
) -> Result<HttpResponse, ApiError> {
	if !(1..=5).contains(&body.rating) {
		return Err(ApiError::new(ErrorCode::ValidationError, "rating must be between 1 and 5"));
	}
	let order_id = path.into_inner();
	let order = find_owned_order(&state, &auth.user_id, &order_id).await?;
	if order.status != OrderStatus::Delivered {
		return Err(ApiError::new(ErrorCode::InvalidTransition, "only delivered orders may be rated"));
	}
	state
		.db
		.orders
		.update_one(
			doc! { "id": &order_id },
			doc! { "$set": { "rating": body.rating as i32, "review": body.review.clone() } },
		)
		.await
		.map_err(db_err)?;
	Ok(ApiResponse::ok(serde_json::json!({ "id": order_id, "rating": body.rating })))
}

async fn find_owned_order(state: &AppState, customer_id: &str, order_id: &str) -> Result<Order, ApiError> {
	state
		.db
		.orders
		.find_one(doc! { "id": order_id, "customer_id": customer_id })
		.await
		.map_err(db_err)?
		.ok_or_else(|| ApiError::new(ErrorCode::OrderNotFound, "order not found"))
}

pub fn status_str(status: OrderStatus) -> &'static str {
	match status {
		OrderStatus::Created => "created",
		OrderStatus::AcceptedByPharmacy => "accepted_by_pharmacy",
		OrderStatus::Prepared => "prepared",
		OrderStatus::DriverAssigned => "driver_assigned",
		OrderStatus::InTransit => "in_transit",
		OrderStatus::Delivered => "delivered",
		OrderStatus::Cancelled => "cancelled",
		OrderStatus::Failed => "failed",
	}
}

fn db_err(e: mongodb::error::Error) -> ApiError {
	error!(error = %e, "document store error");
	ApiError::new(ErrorCode::DatabaseError, "document store error")
}
