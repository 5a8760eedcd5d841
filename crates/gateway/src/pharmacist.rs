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

//! Pharmacist Gateway (§4.6): order transitions and inventory CRUD scoped to
//! the signed-in pharmacist's own pharmacy.

use actix_web::{HttpResponse, web};
use chrono::Utc;
use mongodb::bson::doc;
use pharma_sdk::{ApiError, ErrorCode, InventoryRow, OrderStatus, Role, RoutingKey, Topic};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::inventory;
use crate::orders::status_str;
use crate::response::ApiResponse;
use crate::store::AppState;

async fn owned_pharmacy_id(state: &AppState, auth: &AuthContext) -> Result<String, ApiError> {
	auth.require_role(Role::Pharmacist)?;
	let pharmacy = state
		.db
		.pharmacies
		.find_one(doc! { "owner_user_id": &auth.user_id })
		.await
		.map_err(db_err)?
		.ok_or_else(|| ApiError::new(ErrorCode::PharmacyNotFound, "no pharmacy owned by this account"))?;
	Ok(pharmacy.id)
}

async fn owned_order(state: &AppState, pharmacy_id: &str, order_id: &str) -> Result<pharma_sdk::Order, ApiError> {
	state
		.db
		.orders
		.find_one(doc! { "id": order_id })
		.await
		.map_err(db_err)?
		.filter(|o| o.pharmacy_id == pharmacy_id)
		.ok_or_else(|| ApiError::new(ErrorCode::Forbidden, "order does not belong to this pharmacy"))
}

pub async fn accept_order(
	state: web::Data<AppState>,
	auth: AuthContext,
	path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
	let pharmacy_id = owned_pharmacy_id(&state, &auth).await?;
	let order_id = path.into_inner();
	let order = owned_order(&state, &pharmacy_id, &order_id).await?;
	transition(&state, &order_id, order.status, OrderStatus::AcceptedByPharmacy).await?;
	Ok(ApiResponse::ok(serde_json::json!({ "id": order_id, "status": "accepted_by_pharmacy" })))
}

pub async fn prepared_order(
	state: web::Data<AppState>,
	auth: AuthContext,
	path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
	let pharmacy_id = owned_pharmacy_id(&state, &auth).await?;
	let order_id = path.into_inner();
	let order = owned_order(&state, &pharmacy_id, &order_id).await?;
	transition(&state, &order_id, order.status, OrderStatus::Prepared).await?;
	Ok(ApiResponse::ok(serde_json::json!({ "id": order_id, "status": "prepared" })))
}

#[derive(Debug, Deserialize)]
pub struct DeclineRequest {
	pub reason: String,
}

pub async fn decline_order(
	state: web::Data<AppState>,
	auth: AuthContext,
	path: web::Path<String>,
	body: web::Json<DeclineRequest>,
) -> Result<HttpResponse, ApiError> {
	let pharmacy_id = owned_pharmacy_id(&state, &auth).await?;
	let order_id = path.into_inner();
	let order = owned_order(&state, &pharmacy_id, &order_id).await?;
	if order.status != OrderStatus::Created {
		return Err(ApiError::new(ErrorCode::InvalidTransition, "only newly created orders may be declined"));
	}

	let result = state
		.db
		.orders
		.update_one(
			doc! { "id": &order_id, "status": status_str(order.status) },
			doc! { "$set": { "status": "cancelled", "cancellation_reason": &body.reason } },
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

async fn transition(
	state: &AppState,
	order_id: &str,
	from: OrderStatus,
	to: OrderStatus,
) -> Result<(), ApiError> {
	if !crate::state_machine::is_allowed(from, to) {
		return Err(ApiError::new(ErrorCode::InvalidTransition, "illegal order transition"));
	}
	let result = state
		.db
		.orders
		.update_one(
			doc! { "id": order_id, "status": status_str(from) },
			doc! { "$set": { "status": status_str(to) } },
		)
		.await
		.map_err(db_err)?;
	if result.modified_count == 0 {
		return Err(ApiError::new(ErrorCode::InvalidTransition, "order status changed concurrently"));
	}
	Ok(())
}

#[derive(Debug, Deserialize)]
pub struct UpsertInventoryRequest {
	pub medicine_id: String,
	pub batch_number: String,
	pub expiry_date: chrono::DateTime<Utc>,
	pub available_qty: u32,
	pub mrp: f64,
	pub selling_price: f64,
}

pub async fn list_inventory(state: web::Data<AppState>, auth: AuthContext) -> Result<HttpResponse, ApiError> {
	let pharmacy_id = owned_pharmacy_id(&state, &auth).await?;
	use futures::TryStreamExt;
	let cursor = state
		.db
		.inventory
		.find(doc! { "pharmacy_id": &pharmacy_id })
		.await
		.map_err(db_err)?;
	let rows: Vec<InventoryRow> = cursor.try_collect().await.map_err(db_err)?;
	Ok(ApiResponse::ok(rows))
}

pub async fn add_inventory(
	state: web::Data<AppState>,
	auth: AuthContext,
	body: web::Json<UpsertInventoryRequest>,
) -> Result<HttpResponse, ApiError> {
	let pharmacy_id = owned_pharmacy_id(&state, &auth).await?;
	let existing = state
		.db
		.inventory
		.find_one(doc! { "pharmacy_id": &pharmacy_id, "medicine_id": &body.medicine_id, "batch_number": &body.batch_number })
		.await
		.map_err(db_err)?;
	if existing.is_some() {
		return Err(ApiError::new(ErrorCode::BatchExists, "batch already exists for this medicine"));
	}
	let row = InventoryRow {
		id: format!("inv_{}", Uuid::new_v4()),
		pharmacy_id,
		medicine_id: body.medicine_id.clone(),
		batch_number: body.batch_number.clone(),
		expiry_date: body.expiry_date,
		available_qty: body.available_qty,
		reserved_qty: 0,
		mrp: body.mrp,
		selling_price: body.selling_price,
	};
	// The pre-check above is advisory; the unique (pharmacy, medicine, batch)
	// index is what actually arbitrates a race between two concurrent adds (§5).
	if let Err(e) = state.db.inventory.insert_one(&row).await {
		if crate::store::is_duplicate_key(&e) {
			return Err(ApiError::new(ErrorCode::BatchExists, "batch already exists for this medicine"));
		}
		return Err(db_err(e));
	}
	Ok(ApiResponse::created(row))
}

pub async fn update_inventory(
	state: web::Data<AppState>,
	auth: AuthContext,
	path: web::Path<String>,
	body: web::Json<UpsertInventoryRequest>,
) -> Result<HttpResponse, ApiError> {
	let pharmacy_id = owned_pharmacy_id(&state, &auth).await?;
	let row_id = path.into_inner();
	let result = state
		.db
		.inventory
		.update_one(
			doc! { "id": &row_id, "pharmacy_id": &pharmacy_id },
			doc! { "$set": {
				"available_qty": body.available_qty as i64,
				"mrp": body.mrp,
				"selling_price": body.selling_price,
				"expiry_date": body.expiry_date,
			}},
		)
		.await
		.map_err(db_err)?;
	if result.matched_count == 0 {
		return Err(ApiError::new(ErrorCode::InventoryNotFound, "inventory row not found"));
	}
	Ok(ApiResponse::ok(serde_json::json!({ "id": row_id })))
}

pub async fn delete_inventory(
	state: web::Data<AppState>,
	auth: AuthContext,
	path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
	let pharmacy_id = owned_pharmacy_id(&state, &auth).await?;
	let row_id = path.into_inner();
	let result = state
		.db
		.inventory
		.delete_one(doc! { "id": &row_id, "pharmacy_id": &pharmacy_id })
		.await
		.map_err(db_err)?;
	if result.deleted_count == 0 {
		return Err(ApiError::new(ErrorCode::InventoryNotFound, "inventory row not found"));
	}
	Ok(ApiResponse::ok(serde_json::json!({ "id": row_id })))
}

fn db_err(e: mongodb::error::Error) -> ApiError {
	error!(error = %e, "document store error");
	ApiError::new(ErrorCode::DatabaseError, "document store error")
}
