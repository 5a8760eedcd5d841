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

//! Driver Gateway (§4.7): available-delivery listing, accept, status and
//! location updates, and OTP-gated delivery confirmation.

use actix_web::{HttpResponse, web};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::doc;
use pharma_sdk::{ApiError, Delivery, DeliveryStatus, ErrorCode, GeoPoint, OrderStatus, Role, RoutingKey, Topic};
use serde::Deserialize;
use tracing::error;

use crate::auth::AuthContext;
use crate::inventory;
use crate::orders::status_str;
use crate::response::ApiResponse;
use crate::store::AppState;

fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
	let r = 6371.0_f64;
	let d_lat = (b.lat - a.lat).to_radians();
	let d_lon = (b.lon - a.lon).to_radians();
	let lat1 = a.lat.to_radians();
	let lat2 = b.lat.to_radians();
	let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
	2.0 * r * h.sqrt().asin()
}

#[derive(Debug, Deserialize)]
pub struct AvailableQuery {
	pub lon: Option<f64>,
	pub lat: Option<f64>,
	pub radius_km: Option<f64>,
}

pub async fn list_available(
	state: web::Data<AppState>,
	auth: AuthContext,
	query: web::Query<AvailableQuery>,
) -> Result<HttpResponse, ApiError> {
	auth.require_role(Role::Driver)?;
	let cursor = state
		.db
		.deliveries
		.find(doc! { "status": "assigned", "driver_id": mongodb::bson::Bson::Null })
		.await
		.map_err(db_err)?;
	let mut deliveries: Vec<Delivery> = cursor.try_collect().await.map_err(db_err)?;

	if let (Some(lon), Some(lat)) = (query.lon, query.lat) {
		let origin = GeoPoint { lon, lat };
		let radius = query.radius_km.unwrap_or(10.0);
		deliveries.retain(|d| match d.pickup_location {
			Some(loc) => haversine_km(origin, loc) <= radius,
			None => true,
		});
	}

	Ok(ApiResponse::ok(deliveries))
}

pub async fn accept_delivery(
	state: web::Data<AppState>,
	auth: AuthContext,
	path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
	auth.require_role(Role::Driver)?;
	let delivery_id = path.into_inner();

	let delivery = state
		.db
		.deliveries
		.find_one(doc! { "id": &delivery_id })
		.await
		.map_err(db_err)?
		.ok_or_else(|| ApiError::new(ErrorCode::DeliveryNotFound, "delivery not found"))?;

	let order = state
		.db
		.orders
		.find_one(doc! { "id": &delivery.order_id })
		.await
		.map_err(db_err)?
		.ok_or_else(|| ApiError::new(ErrorCode::OrderNotFound, "order not found"))?;
	if order.status != OrderStatus::Prepared {
		return Err(ApiError::new(ErrorCode::DriverNotAvailable, "order is not ready for dispatch"));
	}

	// Conditional bind: only succeeds if still unassigned and still `assigned` (§4.7).
	let result = state
		.db
		.deliveries
		.update_one(
			doc! { "id": &delivery_id, "driver_id": mongodb::bson::Bson::Null, "status": "assigned" },
			doc! { "$set": { "driver_id": &auth.user_id } },
		)
		.await
		.map_err(db_err)?;
	if result.modified_count == 0 {
		return Err(ApiError::new(ErrorCode::DriverNotAvailable, "delivery already taken"));
	}

	let order_update = state
		.db
		.orders
		.update_one(
			doc! { "id": &order.id, "status": "prepared" },
			doc! { "$set": { "status": "driver_assigned" } },
		)
		.await
		.map_err(db_err)?;
	if order_update.modified_count == 0 {
		// Order moved on concurrently; undo the bind so the delivery stays pickable.
		let _ = state
			.db
			.deliveries
			.update_one(
				doc! { "id": &delivery_id, "driver_id": &auth.user_id },
				doc! { "$set": { "driver_id": None::<String> } },
			)
			.await;
		return Err(ApiError::new(ErrorCode::InvalidTransition, "order status changed concurrently"));
	}

	state.events.emit(
		Topic::Deliveries,
		RoutingKey::Created,
		serde_json::json!({ "delivery_id": delivery.id, "order_id": order.id, "pharmacy_id": order.pharmacy_id }),
	);

	Ok(ApiResponse::ok(serde_json::json!({ "id": delivery_id, "status": "driver_assigned" })))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
	pub status: String,
	pub location: Option<GeoPoint>,
}

pub async fn update_status(
	state: web::Data<AppState>,
	auth: AuthContext,
	path: web::Path<String>,
	body: web::Json<StatusUpdateRequest>,
) -> Result<HttpResponse, ApiError> {
	auth.require_role(Role::Driver)?;
	let delivery_id = path.into_inner();
	let delivery = owned_delivery(&state, &auth.user_id, &delivery_id).await?;

	let (delivery_status, order_from, order_to) = match body.status.as_str() {
		"picked_up" => (DeliveryStatus::PickedUp, OrderStatus::DriverAssigned, OrderStatus::InTransit),
		"in_transit" => (DeliveryStatus::InTransit, OrderStatus::DriverAssigned, OrderStatus::InTransit),
		"failed" => (DeliveryStatus::Failed, OrderStatus::InTransit, OrderStatus::Failed),
		"delivered" => {
			return Err(ApiError::new(
				ErrorCode::InvalidTransition,
				"delivered must go through confirm-delivery",
			));
		}
		_ => return Err(ApiError::new(ErrorCode::ValidationError, "unrecognized delivery status")),
	};

	let order = state
		.db
		.orders
		.find_one(doc! { "id": &delivery.order_id })
		.await
		.map_err(db_err)?
		.ok_or_else(|| ApiError::new(ErrorCode::OrderNotFound, "order not found"))?;

	let status_str_val = delivery_status_str(delivery_status);
	let mut update = doc! { "status": status_str_val };
	if delivery_status == DeliveryStatus::PickedUp {
		update.insert("picked_up_at", Utc::now());
	}
	if let Some(loc) = body.location {
		update.insert("current_location", mongodb::bson::to_bson(&loc).map_err(|_| ApiError::new(ErrorCode::InternalError, "location encode failed"))?);
	}
	state
		.db
		.deliveries
		.update_one(doc! { "id": &delivery_id }, doc! { "$set": update })
		.await
		.map_err(db_err)?;

	if order.status == order_from {
		let result = state
			.db
			.orders
			.update_one(
				doc! { "id": &order.id, "status": status_str(order_from) },
				doc! { "$set": { "status": status_str(order_to) } },
			)
			.await
			.map_err(db_err)?;
		if result.modified_count == 0 {
			return Err(ApiError::new(ErrorCode::InvalidTransition, "order status changed concurrently"));
		}
	}

	Ok(ApiResponse::ok(serde_json::json!({ "id": delivery_id, "status": body.status })))
}

pub async fn update_location(
	state: web::Data<AppState>,
	auth: AuthContext,
	path: web::Path<String>,
	body: web::Json<GeoPoint>,
) -> Result<HttpResponse, ApiError> {
	auth.require_role(Role::Driver)?;
	let delivery_id = path.into_inner();
	owned_delivery(&state, &auth.user_id, &delivery_id).await?;

	let location = mongodb::bson::to_bson(&body.into_inner())
		.map_err(|_| ApiError::new(ErrorCode::InternalError, "location encode failed"))?;
	state
		.db
		.deliveries
		.update_one(doc! { "id": &delivery_id }, doc! { "$set": { "current_location": location } })
		.await
		.map_err(db_err)?;
	Ok(ApiResponse::ok(serde_json::json!({ "id": delivery_id })))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmDeliveryRequest {
	pub otp: String,
}

pub async fn confirm_delivery(
	state: web::Data<AppState>,
	auth: AuthContext,
	path: web::Path<String>,
	body: web::Json<ConfirmDeliveryRequest>,
) -> Result<HttpResponse, ApiError> {
	auth.require_role(Role::Driver)?;
	let delivery_id = path.into_inner();
	let delivery = owned_delivery(&state, &auth.user_id, &delivery_id).await?;

	let order = state
		.db
		.orders
		.find_one(doc! { "id": &delivery.order_id })
		.await
		.map_err(db_err)?
		.ok_or_else(|| ApiError::new(ErrorCode::OrderNotFound, "order not found"))?;

	if order.otp_for_delivery != body.otp {
		return Err(ApiError::new(ErrorCode::DeliveryOtpInvalid, "delivery otp does not match"));
	}

	let result = state
		.db
		.orders
		.update_one(
			doc! { "id": &order.id, "status": "in_transit" },
			doc! { "$set": { "status": "delivered" } },
		)
		.await
		.map_err(db_err)?;
	if result.modified_count == 0 {
		return Err(ApiError::new(ErrorCode::InvalidTransition, "order is not in transit"));
	}

	state
		.db
		.deliveries
		.update_one(
			doc! { "id": &delivery_id },
			doc! { "$set": { "status": "delivered", "delivered_at": Utc::now() } },
		)
		.await
		.map_err(db_err)?;

	for item in &order.items {
		inventory::commit(&state.db, &state.events, &order.pharmacy_id, &item.medicine_id, &item.batch_number, item.qty).await;
	}

	state.events.emit(
		Topic::Deliveries,
		RoutingKey::Updated,
		serde_json::json!({ "delivery_id": delivery.id, "order_id": order.id, "status": "delivered", "user_id": order.customer_id }),
	);

	Ok(ApiResponse::ok(serde_json::json!({ "id": delivery_id, "status": "delivered" })))
}

async fn owned_delivery(state: &AppState, driver_id: &str, delivery_id: &str) -> Result<Delivery, ApiError> {
	state
		.db
		.deliveries
		.find_one(doc! { "id": delivery_id, "driver_id": driver_id })
		.await
		.map_err(db_err)?
		.ok_or_else(|| ApiError::new(ErrorCode::DeliveryNotFound, "delivery not found"))
}

fn delivery_status_str(status: DeliveryStatus) -> &'static str {
	match status {
		DeliveryStatus::Assigned => "assigned",
		DeliveryStatus::PickedUp => "picked_up",
		DeliveryStatus::InTransit => "in_transit",
		DeliveryStatus::Delivered => "delivered",
		DeliveryStatus::Failed => "failed",
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
	fn haversine_same_point_is_zero() {
		let p = GeoPoint { lon: 72.8777, lat: 19.0760 };
		assert!(haversine_km(p, p) < 1e-9);
	}

	#[test]
	fn haversine_known_distance() {
		let mumbai = GeoPoint { lon: 72.8777, lat: 19.0760 };
		let pune = GeoPoint { lon: 73.8567, lat: 18.5204 };
		let km = haversine_km(mumbai, pune);
		assert!((100.0..200.0).contains(&km), "expected ~150km, got {km}");
	}
}
