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

//! Profile and cart persistence (§6). The cart is not authoritative for
//! pricing at checkout (§3) — it is convenience state only.

use actix_web::{HttpResponse, web};
use chrono::Utc;
use mongodb::bson::doc;
use pharma_sdk::{Address, ApiError, CartEntry, ErrorCode};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::auth::AuthContext;
use crate::response::ApiResponse;
use crate::store::AppState;

#[derive(Serialize)]
struct ProfileResponse {
	id: String,
	name: String,
	email: String,
	phone: String,
	addresses: Vec<Address>,
	wallet_balance: f64,
}

pub async fn get_profile(state: web::Data<AppState>, auth: AuthContext) -> Result<HttpResponse, ApiError> {
	let user = state
		.db
		.users
		.find_one(doc! { "id": &auth.user_id })
		.await
		.map_err(db_err)?
		.ok_or_else(|| ApiError::new(ErrorCode::UserNotFound, "user not found"))?;
	Ok(ApiResponse::ok(ProfileResponse {
		id: user.id,
		name: user.name,
		email: user.email,
		phone: user.phone,
		addresses: user.addresses,
		wallet_balance: user.wallet_balance,
	}))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
	pub name: Option<String>,
	pub addresses: Option<Vec<Address>>,
}

pub async fn update_profile(
	state: web::Data<AppState>,
	auth: AuthContext,
	body: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ApiError> {
	let mut set = doc! { "updated_at": Utc::now() };
	if let Some(name) = &body.name {
		set.insert("name", name);
	}
	if let Some(addresses) = &body.addresses {
		let encoded = mongodb::bson::to_bson(addresses)
			.map_err(|_| ApiError::new(ErrorCode::InternalError, "address encode failed"))?;
		set.insert("addresses", encoded);
	}
	let result = state
		.db
		.users
		.update_one(doc! { "id": &auth.user_id }, doc! { "$set": set })
		.await
		.map_err(db_err)?;
	if result.matched_count == 0 {
		return Err(ApiError::new(ErrorCode::UserNotFound, "user not found"));
	}
	Ok(ApiResponse::ok(serde_json::json!({ "id": auth.user_id })))
}

pub async fn get_cart(state: web::Data<AppState>, auth: AuthContext) -> Result<HttpResponse, ApiError> {
	let user = state
		.db
		.users
		.find_one(doc! { "id": &auth.user_id })
		.await
		.map_err(db_err)?
		.ok_or_else(|| ApiError::new(ErrorCode::UserNotFound, "user not found"))?;
	Ok(ApiResponse::ok(user.cart))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
	pub items: Vec<CartEntry>,
}

pub async fn update_cart(
	state: web::Data<AppState>,
	auth: AuthContext,
	body: web::Json<UpdateCartRequest>,
) -> Result<HttpResponse, ApiError> {
	let encoded = mongodb::bson::to_bson(&body.items)
		.map_err(|_| ApiError::new(ErrorCode::InternalError, "cart encode failed"))?;
	let result = state
		.db
		.users
		.update_one(
			doc! { "id": &auth.user_id },
			doc! { "$set": { "cart": encoded, "updated_at": Utc::now() } },
		)
		.await
		.map_err(db_err)?;
	if result.matched_count == 0 {
		return Err(ApiError::new(ErrorCode::UserNotFound, "user not found"));
	}
	Ok(ApiResponse::ok(&body.items))
}

fn db_err(e: mongodb::error::Error) -> ApiError {
	error!(error = %e, "document store error");
	ApiError::new(ErrorCode::DatabaseError, "document store error")
}
