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

//! Medicine and pharmacy browsing (§6): read-mostly catalog endpoints with a
//! short-lived search cache (`search:<hash>`, 180 s) backing the text-search
//! path.

use std::sync::LazyLock;
use std::time::Duration;

use actix_web::{HttpResponse, web};
use futures::TryStreamExt;
use mongodb::bson::doc;
use moka::sync::Cache;
use pharma_sdk::{ApiError, ErrorCode, GeoPoint, InventoryRow, Medicine, Pharmacy};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::error;

use crate::store::AppState;
use crate::response::ApiResponse;

const SEARCH_CACHE_TTL: Duration = Duration::from_secs(180);

static SEARCH_CACHE: LazyLock<Cache<String, Vec<Medicine>>> = LazyLock::new(|| {
	Cache::builder().time_to_live(SEARCH_CACHE_TTL).max_capacity(10_000).build()
});

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
pub struct MedicineSearchQuery {
	pub q: String,
	pub lat: Option<f64>,
	pub lon: Option<f64>,
	pub radius: Option<f64>,
}

pub async fn search_medicines(
	state: web::Data<AppState>,
	query: web::Query<MedicineSearchQuery>,
) -> Result<HttpResponse, ApiError> {
	let needle = query.q.trim().to_lowercase();
	let cache_key = format!("{:x}", Sha256::digest(needle.as_bytes()));

	if let Some(hit) = SEARCH_CACHE.get(&cache_key) {
		return Ok(ApiResponse::ok(hit));
	}

	let filter = doc! {
		"$or": [
			{ "name": { "$regex": &needle, "$options": "i" } },
			{ "brand": { "$regex": &needle, "$options": "i" } },
			{ "generic_name": { "$regex": &needle, "$options": "i" } },
			{ "salt": { "$regex": &needle, "$options": "i" } },
			{ "search_synonyms": { "$regex": &needle, "$options": "i" } },
		]
	};
	let cursor = state.db.medicines.find(filter).limit(100).await.map_err(db_err)?;
	let medicines: Vec<Medicine> = cursor.try_collect().await.map_err(db_err)?;

	SEARCH_CACHE.insert(cache_key, medicines.clone());
	Ok(ApiResponse::ok(medicines))
}

pub async fn get_medicine(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
	let medicine = state
		.db
		.medicines
		.find_one(doc! { "id": path.into_inner() })
		.await
		.map_err(db_err)?
		.ok_or_else(|| ApiError::new(ErrorCode::MedicineNotFound, "medicine not found"))?;
	Ok(ApiResponse::ok(medicine))
}

#[derive(Debug, Deserialize)]
pub struct PharmacyListQuery {
	pub lat: Option<f64>,
	pub lon: Option<f64>,
	pub radius_km: Option<f64>,
	pub page: Option<u64>,
	pub size: Option<u64>,
}

#[derive(Serialize)]
struct PharmacyWithDistance {
	#[serde(flatten)]
	pharmacy: Pharmacy,
	distance_km: Option<f64>,
}

pub async fn list_pharmacies(
	state: web::Data<AppState>,
	query: web::Query<PharmacyListQuery>,
) -> Result<HttpResponse, ApiError> {
	let size = query.size.unwrap_or(20).min(100);
	let page = query.page.unwrap_or(1).max(1);
	let skip = (page - 1) * size;

	let cursor = state
		.db
		.pharmacies
		.find(doc! { "active": true })
		.skip(skip)
		.limit(size as i64)
		.await
		.map_err(db_err)?;
	let mut pharmacies: Vec<Pharmacy> = cursor.try_collect().await.map_err(db_err)?;

	let origin = match (query.lon, query.lat) {
		(Some(lon), Some(lat)) => Some(GeoPoint { lon, lat }),
		_ => None,
	};
	let radius = query.radius_km.unwrap_or(10.0);
	if let Some(origin) = origin {
		pharmacies.retain(|p| haversine_km(origin, p.location) <= radius);
	}

	let with_distance: Vec<PharmacyWithDistance> = pharmacies
		.into_iter()
		.map(|p| {
			let distance_km = origin.map(|o| haversine_km(o, p.location));
			PharmacyWithDistance { pharmacy: p, distance_km }
		})
		.collect();

	Ok(ApiResponse::ok(with_distance))
}

pub async fn get_pharmacy(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
	let pharmacy = state
		.db
		.pharmacies
		.find_one(doc! { "id": path.into_inner() })
		.await
		.map_err(db_err)?
		.ok_or_else(|| ApiError::new(ErrorCode::PharmacyNotFound, "pharmacy not found"))?;
	Ok(ApiResponse::ok(pharmacy))
}

pub async fn pharmacy_inventory(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
	let pharmacy_id = path.into_inner();
	let cursor = state
		.db
		.inventory
		.find(doc! { "pharmacy_id": &pharmacy_id, "available_qty": { "$gt": 0 } })
		.await
		.map_err(db_err)?;
	let rows: Vec<InventoryRow> = cursor.try_collect().await.map_err(db_err)?;
	Ok(ApiResponse::ok(rows))
}

fn db_err(e: mongodb::error::Error) -> ApiError {
	error!(error = %e, "document store error");
	ApiError::new(ErrorCode::DatabaseError, "document store error")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn haversine_known_distance() {
		let mumbai = GeoPoint { lon: 72.8777, lat: 19.0760 };
		let pune = GeoPoint { lon: 73.8567, lat: 18.5204 };
		let km = haversine_km(mumbai, pune);
		assert!((100.0..200.0).contains(&km), "expected ~150km, got {km}");
	}
}
