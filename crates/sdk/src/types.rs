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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Roles a user principal may hold. A user's role-set is a subset of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	Customer,
	Admin,
	Pharmacist,
	Driver,
}

/// A saved shipping address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
	pub line1: String,
	pub line2: Option<String>,
	pub city: String,
	pub state: String,
	pub postal_code: String,
	pub country: String,
}

/// A line in a user's persisted cart. Not authoritative for pricing at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartEntry {
	pub medicine_id: String,
	pub pharmacy_id: String,
	pub qty: u32,
	pub price_at_add: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
	pub id: String,
	pub email: String,
	pub phone: String,
	pub name: String,
	#[serde(skip_serializing)]
	pub password_digest: String,
	pub roles: Vec<Role>,
	pub verified: bool,
	pub addresses: Vec<Address>,
	pub cart: Vec<CartEntry>,
	pub wallet_balance: f64,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl User {
	pub fn has_role(&self, role: Role) -> bool {
		self.roles.contains(&role)
	}
}

/// A longitude/latitude pair. Order is (lon, lat) to match GeoJSON convention,
/// the same convention the document store's geo indexes expect.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
	pub lon: f64,
	pub lat: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pharmacy {
	pub id: String,
	pub owner_user_id: String,
	pub name: String,
	pub address: String,
	pub location: GeoPoint,
	pub active: bool,
	pub opening_hours: String,
	pub contact_phone: String,
	pub rating: f32,
	pub rating_count: u32,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DosageForm {
	Tablet,
	Capsule,
	Syrup,
	Injection,
	Ointment,
	Drops,
	Inhaler,
	Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medicine {
	pub id: String,
	pub name: String,
	pub brand: String,
	pub generic_name: String,
	pub salt: String,
	pub dosage_form: DosageForm,
	pub strength: String,
	pub prescription_required: bool,
	pub tags: Vec<String>,
	pub search_synonyms: Vec<String>,
	pub manufacturer: String,
}

/// An inventory row. Keyed uniquely by (pharmacy_id, medicine_id, batch_number).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryRow {
	pub id: String,
	pub pharmacy_id: String,
	pub medicine_id: String,
	pub batch_number: String,
	pub expiry_date: DateTime<Utc>,
	pub available_qty: u32,
	pub reserved_qty: u32,
	pub mrp: f64,
	pub selling_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	Created,
	AcceptedByPharmacy,
	Prepared,
	DriverAssigned,
	InTransit,
	Delivered,
	Cancelled,
	Failed,
}

impl OrderStatus {
	pub fn is_terminal(self) -> bool {
		matches!(
			self,
			OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Failed
		)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
	Pending,
	Paid,
	Failed,
	Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
	pub medicine_id: String,
	pub batch_number: String,
	pub qty: u32,
	pub unit_price: f64,
	pub tax: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
	pub id: String,
	pub customer_id: String,
	pub pharmacy_id: String,
	pub items: Vec<OrderItem>,
	pub total_amount: f64,
	pub status: OrderStatus,
	pub payment_status: PaymentStatus,
	pub shipping_address: Address,
	pub idempotency_key: Option<String>,
	/// 6-digit delivery OTP, bound at creation. Surfaced only to the customer.
	pub otp_for_delivery: String,
	pub delivery_id: Option<String>,
	pub rating: Option<u8>,
	pub review: Option<String>,
	pub cancellation_reason: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
	Assigned,
	PickedUp,
	InTransit,
	Delivered,
	Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
	pub id: String,
	pub order_id: String,
	pub driver_id: Option<String>,
	pub status: DeliveryStatus,
	pub pickup_location: Option<GeoPoint>,
	pub delivery_location: Option<GeoPoint>,
	pub current_location: Option<GeoPoint>,
	pub notes: Option<String>,
	pub assigned_at: DateTime<Utc>,
	pub picked_up_at: Option<DateTime<Utc>>,
	pub delivered_at: Option<DateTime<Utc>>,
}

/// Token type carried inside an issued token, mirrored on both access and
/// refresh tokens so a token of the wrong type is rejected outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
	Access,
	Refresh,
}

/// A decoded, verified token's claim set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
	pub sub: String,
	pub roles: Vec<Role>,
	pub jti: String,
	pub token_type: TokenType,
	pub iat: i64,
	pub exp: i64,
	pub iss: String,
	pub aud: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
	pub access_token: String,
	pub refresh_token: String,
	pub expires_in: i64,
	pub token_type: &'static str,
}
