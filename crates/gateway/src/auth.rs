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

//! Identity Service (§4.1): registration, OTP verification, login, refresh
//! rotation, logout, and admin provisioning. Also hosts [`AuthContext`], the
//! bearer-token request extractor every protected handler in this crate uses.

use std::future::{Ready, ready};

use actix_web::{FromRequest, HttpMessage, HttpRequest, HttpResponse, cookie::Cookie, dev::Payload, web};
use chrono::Utc;
use mongodb::bson::doc;
use pharma_sdk::{
	ApiError, Claims, ErrorCode, Role, TokenPair, TokenType, User,
	crypto::{hash_password, verify_password},
	mask::mask,
	token::generate_otp,
};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::admission::Policy;
use crate::response::ApiResponse;
use crate::store::AppState;

/// The signed-in principal, extracted from the `Authorization: Bearer <token>`
/// header (falling back to the `access_token` cookie). Any handler taking
/// `auth: AuthContext` as a parameter is implicitly bearer-protected.
#[derive(Debug, Clone)]
pub struct AuthContext {
	pub user_id: String,
	pub roles: Vec<Role>,
}

impl AuthContext {
	pub fn require_role(&self, role: Role) -> Result<(), ApiError> {
		if self.roles.contains(&role) {
			Ok(())
		} else {
			Err(ApiError::new(ErrorCode::Forbidden, "role not permitted"))
		}
	}
}

impl FromRequest for AuthContext {
	type Error = actix_web::Error;
	type Future = Ready<Result<Self, Self::Error>>;

	fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
		ready(extract_auth_context(req))
	}
}

fn extract_auth_context(req: &HttpRequest) -> Result<AuthContext, actix_web::Error> {
	let state = req
		.app_data::<web::Data<AppState>>()
		.expect("AppState must be registered");

	let token = bearer_token(req).ok_or_else(|| {
		ApiError::new(ErrorCode::Unauthorized, "missing bearer credential")
	})?;

	let claims: Claims = state
		.tokens
		.verify_type(&token, TokenType::Access, Utc::now().timestamp())
		.map_err(|e| {
			warn!(error = %e, "access token rejected");
			match e {
				pharma_sdk::token::TokenError::Expired => {
					ApiError::new(ErrorCode::TokenExpired, "access token expired")
				}
				_ => ApiError::new(ErrorCode::TokenInvalid, "access token invalid"),
			}
		})?;

	Ok(AuthContext {
		user_id: claims.sub,
		roles: claims.roles,
	})
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
	if let Some(header) = req.headers().get("Authorization")
		&& let Ok(value) = header.to_str()
		&& let Some(token) = value.strip_prefix("Bearer ")
	{
		return Some(token.to_string());
	}
	req.cookie("access_token").map(|c| c.value().to_string())
}

fn normalize_phone(raw: &str) -> String {
	let digits: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();
	if digits.starts_with('+') {
		digits
	} else if digits.len() > 10 {
		format!("+{digits}")
	} else {
		digits
	}
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
	pub name: String,
	pub email: String,
	pub phone: String,
	pub password: String,
}

impl RegisterRequest {
	fn validate(&self) -> Result<(), ApiError> {
		if self.password.len() < 8 {
			return Err(ApiError::new(
				ErrorCode::ValidationError,
				"password must be at least 8 characters",
			));
		}
		if self.name.trim().is_empty() || self.email.trim().is_empty() || self.phone.trim().is_empty() {
			return Err(ApiError::new(ErrorCode::MissingField, "name, email and phone are required"));
		}
		Ok(())
	}
}

#[derive(Serialize)]
struct RegisterResponse {
	user: PublicUser,
	message: String,
}

#[derive(Serialize)]
struct PublicUser {
	id: String,
	name: String,
	email: String,
	phone: String,
	roles: Vec<Role>,
	verified: bool,
}

impl From<&User> for PublicUser {
	fn from(u: &User) -> Self {
		Self {
			id: u.id.clone(),
			name: u.name.clone(),
			email: u.email.clone(),
			phone: u.phone.clone(),
			roles: u.roles.clone(),
			verified: u.verified,
		}
	}
}

pub async fn register(
	state: web::Data<AppState>,
	req: HttpRequest,
	body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
	state
		.rate_limiters
		.check_with_mirror(state.redis.clone(), client_ip(&req).as_str(), Policy::Register)
		.map_err(|_| ApiError::new(ErrorCode::RateLimited, "too many registration attempts"))?;

	body.validate()?;
	let phone = normalize_phone(&body.phone);

	let existing = state
		.db
		.users
		.find_one(doc! { "$or": [ { "email": &body.email }, { "phone": &phone } ] })
		.await
		.map_err(db_err)?;
	if existing.is_some() {
		return Err(ApiError::new(ErrorCode::UserExists, "account already exists"));
	}

	let digest = hash_password(&body.password, state.config.kdf.work_factor_kib)
		.map_err(|_| ApiError::new(ErrorCode::InternalError, "password hashing failed"))?;
	let now = Utc::now();
	let user = User {
		id: format!("user_{}", Uuid::new_v4()),
		email: body.email.clone(),
		phone: phone.clone(),
		name: body.name.clone(),
		password_digest: digest,
		roles: vec![Role::Customer],
		verified: false,
		addresses: Vec::new(),
		cart: Vec::new(),
		wallet_balance: 0.0,
		created_at: now,
		updated_at: now,
	};
	state.db.users.insert_one(&user).await.map_err(db_err)?;

	issue_and_store_otp(&state, &phone, &user.id).await?;

	Ok(ApiResponse::created(RegisterResponse {
		user: PublicUser::from(&user),
		message: "registration successful, otp sent".to_string(),
	}))
}

async fn issue_and_store_otp(state: &AppState, phone: &str, user_id: &str) -> Result<String, ApiError> {
	let otp = generate_otp();
	let mut redis = state.redis.clone();
	let value = format!("{otp}|{user_id}|0");
	redis::cmd("SET")
		.arg(format!("otp:{phone}"))
		.arg(&value)
		.arg("EX")
		.arg(300)
		.query_async::<()>(&mut redis)
		.await
		.map_err(|e| {
			error!(error = %e, "failed to store otp");
			ApiError::new(ErrorCode::DatabaseError, "could not issue otp")
		})?;
	// Out-of-band delivery (SMS) is a non-goal; the masked code is logged only.
	tracing::info!(phone = %mask(phone), otp = %mask(&otp), "otp issued");
	Ok(otp)
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
	pub phone: String,
	pub otp: String,
}

pub async fn verify_otp(
	state: web::Data<AppState>,
	req: HttpRequest,
	body: web::Json<VerifyOtpRequest>,
) -> Result<HttpResponse, ApiError> {
	state
		.rate_limiters
		.check_with_mirror(state.redis.clone(), client_ip(&req).as_str(), Policy::Otp)
		.map_err(|_| ApiError::new(ErrorCode::RateLimited, "too many otp attempts"))?;

	let phone = normalize_phone(&body.phone);
	let mut redis = state.redis.clone();
	let key = format!("otp:{phone}");
	let record: Option<String> = redis
		.get(&key)
		.await
		.map_err(|_| ApiError::new(ErrorCode::ServiceUnavailable, "key-value store unavailable"))?;
	let record = record.ok_or_else(|| ApiError::new(ErrorCode::OtpInvalid, "no otp on file"))?;

	let mut parts = record.splitn(3, '|');
	let code = parts.next().unwrap_or_default();
	let user_id = parts.next().unwrap_or_default().to_string();
	let used = parts.next().unwrap_or("0") == "1";
	if used || code != body.otp {
		return Err(ApiError::new(ErrorCode::OtpInvalid, "otp does not match"));
	}
	// Mark used rather than delete outright: the record is retained for a
	// further 60s so a replayed attempt within that window still observes
	// `used` instead of silently falling through to "no otp on file" (§3, §8).
	let used_value = format!("{code}|{user_id}|1");
	let _: Result<(), _> = redis::cmd("SET")
		.arg(&key)
		.arg(&used_value)
		.arg("EX")
		.arg(60)
		.query_async::<()>(&mut redis)
		.await;

	let mut user = state
		.db
		.users
		.find_one(doc! { "id": &user_id })
		.await
		.map_err(db_err)?
		.ok_or_else(|| ApiError::new(ErrorCode::UserNotFound, "user not found"))?;
	user.verified = true;
	state
		.db
		.users
		.update_one(doc! { "id": &user_id }, doc! { "$set": { "verified": true } })
		.await
		.map_err(db_err)?;

	let pair = issue_token_pair(&state, &user).await?;
	Ok(tokens_response(pair, &user))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
	pub email_or_phone: String,
	pub password: String,
}

#[derive(Serialize)]
struct VerificationRequiredResponse {
	verified: bool,
	message: String,
}

pub async fn login(
	state: web::Data<AppState>,
	req: HttpRequest,
	body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
	state
		.rate_limiters
		.check_with_mirror(state.redis.clone(), client_ip(&req).as_str(), Policy::Login)
		.map_err(|_| ApiError::new(ErrorCode::RateLimited, "too many login attempts"))?;

	let filter = if body.email_or_phone.contains('@') {
		doc! { "email": &body.email_or_phone }
	} else {
		doc! { "phone": normalize_phone(&body.email_or_phone) }
	};

	let user = state.db.users.find_one(filter).await.map_err(db_err)?;
	// Folds "no such user" and "wrong password" into one branch (§4.1) so the
	// response never reveals whether an account exists.
	let invalid_credentials = || ApiError::new(ErrorCode::InvalidCredentials, "invalid credentials");
	let user = match user {
		Some(u) => u,
		None => {
			let _ = verify_password(&body.password, "$argon2id$v=19$m=19456,t=2,p=1$ZHVtbXlzYWx0$ZHVtbXloYXNo");
			return Err(invalid_credentials());
		}
	};
	let ok = verify_password(&body.password, &user.password_digest)
		.map_err(|_| ApiError::new(ErrorCode::InternalError, "password verification failed"))?;
	if !ok {
		return Err(invalid_credentials());
	}

	if !user.verified {
		issue_and_store_otp(&state, &user.phone, &user.id).await?;
		return Ok(HttpResponse::Ok().json(VerificationRequiredResponse {
			verified: false,
			message: "account not verified, otp resent".to_string(),
		}));
	}

	let pair = issue_token_pair(&state, &user).await?;
	Ok(tokens_response(pair, &user))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
	pub refresh_token: String,
}

pub async fn refresh(
	state: web::Data<AppState>,
	body: web::Json<RefreshRequest>,
) -> Result<HttpResponse, ApiError> {
	let claims = state
		.tokens
		.verify_type(&body.refresh_token, TokenType::Refresh, Utc::now().timestamp())
		.map_err(|_| ApiError::new(ErrorCode::TokenInvalid, "refresh token invalid"))?;

	let mut redis = state.redis.clone();
	let live_key = format!("refresh_token:{}", claims.jti);
	let is_live: bool = redis
		.exists(&live_key)
		.await
		.map_err(|_| ApiError::new(ErrorCode::ServiceUnavailable, "key-value store unavailable"))?;
	if !is_live {
		return Err(ApiError::new(ErrorCode::TokenInvalid, "refresh token has been rotated or revoked"));
	}

	let user = state
		.db
		.users
		.find_one(doc! { "id": &claims.sub })
		.await
		.map_err(db_err)?
		.ok_or_else(|| ApiError::new(ErrorCode::UserNotFound, "user not found"))?;

	// Rotate: remove the old identifier before the new one is inserted (§4.1).
	let _: Result<(), _> = redis.del::<_, ()>(&live_key).await;
	let pair = issue_token_pair(&state, &user).await?;
	Ok(tokens_response(pair, &user))
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
	pub refresh_token: Option<String>,
}

#[derive(Serialize)]
struct SuccessOnly {
	success: bool,
}

pub async fn logout(
	state: web::Data<AppState>,
	body: web::Json<LogoutRequest>,
) -> Result<HttpResponse, ApiError> {
	if let Some(token) = &body.refresh_token
		&& let Ok(claims) =
			state.tokens.verify_type(token, TokenType::Refresh, Utc::now().timestamp())
	{
		let mut redis = state.redis.clone();
		let _: Result<(), _> = redis.del::<_, ()>(format!("refresh_token:{}", claims.jti)).await;
	}
	Ok(HttpResponse::Ok().json(SuccessOnly { success: true }))
}

pub async fn me(state: web::Data<AppState>, auth: AuthContext) -> Result<HttpResponse, ApiError> {
	let user = state
		.db
		.users
		.find_one(doc! { "id": &auth.user_id })
		.await
		.map_err(db_err)?
		.ok_or_else(|| ApiError::new(ErrorCode::UserNotFound, "user not found"))?;
	Ok(ApiResponse::ok(PublicUser::from(&user)))
}

#[derive(Debug, Deserialize)]
pub struct CreatePharmacistRequest {
	pub name: String,
	pub email: String,
	pub phone: String,
	pub password: String,
	pub pharmacy_name: String,
	pub pharmacy_address: String,
	pub lon: f64,
	pub lat: f64,
}

pub async fn create_pharmacist(
	state: web::Data<AppState>,
	auth: AuthContext,
	body: web::Json<CreatePharmacistRequest>,
) -> Result<HttpResponse, ApiError> {
	auth.require_role(Role::Admin)?;
	let digest = hash_password(&body.password, state.config.kdf.work_factor_kib)
		.map_err(|_| ApiError::new(ErrorCode::InternalError, "password hashing failed"))?;
	let now = Utc::now();
	let user = User {
		id: format!("user_{}", Uuid::new_v4()),
		email: body.email.clone(),
		phone: normalize_phone(&body.phone),
		name: body.name.clone(),
		password_digest: digest,
		roles: vec![Role::Pharmacist],
		verified: true,
		addresses: Vec::new(),
		cart: Vec::new(),
		wallet_balance: 0.0,
		created_at: now,
		updated_at: now,
	};
	state.db.users.insert_one(&user).await.map_err(db_err)?;

	let pharmacy = pharma_sdk::Pharmacy {
		id: format!("pharmacy_{}", Uuid::new_v4()),
		owner_user_id: user.id.clone(),
		name: body.pharmacy_name.clone(),
		address: body.pharmacy_address.clone(),
		location: pharma_sdk::GeoPoint { lon: body.lon, lat: body.lat },
		active: true,
		opening_hours: "09:00-21:00".to_string(),
		contact_phone: user.phone.clone(),
		rating: 0.0,
		rating_count: 0,
		created_at: now,
	};
	state.db.pharmacies.insert_one(&pharmacy).await.map_err(db_err)?;

	Ok(ApiResponse::created(PublicUser::from(&user)))
}

#[derive(Debug, Deserialize)]
pub struct CreateDriverRequest {
	pub name: String,
	pub phone: String,
	pub password: String,
}

pub async fn create_driver(
	state: web::Data<AppState>,
	auth: AuthContext,
	body: web::Json<CreateDriverRequest>,
) -> Result<HttpResponse, ApiError> {
	auth.require_role(Role::Admin)?;
	let digest = hash_password(&body.password, state.config.kdf.work_factor_kib)
		.map_err(|_| ApiError::new(ErrorCode::InternalError, "password hashing failed"))?;
	let now = Utc::now();
	let driver_count = state
		.db
		.users
		.count_documents(doc! { "roles": "driver" })
		.await
		.map_err(db_err)?;
	let email = format!("driver{:05}@internal.pharma", driver_count + 1);
	let user = User {
		id: format!("user_{}", Uuid::new_v4()),
		email,
		phone: normalize_phone(&body.phone),
		name: body.name.clone(),
		password_digest: digest,
		roles: vec![Role::Driver],
		verified: true,
		addresses: Vec::new(),
		cart: Vec::new(),
		wallet_balance: 0.0,
		created_at: now,
		updated_at: now,
	};
	state.db.users.insert_one(&user).await.map_err(db_err)?;
	Ok(ApiResponse::created(PublicUser::from(&user)))
}

async fn issue_token_pair(state: &AppState, user: &User) -> Result<TokenPair, ApiError> {
	let now = Utc::now().timestamp();
	let (access_token, _) = state
		.tokens
		.issue(&user.id, &user.roles, TokenType::Access, now)
		.map_err(|_| ApiError::new(ErrorCode::InternalError, "token issuance failed"))?;
	let (refresh_token, refresh_jti) = state
		.tokens
		.issue(&user.id, &user.roles, TokenType::Refresh, now)
		.map_err(|_| ApiError::new(ErrorCode::InternalError, "token issuance failed"))?;

	let mut redis = state.redis.clone();
	redis::cmd("SET")
		.arg(format!("refresh_token:{refresh_jti}"))
		.arg(&user.id)
		.arg("EX")
		.arg(state.config.token.refresh_ttl_secs)
		.query_async::<()>(&mut redis)
		.await
		.map_err(|_| ApiError::new(ErrorCode::ServiceUnavailable, "key-value store unavailable"))?;

	Ok(TokenPair {
		access_token,
		refresh_token,
		expires_in: state.config.token.access_ttl_secs,
		token_type: "Bearer",
	})
}

fn tokens_response(pair: TokenPair, user: &User) -> HttpResponse {
	#[derive(Serialize)]
	struct Body<'a> {
		access_token: &'a str,
		refresh_token: &'a str,
		expires_in: i64,
		token_type: &'a str,
		user: PublicUser,
	}
	HttpResponse::Ok()
		.cookie(secure_cookie("access_token", &pair.access_token, pair.expires_in))
		.cookie(secure_cookie("refresh_token", &pair.refresh_token, 2_592_000))
		.json(Body {
			access_token: &pair.access_token,
			refresh_token: &pair.refresh_token,
			expires_in: pair.expires_in,
			token_type: pair.token_type,
			user: PublicUser::from(user),
		})
}

fn secure_cookie<'a>(name: &'a str, value: &'a str, max_age_secs: i64) -> Cookie<'a> {
	Cookie::build(name, value)
		.http_only(true)
		.secure(!cfg!(debug_assertions))
		.same_site(actix_web::cookie::SameSite::Strict)
		.max_age(actix_web::cookie::time::Duration::seconds(max_age_secs))
		.path("/")
		.finish()
}

fn client_ip(req: &HttpRequest) -> String {
	req.connection_info().realip_remote_addr().unwrap_or("unknown").to_string()
}

fn db_err(e: mongodb::error::Error) -> ApiError {
	error!(error = %e, "document store error");
	ApiError::new(ErrorCode::DatabaseError, "document store error")
}
