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

//! The §6 event envelope and topic/routing-key taxonomy shared by the
//! gateway (producer) and the events worker (consumer).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
	Orders,
	Deliveries,
	Inventory,
}

impl Topic {
	pub fn as_str(self) -> &'static str {
		match self {
			Topic::Orders => "orders",
			Topic::Deliveries => "deliveries",
			Topic::Inventory => "inventory",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingKey {
	Created,
	Paid,
	Cancelled,
	Updated,
}

impl RoutingKey {
	pub fn as_str(self) -> &'static str {
		match self {
			RoutingKey::Created => "created",
			RoutingKey::Paid => "paid",
			RoutingKey::Cancelled => "cancelled",
			RoutingKey::Updated => "updated",
		}
	}
}

/// Durable envelope wrapping every event-bus payload. `message_id` is also
/// the downstream dedup key; `retries` is incremented by the events worker
/// on each re-queue and inspected against the §4.8 retry ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T = Value> {
	pub message_id: String,
	#[serde(rename = "type")]
	pub event_type: String,
	pub timestamp: DateTime<Utc>,
	pub retries: u32,
	pub payload: T,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub meta: Option<Value>,
}

impl<T: Serialize> EventEnvelope<T> {
	pub fn new(topic: Topic, key: RoutingKey, payload: T, now: DateTime<Utc>) -> Self {
		Self {
			message_id: uuid::Uuid::new_v4().to_string(),
			event_type: format!("{}.{}", topic.as_str(), key.as_str()),
			timestamp: now,
			retries: 0,
			payload,
			meta: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn event_type_is_topic_dot_key() {
		let env = EventEnvelope::new(Topic::Orders, RoutingKey::Created, json!({}), Utc::now());
		assert_eq!(env.event_type, "orders.created");
		assert_eq!(env.retries, 0);
	}
}
