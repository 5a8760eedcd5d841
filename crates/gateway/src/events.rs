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

//! Event outbox: handlers push envelopes onto a bounded channel without
//! waiting on the event bus; a background task drains the channel and
//! publishes to the durable topic exchange, decoupling request latency from
//! broker I/O.

use anyhow::{Context, Result};
use chrono::Utc;
use lapin::{
	Channel, Connection, ConnectionProperties, ExchangeKind,
	options::{BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
	types::FieldTable,
};
use pharma_sdk::{EventEnvelope, RoutingKey, Topic};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const EXCHANGE: &str = "pharma.events";
const CHANNEL_CAPACITY: usize = 1_024;
const MAX_RETRIES: u32 = 3;

struct OutgoingEvent {
	routing_key: String,
	envelope: EventEnvelope<Value>,
}

/// Producer handle, cloned into every piece of handler state that needs to
/// emit domain events. Cheap to clone: it wraps an `mpsc::Sender`.
#[derive(Clone)]
pub struct EventOutbox {
	sender: mpsc::Sender<OutgoingEvent>,
}

impl EventOutbox {
	/// Connects to the broker, declares the topic exchange, and spawns the
	/// background publisher task. Returns once the exchange is confirmed
	/// declared so callers know the outbox is ready to accept events.
	pub async fn connect(uri: &str) -> Result<Self> {
		let conn = Connection::connect(uri, ConnectionProperties::default())
			.await
			.context("connecting to event bus")?;
		let channel = conn.create_channel().await.context("opening channel")?;
		channel
			.exchange_declare(
				EXCHANGE,
				ExchangeKind::Topic,
				ExchangeDeclareOptions {
					durable: true,
					..Default::default()
				},
				FieldTable::default(),
			)
			.await
			.context("declaring event exchange")?;

		for topic in [Topic::Orders, Topic::Deliveries, Topic::Inventory] {
			declare_and_bind_queue(&channel, topic).await?;
		}

		let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
		tokio::spawn(publisher_loop(conn, channel, receiver));

		Ok(Self { sender })
	}

	/// Enqueues an event for publish. Non-blocking: if the channel is full
	/// (publisher lagging badly) the event is dropped and logged rather than
	/// applying backpressure to the request path, matching §7's policy that
	/// event-bus publish failures never roll back a committed write.
	pub fn emit<T: Serialize>(&self, topic: Topic, key: RoutingKey, payload: T) {
		let envelope = EventEnvelope::new(topic, key, serde_json::to_value(payload).unwrap(), Utc::now());
		let routing_key = format!("{}.{}", topic.as_str(), key.as_str());
		match self.sender.try_send(OutgoingEvent { routing_key, envelope }) {
			Ok(()) => {}
			Err(e) => warn!(error = %e, "event outbox channel full, dropping event"),
		}
	}
}

async fn declare_and_bind_queue(channel: &Channel, topic: Topic) -> Result<()> {
	let queue_name = format!("pharma.{}", topic.as_str());
	channel
		.queue_declare(
			&queue_name,
			QueueDeclareOptions {
				durable: true,
				..Default::default()
			},
			FieldTable::default(),
		)
		.await
		.with_context(|| format!("declaring queue {queue_name}"))?;
	channel
		.queue_bind(
			&queue_name,
			EXCHANGE,
			&format!("{}.*", topic.as_str()),
			QueueBindOptions::default(),
			FieldTable::default(),
		)
		.await
		.with_context(|| format!("binding queue {queue_name}"))?;
	Ok(())
}

async fn publisher_loop(
	_conn: Connection,
	channel: Channel,
	mut receiver: mpsc::Receiver<OutgoingEvent>,
) {
	info!("event outbox publisher started");
	while let Some(mut outgoing) = receiver.recv().await {
		loop {
			let body = match serde_json::to_vec(&outgoing.envelope) {
				Ok(b) => b,
				Err(e) => {
					error!(error = %e, "failed to serialize event envelope, dropping");
					break;
				}
			};
			let publish = channel
				.basic_publish(
					EXCHANGE,
					&outgoing.routing_key,
					BasicPublishOptions::default(),
					&body,
					lapin::BasicProperties::default().with_delivery_mode(2),
				)
				.await;
			match publish {
				Ok(confirm) => {
					if confirm.await.is_ok() {
						break;
					}
				}
				Err(e) => {
					error!(error = %e, retries = outgoing.envelope.retries, "event publish failed");
				}
			}
			outgoing.envelope.retries += 1;
			if outgoing.envelope.retries > MAX_RETRIES {
				error!(
					event_type = %outgoing.envelope.event_type,
					"event dropped after exceeding retry ceiling"
				);
				break;
			}
			tokio::time::sleep(std::time::Duration::from_secs(outgoing.envelope.retries as u64)).await;
		}
	}
	info!("event outbox publisher stopped");
}
