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

//! Subscribes to the `pharma.events` topic exchange's per-topic queues and
//! dispatches by `event_type` (§4.8). A handler failure re-queues the
//! envelope with its retry counter incremented and a back-off of
//! `attempt * 1s`; past 3 attempts the message is acknowledged (dropped) to
//! guarantee forward progress.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use lapin::{
	Channel, Connection, ConnectionProperties,
	options::{BasicAckOptions, BasicConsumeOptions, BasicPublishOptions},
	types::FieldTable,
};
use pharma_sdk::EventEnvelope;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::handlers;
use crate::store::EventsState;

const EXCHANGE: &str = "pharma.events";
const MAX_RETRIES: u32 = 3;

pub async fn run(rabbitmq_uri: &str, state: Arc<EventsState>) -> Result<()> {
	let conn = Connection::connect(rabbitmq_uri, ConnectionProperties::default())
		.await
		.context("connecting to event bus")?;

	let queues = ["pharma.orders", "pharma.deliveries", "pharma.inventory"];
	let mut workers = Vec::with_capacity(queues.len());
	for queue in queues {
		let channel = conn.create_channel().await.context("opening consumer channel")?;
		let state = state.clone();
		workers.push(tokio::spawn(consume_queue(channel, queue.to_string(), state)));
	}

	for worker in workers {
		worker.await.context("event consumer task panicked")??;
	}
	Ok(())
}

async fn consume_queue(channel: Channel, queue: String, state: Arc<EventsState>) -> Result<()> {
	let mut consumer = channel
		.basic_consume(
			&queue,
			&format!("{queue}-consumer"),
			BasicConsumeOptions::default(),
			FieldTable::default(),
		)
		.await
		.with_context(|| format!("consuming queue {queue}"))?;

	info!(queue = %queue, "event consumer started");
	while let Some(delivery) = consumer.next().await {
		let delivery = match delivery {
			Ok(d) => d,
			Err(e) => {
				error!(error = %e, queue = %queue, "delivery error from broker");
				continue;
			}
		};

		let routing_key = delivery.routing_key.to_string();
		match serde_json::from_slice::<EventEnvelope<Value>>(&delivery.data) {
			Ok(mut envelope) => {
				if let Err(e) = dispatch(&state, &routing_key, &envelope).await {
					warn!(error = %e, event_type = %envelope.event_type, retries = envelope.retries, "event handler failed");
					envelope.retries += 1;
					if envelope.retries > MAX_RETRIES {
						error!(event_type = %envelope.event_type, "event dropped after exceeding retry ceiling");
					} else {
						tokio::time::sleep(Duration::from_secs(envelope.retries as u64)).await;
						requeue(&channel, &routing_key, &envelope).await;
					}
				}
			}
			Err(e) => error!(error = %e, queue = %queue, "malformed event envelope, dropping"),
		}

		if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
			error!(error = %e, queue = %queue, "failed to ack delivery");
		}
	}
	Ok(())
}

async fn dispatch(state: &EventsState, routing_key: &str, envelope: &EventEnvelope<Value>) -> Result<()> {
	match routing_key {
		"orders.created" => handlers::order_created(state, envelope).await,
		"orders.paid" => handlers::order_paid(state, envelope).await,
		"orders.cancelled" => handlers::order_cancelled(state, envelope).await,
		"deliveries.created" => handlers::delivery_created(state, envelope).await,
		"deliveries.updated" => handlers::delivery_updated(state, envelope).await,
		"inventory.updated" => handlers::inventory_updated(state, envelope).await,
		other => {
			warn!(routing_key = other, "no handler registered for routing key");
			Ok(())
		}
	}
}

async fn requeue(channel: &Channel, routing_key: &str, envelope: &EventEnvelope<Value>) {
	let body = match serde_json::to_vec(envelope) {
		Ok(b) => b,
		Err(e) => {
			error!(error = %e, "failed to serialize envelope for requeue");
			return;
		}
	};
	if let Err(e) = channel
		.basic_publish(
			EXCHANGE,
			routing_key,
			BasicPublishOptions::default(),
			&body,
			lapin::BasicProperties::default().with_delivery_mode(2),
		)
		.await
	{
		error!(error = %e, routing_key, "failed to requeue event after handler failure");
	}
}
