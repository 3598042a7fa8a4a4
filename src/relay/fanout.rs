//! Latency-aware frame fan-out
//!
//! A frame from a room's source goes to every open viewer in the room.
//! Viewers are ordered by estimated latency (fastest first) and split into
//! fixed-size batches; batch `k` is sent `k * batch_stagger` after the frame
//! arrived. Staggering only smooths bursts on the outbound path. It is not
//! backpressure, and a later frame can overtake an earlier frame's delayed
//! batches.
//!
//! Scheduled batches are never cancelled. A viewer that disconnects before
//! its batch fires is skipped when the batch runs.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::session::{ClientHandle, ConnectionId, Outgoing, SendFailure};

use super::{Relay, RelayConfig};

/// A group of deliveries sharing one delay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    /// Delay after frame receipt
    pub delay: Duration,
    /// Recipients, fastest first
    pub targets: Vec<T>,
}

/// Outcome of one deferred delivery, reported back to the coordinator
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    /// Recipient
    pub id: ConnectionId,
    /// Payload size
    pub bytes: usize,
    /// Queue result
    pub outcome: Result<(), SendFailure>,
    /// When the attempt ran
    pub at: DateTime<Utc>,
}

/// Order `targets` by latency and split them into staggered batches
///
/// Targets without a latency reading sort as `config.unknown_latency_ms`.
/// Equal latencies keep their input order.
pub fn plan_batches<T>(targets: Vec<(T, Option<u32>)>, config: &RelayConfig) -> Vec<Batch<T>> {
    let mut ordered = targets;
    ordered.sort_by_key(|(_, latency)| latency.unwrap_or(config.unknown_latency_ms));

    let batch_size = config.batch_size.max(1);
    let mut batches: Vec<Batch<T>> = Vec::with_capacity(ordered.len().div_ceil(batch_size));
    for (index, (target, _)) in ordered.into_iter().enumerate() {
        let k = index / batch_size;
        if batches.len() == k {
            batches.push(Batch {
                delay: config.batch_stagger * k as u32,
                targets: Vec::with_capacity(batch_size),
            });
        }
        batches[k].targets.push(target);
    }
    batches
}

/// Queue `payload` on `handle`; `None` if the transport is already closed
fn deliver(handle: &ClientHandle, payload: &Bytes) -> Option<Result<(), SendFailure>> {
    if !handle.is_open() {
        return None;
    }
    match handle.send(Outgoing::Text(payload.clone())) {
        Err(SendFailure::Closed) => None,
        outcome => Some(outcome),
    }
}

impl Relay {
    /// Fan a source frame out to its room
    ///
    /// `payload` is the source's envelope, forwarded unmodified. Returns the
    /// number of viewers targeted. Frames from connections that are not a
    /// source are ignored.
    pub fn fan_out(&mut self, id: ConnectionId, payload: Bytes, now: DateTime<Utc>) -> usize {
        let Some(session) = self.connections.get(id) else {
            return 0;
        };
        let Some(room) = session.room_id.clone().filter(|_| session.is_source()) else {
            tracing::debug!(connection = %id, "Ignoring frame from non-source");
            return 0;
        };

        self.frames_in_window += 1;
        self.frames_relayed += 1;

        let targets: Vec<(ClientHandle, Option<u32>)> = self
            .connections
            .room_members(&room, Some(id))
            .filter(|viewer| viewer.handle.is_open())
            .map(|viewer| (viewer.handle.clone(), viewer.telemetry.estimated_latency_ms))
            .collect();

        if targets.is_empty() {
            return 0;
        }
        let count = targets.len();

        let batches = plan_batches(targets, &self.config);
        tracing::trace!(
            room = %room,
            viewers = count,
            batches = batches.len(),
            bytes = payload.len(),
            "Fanning out frame"
        );

        for batch in batches {
            if batch.delay.is_zero() {
                for handle in &batch.targets {
                    if let Some(outcome) = deliver(handle, &payload) {
                        self.record_delivery(DeliveryReport {
                            id: handle.id(),
                            bytes: payload.len(),
                            outcome,
                            at: now,
                        });
                    }
                }
            } else {
                self.schedule_batch(batch, payload.clone());
            }
        }

        count
    }

    /// Send a batch after its delay on a detached task
    fn schedule_batch(&self, batch: Batch<ClientHandle>, payload: Bytes) {
        let reports = self.reports.clone();

        tokio::spawn(async move {
            tokio::time::sleep(batch.delay).await;

            for handle in &batch.targets {
                if let Some(outcome) = deliver(handle, &payload) {
                    let report = DeliveryReport {
                        id: handle.id(),
                        bytes: payload.len(),
                        outcome,
                        at: Utc::now(),
                    };
                    if reports.send(report).is_err() {
                        return;
                    }
                }
            }
        });
    }

    /// Apply a delivery outcome to the recipient's telemetry
    pub fn record_delivery(&mut self, report: DeliveryReport) {
        let Some(session) = self.connections.get_mut(report.id) else {
            return;
        };

        match report.outcome {
            Ok(()) => session.telemetry.record_delivery(report.bytes, report.at),
            Err(failure) => {
                session.telemetry.record_drop();
                tracing::warn!(
                    connection = %report.id,
                    failure = ?failure,
                    dropped = session.telemetry.dropped_count,
                    "Frame delivery failed"
                );
            }
        }
    }
}
