//! Per-socket connection task
//!
//! Splits a WebSocket into a writer task draining the connection's outbound
//! queue and a reader loop forwarding inbound events to the coordinator.
//! Either side ending cancels the connection's lifetime token, which stops
//! the other.

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::server::coordinator::CoordinatorHandle;
use crate::session::{ConnectionId, Outgoing};

/// Drive one WebSocket until it closes
pub async fn serve_socket(socket: WebSocket, coordinator: CoordinatorHandle) {
    let (client, outgoing) = coordinator.open_connection();
    let id = client.id();
    let lifetime = client.lifetime().clone();

    tracing::debug!(connection = %id, "WebSocket upgraded");

    if coordinator.connect(client).await.is_err() {
        tracing::warn!(connection = %id, "Coordinator unavailable, dropping socket");
        return;
    }

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_loop(id, sink, outgoing, lifetime.clone()));

    read_loop(id, stream, &coordinator, &lifetime).await;

    lifetime.cancel();
    if let Err(e) = writer.await {
        tracing::debug!(connection = %id, error = %e, "Writer task failed");
    }
    if coordinator.disconnect(id).await.is_err() {
        tracing::debug!(connection = %id, "Coordinator gone before disconnect");
    }
}

async fn read_loop(
    id: ConnectionId,
    mut stream: SplitStream<WebSocket>,
    coordinator: &CoordinatorHandle,
    lifetime: &CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = lifetime.cancelled() => break,
            message = stream.next() => message,
        };

        let forwarded = match message {
            Some(Ok(Message::Text(text))) => {
                coordinator
                    .message(id, Bytes::copy_from_slice(text.as_str().as_bytes()))
                    .await
            }
            Some(Ok(Message::Binary(data))) => coordinator.message(id, data).await,
            Some(Ok(Message::Pong(_))) => coordinator.transport_pong(id).await,
            // Pings are answered by the WebSocket layer
            Some(Ok(Message::Ping(_))) => Ok(()),
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                tracing::debug!(connection = %id, error = %e, "WebSocket error");
                break;
            }
        };

        if forwarded.is_err() {
            break;
        }
    }
}

async fn write_loop(
    id: ConnectionId,
    mut sink: SplitSink<WebSocket, Message>,
    mut outgoing: mpsc::Receiver<Outgoing>,
    lifetime: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            _ = lifetime.cancelled() => break,
            item = outgoing.recv() => item,
        };

        let message = match item {
            Some(Outgoing::Text(bytes)) => match Utf8Bytes::try_from(bytes) {
                Ok(text) => Message::Text(text),
                Err(e) => {
                    tracing::warn!(connection = %id, error = %e, "Dropping non UTF-8 payload");
                    continue;
                }
            },
            Some(Outgoing::Ping) => Message::Ping(Bytes::new()),
            None => break,
        };

        if let Err(e) = sink.send(message).await {
            tracing::debug!(connection = %id, error = %e, "Send failed");
            break;
        }
    }

    lifetime.cancel();
    let _ = sink.send(Message::Close(None)).await;
}
