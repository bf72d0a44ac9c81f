//! Live results over a WebSocket.
//!
//! Frames are `{ "pollOptionId": ..., "votes": ... }`. The handler attaches
//! to the bus before reading the snapshot, then sends the snapshot as one
//! frame per option, so a viewer never misses a change made in between.

use std::sync::Arc;

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use log::{debug, info};

use super::AppState;
use super::error::ApiError;
use super::routes::parse_id;
use crate::bus::Subscription;
use crate::models::{PollSnapshot, TallyEvent};

pub async fn poll_results(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
) -> Result<Response, ApiError> {
    let poll_id = parse_id(&poll_id)?;

    let subscription = state.bus.subscribe(poll_id);
    let snapshot = state.snapshots.read_snapshot(poll_id).await?;

    Ok(ws.on_upgrade(move |socket| stream_results(socket, subscription, snapshot)))
}

pub(super) fn snapshot_frames(snapshot: &PollSnapshot) -> Vec<TallyEvent> {
    snapshot
        .poll
        .options
        .iter()
        .map(|option| TallyEvent {
            poll_id: snapshot.poll.id,
            option_id: option.id,
            votes: option.score,
        })
        .collect()
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &TallyEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(_) => false,
    }
}

async fn stream_results(socket: WebSocket, mut subscription: Subscription, snapshot: PollSnapshot) {
    let poll_id = subscription.poll_id();
    info!("Live viewer attached to poll {}", poll_id);

    let (mut sender, mut receiver) = socket.split();

    for event in snapshot_frames(&snapshot) {
        if !send_event(&mut sender, &event).await {
            debug!("Live viewer on poll {} left during snapshot", poll_id);
            return;
        }
    }

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                if !send_event(&mut sender, &event).await {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    info!("Live viewer detached from poll {}", poll_id);
}
