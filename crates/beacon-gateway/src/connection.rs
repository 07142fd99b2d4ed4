//! WebSocket connection handling for the alert channel.
//!
//! A connection moves through three states: `Connecting` while awaiting the
//! identify handshake, `Open` once `Ready` has been sent, and `Closed` on
//! explicit disconnect, transport failure, or heartbeat timeout. There is
//! no way back to `Open`; a reconnect is a new connection.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use beacon_db::Database;
use beacon_roster::{RosterStore, StoreError};
use beacon_types::events::{ChannelCommand, ChannelEvent};
use beacon_types::geo::GeoPoint;

use crate::dispatcher::{AlertDispatcher, Delivery};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a connection may sit in the handshake before being dropped.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a live connection needs from the rest of the service.
#[derive(Clone)]
pub struct ChannelContext {
    pub dispatcher: AlertDispatcher,
    pub store: RosterStore,
    pub db: Arc<Database>,
    pub sessions: TrackerSessions,
}

/// Tracks which connection currently owns a tracked user's presence. A
/// reconnect takes over; the superseded connection's teardown then becomes
/// a no-op instead of knocking the user offline.
#[derive(Clone, Default)]
pub struct TrackerSessions {
    inner: Arc<RwLock<HashMap<Uuid, Uuid>>>,
}

impl TrackerSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim presence ownership for a user, superseding any earlier claim.
    pub async fn claim(&self, user_id: Uuid) -> Uuid {
        let conn_id = Uuid::new_v4();
        self.inner.write().await.insert(user_id, conn_id);
        conn_id
    }

    /// Release a claim. Returns false when a newer connection has already
    /// taken over.
    pub async fn release(&self, user_id: Uuid, conn_id: Uuid) -> bool {
        let mut sessions = self.inner.write().await;
        if sessions.get(&user_id) == Some(&conn_id) {
            sessions.remove(&user_id);
            true
        } else {
            false
        }
    }
}

/// Identity established by the handshake: a tracked user, or `None` for an
/// anonymous viewer.
type Tracker = Option<(Uuid, String)>;

pub async fn handle_connection(socket: WebSocket, ctx: ChannelContext) {
    let (mut sender, mut receiver) = socket.split();

    // Connecting: wait for the identify handshake.
    let tracker = match wait_for_identify(&mut receiver, &ctx).await {
        Ok(tracker) => tracker,
        Err(reason) => {
            warn!("channel handshake failed: {}", reason);
            return;
        }
    };

    // Open: acknowledge, claim presence, enter the event loop.
    let ready = ChannelEvent::Ready {
        user_id: tracker.as_ref().map(|(id, _)| *id),
    };
    if send_event(&mut sender, &ready).await.is_err() {
        return;
    }

    let conn_id = match &tracker {
        Some((id, name)) => {
            let conn_id = ctx.sessions.claim(*id).await;
            match ctx.store.set_online(*id, true).await {
                Ok(true) => {
                    ctx.dispatcher.publish(ChannelEvent::PresenceUpdate {
                        user_id: *id,
                        name: name.clone(),
                        online: true,
                    });
                }
                Ok(false) => {}
                Err(e) => warn!("presence update failed for {}: {}", id, e),
            }
            info!("{} ({}) connected to alert channel", name, id);
            Some(conn_id)
        }
        None => {
            info!("viewer connected to alert channel");
            None
        }
    };

    run_connection_loop(sender, receiver, ctx.clone(), tracker.clone()).await;

    // Closed: tear down presence, unless a newer connection took over.
    match (&tracker, conn_id) {
        (Some((id, name)), Some(conn_id)) => {
            if ctx.sessions.release(*id, conn_id).await {
                match ctx.store.set_online(*id, false).await {
                    Ok(true) => {
                        ctx.dispatcher.publish(ChannelEvent::PresenceUpdate {
                            user_id: *id,
                            name: name.clone(),
                            online: false,
                        });
                    }
                    Ok(false) => {}
                    Err(e) => warn!("presence teardown failed for {}: {}", id, e),
                }
            }
            info!("{} ({}) disconnected from alert channel", name, id);
        }
        _ => info!("viewer disconnected from alert channel"),
    }
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    ctx: ChannelContext,
    tracker: Tracker,
) {
    let mut subscription = ctx.dispatcher.subscribe();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward channel events to the client, with heartbeat.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                delivery = subscription.recv() => {
                    match delivery {
                        Some(Delivery::Event(event)) => {
                            if send_event(&mut sender, &event).await.is_err() {
                                break;
                            }
                        }
                        Some(Delivery::Lagged(skipped)) => {
                            warn!("subscriber lagged, dropped {} oldest events", skipped);
                        }
                        None => break,
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from the client.
    let ctx_recv = ctx.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ChannelCommand>(&text) {
                    Ok(cmd) => handle_command(&ctx_recv, tracker.as_ref(), cmd).await,
                    Err(e) => {
                        warn!(
                            "bad channel command: {} -- raw: {}",
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // A failure on either half is local to this connection: abort the
    // other half and fall through to teardown.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    ctx: &ChannelContext,
) -> Result<Tracker, &'static str> {
    let handshake = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(ChannelCommand::Identify { user_id }) =
                    serde_json::from_str::<ChannelCommand>(&text)
                {
                    return Some(user_id);
                }
            }
        }
        None
    });

    let user_id = match handshake.await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => return Err("socket closed before identify"),
        Err(_) => return Err("identify timed out"),
    };

    match user_id {
        None => Ok(None),
        Some(id) => match ctx.store.get(id).await {
            Some(user) => Ok(Some((id, user.profile.name))),
            None => Err("identify for unknown user"),
        },
    }
}

async fn handle_command(ctx: &ChannelContext, tracker: Option<&(Uuid, String)>, cmd: ChannelCommand) {
    match cmd {
        ChannelCommand::Identify { .. } => {} // Already handled

        ChannelCommand::UpdateLocation {
            latitude,
            longitude,
            recorded_at,
        } => {
            let Some((user_id, name)) = tracker else {
                warn!("viewer connection sent a location report, ignoring");
                return;
            };
            let Some(point) = GeoPoint::new(latitude, longitude) else {
                warn!(
                    "{} ({}) reported out-of-range coordinate ({}, {})",
                    name, user_id, latitude, longitude
                );
                return;
            };

            match ctx.store.upsert_location(*user_id, point, recorded_at).await {
                Ok(()) => {
                    // Write through so the last location survives a restart.
                    let db = ctx.db.clone();
                    let id = user_id.to_string();
                    let ts = recorded_at.to_rfc3339();
                    let result = tokio::task::spawn_blocking(move || {
                        db.update_last_location(&id, point.latitude, point.longitude, &ts)
                    })
                    .await;
                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!("location write-through failed for {}: {}", user_id, e),
                        Err(e) => warn!("location write-through join error: {}", e),
                    }
                }
                Err(StoreError::StaleTimestamp) => {
                    warn!("{} ({}) sent a stale location report, ignoring", name, user_id);
                }
                Err(e) => warn!("location update rejected for {}: {}", user_id, e),
            }
        }
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &ChannelEvent,
) -> Result<(), axum::Error> {
    sender
        .send(Message::Text(serde_json::to_string(event).unwrap().into()))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn release_is_idempotent() {
        let sessions = TrackerSessions::new();
        let user = Uuid::new_v4();
        let conn = sessions.claim(user).await;

        assert!(sessions.release(user, conn).await);
        assert!(!sessions.release(user, conn).await);
    }

    #[tokio::test]
    async fn newer_claim_supersedes_older() {
        let sessions = TrackerSessions::new();
        let user = Uuid::new_v4();

        let old_conn = sessions.claim(user).await;
        let new_conn = sessions.claim(user).await;

        // The old connection's teardown must not release the new claim.
        assert!(!sessions.release(user, old_conn).await);
        assert!(sessions.release(user, new_conn).await);
    }
}
