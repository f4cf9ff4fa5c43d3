//! Session lifecycle task: drive one tenant's session state machine from the
//! channel's event stream and feed inbound messages to the dispatcher.

use crate::channels::{ChannelEvent, ChannelMessage, ChannelPort};
use crate::dispatch::Dispatcher;
use crate::session::registry::TenantSlot;
use crate::session::SessionState;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Per-user queue depth; a user this far behind simply drops the extra message.
const USER_QUEUE: usize = 16;

/// Run one tenant's session until the channel dies or the slot is destroyed.
pub(crate) async fn run_session(
    slot: Arc<TenantSlot>,
    channel: Arc<dyn ChannelPort>,
    dispatcher: Arc<Dispatcher>,
    qr_timeout: Duration,
) {
    let tenant_id = slot.tenant_id().to_string();
    slot.set_state(SessionState::Initializing, None).await;

    let mut rx = match channel.open(&tenant_id).await {
        Ok(rx) => rx,
        Err(e) => {
            log::warn!("[{}] channel open failed: {}", tenant_id, e);
            slot.set_state(SessionState::Error, Some(e)).await;
            return;
        }
    };
    log::info!("[{}] session initializing", tenant_id);

    // One worker per user keeps that user's messages in arrival order while
    // different users are handled in parallel. Workers end when their sender
    // is dropped with this task.
    let mut user_workers: HashMap<String, mpsc::Sender<ChannelMessage>> = HashMap::new();

    loop {
        let event = if slot.state().await == SessionState::QrPending {
            // Abandoned login: nobody scanned the QR within the window.
            match tokio::time::timeout(qr_timeout, rx.recv()).await {
                Ok(event) => event,
                Err(_) => {
                    log::warn!("[{}] login not completed before timeout", tenant_id);
                    slot.set_state(
                        SessionState::Error,
                        Some("login not completed before timeout".to_string()),
                    )
                    .await;
                    return;
                }
            }
        } else {
            rx.recv().await
        };

        match event {
            Some(ChannelEvent::LoginQr(qr)) => {
                log::info!("[{}] login QR issued", tenant_id);
                slot.set_qr(qr).await;
            }
            Some(ChannelEvent::Authenticated(identity)) => {
                log::info!("[{}] authenticated as {}", tenant_id, identity);
                slot.set_identity(identity).await;
                slot.set_state(SessionState::Authenticated, None).await;
                // The message loop is this task, so the inbound callback is
                // in place the moment we flip to running.
                slot.set_state(SessionState::Running, None).await;
            }
            Some(ChannelEvent::Inbound(message)) => {
                if slot.state().await != SessionState::Running {
                    log::debug!("[{}] inbound before running, dropped", tenant_id);
                    continue;
                }
                if message.is_group || message.is_self {
                    continue;
                }
                dispatch_to_user_worker(
                    &mut user_workers,
                    &tenant_id,
                    message,
                    &channel,
                    &dispatcher,
                );
            }
            Some(ChannelEvent::Fatal(reason)) => {
                log::warn!("[{}] channel failed: {}", tenant_id, reason);
                slot.set_state(SessionState::Error, Some(reason)).await;
                return;
            }
            None => {
                log::warn!("[{}] channel event stream closed", tenant_id);
                slot.set_state(SessionState::Error, Some("channel stream closed".to_string()))
                    .await;
                return;
            }
        }
    }
}

/// Queue the message on the sender's worker, spawning it on first contact.
fn dispatch_to_user_worker(
    workers: &mut HashMap<String, mpsc::Sender<ChannelMessage>>,
    tenant_id: &str,
    message: ChannelMessage,
    channel: &Arc<dyn ChannelPort>,
    dispatcher: &Arc<Dispatcher>,
) {
    let user_id = message.user_id.clone();
    let tx = workers
        .entry(user_id.clone())
        .or_insert_with(|| spawn_user_worker(tenant_id, &user_id, channel, dispatcher));
    if let Err(e) = tx.try_send(message) {
        match e {
            mpsc::error::TrySendError::Full(_) => {
                log::warn!("[{}] user {} queue full, message dropped", tenant_id, user_id);
            }
            mpsc::error::TrySendError::Closed(m) => {
                // Worker died (should not happen); replace it and requeue.
                let tx = spawn_user_worker(tenant_id, &user_id, channel, dispatcher);
                let _ = tx.try_send(m);
                workers.insert(user_id, tx);
            }
        }
    }
}

fn spawn_user_worker(
    tenant_id: &str,
    user_id: &str,
    channel: &Arc<dyn ChannelPort>,
    dispatcher: &Arc<Dispatcher>,
) -> mpsc::Sender<ChannelMessage> {
    let (tx, mut rx) = mpsc::channel::<ChannelMessage>(USER_QUEUE);
    let tenant_id = tenant_id.to_string();
    let user_id = user_id.to_string();
    let channel = channel.clone();
    let dispatcher = dispatcher.clone();
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let replies = dispatcher.handle(&tenant_id, &user_id, &message.text).await;
            for reply in replies {
                if let Err(e) = channel.send(&tenant_id, &user_id, &reply).await {
                    log::warn!("[{}] send to {} failed: {}", tenant_id, user_id, e);
                }
            }
        }
    });
    tx
}
