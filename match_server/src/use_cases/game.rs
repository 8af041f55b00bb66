use super::service::MatchService;
use super::types::{ConnId, GameEvent, MatchStatus, Outbound, ServerEvent};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// The single serialized match context: every command, physics step and timer follow-up
/// runs here, one at a time.
pub async fn match_task(
    mut service: MatchService,
    mut input_rx: mpsc::Receiver<GameEvent>,
    event_tx: broadcast::Sender<ServerEvent>,
    status_tx: watch::Sender<MatchStatus>,
    tick_interval: Duration,
) {
    // Per-connection channels for events addressed to one socket.
    let mut direct: HashMap<ConnId, mpsc::Sender<ServerEvent>> = HashMap::new();

    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let out = tokio::select! {
            event = input_rx.recv() => {
                let Some(event) = event else {
                    info!("input channel closed; match task exiting");
                    break;
                };
                handle_event(&mut service, &mut direct, event)
            }
            _ = interval.tick() => service.tick(Instant::now().into_std()),
        };

        dispatch(out, &event_tx, &direct);
        publish_status(&status_tx, service.status());
    }
}

fn handle_event(
    service: &mut MatchService,
    direct: &mut HashMap<ConnId, mpsc::Sender<ServerEvent>>,
    event: GameEvent,
) -> Vec<Outbound> {
    match event {
        GameEvent::Join {
            conn_id,
            user,
            direct_tx,
            reply,
        } => match service.join(conn_id, &user) {
            Ok((hello, out)) => {
                if reply.send(Ok(hello)).is_err() {
                    // The socket went away while the join was queued.
                    debug!(conn_id, "join reply dropped; undoing join");
                    let mut out = out;
                    out.extend(service.leave(conn_id));
                    return out;
                }
                direct.insert(conn_id, direct_tx);
                out
            }
            Err(err) => {
                let _ = reply.send(Err(err));
                Vec::new()
            }
        },
        GameEvent::Leave { conn_id } => {
            direct.remove(&conn_id);
            service.leave(conn_id)
        }
        GameEvent::Chat { conn_id, message } => service.chat(conn_id, &message, unix_millis()),
        GameEvent::PickSeat { conn_id, seat } => service.pick_seat(conn_id, seat),
        GameEvent::Start { conn_id } => service.start(conn_id),
        GameEvent::Stop { conn_id } => service.stop(conn_id),
        GameEvent::Options { conn_id, config } => service.update_options(conn_id, config),
        GameEvent::Key {
            conn_id,
            code,
            pressed,
        } => service.key(conn_id, code, pressed),
    }
}

fn dispatch(
    out: Vec<Outbound>,
    event_tx: &broadcast::Sender<ServerEvent>,
    direct: &HashMap<ConnId, mpsc::Sender<ServerEvent>>,
) {
    for outbound in out {
        match outbound {
            Outbound::Broadcast(event) => {
                // No receivers just means nobody is connected.
                let _ = event_tx.send(event);
            }
            Outbound::Direct(conn_id, event) => {
                let Some(tx) = direct.get(&conn_id) else {
                    continue;
                };
                if tx.try_send(event).is_err() {
                    warn!(conn_id, "direct channel full or closed; dropping event");
                }
            }
        }
    }
}

fn publish_status(status_tx: &watch::Sender<MatchStatus>, status: MatchStatus) {
    status_tx.send_if_modified(|current| {
        if *current == status {
            false
        } else {
            *current = status;
            true
        }
    });
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
