use tokio::sync::{broadcast, mpsc};
use tracing::debug;
use vigil_common::protocol::{Command, Frame, Reply, ReplyFrame};
use vigil_engine::coordinator::Coordinator;

use crate::server::BridgeInbound;

/// Routes inbound bridge traffic to the coordinator and writes each
/// command's reply back out.
///
/// The pump owns the coordinator, so commands and browser events are
/// handled one at a time in arrival order. A command whose `type` does not
/// decode is answered with the structured unknown-message error and causes
/// no side effects.
pub async fn run(
    mut coordinator: Coordinator,
    mut inbound_rx: mpsc::Receiver<BridgeInbound>,
    outbound_tx: broadcast::Sender<Frame>,
) {
    while let Some(inbound) = inbound_rx.recv().await {
        match inbound {
            BridgeInbound::Command { seq, command } => {
                let reply = match serde_json::from_value::<Command>(command) {
                    Ok(command) => coordinator.handle_command(command).await,
                    Err(e) => {
                        debug!("unrecognized command: {}", e);
                        Reply::unknown_message()
                    }
                };
                // No receivers means the bridge vanished mid-command; the
                // reply has nowhere to go.
                let _ = outbound_tx.send(Frame::Reply(ReplyFrame { seq, reply }));
            }
            BridgeInbound::Event(event) => coordinator.handle_event(event).await,
        }
    }
}
