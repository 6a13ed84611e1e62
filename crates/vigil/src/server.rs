use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};
use vigil_common::protocol::{BrowserEvent, Frame, QueryResultFrame};

/// Inbound bridge traffic destined for the dispatch pump.
#[derive(Debug)]
pub enum BridgeInbound {
    Command {
        seq: u64,
        command: serde_json::Value,
    },
    Event(BrowserEvent),
}

/// WebSocket listener the page bridge connects to.
pub struct BridgeServer {
    port: u16,
}

pub struct ServerHandle {
    /// Outbound frames, broadcast to every connected bridge (normally one).
    pub outbound_tx: broadcast::Sender<Frame>,
    /// Commands and events from all connections, in arrival order.
    pub inbound_rx: mpsc::Receiver<BridgeInbound>,
    /// Query answers, consumed by the remote browser.
    pub query_rx: Arc<Mutex<mpsc::Receiver<QueryResultFrame>>>,
}

impl BridgeServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn start(&self) -> std::io::Result<ServerHandle> {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        let listener = TcpListener::bind(&addr).await?;
        info!("bridge server listening on {}", addr);

        let (outbound_tx, _) = broadcast::channel(100);
        let (inbound_tx, inbound_rx) = mpsc::channel(100);
        let (query_tx, query_rx) = mpsc::channel(100);

        let accept_outbound = outbound_tx.clone();
        tokio::spawn(async move {
            while let Ok((stream, peer)) = listener.accept().await {
                info!("bridge connected from {}", peer);
                tokio::spawn(handle_connection(
                    stream,
                    accept_outbound.subscribe(),
                    inbound_tx.clone(),
                    query_tx.clone(),
                ));
            }
        });

        Ok(ServerHandle {
            outbound_tx,
            inbound_rx,
            query_rx: Arc::new(Mutex::new(query_rx)),
        })
    }
}

async fn handle_connection(
    stream: TcpStream,
    mut outbound_rx: broadcast::Receiver<Frame>,
    inbound_tx: mpsc::Sender<BridgeInbound>,
    query_tx: mpsc::Sender<QueryResultFrame>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("websocket handshake failed: {}", e);
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                match outbound {
                    Ok(frame) => {
                        let text = match serde_json::to_string(&frame) {
                            Ok(text) => text,
                            Err(e) => {
                                error!("failed to serialize frame: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = ws_sender.send(Message::Text(text)).await {
                            error!("failed to send frame: {}", e);
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!("connection lagged, dropped {} outbound frames", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            inbound = ws_receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        route_frame(&text, &inbound_tx, &query_tx).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("bridge disconnected");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("websocket error: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

async fn route_frame(
    text: &str,
    inbound_tx: &mpsc::Sender<BridgeInbound>,
    query_tx: &mpsc::Sender<QueryResultFrame>,
) {
    let frame = match serde_json::from_str::<Frame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("dropping unparsable frame: {}", e);
            return;
        }
    };
    match frame {
        Frame::Command(command) => {
            let _ = inbound_tx
                .send(BridgeInbound::Command {
                    seq: command.seq,
                    command: command.command,
                })
                .await;
        }
        Frame::Event(event) => {
            let _ = inbound_tx.send(BridgeInbound::Event(event.event)).await;
        }
        Frame::QueryResult(result) => {
            let _ = query_tx.send(result).await;
        }
        // Reply and query frames only travel service -> bridge.
        other => debug!("unexpected inbound frame: {:?}", other),
    }
}
