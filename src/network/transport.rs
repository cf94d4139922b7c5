//! Chat Transport
//!
//! [`ChatTransport`] is the outbound capability the bot needs from a chat
//! service. [`TwitchTransport`] provides it over Twitch's IRC WebSocket
//! endpoint and delivers inbound [`ChatEvent`]s on a channel.
//!
//! Outbound calls only enqueue a line; a writer task owns the socket.
//! Callers never block on network I/O.

use std::collections::BTreeSet;
use std::sync::Mutex;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn, instrument};

use crate::network::auth::Token;
use crate::network::protocol::{ChatEvent, ClientCommand, IrcMessage, channel_name};

/// Capability Twitch membership events depend on.
const MEMBERSHIP_CAPABILITY: &str = "twitch.tv/membership";

/// Inbound event queue depth.
const EVENT_QUEUE_SIZE: usize = 64;

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection is gone; nothing can be sent.
    #[error("connection closed")]
    Closed,
}

/// Outbound operations the bot requires from a chat service.
pub trait ChatTransport: Send + Sync + 'static {
    /// Say `text` in `channel`.
    fn send_message(&self, channel: &str, text: &str) -> Result<(), TransportError>;

    /// Join `channel`.
    fn join_channel(&self, channel: &str) -> Result<(), TransportError>;

    /// Say `farewell` in every joined channel and end the session.
    fn log_out(&self, farewell: &str) -> Result<(), TransportError>;
}

/// Item on the writer task's queue.
#[derive(Debug)]
enum Outbound {
    /// Send a text line.
    Line(String),
    /// Close the socket.
    Close,
}

/// Twitch chat over WebSocket.
pub struct TwitchTransport {
    /// Writer task queue.
    outbound: mpsc::UnboundedSender<Outbound>,
    /// Channels we have asked to join.
    joined: Mutex<BTreeSet<String>>,
}

impl TwitchTransport {
    /// Connect to `url` and authenticate as `nickname`.
    ///
    /// Returns the transport and the receiver on which inbound chat events
    /// arrive. A final [`ChatEvent::Logout`] is delivered when the
    /// connection ends.
    #[instrument(skip(token), fields(token = %token.fingerprint()))]
    pub async fn log_in(
        url: &str,
        nickname: &str,
        token: &Token,
    ) -> Result<(Self, mpsc::Receiver<ChatEvent>), TransportError> {
        let (ws_stream, _) = connect_async(url).await?;
        info!("Connected to {}", url);

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
        let (event_tx, event_rx) = mpsc::channel::<ChatEvent>(EVENT_QUEUE_SIZE);

        // Writer task
        tokio::spawn(async move {
            while let Some(item) = outbound_rx.recv().await {
                match item {
                    Outbound::Line(line) => {
                        if line.starts_with("PASS ") {
                            debug!("> PASS ***");
                        } else {
                            debug!("> {}", line);
                        }
                        if let Err(e) = ws_sender.send(Message::Text(line)).await {
                            warn!("Send failed: {}", e);
                            break;
                        }
                    }
                    Outbound::Close => {
                        let _ = ws_sender.close().await;
                        break;
                    }
                }
            }
        });

        // Reader task
        let pong_tx = outbound_tx.clone();
        tokio::spawn(async move {
            while let Some(frame) = ws_receiver.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("Receive failed: {}", e);
                        break;
                    }
                };

                for line in text.lines().filter(|l| !l.is_empty()) {
                    let message = match IrcMessage::parse(line) {
                        Ok(m) => m,
                        Err(e) => {
                            debug!("Ignoring line: {}", e);
                            continue;
                        }
                    };

                    if message.command == "PING" {
                        let server = message.param(0).unwrap_or("tmi.twitch.tv").to_string();
                        let _ = pong_tx.send(Outbound::Line(ClientCommand::Pong(server).to_line()));
                        continue;
                    }

                    if let Some(event) = message.to_chat_event() {
                        if event_tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }
            }

            info!("Connection closed");
            let _ = event_tx.send(ChatEvent::Logout).await;
        });

        let transport = Self {
            outbound: outbound_tx,
            joined: Mutex::new(BTreeSet::new()),
        };
        transport.send_command(ClientCommand::CapReq(MEMBERSHIP_CAPABILITY.to_string()))?;
        transport.send_command(ClientCommand::Pass(token.expose().to_string()))?;
        transport.send_command(ClientCommand::Nick(nickname.to_string()))?;

        Ok((transport, event_rx))
    }

    /// Queue a command for the writer task.
    fn send_command(&self, command: ClientCommand) -> Result<(), TransportError> {
        self.outbound
            .send(Outbound::Line(command.to_line()))
            .map_err(|_| TransportError::Closed)
    }

    /// Channels joined so far.
    pub fn joined_channels(&self) -> Vec<String> {
        self.joined
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

impl ChatTransport for TwitchTransport {
    fn send_message(&self, channel: &str, text: &str) -> Result<(), TransportError> {
        self.send_command(ClientCommand::Privmsg {
            channel: channel.to_string(),
            text: text.to_string(),
        })
    }

    fn join_channel(&self, channel: &str) -> Result<(), TransportError> {
        self.joined
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(channel_name(channel));
        self.send_command(ClientCommand::Join(channel.to_string()))
    }

    fn log_out(&self, farewell: &str) -> Result<(), TransportError> {
        for channel in self.joined_channels() {
            self.send_message(&channel, farewell)?;
        }
        self.send_command(ClientCommand::Quit)?;
        self.outbound
            .send(Outbound::Close)
            .map_err(|_| TransportError::Closed)
    }
}
