//! Protocol Messages
//!
//! Twitch chat speaks IRC over WebSocket. Inbound lines are parsed into
//! [`IrcMessage`] and reduced to the handful of [`ChatEvent`]s the bot cares
//! about; outbound traffic is built from [`ClientCommand`].

use serde::{Serialize, Deserialize};

// =============================================================================
// CHAT EVENTS (TRANSPORT -> BOT)
// =============================================================================

/// Events the transport delivers to the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Authenticated with the chat server.
    Login,

    /// Session ended (logout, auth failure or connection loss).
    Logout,

    /// A user joined a channel.
    Join { channel: String, user: String },

    /// A user left a channel.
    Leave { channel: String, user: String },

    /// A user said something in a channel.
    Message { channel: String, user: String, text: String },
}

// =============================================================================
// IRC MESSAGES (SERVER -> CLIENT)
// =============================================================================

/// Protocol errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Line contained no command.
    #[error("missing command in line: {0:?}")]
    MissingCommand(String),
}

/// NOTICE texts that mean the server refused our credentials.
const AUTH_FAILURE_NOTICES: [&str; 2] = [
    "Login authentication failed",
    "Improperly formatted auth",
];

/// One parsed IRC line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    /// IRCv3 tags, unparsed (without the leading `@`).
    pub tags: Option<String>,
    /// Source prefix (without the leading `:`).
    pub prefix: Option<String>,
    /// Command or numeric reply, e.g. `PRIVMSG` or `001`.
    pub command: String,
    /// Parameters; the trailing parameter is last.
    pub params: Vec<String>,
}

impl IrcMessage {
    /// Parse a single line (with or without its CRLF).
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        let tags = match rest.strip_prefix('@') {
            Some(tagged) => {
                let (tags, remainder) = tagged.split_once(' ').unwrap_or((tagged, ""));
                rest = remainder.trim_start();
                Some(tags.to_string())
            }
            None => None,
        };

        let prefix = match rest.strip_prefix(':') {
            Some(prefixed) => {
                let (prefix, remainder) = prefixed.split_once(' ').unwrap_or((prefixed, ""));
                rest = remainder.trim_start();
                Some(prefix.to_string())
            }
            None => None,
        };

        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return Err(ProtocolError::MissingCommand(line.to_string()));
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            let (param, remainder) = rest.split_once(' ').unwrap_or((rest, ""));
            params.push(param.to_string());
            rest = remainder;
        }

        Ok(Self {
            tags,
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Nickname part of the prefix (`nick!user@host`).
    pub fn nickname(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        let nick = prefix.split(['!', '@']).next()?;
        if nick.is_empty() { None } else { Some(nick) }
    }

    /// Parameter by index.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Reduce to a chat event, if this line is one the bot reacts to.
    pub fn to_chat_event(&self) -> Option<ChatEvent> {
        match self.command.as_str() {
            "001" => Some(ChatEvent::Login),
            "NOTICE" => {
                let text = self.params.last()?;
                AUTH_FAILURE_NOTICES
                    .iter()
                    .any(|notice| text.contains(notice))
                    .then_some(ChatEvent::Logout)
            }
            "RECONNECT" => Some(ChatEvent::Logout),
            "JOIN" => Some(ChatEvent::Join {
                channel: channel_name(self.param(0)?),
                user: self.nickname()?.to_ascii_lowercase(),
            }),
            "PART" => Some(ChatEvent::Leave {
                channel: channel_name(self.param(0)?),
                user: self.nickname()?.to_ascii_lowercase(),
            }),
            "PRIVMSG" => Some(ChatEvent::Message {
                channel: channel_name(self.param(0)?),
                user: self.nickname()?.to_string(),
                text: self.param(1)?.to_string(),
            }),
            _ => None,
        }
    }
}

/// Channel name without the leading `#`, lowercased.
pub fn channel_name(raw: &str) -> String {
    raw.trim_start_matches('#').to_ascii_lowercase()
}

// =============================================================================
// CLIENT COMMANDS (CLIENT -> SERVER)
// =============================================================================

/// Commands the bot sends to the chat server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Request an IRCv3 capability.
    CapReq(String),
    /// Credential (OAuth token).
    Pass(String),
    /// Login name.
    Nick(String),
    /// Join a channel (name without `#`).
    Join(String),
    /// Say something in a channel.
    Privmsg { channel: String, text: String },
    /// Answer a server PING.
    Pong(String),
    /// End the session.
    Quit,
}

impl ClientCommand {
    /// Render as a CRLF-free IRC line.
    pub fn to_line(&self) -> String {
        match self {
            ClientCommand::CapReq(cap) => format!("CAP REQ :{}", cap),
            ClientCommand::Pass(token) => format!("PASS {}", single_line(token)),
            ClientCommand::Nick(nick) => format!("NICK {}", single_line(nick).to_ascii_lowercase()),
            ClientCommand::Join(channel) => format!("JOIN #{}", channel_name(channel)),
            ClientCommand::Privmsg { channel, text } => {
                format!("PRIVMSG #{} :{}", channel_name(channel), single_line(text))
            }
            ClientCommand::Pong(server) => format!("PONG :{}", server),
            ClientCommand::Quit => "QUIT".to_string(),
        }
    }
}

/// Strip line breaks so text cannot smuggle extra commands.
fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

// =============================================================================
// TESTS
// =============================================================================
