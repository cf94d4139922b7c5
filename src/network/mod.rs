//! Network Layer
//!
//! Chat transport, credential loading and the session that coordinates the
//! background scheduler with inbound chat. Everything here is concurrent or
//! does I/O; the trivia rules themselves live in `game/`.

pub mod auth;
pub mod protocol;
pub mod transport;
pub mod session;
pub mod bot;

pub use auth::{AuthError, Token, load_token};
pub use protocol::{ChatEvent, ClientCommand, IrcMessage, ProtocolError};
pub use transport::{ChatTransport, TransportError, TwitchTransport};
pub use session::{SessionConfig, TriviaSession};
pub use bot::{BotConfig, BotError, LiveSession, MathBot};
