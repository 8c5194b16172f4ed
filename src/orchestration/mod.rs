//! Conversation orchestration.
//!
//! Drives one chat session per client request: the session turn loop
//! ([`ChatSession`]), the wire events it produces ([`OutboundEvent`]), and
//! the single-writer channel that carries them ([`OutputChannel`]).

mod channel;
mod events;
mod session;

pub use channel::{EventSender, OutputChannel};
pub use events::OutboundEvent;
pub use session::{resolve_conversation_id, ChatRequest, ChatSession, SessionError};
