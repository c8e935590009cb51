//! Session payloads and their storage.
//!
//! The portal never manages cookie or storage mechanics itself; it talks to a
//! [`SessionStore`] through whole-payload reads and writes plus partial
//! [`SessionPatch`] updates.

mod data;
mod key;
mod store;

pub use data::{SessionData, SessionPatch};
pub use key::generate_session_key;
pub use store::{BoxError, MemorySessionStore, SessionStore};
