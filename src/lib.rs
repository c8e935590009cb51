#![doc = include_str!("../README.md")]

pub mod api;
pub mod error;
pub mod guard;
pub mod middleware;
pub mod session;
pub mod types;

// Re-exports for convenient access
pub use api::{ApiClient, ApiConfig, ApiRequest, Credentials, LoginResponse, PaymentVerification};
pub use error::Error;
pub use guard::{Decision, RouteClass, RouteGuard, RouteTable};
pub use session::{MemorySessionStore, SessionData, SessionPatch, SessionStore, generate_session_key};
pub use types::{PaymentKind, Role, SessionKey, User, UserId};
