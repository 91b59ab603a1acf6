//! Shared types for the Studydeck study-aid service.

mod aids;
mod chat;
mod session;
mod tool;
mod user;

pub use aids::*;
pub use chat::*;
pub use session::*;
pub use tool::*;
pub use user::*;
