//! Database models split into domain-specific modules.

pub mod category;
pub mod chat;
pub mod issue;
pub mod ticket;
pub mod user;

pub use category::*;
pub use chat::*;
pub use issue::*;
pub use ticket::*;
pub use user::*;
