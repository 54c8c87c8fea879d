pub mod auth;
pub mod chats;
pub mod error;
pub mod friends;
pub mod messages;
pub mod middleware;
pub mod password;
pub mod router;
pub mod state;
pub mod token;
pub mod users;

pub use error::ApiError;
pub use state::{AppState, AppStateInner};
