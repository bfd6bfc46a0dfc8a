//! Client-side session: token storage, change notification and expiry checks.

mod events;
mod storage;
mod store;
pub mod token;

pub use events::{Notifications, SessionEvents, Subscription};
pub use storage::{
    ACCESS_TOKEN_KEY, FileStorage, MemoryStorage, REFRESH_TOKEN_KEY, SessionStorage, USER_KEY,
};
pub use store::{Session, SessionStore};
pub use token::TokenClaims;
