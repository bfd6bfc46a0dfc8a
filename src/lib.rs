#![doc = include_str!("../README.md")]

pub mod api;
pub mod config;
pub mod error;
pub mod guard;
pub mod pipeline;
pub mod session;
pub mod types;

// Re-exports for convenient access
pub use api::ApiClient;
pub use config::ClientConfig;
pub use error::Error;
pub use guard::{GuardDecision, GuardHandle, GuardState, Location, Navigator, RouteGuard};
pub use pipeline::{ApiRequest, RequestPipeline};
pub use session::{
    FileStorage, MemoryStorage, Session, SessionEvents, SessionStorage, SessionStore,
    Subscription, TokenClaims,
};
pub use types::{
    AuthOutcome, AuthResponse, GeneratedAids, ItemId, LoginCredentials, MemoryItem, MindMapNode,
    Mnemonic, NewMemoryItem, ProfileUpdate, RegisterCredentials, ReviewId, ReviewSchedule,
    SensoryAssociation, UserId, UserProfile,
};
