//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod account;
pub mod auth;
pub mod logging;
pub mod password;
mod transfer;
mod user;

pub use account::{AccountService, MAX_PAGE_SIZE};
pub use auth::authorize;
pub use logging::{
    CommandOutcomes, EntryPoint, LogEntry, LogEvent, LogFilter, LogSummary, LoggingService,
};
pub use password::{check_password, hash_password};
pub use transfer::{TransferRequest, TransferService};
pub use user::{
    CreateUserRequest, LoginRequest, LoginResult, RenewAccessTokenResult, UserService,
};
