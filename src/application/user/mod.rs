//! User module: staff accounts and authentication

pub mod service;

pub use service::{AuthResult, CreateUserRequest, UserOutcome, UserService};
