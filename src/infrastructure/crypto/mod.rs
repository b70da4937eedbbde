//! Credential hashing

pub mod password;

pub use password::{generate_temporary_password, hash_password, verify_password};
