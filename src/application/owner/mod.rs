//! Owner module: EV owner accounts and profiles

pub mod service;

pub use service::{
    CreateOwnerRequest, OwnerDetails, OwnerOutcome, OwnerService, RegisterOwnerRequest,
    UpdateOwnerRequest,
};
