//! Common types, protocol definitions, and errors shared across `payload-seal` crates.

pub mod error;
pub mod protocol;

pub use error::ServiceError;
