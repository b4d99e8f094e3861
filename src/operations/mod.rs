//! CA web service operations.
//!
//! Each module builds the request envelope and parses the response of one
//! call. Transport is handled by [`crate::client::EjbcaClient`].

pub mod enroll;
pub mod find_certs;

pub use enroll::validate_issued;
