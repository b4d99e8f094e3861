//! Mutual TLS channel tests

mod channel_test;
mod trust_test;
