//! Job runner tests
