//! Integration tests for possync-remote
//!
//! Uses wiremock to simulate the cloud sync API and verifies URL building,
//! authentication, payloads and error classification end to end.

mod common;

mod test_status;
