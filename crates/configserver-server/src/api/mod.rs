// ABOUTME: API module containing the HTTP handler functions for configserver.
// ABOUTME: Split into public actuator checks and Basic-protected environment lookups.

pub mod actuator;
pub mod environment;
