// ABOUTME: Core library for configserver: keystore materialization and property-source resolution.
// ABOUTME: Has no HTTP dependencies so startup provisioning can be tested in isolation.

pub mod environment;
pub mod keystore;
pub mod repository;

pub use environment::{Environment, PropertySource};
pub use keystore::{KeystoreError, MaterializeOutcome, SecretSource};
pub use repository::{Repository, RepositoryError};
