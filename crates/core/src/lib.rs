//! Core domain types and pure logic for the rdpg agent.
//!
//! This crate defines the data model shared by every other crate:
//! - Identifier sanitization and derived database/role names
//! - Instance construction and validation
//! - Record lifecycle status
//! - Credentials and their connection-string encodings
//! - Cluster topology and client endpoint selection
//! - Role secret generation

pub mod config;
pub mod credentials;
pub mod error;
pub mod identifier;
pub mod instance;
pub mod secret;
pub mod status;
pub mod topology;

pub use credentials::Credentials;
pub use error::{Error, Result, ValidationError};
pub use identifier::sanitize;
pub use instance::Instance;
pub use secret::Secret;
pub use status::RecordStatus;
pub use topology::{EndpointPolicy, EndpointSelection, FirstNode, Node, RoundRobin};
