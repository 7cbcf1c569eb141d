//! Provisioning agent for rdpg clusters.
//!
//! This crate provides the orchestration layer:
//! - Schema bootstrap of the control database and every node
//! - Instance provisioning as a compensating saga, and best-effort removal
//! - Bindings and the credentials handed to applications
//! - The [`Broker`] facade the `rdpg-agent` binary drives

pub mod bindings;
pub mod bootstrap;
pub mod broker;
pub mod error;
pub mod provision;
pub mod resolver;

pub use bindings::{Binding, BindingManager};
pub use bootstrap::{BootstrapError, BootstrapReport, Bootstrapper};
pub use broker::Broker;
pub use error::{BrokerError, BrokerResult, PartialProvision, StepFailure};
pub use provision::{ProvisionStep, Provisioner, RemovalOutcome, TeardownReport};
pub use resolver::CredentialResolver;
