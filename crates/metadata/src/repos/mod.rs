//! Repository traits for metadata operations.

pub mod bindings;
pub mod instances;

pub use bindings::BindingRepo;
pub use instances::InstanceRepo;
