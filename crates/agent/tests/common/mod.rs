//! Common test utilities and fixtures.

pub mod cluster;
pub mod fixtures;
pub mod postgres;
pub mod schema;
pub mod store;

#[allow(unused_imports)]
pub use cluster::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use postgres::*;
#[allow(unused_imports)]
pub use schema::*;
#[allow(unused_imports)]
pub use store::*;
