pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod frames;
pub mod resources;
pub mod result;
pub mod runner;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use api::{ApiProvider, AthenaApi, NamedQuery, StartQuery, BATCH_LIMIT};
pub use client::{ConnectOptions, SdkApiProvider, SdkAthenaApi};
pub use config::AthenaConfig;
pub use error::AthenaError;
pub use resources::{AthenaResources, RESOURCE_NAMES};
pub use result::{AthenaColumn, AthenaQueryResult};
pub use runner::QueryRunner;
