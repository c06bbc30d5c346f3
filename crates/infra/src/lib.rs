//! Wiring: the schema catalog, configuration, tracing, and the [`Pos`]
//! handle that ties the domain services to one store.

pub mod config;
pub mod pos;
pub mod schema;
pub mod telemetry;


pub use config::PosConfig;
pub use pos::Pos;
pub use schema::schema_versions;
