//! Operational HTTP surface: health probes and a metrics snapshot.

pub mod response;
pub mod routes;

pub use routes::router;
