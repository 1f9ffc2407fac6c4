//! Alert Store (§4.B): Postgres-backed persistence for alerts, their
//! classifications, and their publishing history. Sits directly atop
//! `ah-pool`'s connection lifecycle.

mod error;
mod filters;
mod postgres;
mod repository;

pub use error::{Result, StoreError};
pub use filters::{AlertFilter, AlertStats, TimeRange};
pub use postgres::PgAlertStore;
pub use repository::AlertStore;
