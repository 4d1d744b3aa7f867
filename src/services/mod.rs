//! Business logic over the store: identity resolution, meeting upsert,
//! classification orchestration, and the read-side aggregation engine.

pub mod classify;
pub mod clients;
pub mod meetings;
pub mod metrics;
