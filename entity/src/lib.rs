//! SeaORM entities for the entitlement store

pub mod prelude;

pub mod users;
