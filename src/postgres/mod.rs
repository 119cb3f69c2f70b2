// PostgreSQL module - connection handle, transactions and statement execution
//
// - config: connection settings and validation
// - connection: the `PgDatabase` handle
// - transaction: `PgTransaction` and savepoints
// - executor: statement execution shared by both handles
// - cursor: forward-only row reader
// - params / query: conversion between `RowValues` and driver types

pub mod config;
pub mod connection;
pub mod cursor;
pub mod executor;
pub mod params;
pub mod query;
pub mod transaction;

pub use config::PgConfig;
pub use connection::PgDatabase;
pub use cursor::RowCursor;
pub use executor::{Executor, QueryTarget};
pub use params::Params;
pub use transaction::{PgTransaction, quote_identifier};
