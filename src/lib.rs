//! Schema-aware document mapping over an sqlx connection pool.
//!
//! A [`Database`] owns the pool and hands out [`Model`]s, each bound to one
//! table and an optional [`Schema`]. Model operations validate writes against
//! the schema before touching the database and return read-only
//! [`Document`]s. Failures from either layer come back as one [`Error`].

mod libs;

pub use libs::*;
