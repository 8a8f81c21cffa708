pub mod config;
pub mod database;
pub mod document;
pub mod engine;
pub mod error;
pub mod model;
pub mod query_builder;
pub mod schema;
pub mod sql;
pub mod validator;
pub mod value;

// Re-export them for easier access from the crate root
pub use config::*;
pub use database::*;
pub use document::*;
pub use engine::*;
pub use error::*;
pub use model::*;
pub use query_builder::*;
pub use schema::*;
pub use sql::*;
pub use validator::*;
pub use value::*;
