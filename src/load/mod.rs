// src/load/mod.rs
pub mod date_parser;
pub mod schema;
pub mod st3;
pub mod st53;
pub mod table;
pub mod utils;

pub use schema::{ColumnLayout, HeaderMode, SchemaTable};
pub use st3::St3Loader;
pub use st53::load_operator_observations;
pub use table::Table;
