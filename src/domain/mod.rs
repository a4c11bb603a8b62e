// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that define what the pipeline
// works on:
//
//   table.rs  — the in-memory column table
//   schema.rs — fixed column names and numerical/categorical roles
//   error.rs  — the pipeline error taxonomy
//   traits.rs — TableSource and Regressor abstractions
//
// Rules for this layer:
//   - NO file I/O
//   - NO model code
//   - Only structs, enums, constants and traits

pub mod error;

pub mod schema;

pub mod table;

pub mod traits;
