//! API implementation submodules.
//!
//! Each submodule contains `impl TfmodApi` blocks; the struct itself lives
//! in `lib.rs`.

mod builder;
mod queries;
mod sync;

pub use builder::TfmodApiBuilder;
