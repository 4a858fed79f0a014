//! Descriptor object model for the microupb toolchain.
//!
//! This crate provides the input side of the pipeline:
//! - `descriptor` - the immutable pool of files, messages, enums and fields
//! - `json` - descriptor-set loading from JSON
//! - `ident` - C identifier and preprocessor-name transforms
//!
//! The pool is produced once (by the JSON loader or by hand in tests) and
//! consumed read-only by the generator.

pub mod descriptor;
pub mod ident;
pub mod json;

pub use descriptor::{
    CType, DefaultValue, Enum, EnumId, EnumValue, Field, FieldType, File, FileId, Label, Message,
    MessageId, Oneof, Pool, Syntax,
};
pub use json::PoolError;
