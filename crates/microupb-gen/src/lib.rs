//! Code generator for the microupb runtime.
//!
//! Consumes a descriptor [`Pool`] and emits, per file, a C header with the
//! inline accessor surface and a C source with the serialized layout
//! tables:
//! - `layout` - per-field offsets, hasbits, oneof case slots, sizes
//! - `submsg` - the per-message submessage index table
//! - `fasttable` - the fast-dispatch table builder
//! - `header` / `source` - the text emitters
//! - `tables` - the same layouts lowered into runtime records
//!
//! Generation is pure text emission; the only fallible step is parameter
//! classification up front.

pub mod ctypes;
pub mod fasttable;
pub mod header;
pub mod layout;
pub mod names;
pub mod source;
pub mod submsg;
pub mod tables;

#[cfg(test)]
mod fasttable_tests;
#[cfg(test)]
mod generator_tests;
#[cfg(test)]
mod submsg_tests;
#[cfg(test)]
pub(crate) mod test_schemas;

use microupb_core::{FileId, Pool};

pub use layout::{MessageLayout, Size};
pub use tables::RuntimeTables;

/// Errors surfaced through the plugin error channel.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum GenError {
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),
}

/// Parsed generator parameters: comma-separated `key[=value]` pairs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Params {
    pub fasttable: bool,
}

impl Params {
    pub fn parse(parameter: &str) -> Result<Params, GenError> {
        let mut params = Params::default();
        for part in parameter.split(',') {
            if part.is_empty() {
                continue;
            }
            let key = match part.split_once('=') {
                Some((key, _value)) => key,
                None => part,
            };
            match key {
                "fasttable" => params.fasttable = true,
                other => return Err(GenError::UnknownParameter(other.to_string())),
            }
        }
        Ok(params)
    }
}

/// The two outputs generated for one schema file.
#[derive(Clone, Debug)]
pub struct Generated {
    pub header_name: String,
    pub header: String,
    pub source_name: String,
    pub source: String,
}

/// Generate the header and source for one file of the pool.
pub fn generate(pool: &Pool, file: FileId, params: &Params) -> Generated {
    let f = pool.file(file);
    Generated {
        header_name: names::header_filename(f),
        header: header::emit_header(pool, file),
        source_name: names::source_filename(f),
        source: source::emit_source(pool, file, params.fasttable),
    }
}
