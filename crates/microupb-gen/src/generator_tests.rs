//! Parameter parsing and top-level generation tests.

use microupb_core::FileId;

use crate::test_schemas::{self, load};
use crate::{generate, GenError, Params};

#[test]
fn empty_parameter_is_default() {
    assert_eq!(Params::parse(""), Ok(Params::default()));
    assert_eq!(Params::parse(",,"), Ok(Params::default()));
}

#[test]
fn fasttable_parameter() {
    assert_eq!(Params::parse("fasttable"), Ok(Params { fasttable: true }));
    assert_eq!(Params::parse("fasttable=1"), Ok(Params { fasttable: true }));
}

#[test]
fn unknown_parameter_is_fatal() {
    let err = Params::parse("fasttable,speed=11").unwrap_err();
    assert_eq!(err, GenError::UnknownParameter("speed".to_string()));
    assert_eq!(err.to_string(), "Unknown parameter: speed");
}

#[test]
fn output_names_strip_proto_extension() {
    let pool = load(test_schemas::SIMPLE);
    let generated = generate(&pool, FileId(0), &Params::default());
    assert_eq!(generated.header_name, "test.upb.h");
    assert_eq!(generated.source_name, "test.upb.c");
    assert!(!generated.header.is_empty());
    assert!(!generated.source.is_empty());
}

#[test]
fn generation_is_reproducible() {
    let pool = load(test_schemas::EXTENSIONS);
    let params = Params { fasttable: true };
    let first = generate(&pool, FileId(0), &params);
    let second = generate(&pool, FileId(0), &params);
    assert_eq!(first.header, second.header);
    assert_eq!(first.source, second.source);
}
