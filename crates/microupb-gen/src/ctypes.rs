//! C-side type names, tokens and literals shared by the emitters.

use microupb_core::{CType, DefaultValue, Field, Pool, Syntax};

use crate::layout::Size;
use crate::names::message_name;

/// Warning banner at the top of every generated file.
pub fn banner(file_name: &str) -> String {
    format!(
        "/* This file was generated by the microupb compiler from the input\n\
         \x20* file:\n\
         \x20*\n\
         \x20*     {file_name}\n\
         \x20*\n\
         \x20* Do not edit -- your changes will be discarded when the file is\n\
         \x20* regenerated. */\n\n"
    )
}

/// `UPB_SIZE(size32, size64)` initializer.
pub fn size_init(size: Size) -> String {
    format!("UPB_SIZE({}, {})", size.size32, size.size64)
}

/// Signed variant, for the bitwise-NOT presence encoding.
pub fn size_init_signed(size32: i32, size64: i32) -> String {
    format!("UPB_SIZE({size32}, {size64})")
}

pub fn ctype(pool: &Pool, field: &Field) -> String {
    ctype_internal(pool, field, false)
}

pub fn ctype_const(pool: &Pool, field: &Field) -> String {
    ctype_internal(pool, field, true)
}

fn ctype_internal(pool: &Pool, field: &Field, is_const: bool) -> String {
    // Only pointer (message) types are const-qualified; scalars are
    // returned by value.
    match field.ctype() {
        CType::Message => {
            let maybe_const = if is_const { "const " } else { "" };
            let target = field
                .message_type
                .expect("message field without a target type");
            let target_msg = pool.message(target);
            // Cross-file types are only forward-declared as structs.
            let maybe_struct = if target_msg.file != field.file {
                "struct "
            } else {
                ""
            };
            format!("{maybe_const}{maybe_struct}{}*", message_name(target_msg))
        }
        CType::Bool => "bool".to_string(),
        CType::Float => "float".to_string(),
        CType::Int32 | CType::Enum => "int32_t".to_string(),
        CType::UInt32 => "uint32_t".to_string(),
        CType::Double => "double".to_string(),
        CType::Int64 => "int64_t".to_string(),
        CType::UInt64 => "uint64_t".to_string(),
        CType::String => "upb_strview".to_string(),
    }
}

/// log2 of the element size, for array accessors.
pub fn size_lg2(field: &Field) -> &'static str {
    match field.ctype() {
        CType::Message => "UPB_SIZE(2, 3)",
        CType::Bool => "1",
        CType::Enum | CType::Float | CType::Int32 | CType::UInt32 => "2",
        CType::Double | CType::Int64 | CType::UInt64 => "3",
        CType::String => "UPB_SIZE(3, 4)",
    }
}

/// Default-value literal for getters.
pub fn field_default(pool: &Pool, field: &Field) -> String {
    match field.ctype() {
        CType::Message => "NULL".to_string(),
        CType::String => {
            let text = match &field.default {
                Some(DefaultValue::String(s)) => c_escape(s),
                _ => String::new(),
            };
            format!("upb_strview_make(\"{text}\", strlen(\"{text}\"))")
        }
        CType::Bool => match field.default {
            Some(DefaultValue::Bool(true)) => "true".to_string(),
            _ => "false".to_string(),
        },
        CType::Int32 | CType::Int64 => match field.default {
            Some(DefaultValue::Int(v)) => v.to_string(),
            _ => "0".to_string(),
        },
        CType::UInt32 | CType::UInt64 => match field.default {
            Some(DefaultValue::Uint(v)) => v.to_string(),
            _ => "0".to_string(),
        },
        CType::Float | CType::Double => match field.default {
            Some(DefaultValue::Float(v)) => v.to_string(),
            _ => "0".to_string(),
        },
        // A number rather than the symbolic name, so the getter does not
        // require the enum's header.
        CType::Enum => match field.default {
            Some(DefaultValue::Enum(v)) => v.to_string(),
            _ => default_enum_number(pool, field).to_string(),
        },
    }
}

fn default_enum_number(pool: &Pool, field: &Field) -> i32 {
    if pool.syntax(field) == Syntax::Proto3 {
        return 0;
    }
    // Proto2 defaults to the first declared value.
    field
        .enum_type
        .and_then(|id| pool.enum_(id).values.first())
        .map(|v| v.number)
        .unwrap_or(0)
}

/// Escape a string for a C literal.
pub fn c_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(byte as char),
            _ => out.push_str(&format!("\\{:03o}", byte)),
        }
    }
    out
}

/// Representation token for field records.
pub fn rep_token(pool: &Pool, field: &Field) -> &'static str {
    if field.is_repeated() || field.is_map(pool) {
        return "_UPB_REP_PTR";
    }
    match field.ctype() {
        CType::Message => "_UPB_REP_PTR",
        CType::Bool => "_UPB_REP_1BYTE",
        CType::Enum | CType::Float | CType::Int32 | CType::UInt32 => "_UPB_REP_4BYTE",
        CType::Double | CType::Int64 | CType::UInt64 => "_UPB_REP_8BYTE",
        CType::String => "_UPB_REP_STRVIEW",
    }
}

/// Mode expression for field records (kind plus flag bits).
pub fn mode_tokens(pool: &Pool, field: &Field) -> String {
    let mut mode = if field.is_map(pool) {
        "_UPB_MODE_MAP".to_string()
    } else if field.is_repeated() {
        "_UPB_MODE_ARRAY".to_string()
    } else {
        "_UPB_MODE_SCALAR".to_string()
    };
    if field.is_packed(pool.syntax(field)) {
        mode.push_str(" | _UPB_MODE_IS_PACKED");
    }
    if field.is_extension {
        mode.push_str(" | _UPB_MODE_IS_EXTENSION");
    }
    mode
}
