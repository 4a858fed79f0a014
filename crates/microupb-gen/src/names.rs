//! Generated-symbol naming and definition orderings.

use microupb_core::ident::{strip_extension, to_c_ident};
use microupb_core::{CType, Field, File, Message, MessageId, Pool};

pub fn header_filename(file: &File) -> String {
    format!("{}.upb.h", strip_extension(&file.name))
}

pub fn source_filename(file: &File) -> String {
    format!("{}.upb.c", strip_extension(&file.name))
}

pub fn message_name(msg: &Message) -> String {
    to_c_ident(&msg.full_name)
}

/// Symbol of a message's layout record.
pub fn message_init(msg: &Message) -> String {
    format!("{}_msginit", message_name(msg))
}

/// Scope prefix for an extension's generated identifiers.
pub fn extension_ident_base(pool: &Pool, ext: &Field) -> String {
    debug_assert!(ext.is_extension);
    match ext.extension_scope {
        Some(scope) => message_name(pool.message(scope)),
        None => to_c_ident(&pool.file(ext.file).package),
    }
}

/// Symbol of an extension's layout record.
pub fn extension_layout_name(pool: &Pool, ext: &Field) -> String {
    format!("{}_{}_ext", extension_ident_base(pool, ext), ext.name)
}

/// Symbol of the per-file layout record.
pub fn file_layout_name(file: &File) -> String {
    format!("{}_upb_file_layout", to_c_ident(&file.name))
}

pub const MESSAGES_INIT: &str = "messages_layout";
pub const EXTENSIONS_INIT: &str = "extensions_layout";

/// Indices of a message's fields sorted by field number.
pub fn field_number_order(msg: &Message) -> Vec<usize> {
    let mut order: Vec<usize> = (0..msg.fields.len()).collect();
    order.sort_by_key(|&i| msg.fields[i].number);
    order
}

/// Decoder-hotness ordering used by the fast-table builder. Field-number
/// order is the stand-in heuristic: low numbers are the hot ones.
pub fn field_hotness_order(msg: &Message) -> Vec<usize> {
    field_number_order(msg)
}

/// Message-typed fields sorted by the referenced message's full name.
pub fn sorted_submessages<'a>(pool: &'a Pool, msg: &'a Message) -> Vec<&'a Field> {
    let mut subs: Vec<&Field> = msg
        .fields
        .iter()
        .filter(|f| f.ctype() == CType::Message)
        .collect();
    subs.sort_by_key(|f| f.message_type.map(|id| pool.message(id).full_name.as_str()));
    subs
}

/// Messages defined in other files but referenced from this one (as
/// submessage targets or extendees), sorted by full name.
pub fn cross_file_messages(pool: &Pool, file_msgs: &[MessageId], exts: &[Field]) -> Vec<MessageId> {
    let mut found: Vec<MessageId> = Vec::new();
    for &id in file_msgs {
        let msg = pool.message(id);
        for field in &msg.fields {
            if let Some(target) = field.message_type {
                if pool.message(target).file != field.file {
                    found.push(target);
                }
            }
        }
    }
    for ext in exts {
        if pool.message(ext.containing).file != ext.file {
            found.push(ext.containing);
        }
    }
    found.sort_by_key(|&id| pool.message(id).full_name.clone());
    found.dedup();
    found
}
