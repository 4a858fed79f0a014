//! Fast-dispatch table builder.
//!
//! Packs a field's expected tag, offset, presence and submessage index into
//! a single 64-bit word, keyed by a slot derived from the first tag byte.
//! The decoder peels two bytes of tag, masks, and indexes; anything the
//! table cannot express falls back to the generic handler.
//!
//! Data layout of an entry word:
//!
//! ```text
//!                  48                32                16                 0
//! |--------|--------|--------|--------|--------|--------|--------|--------|
//! |   offset (16)   |case offset (16) |presence| submsg |  exp. tag (16)  |
//! |--------|--------|--------|--------|--------|--------|--------|--------|
//! ```
//!
//! `presence` is a hasbit index, or the field number for oneof members.

use microupb_core::{CType, Field, FieldType, MessageId, Pool, Syntax};
use microupb_runtime::wire;

use crate::layout::MessageLayout;
use crate::names::field_hotness_order;
use crate::submsg::SubmsgArray;
use crate::tables::wire_type_of;

/// Handler symbol for slots no field claims.
pub const GENERIC_HANDLER: &str = "fastdecode_generic";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableEntry {
    pub function: String,
    pub data: u64,
}

impl TableEntry {
    fn generic() -> TableEntry {
        TableEntry {
            function: GENERIC_HANDLER.to_string(),
            data: 0,
        }
    }

    pub fn is_generic(&self) -> bool {
        self.function == GENERIC_HANDLER
    }
}

/// The field's tag, varint-encoded, as a little-endian integer.
pub fn encoded_tag(pool: &Pool, field: &Field) -> u64 {
    wire::encoded_tag(field.number, wire_type_of(pool, field))
}

/// Table slot for the field, or None when the tag needs more than two
/// bytes.
pub fn table_slot(pool: &Pool, field: &Field) -> Option<usize> {
    let tag = encoded_tag(pool, field);
    if tag > 0x7fff {
        return None;
    }
    Some(((tag & 0xf8) >> 3) as usize)
}

/// Type discriminator in the handler symbol name.
fn type_letter(pool: &Pool, field: &Field) -> Option<&'static str> {
    Some(match field.field_type {
        FieldType::Bool => "b1",
        FieldType::Int32 | FieldType::Enum | FieldType::Uint32 => "v4",
        FieldType::Int64 | FieldType::Uint64 => "v8",
        FieldType::Fixed32 | FieldType::Sfixed32 | FieldType::Float => "f4",
        FieldType::Fixed64 | FieldType::Sfixed64 | FieldType::Double => "f8",
        FieldType::Sint32 => "z4",
        FieldType::Sint64 => "z8",
        // Only proto3 validates UTF-8; proto2 strings decode as bytes.
        FieldType::String if pool.syntax(field) == Syntax::Proto3 => "s",
        FieldType::String | FieldType::Bytes => "b",
        FieldType::Message if field.is_map(pool) => return None,
        FieldType::Message => "m",
        FieldType::Group => return None,
    })
}

fn cardinality(pool: &Pool, msg_id: MessageId, field: &Field) -> &'static str {
    if field.is_repeated() {
        if field.is_packed(pool.syntax(field)) {
            "p"
        } else {
            "r"
        }
    } else if field.real_oneof(pool.message(msg_id)).is_some() {
        "o"
    } else {
        "s"
    }
}

/// Build the entry for one field, or None if the field cannot use the fast
/// path (unsupported type, or an index/offset that does not fit the packed
/// word).
pub fn try_fill_entry(
    pool: &Pool,
    msg_id: MessageId,
    layout: &MessageLayout,
    submsgs: &SubmsgArray,
    field: &Field,
) -> Option<TableEntry> {
    let msg = pool.message(msg_id);
    let ty = type_letter(pool, field)?;
    let card = cardinality(pool, msg_id, field);
    let tag = encoded_tag(pool, field);
    let offset = layout.field_offset(field);

    let mut data = (offset.size64 as u64) << 48 | tag;

    // Repeated, oneof and hasbit presence are mutually exclusive.
    if field.is_repeated() {
        // No presence word.
    } else if let Some((oi, _)) = field.real_oneof(msg) {
        let case_offset = layout.oneof_case_offset(oi);
        if case_offset.size64 > 0xffff || field.number >= 256 {
            return None;
        }
        data |= (field.number as u64) << 24;
        data |= (case_offset.size64 as u64) << 32;
    } else {
        // No hasbit: point at a high, unused bit.
        let mut hasbit_index = 63u64;
        if let Some(index) = layout.hasbit_index(field) {
            if index > 31 {
                return None;
            }
            hasbit_index = index as u64;
        }
        data |= hasbit_index << 24;
    }

    let tag_bytes = if tag > 0xff { "2" } else { "1" };
    let function = if field.ctype() == CType::Message {
        let index = submsgs.index_of(field);
        if index > 255 {
            return None;
        }
        data |= (index as u64) << 16;

        // The submessage size bucket is only knowable for same-file types.
        let target = field.message_type?;
        let mut ceil = "max".to_string();
        if pool.message(target).file == field.file {
            let size = MessageLayout::new(pool, target).message_size().size64 as usize + 8;
            for brk in [64usize, 128, 192, 256] {
                if size <= brk {
                    ceil = brk.to_string();
                    break;
                }
            }
        }
        format!("upb_p{card}{ty}_{tag_bytes}bt_max{ceil}b")
    } else {
        format!("upb_p{card}{ty}_{tag_bytes}bt")
    };

    Some(TableEntry { function, data })
}

/// Build the whole table: hotter fields claim slots first, the table grows
/// by powers of two until the hottest eligible slot fits.
pub fn fast_decode_table(pool: &Pool, msg_id: MessageId, layout: &MessageLayout) -> Vec<TableEntry> {
    let msg = pool.message(msg_id);
    let submsgs = SubmsgArray::new(pool, msg_id);
    let mut table: Vec<TableEntry> = Vec::new();

    for fi in field_hotness_order(msg) {
        let field = &msg.fields[fi];
        let Some(slot) = table_slot(pool, field) else {
            continue;
        };
        let Some(entry) = try_fill_entry(pool, msg_id, layout, &submsgs, field) else {
            continue;
        };
        while slot >= table.len() {
            let size = (table.len() * 2).max(1);
            table.resize(size, TableEntry::generic());
        }
        if !table[slot].is_generic() {
            // A hotter field already claimed this slot.
            continue;
        }
        table[slot] = entry;
    }
    table
}

/// The mask stored in the layout record: `(size - 1) << 3` for a real
/// table, otherwise all ones (no table).
pub fn table_mask(table_len: usize) -> u8 {
    if table_len > 1 {
        debug_assert!(table_len.is_power_of_two());
        ((table_len - 1) << 3) as u8
    } else {
        0xff
    }
}
