//! Lowering of computed layouts into runtime tables.
//!
//! The C toolchain gets runtime tables by compiling the emitted source;
//! this module produces the same tables directly as
//! [`microupb_runtime::LayoutPool`] records, so a schema can be loaded,
//! laid out and encoded in one process. Every number here must agree with
//! what the source emitter prints.

use std::collections::HashMap;

use microupb_core::{CType, Field, FieldType, FileId, Message, MessageId, Pool, Syntax};
use microupb_runtime as rt;
use microupb_runtime::table::{make_mode, mode};

use crate::layout::MessageLayout;
use crate::names::field_number_order;
use crate::submsg::SubmsgArray;

/// Descriptor type as stored in field records. Proto2 strings skip UTF-8
/// validation, which makes them bytes fields as far as the wire tables are
/// concerned.
pub fn descriptor_type_of(pool: &Pool, field: &Field) -> rt::DescriptorType {
    if field.field_type == FieldType::String && pool.syntax(field) == Syntax::Proto2 {
        return rt::DescriptorType::Bytes;
    }
    match field.field_type {
        FieldType::Double => rt::DescriptorType::Double,
        FieldType::Float => rt::DescriptorType::Float,
        FieldType::Int64 => rt::DescriptorType::Int64,
        FieldType::Uint64 => rt::DescriptorType::Uint64,
        FieldType::Int32 => rt::DescriptorType::Int32,
        FieldType::Fixed64 => rt::DescriptorType::Fixed64,
        FieldType::Fixed32 => rt::DescriptorType::Fixed32,
        FieldType::Bool => rt::DescriptorType::Bool,
        FieldType::String => rt::DescriptorType::String,
        FieldType::Group => rt::DescriptorType::Group,
        FieldType::Message => rt::DescriptorType::Message,
        FieldType::Bytes => rt::DescriptorType::Bytes,
        FieldType::Uint32 => rt::DescriptorType::Uint32,
        FieldType::Enum => rt::DescriptorType::Enum,
        FieldType::Sfixed32 => rt::DescriptorType::Sfixed32,
        FieldType::Sfixed64 => rt::DescriptorType::Sfixed64,
        FieldType::Sint32 => rt::DescriptorType::Sint32,
        FieldType::Sint64 => rt::DescriptorType::Sint64,
    }
}

/// Wire type of the field's tag (packed repeated fields use one
/// length-delimited record).
pub fn wire_type_of(pool: &Pool, field: &Field) -> rt::WireType {
    if field.is_packed(pool.syntax(field)) {
        rt::WireType::Delimited
    } else {
        descriptor_type_of(pool, field).wire_type()
    }
}

fn rep_of(pool: &Pool, field: &Field) -> rt::Rep {
    if field.is_repeated() || field.is_map(pool) {
        return rt::Rep::EightByte;
    }
    match field.ctype() {
        CType::Bool => rt::Rep::OneByte,
        CType::Float | CType::Int32 | CType::UInt32 | CType::Enum => rt::Rep::FourByte,
        CType::Double | CType::Int64 | CType::UInt64 => rt::Rep::EightByte,
        CType::String => rt::Rep::StrView,
        CType::Message => rt::Rep::EightByte,
    }
}

fn mode_of(pool: &Pool, field: &Field) -> u8 {
    let kind = if field.is_map(pool) {
        rt::FieldKind::Map
    } else if field.is_repeated() {
        rt::FieldKind::Array
    } else {
        rt::FieldKind::Scalar
    };
    let mut bits = make_mode(kind, rep_of(pool, field));
    if field.is_packed(pool.syntax(field)) {
        bits |= mode::IS_PACKED;
    }
    if field.is_extension {
        bits |= mode::IS_EXTENSION;
    }
    bits
}

/// Presence word: 0, a hasbit index, or the bitwise NOT of the oneof case
/// offset.
pub fn presence_of(layout: &MessageLayout, msg: &Message, field: &Field) -> i32 {
    if let Some(index) = layout.hasbit_index(field) {
        index as i32
    } else if let Some((oi, _)) = field.real_oneof(msg) {
        !(layout.oneof_case_offset(oi).size64 as i32)
    } else {
        0
    }
}

/// Length of the longest prefix of the sorted field numbers that is
/// exactly `1..=k`, capped at 255. Lets the decoder dispatch small dense
/// schemas with an array index instead of a search.
pub fn dense_below(sorted_numbers: &[u32]) -> u8 {
    let mut dense = 0u8;
    for (i, &number) in sorted_numbers.iter().enumerate() {
        if i >= 255 || number != i as u32 + 1 {
            break;
        }
        dense = (i + 1) as u8;
    }
    dense
}

pub fn ext_mode_of(msg: &Message) -> rt::ExtMode {
    if msg.extension_ranges.is_empty() {
        rt::ExtMode::None
    } else if msg.message_set_wire_format {
        rt::ExtMode::MsgSet
    } else {
        rt::ExtMode::Extendable
    }
}

/// Runtime tables for a whole descriptor pool. `MessageId(i)` lowers to
/// `LayoutId(i)`.
#[derive(Debug)]
pub struct RuntimeTables {
    pub layouts: rt::LayoutPool,
    ext_ids: HashMap<(MessageId, u32), rt::ExtId>,
}

impl RuntimeTables {
    pub fn build(pool: &Pool) -> RuntimeTables {
        let mut layouts = rt::LayoutPool::default();

        for (mi, msg) in pool.messages.iter().enumerate() {
            let id = MessageId(mi as u32);
            let layout = MessageLayout::new(pool, id);
            let submsgs = SubmsgArray::new(pool, id);

            let order = field_number_order(msg);
            let mut fields = Vec::with_capacity(order.len());
            let mut numbers = Vec::with_capacity(order.len());
            for &fi in &order {
                let field = &msg.fields[fi];
                numbers.push(field.number);
                fields.push(lower_field(
                    pool,
                    msg,
                    &layout,
                    field,
                    submsg_index(&submsgs, field),
                    layout.field_offset(field).size64,
                ));
            }

            layouts.add_msg(rt::MessageLayout {
                subs: submsgs.submsgs().map(|m| rt::LayoutId(m.0)).collect(),
                fields,
                size: layout.message_size().size64,
                ext: ext_mode_of(msg),
                dense_below: dense_below(&numbers),
            });
        }

        let mut ext_ids = HashMap::new();
        for fi in 0..pool.files.len() {
            for ext in pool.file_extensions(FileId(fi as u32)) {
                let field = rt::FieldLayout {
                    number: ext.number,
                    offset: 0,
                    presence: 0,
                    submsg_index: 0,
                    descriptor_type: descriptor_type_of(pool, &ext),
                    mode: mode_of(pool, &ext),
                };
                let id = layouts.add_ext(rt::ExtensionLayout {
                    field,
                    extendee: rt::LayoutId(ext.containing.0),
                    sub: ext.message_type.map(|m| rt::LayoutId(m.0)),
                });
                ext_ids.insert((ext.containing, ext.number), id);
            }
        }

        RuntimeTables { layouts, ext_ids }
    }

    pub fn layout_id(&self, id: MessageId) -> rt::LayoutId {
        rt::LayoutId(id.0)
    }

    pub fn ext_id(&self, extendee: MessageId, number: u32) -> Option<rt::ExtId> {
        self.ext_ids.get(&(extendee, number)).copied()
    }

    /// Field record lookup by number, for driving the runtime accessors.
    pub fn field(&self, id: MessageId, number: u32) -> Option<&rt::FieldLayout> {
        self.layouts
            .msg(rt::LayoutId(id.0))
            .fields
            .iter()
            .find(|f| f.number == number)
    }
}

fn submsg_index(submsgs: &SubmsgArray, field: &Field) -> u8 {
    if field.ctype() == CType::Message {
        let index = submsgs.index_of(field);
        debug_assert!(index <= u8::MAX as usize);
        index as u8
    } else {
        0
    }
}

fn lower_field(
    pool: &Pool,
    msg: &Message,
    layout: &MessageLayout,
    field: &Field,
    submsg_index: u8,
    offset: u32,
) -> rt::FieldLayout {
    rt::FieldLayout {
        number: field.number,
        offset,
        presence: presence_of(layout, msg, field),
        submsg_index,
        descriptor_type: descriptor_type_of(pool, field),
        mode: mode_of(pool, field),
    }
}
