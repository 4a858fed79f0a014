//! Binary layout computation.
//!
//! Assigns every field an offset for both the 32-bit and the 64-bit struct
//! layout, allocates hasbit indices and oneof case slots, and computes the
//! total message size. The struct image is, in order: hasbit block, oneof
//! case slots, then data cells sorted by descending size to minimize
//! padding. All members of a oneof share one data cell sized to the widest
//! member.

use std::collections::HashMap;

use microupb_core::{CType, Field, Message, MessageId, Pool};

use crate::names::field_number_order;

/// A size or offset on both target widths. Invariant: `size64 >= size32`
/// for sizes produced by the layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Size {
    pub size32: u32,
    pub size64: u32,
}

impl Size {
    pub fn new(size32: u32, size64: u32) -> Size {
        Size { size32, size64 }
    }
}

/// Computed layout of one message.
#[derive(Debug)]
pub struct MessageLayout {
    /// Field number -> data cell offset.
    field_offsets: HashMap<u32, Size>,
    /// Field number -> hasbit index (1-based; 0 is reserved).
    hasbit_indices: HashMap<u32, u32>,
    /// Oneof index -> case slot offset (None for synthetic oneofs).
    oneof_case_offsets: Vec<Option<Size>>,
    size: Size,
}

impl MessageLayout {
    pub fn new(pool: &Pool, id: MessageId) -> MessageLayout {
        let msg = pool.message(id);
        let order = field_number_order(msg);

        // 1. Hasbits, allocated in field-number order from index 1.
        let mut hasbit_indices = HashMap::new();
        let mut hasbit_count = 0u32;
        for &fi in &order {
            let field = &msg.fields[fi];
            if Self::has_hasbit(pool, msg, field) {
                hasbit_count += 1;
                hasbit_indices.insert(field.number, hasbit_count);
            }
        }
        let mut size = Size::default();
        if hasbit_count > 0 {
            // One reserved bit plus the allocated ones, rounded to 4 bytes.
            let bytes = align_up((hasbit_count + 1).div_ceil(8), 4);
            size = Size::new(bytes, bytes);
        }

        // 2. One 4-byte case slot per declared oneof.
        let mut oneof_case_offsets = vec![None; msg.oneofs.len()];
        for (oi, oneof) in msg.oneofs.iter().enumerate() {
            if oneof.synthetic {
                continue;
            }
            oneof_case_offsets[oi] = Some(place(&mut size, Size::new(4, 4), Size::new(4, 4)));
        }

        // 3. Placement units: plain fields plus one data cell per oneof,
        // stably sorted by descending 64-bit size.
        enum Unit {
            Field(usize),
            Oneof(usize),
        }
        let mut units: Vec<(Unit, Size, Size)> = Vec::new();
        for &fi in &order {
            let field = &msg.fields[fi];
            if field.real_oneof(msg).is_some() {
                continue;
            }
            let (sz, align) = storage_class(pool, field);
            units.push((Unit::Field(fi), sz, align));
        }
        for (oi, oneof) in msg.oneofs.iter().enumerate() {
            if oneof.synthetic {
                continue;
            }
            let mut sz = Size::default();
            let mut align = Size::new(1, 1);
            for field in msg.fields.iter().filter(|f| f.oneof == Some(oi)) {
                let (fsz, falign) = storage_class(pool, field);
                sz.size32 = sz.size32.max(fsz.size32);
                sz.size64 = sz.size64.max(fsz.size64);
                align.size32 = align.size32.max(falign.size32);
                align.size64 = align.size64.max(falign.size64);
            }
            units.push((Unit::Oneof(oi), sz, align));
        }
        units.sort_by_key(|(_, sz, _)| std::cmp::Reverse(sz.size64));

        let mut field_offsets = HashMap::new();
        for (unit, sz, align) in units {
            let offset = place(&mut size, sz, align);
            match unit {
                Unit::Field(fi) => {
                    field_offsets.insert(msg.fields[fi].number, offset);
                }
                Unit::Oneof(oi) => {
                    // Every member reports the shared cell.
                    for field in msg.fields.iter().filter(|f| f.oneof == Some(oi)) {
                        field_offsets.insert(field.number, offset);
                    }
                }
            }
        }

        // 4. Round the totals to the struct alignment of each target.
        size.size32 = align_up(size.size32, 4);
        size.size64 = align_up(size.size64, 8);

        MessageLayout {
            field_offsets,
            hasbit_indices,
            oneof_case_offsets,
            size,
        }
    }

    /// Whether a field gets a hasbit: presence-carrying fields outside
    /// oneofs and extensions, in non-map-entry messages.
    pub fn has_hasbit(pool: &Pool, msg: &Message, field: &Field) -> bool {
        field.has_presence(pool.syntax(field))
            && field.real_oneof(msg).is_none()
            && !field.is_extension
            && !msg.map_entry
    }

    pub fn field_offset(&self, field: &Field) -> Size {
        self.field_offsets[&field.number]
    }

    pub fn hasbit_index(&self, field: &Field) -> Option<u32> {
        self.hasbit_indices.get(&field.number).copied()
    }

    pub fn oneof_case_offset(&self, oneof_index: usize) -> Size {
        self.oneof_case_offsets[oneof_index].expect("synthetic oneofs have no case slot")
    }

    pub fn message_size(&self) -> Size {
        self.size
    }
}

/// Size and alignment of a field's data cell on both targets.
fn storage_class(pool: &Pool, field: &Field) -> (Size, Size) {
    let ptr = (Size::new(4, 8), Size::new(4, 8));
    if field.is_repeated() || field.is_map(pool) {
        return ptr;
    }
    match field.ctype() {
        CType::Bool => (Size::new(1, 1), Size::new(1, 1)),
        CType::Float | CType::Int32 | CType::UInt32 | CType::Enum => {
            (Size::new(4, 4), Size::new(4, 4))
        }
        CType::Double | CType::Int64 | CType::UInt64 => (Size::new(8, 8), Size::new(8, 8)),
        CType::String => (Size::new(8, 16), Size::new(4, 8)),
        CType::Message => ptr,
    }
}

/// Align both cursors and advance them, returning the placed offset.
fn place(size: &mut Size, sz: Size, align: Size) -> Size {
    size.size32 = align_up(size.size32, align.size32);
    size.size64 = align_up(size.size64, align.size64);
    let offset = *size;
    size.size32 += sz.size32;
    size.size64 += sz.size64;
    offset
}

fn align_up(value: u32, align: u32) -> u32 {
    (value + align - 1) & !(align - 1)
}
