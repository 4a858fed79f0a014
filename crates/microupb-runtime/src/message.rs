//! Dynamic message representation.
//!
//! A [`Message`] is a byte image of the 64-bit struct layout (hasbit block,
//! oneof case slots, field cells) plus a slot table for heap values. A
//! pointer-rep cell stores `slot index + 1` as a little-endian u64, so zero
//! always means "unset". A string-view cell is sixteen bytes: the slot
//! handle followed by the byte length.

use indexmap::IndexMap;

use crate::table::{ExtId, FieldLayout, MessageLayout, Rep};

/// A single scalar or heap value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(Vec<u8>),
    Msg(Message),
}

/// A map key. Keys within one map are homogeneous; the derived order is the
/// deterministic-encoding order for that key type (numeric for integers and
/// bool, lexicographic bytes for strings).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapKey {
    Bool(bool),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    Str(Vec<u8>),
}

impl MapKey {
    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(v) => Value::Bool(*v),
            MapKey::I32(v) => Value::I32(*v),
            MapKey::U32(v) => Value::U32(*v),
            MapKey::I64(v) => Value::I64(*v),
            MapKey::U64(v) => Value::U64(*v),
            MapKey::Str(v) => Value::Str(v.clone()),
        }
    }
}

/// Element storage of a repeated field.
pub type Array = Vec<Value>;

/// Storage of a map field, in insertion order.
pub type Map = IndexMap<MapKey, Value>;

/// A heap value referenced from a message cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Slot {
    Str(Vec<u8>),
    Array(Array),
    Map(Map),
    Msg(Message),
}

/// An extension value attached to a message instance.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageExt {
    pub ext: ExtId,
    pub value: ExtValue,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExtValue {
    Scalar(Value),
    Array(Array),
}

/// A message instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub(crate) data: Box<[u8]>,
    pub(crate) slots: Vec<Slot>,
    /// Verbatim unknown-field bytes, re-emitted on encode.
    pub unknown: Vec<u8>,
    /// Extensions in set order.
    pub exts: Vec<MessageExt>,
}

impl Message {
    pub fn new(layout: &MessageLayout) -> Self {
        Message {
            data: vec![0; layout.size as usize].into_boxed_slice(),
            slots: Vec::new(),
            unknown: Vec::new(),
            exts: Vec::new(),
        }
    }

    // Cell primitives.

    fn cell(&self, offset: u32, len: usize) -> &[u8] {
        &self.data[offset as usize..offset as usize + len]
    }

    fn cell_mut(&mut self, offset: u32, len: usize) -> &mut [u8] {
        &mut self.data[offset as usize..offset as usize + len]
    }

    pub(crate) fn read_u32(&self, offset: u32) -> u32 {
        u32::from_le_bytes(self.cell(offset, 4).try_into().unwrap())
    }

    pub(crate) fn read_u64(&self, offset: u32) -> u64 {
        u64::from_le_bytes(self.cell(offset, 8).try_into().unwrap())
    }

    fn write_u64(&mut self, offset: u32, val: u64) {
        self.cell_mut(offset, 8).copy_from_slice(&val.to_le_bytes());
    }

    // Hasbits and oneof cases.

    pub fn hasbit(&self, index: u32) -> bool {
        debug_assert!(index != 0, "hasbit index 0 is reserved");
        self.data[index as usize / 8] >> (index % 8) & 1 != 0
    }

    fn set_hasbit(&mut self, index: u32) {
        self.data[index as usize / 8] |= 1 << (index % 8);
    }

    fn clear_hasbit(&mut self, index: u32) {
        self.data[index as usize / 8] &= !(1 << (index % 8));
    }

    pub fn oneof_case(&self, case_offset: u32) -> u32 {
        self.read_u32(case_offset)
    }

    fn set_oneof_case(&mut self, case_offset: u32, number: u32) {
        self.cell_mut(case_offset, 4)
            .copy_from_slice(&number.to_le_bytes());
    }

    // Presence.

    /// Whether the field is set: hasbit, oneof case match, or (for fields
    /// with no presence discipline) a non-default cell.
    pub fn has(&self, f: &FieldLayout) -> bool {
        if f.presence > 0 {
            self.hasbit(f.presence as u32)
        } else if f.presence < 0 {
            self.oneof_case(f.case_offset()) == f.number
        } else {
            match f.rep() {
                Rep::OneByte => self.data[f.offset as usize] != 0,
                Rep::FourByte => self.read_u32(f.offset) != 0,
                Rep::EightByte => self.read_u64(f.offset) != 0,
                Rep::StrView => self.read_u64(f.offset + 8) != 0,
            }
        }
    }

    /// Unset the field: drop the presence mark and zero the cell.
    ///
    /// Clearing a oneof member that is not the active member is a no-op, so
    /// the active member's data survives.
    pub fn clear(&mut self, f: &FieldLayout) {
        if f.presence > 0 {
            self.clear_hasbit(f.presence as u32);
        } else if f.presence < 0 {
            if self.oneof_case(f.case_offset()) != f.number {
                return;
            }
            self.set_oneof_case(f.case_offset(), 0);
        }
        let len = f.rep().cell_len();
        self.cell_mut(f.offset, len).fill(0);
    }

    fn mark_present(&mut self, f: &FieldLayout) {
        if f.presence > 0 {
            self.set_hasbit(f.presence as u32);
        } else if f.presence < 0 {
            self.set_oneof_case(f.case_offset(), f.number);
        }
    }

    // Scalar accessors.

    /// Store a scalar value, applying the presence side effect.
    ///
    /// # Panics
    /// Panics if the value does not match the field's representation.
    pub fn set(&mut self, f: &FieldLayout, value: Value) {
        self.reset_stale_oneof_cell(f);
        match (f.rep(), value) {
            (Rep::OneByte, Value::Bool(v)) => self.data[f.offset as usize] = v as u8,
            (Rep::FourByte, Value::I32(v)) => self
                .cell_mut(f.offset, 4)
                .copy_from_slice(&v.to_le_bytes()),
            (Rep::FourByte, Value::U32(v)) => self
                .cell_mut(f.offset, 4)
                .copy_from_slice(&v.to_le_bytes()),
            (Rep::FourByte, Value::F32(v)) => self
                .cell_mut(f.offset, 4)
                .copy_from_slice(&v.to_le_bytes()),
            (Rep::EightByte, Value::I64(v)) => self
                .cell_mut(f.offset, 8)
                .copy_from_slice(&v.to_le_bytes()),
            (Rep::EightByte, Value::U64(v)) => self
                .cell_mut(f.offset, 8)
                .copy_from_slice(&v.to_le_bytes()),
            (Rep::EightByte, Value::F64(v)) => self
                .cell_mut(f.offset, 8)
                .copy_from_slice(&v.to_le_bytes()),
            (Rep::EightByte, Value::Msg(m)) => {
                self.store_slot(f.offset, Slot::Msg(m));
            }
            (Rep::StrView, Value::Str(bytes)) => {
                let len = bytes.len() as u64;
                self.store_slot(f.offset, Slot::Str(bytes));
                self.write_u64(f.offset + 8, len);
            }
            (rep, value) => panic!("value {value:?} does not match representation {rep:?}"),
        }
        self.mark_present(f);
    }

    /// Read the scalar cell back as a [`Value`].
    pub fn get(&self, f: &FieldLayout) -> Value {
        use crate::table::DescriptorType as T;
        match f.descriptor_type {
            T::Bool => Value::Bool(self.data[f.offset as usize] != 0),
            T::Int32 | T::Sint32 | T::Sfixed32 | T::Enum => {
                Value::I32(self.read_u32(f.offset) as i32)
            }
            T::Uint32 | T::Fixed32 => Value::U32(self.read_u32(f.offset)),
            T::Float => Value::F32(f32::from_le_bytes(
                self.cell(f.offset, 4).try_into().unwrap(),
            )),
            T::Int64 | T::Sint64 | T::Sfixed64 => Value::I64(self.read_u64(f.offset) as i64),
            T::Uint64 | T::Fixed64 => Value::U64(self.read_u64(f.offset)),
            T::Double => Value::F64(f64::from_le_bytes(
                self.cell(f.offset, 8).try_into().unwrap(),
            )),
            T::String | T::Bytes => {
                Value::Str(self.str_bytes(f).unwrap_or_default().to_vec())
            }
            T::Group | T::Message => match self.submsg(f) {
                Some(m) => Value::Msg(m.clone()),
                None => Value::Msg(Message::empty()),
            },
        }
    }

    fn empty() -> Message {
        Message {
            data: Box::default(),
            slots: Vec::new(),
            unknown: Vec::new(),
            exts: Vec::new(),
        }
    }

    pub fn set_str(&mut self, f: &FieldLayout, bytes: &[u8]) {
        self.set(f, Value::Str(bytes.to_vec()));
    }

    pub fn str_bytes(&self, f: &FieldLayout) -> Option<&[u8]> {
        if self.oneof_member_inactive(f) {
            return None;
        }
        match self.slot_at(f.offset)? {
            Slot::Str(b) => Some(b),
            _ => None,
        }
    }

    pub fn set_submsg(&mut self, f: &FieldLayout, msg: Message) {
        self.reset_stale_oneof_cell(f);
        self.store_slot(f.offset, Slot::Msg(msg));
        self.mark_present(f);
    }

    pub fn submsg(&self, f: &FieldLayout) -> Option<&Message> {
        if self.oneof_member_inactive(f) {
            return None;
        }
        match self.slot_at(f.offset)? {
            Slot::Msg(m) => Some(m),
            _ => None,
        }
    }

    pub fn submsg_mut(&mut self, f: &FieldLayout) -> Option<&mut Message> {
        if self.oneof_member_inactive(f) {
            return None;
        }
        let idx = self.slot_handle(f.offset)?;
        match &mut self.slots[idx] {
            Slot::Msg(m) => Some(m),
            _ => None,
        }
    }

    // Repeated and map accessors.

    pub fn array(&self, f: &FieldLayout) -> Option<&Array> {
        match self.slot_at(f.offset)? {
            Slot::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Mutable element storage, allocated on first use.
    pub fn array_mut(&mut self, f: &FieldLayout) -> &mut Array {
        let idx = match self.slot_handle(f.offset) {
            Some(idx) => idx,
            None => self.alloc_slot(f.offset, Slot::Array(Vec::new())),
        };
        match &mut self.slots[idx] {
            Slot::Array(a) => a,
            _ => panic!("cell does not hold an array"),
        }
    }

    pub fn map(&self, f: &FieldLayout) -> Option<&Map> {
        match self.slot_at(f.offset)? {
            Slot::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Mutable map storage, allocated on first use.
    pub fn map_mut(&mut self, f: &FieldLayout) -> &mut Map {
        let idx = match self.slot_handle(f.offset) {
            Some(idx) => idx,
            None => self.alloc_slot(f.offset, Slot::Map(Map::default())),
        };
        match &mut self.slots[idx] {
            Slot::Map(m) => m,
            _ => panic!("cell does not hold a map"),
        }
    }

    // Unknown fields and extensions.

    pub fn add_unknown(&mut self, bytes: &[u8]) {
        self.unknown.extend_from_slice(bytes);
    }

    /// Set an extension value, replacing an existing entry for the same id.
    pub fn set_ext(&mut self, ext: ExtId, value: ExtValue) {
        if let Some(entry) = self.exts.iter_mut().find(|e| e.ext == ext) {
            entry.value = value;
        } else {
            self.exts.push(MessageExt { ext, value });
        }
    }

    // Slot plumbing.

    /// Oneof members share one data cell, so a cell written through another
    /// member's layout may hold stale bytes. Zero it before reuse.
    fn reset_stale_oneof_cell(&mut self, f: &FieldLayout) {
        if self.oneof_member_inactive(f) {
            let len = f.rep().cell_len();
            self.cell_mut(f.offset, len).fill(0);
        }
    }

    fn oneof_member_inactive(&self, f: &FieldLayout) -> bool {
        f.presence < 0 && self.oneof_case(f.case_offset()) != f.number
    }

    pub(crate) fn slot_handle(&self, offset: u32) -> Option<usize> {
        let handle = self.read_u64(offset) as usize;
        if handle == 0 || handle > self.slots.len() {
            None
        } else {
            Some(handle - 1)
        }
    }

    pub(crate) fn slot_at(&self, offset: u32) -> Option<&Slot> {
        self.slot_handle(offset).map(|idx| &self.slots[idx])
    }

    fn alloc_slot(&mut self, offset: u32, slot: Slot) -> usize {
        let idx = self.slots.len();
        self.slots.push(slot);
        self.write_u64(offset, idx as u64 + 1);
        idx
    }

    /// Write `slot` into the cell at `offset`, reusing an existing slot.
    fn store_slot(&mut self, offset: u32, slot: Slot) {
        match self.slot_handle(offset) {
            Some(idx) => self.slots[idx] = slot,
            None => {
                self.alloc_slot(offset, slot);
            }
        }
    }
}
