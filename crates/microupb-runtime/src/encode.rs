//! One-pass reverse wire-format encoder.
//!
//! Bytes are written backwards, from the end of the buffer toward the
//! start. Submessages are therefore encoded before their length prefix,
//! and the length is simply the distance the cursor moved, with no size
//! pre-pass. Growing copies the used suffix to the end of the new buffer
//! and everything keeps working.

use crate::message::{Array, ExtValue, MapKey, Message, Slot, Value};
use crate::table::{
    DescriptorType, ExtMode, ExtensionLayout, FieldKind, FieldLayout, LayoutId, LayoutPool,
    MessageLayout, Rep,
};
use crate::wire::{self, WireType, MAX_VARINT_LEN};

/// Option bit: order map entries by key.
pub const DETERMINISTIC: u32 = 1;
/// Option bit: drop unknown fields instead of re-emitting them.
pub const SKIP_UNKNOWN: u32 = 2;

/// Depth used when options bits 16-31 are zero.
const DEFAULT_DEPTH: u32 = 64;

/// Maximum recursion depth carried in the options word.
pub fn max_depth(options: u32) -> u32 {
    match options >> 16 {
        0 => DEFAULT_DEPTH,
        depth => depth,
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("message nesting exceeds the depth limit")]
    MaxDepthExceeded,
    #[error("out of memory while growing the encode buffer")]
    OutOfMemory,
}

/// Encode `msg` against `layout` into canonical wire format.
///
/// An empty message yields an empty vector. `options` combines the
/// [`DETERMINISTIC`] and [`SKIP_UNKNOWN`] bits with the depth limit in
/// bits 16-31 (zero means 64).
pub fn encode(
    msg: &Message,
    pool: &LayoutPool,
    layout: LayoutId,
    options: u32,
) -> Result<Vec<u8>, EncodeError> {
    let mut e = Encoder {
        pool,
        buf: Vec::new(),
        start: 0,
        options,
        depth: max_depth(options),
    };
    e.put_message(msg, pool.msg(layout))?;
    let start = e.start;
    Ok(e.buf.split_off(start))
}

/// Borrowed scalar, decoupled from where the value lives (message cell,
/// array element, map key or value, extension cell).
enum Scalar<'a> {
    Bool(bool),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Bytes(&'a [u8]),
    Msg(&'a Message),
}

impl<'a> Scalar<'a> {
    fn from_value(v: &'a Value) -> Scalar<'a> {
        match v {
            Value::Bool(x) => Scalar::Bool(*x),
            Value::I32(x) => Scalar::I32(*x),
            Value::U32(x) => Scalar::U32(*x),
            Value::I64(x) => Scalar::I64(*x),
            Value::U64(x) => Scalar::U64(*x),
            Value::F32(x) => Scalar::F32(*x),
            Value::F64(x) => Scalar::F64(*x),
            Value::Str(x) => Scalar::Bytes(x),
            Value::Msg(x) => Scalar::Msg(x),
        }
    }

    fn from_key(k: &'a MapKey) -> Scalar<'a> {
        match k {
            MapKey::Bool(x) => Scalar::Bool(*x),
            MapKey::I32(x) => Scalar::I32(*x),
            MapKey::U32(x) => Scalar::U32(*x),
            MapKey::I64(x) => Scalar::I64(*x),
            MapKey::U64(x) => Scalar::U64(*x),
            MapKey::Str(x) => Scalar::Bytes(x),
        }
    }

    fn as_varint(&self) -> u64 {
        match self {
            Scalar::Bool(x) => *x as u64,
            Scalar::I32(x) => *x as i64 as u64,
            Scalar::U32(x) => *x as u64,
            Scalar::I64(x) => *x as u64,
            Scalar::U64(x) => *x,
            _ => unreachable!("not a varint scalar"),
        }
    }

    fn as_fixed32(&self) -> u32 {
        match self {
            Scalar::I32(x) => *x as u32,
            Scalar::U32(x) => *x,
            Scalar::F32(x) => x.to_bits(),
            _ => unreachable!("not a 32-bit scalar"),
        }
    }

    fn as_fixed64(&self) -> u64 {
        match self {
            Scalar::I64(x) => *x as u64,
            Scalar::U64(x) => *x,
            Scalar::F64(x) => x.to_bits(),
            _ => unreachable!("not a 64-bit scalar"),
        }
    }

    fn as_zigzag(&self, ty: DescriptorType) -> u64 {
        match (ty, self) {
            (DescriptorType::Sint32, Scalar::I32(x)) => wire::zigzag32(*x) as u64,
            (DescriptorType::Sint64, Scalar::I64(x)) => wire::zigzag64(*x),
            _ => unreachable!("not a zigzag scalar"),
        }
    }
}

struct Encoder<'a> {
    pool: &'a LayoutPool,
    buf: Vec<u8>,
    /// Cursor; the valid output is `buf[start..]`.
    start: usize,
    options: u32,
    depth: u32,
}

impl Encoder<'_> {
    fn len(&self) -> usize {
        self.buf.len() - self.start
    }

    /// Make `n` bytes available below the cursor and move it down.
    fn reserve(&mut self, n: usize) -> Result<(), EncodeError> {
        if self.start < n {
            self.grow(n)?;
        }
        self.start -= n;
        Ok(())
    }

    #[cold]
    fn grow(&mut self, n: usize) -> Result<(), EncodeError> {
        let used = self.len();
        let mut new_size = 128;
        while new_size < n + used {
            new_size *= 2;
        }
        let mut new_buf: Vec<u8> = Vec::new();
        new_buf
            .try_reserve_exact(new_size)
            .map_err(|_| EncodeError::OutOfMemory)?;
        new_buf.resize(new_size, 0);
        // Previous output keeps its position relative to the end.
        new_buf[new_size - used..].copy_from_slice(&self.buf[self.start..]);
        self.buf = new_buf;
        self.start = new_size - used;
        Ok(())
    }

    fn put_bytes(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        if data.is_empty() {
            return Ok(());
        }
        self.reserve(data.len())?;
        self.buf[self.start..self.start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn put_varint(&mut self, val: u64) -> Result<(), EncodeError> {
        if val < 128 && self.start > 0 {
            self.start -= 1;
            self.buf[self.start] = val as u8;
            Ok(())
        } else {
            let mut scratch = [0u8; MAX_VARINT_LEN];
            let n = wire::encode_varint(val, &mut scratch);
            self.put_bytes(&scratch[..n])
        }
    }

    fn put_fixed32(&mut self, val: u32) -> Result<(), EncodeError> {
        self.put_bytes(&val.to_le_bytes())
    }

    fn put_fixed64(&mut self, val: u64) -> Result<(), EncodeError> {
        self.put_bytes(&val.to_le_bytes())
    }

    fn put_tag(&mut self, number: u32, wire_type: WireType) -> Result<(), EncodeError> {
        self.put_varint(wire::make_tag(number, wire_type) as u64)
    }

    fn enter(&mut self) -> Result<(), EncodeError> {
        self.depth -= 1;
        if self.depth == 0 {
            return Err(EncodeError::MaxDepthExceeded);
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth += 1;
    }

    /// Write one message body and return its encoded size.
    fn put_message(
        &mut self,
        msg: &Message,
        layout: &MessageLayout,
    ) -> Result<usize, EncodeError> {
        let pre_len = self.len();

        // Unknown bytes go out first, which puts them last on the wire.
        if self.options & SKIP_UNKNOWN == 0 && !msg.unknown.is_empty() {
            self.put_bytes(&msg.unknown)?;
        }

        if layout.ext != ExtMode::None {
            // Extensions are not interleaved with regular fields in number
            // order; they encode together in set order.
            for ext in &msg.exts {
                let ext_layout = self.pool.ext(ext.ext);
                if layout.ext == ExtMode::MsgSet {
                    self.put_msgset_item(&ext.value, ext_layout)?;
                } else {
                    self.put_ext_field(&ext.value, ext_layout)?;
                }
            }
        }

        // Fields iterate last-to-first so the wire reads first-to-last.
        for f in layout.fields.iter().rev() {
            if self.should_encode(msg, f) {
                self.put_field(msg, &layout.subs, f)?;
            }
        }

        Ok(self.len() - pre_len)
    }

    fn should_encode(&self, msg: &Message, f: &FieldLayout) -> bool {
        if f.presence == 0 {
            match f.rep() {
                Rep::OneByte => msg.data[f.offset as usize] != 0,
                Rep::FourByte => msg.read_u32(f.offset) != 0,
                Rep::EightByte => msg.read_u64(f.offset) != 0,
                Rep::StrView => msg.read_u64(f.offset + 8) != 0,
            }
        } else if f.presence > 0 {
            msg.hasbit(f.presence as u32)
        } else {
            msg.oneof_case(f.case_offset()) == f.number
        }
    }

    fn put_field(
        &mut self,
        msg: &Message,
        subs: &[LayoutId],
        f: &FieldLayout,
    ) -> Result<(), EncodeError> {
        match f.kind() {
            FieldKind::Scalar => match self.scalar_from_cell(msg, f) {
                Some(v) => self.put_scalar(v, subs, f),
                None => Ok(()),
            },
            FieldKind::Array => match msg.slot_at(f.offset) {
                Some(Slot::Array(arr)) => self.put_array(arr, subs, f),
                _ => Ok(()),
            },
            FieldKind::Map => self.put_map(msg, subs, f),
        }
    }

    fn scalar_from_cell<'m>(&self, msg: &'m Message, f: &FieldLayout) -> Option<Scalar<'m>> {
        use DescriptorType as T;
        Some(match f.descriptor_type {
            T::Bool => Scalar::Bool(msg.data[f.offset as usize] != 0),
            T::Int32 | T::Sint32 | T::Sfixed32 | T::Enum => {
                Scalar::I32(msg.read_u32(f.offset) as i32)
            }
            T::Uint32 | T::Fixed32 => Scalar::U32(msg.read_u32(f.offset)),
            T::Float => Scalar::F32(f32::from_bits(msg.read_u32(f.offset))),
            T::Int64 | T::Sint64 | T::Sfixed64 => Scalar::I64(msg.read_u64(f.offset) as i64),
            T::Uint64 | T::Fixed64 => Scalar::U64(msg.read_u64(f.offset)),
            T::Double => Scalar::F64(f64::from_bits(msg.read_u64(f.offset))),
            T::String | T::Bytes => match msg.slot_at(f.offset) {
                Some(Slot::Str(b)) => Scalar::Bytes(b),
                _ => Scalar::Bytes(&[]),
            },
            T::Group | T::Message => match msg.slot_at(f.offset) {
                Some(Slot::Msg(m)) => Scalar::Msg(m),
                _ => return None,
            },
        })
    }

    /// Write one scalar payload followed by its tag.
    fn put_scalar(
        &mut self,
        value: Scalar<'_>,
        subs: &[LayoutId],
        f: &FieldLayout,
    ) -> Result<(), EncodeError> {
        use DescriptorType as T;
        let wire_type = match f.descriptor_type {
            T::Double => {
                self.put_fixed64(value.as_fixed64())?;
                WireType::Fixed64
            }
            T::Float => {
                self.put_fixed32(value.as_fixed32())?;
                WireType::Fixed32
            }
            T::Int64 | T::Uint64 | T::Int32 | T::Uint32 | T::Enum | T::Bool => {
                self.put_varint(value.as_varint())?;
                WireType::Varint
            }
            T::Fixed64 | T::Sfixed64 => {
                self.put_fixed64(value.as_fixed64())?;
                WireType::Fixed64
            }
            T::Fixed32 | T::Sfixed32 => {
                self.put_fixed32(value.as_fixed32())?;
                WireType::Fixed32
            }
            T::Sint32 | T::Sint64 => {
                self.put_varint(value.as_zigzag(f.descriptor_type))?;
                WireType::Varint
            }
            T::String | T::Bytes => {
                let Scalar::Bytes(bytes) = value else {
                    unreachable!("string field without bytes value");
                };
                self.put_bytes(bytes)?;
                self.put_varint(bytes.len() as u64)?;
                WireType::Delimited
            }
            T::Group => {
                let Scalar::Msg(sub) = value else {
                    unreachable!("group field without message value");
                };
                let sub_layout = self.pool.msg(subs[f.submsg_index as usize]);
                self.enter()?;
                self.put_tag(f.number, WireType::EndGroup)?;
                self.put_message(sub, sub_layout)?;
                self.leave();
                WireType::StartGroup
            }
            T::Message => {
                let Scalar::Msg(sub) = value else {
                    unreachable!("message field without message value");
                };
                let sub_layout = self.pool.msg(subs[f.submsg_index as usize]);
                self.enter()?;
                let size = self.put_message(sub, sub_layout)?;
                self.put_varint(size as u64)?;
                self.leave();
                WireType::Delimited
            }
        };
        self.put_tag(f.number, wire_type)
    }

    /// Write a repeated field: elements in reverse, then for packed fields
    /// a single length and tag.
    fn put_array(
        &mut self,
        arr: &Array,
        subs: &[LayoutId],
        f: &FieldLayout,
    ) -> Result<(), EncodeError> {
        use DescriptorType as T;
        if arr.is_empty() {
            return Ok(());
        }
        let packed = f.is_packed();
        let pre_len = self.len();

        match f.descriptor_type {
            T::Double | T::Fixed64 | T::Sfixed64 => {
                for v in arr.iter().rev() {
                    self.put_fixed64(Scalar::from_value(v).as_fixed64())?;
                    if !packed {
                        self.put_tag(f.number, WireType::Fixed64)?;
                    }
                }
            }
            T::Float | T::Fixed32 | T::Sfixed32 => {
                for v in arr.iter().rev() {
                    self.put_fixed32(Scalar::from_value(v).as_fixed32())?;
                    if !packed {
                        self.put_tag(f.number, WireType::Fixed32)?;
                    }
                }
            }
            T::Int64 | T::Uint64 | T::Int32 | T::Uint32 | T::Enum | T::Bool => {
                for v in arr.iter().rev() {
                    self.put_varint(Scalar::from_value(v).as_varint())?;
                    if !packed {
                        self.put_tag(f.number, WireType::Varint)?;
                    }
                }
            }
            T::Sint32 | T::Sint64 => {
                for v in arr.iter().rev() {
                    self.put_varint(Scalar::from_value(v).as_zigzag(f.descriptor_type))?;
                    if !packed {
                        self.put_tag(f.number, WireType::Varint)?;
                    }
                }
            }
            T::String | T::Bytes => {
                for v in arr.iter().rev() {
                    let Value::Str(bytes) = v else {
                        unreachable!("string array without bytes elements");
                    };
                    self.put_bytes(bytes)?;
                    self.put_varint(bytes.len() as u64)?;
                    self.put_tag(f.number, WireType::Delimited)?;
                }
                return Ok(());
            }
            T::Group => {
                let sub_layout = self.pool.msg(subs[f.submsg_index as usize]);
                self.enter()?;
                for v in arr.iter().rev() {
                    let Value::Msg(sub) = v else {
                        unreachable!("group array without message elements");
                    };
                    self.put_tag(f.number, WireType::EndGroup)?;
                    self.put_message(sub, sub_layout)?;
                    self.put_tag(f.number, WireType::StartGroup)?;
                }
                self.leave();
                return Ok(());
            }
            T::Message => {
                let sub_layout = self.pool.msg(subs[f.submsg_index as usize]);
                self.enter()?;
                for v in arr.iter().rev() {
                    let Value::Msg(sub) = v else {
                        unreachable!("message array without message elements");
                    };
                    let size = self.put_message(sub, sub_layout)?;
                    self.put_varint(size as u64)?;
                    self.put_tag(f.number, WireType::Delimited)?;
                }
                self.leave();
                return Ok(());
            }
        }

        if packed {
            let payload = self.len() - pre_len;
            self.put_varint(payload as u64)?;
            self.put_tag(f.number, WireType::Delimited)?;
        }
        Ok(())
    }

    fn put_map(
        &mut self,
        msg: &Message,
        subs: &[LayoutId],
        f: &FieldLayout,
    ) -> Result<(), EncodeError> {
        let Some(Slot::Map(map)) = msg.slot_at(f.offset) else {
            return Ok(());
        };
        let entry_layout = self.pool.msg(subs[f.submsg_index as usize]);
        debug_assert_eq!(entry_layout.fields.len(), 2);

        if self.options & DETERMINISTIC != 0 {
            // Writing backwards, so descending key order reads ascending on
            // the wire.
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| b.0.cmp(a.0));
            for (key, value) in entries {
                self.put_map_entry(f.number, entry_layout, key, value)?;
            }
        } else {
            for (key, value) in map.iter().rev() {
                self.put_map_entry(f.number, entry_layout, key, value)?;
            }
        }
        Ok(())
    }

    /// One map entry is a two-field submessage: value then key backwards,
    /// so key then value on the wire.
    fn put_map_entry(
        &mut self,
        number: u32,
        entry_layout: &MessageLayout,
        key: &MapKey,
        value: &Value,
    ) -> Result<(), EncodeError> {
        let pre_len = self.len();
        self.put_scalar(
            Scalar::from_value(value),
            &entry_layout.subs,
            &entry_layout.fields[1],
        )?;
        self.put_scalar(
            Scalar::from_key(key),
            &entry_layout.subs,
            &entry_layout.fields[0],
        )?;
        let size = self.len() - pre_len;
        self.put_varint(size as u64)?;
        self.put_tag(number, WireType::Delimited)
    }

    fn put_ext_field(
        &mut self,
        value: &ExtValue,
        ext: &ExtensionLayout,
    ) -> Result<(), EncodeError> {
        let subs = ext.sub.as_slice();
        match value {
            ExtValue::Scalar(v) => self.put_scalar(Scalar::from_value(v), subs, &ext.field),
            ExtValue::Array(arr) => self.put_array(arr, subs, &ext.field),
        }
    }

    /// MessageSet item, written in reverse:
    /// end-group(1), message(3), type_id(2), start-group(1).
    fn put_msgset_item(
        &mut self,
        value: &ExtValue,
        ext: &ExtensionLayout,
    ) -> Result<(), EncodeError> {
        let (ExtValue::Scalar(Value::Msg(sub)), Some(sub_id)) = (value, ext.sub) else {
            return Ok(());
        };
        let sub_layout = self.pool.msg(sub_id);
        self.put_tag(1, WireType::EndGroup)?;
        let size = self.put_message(sub, sub_layout)?;
        self.put_varint(size as u64)?;
        self.put_tag(3, WireType::Delimited)?;
        self.put_varint(ext.field.number as u64)?;
        self.put_tag(2, WireType::Varint)?;
        self.put_tag(1, WireType::StartGroup)
    }
}
