//! Runtime layout tables.
//!
//! These records are the in-memory form of what the generator emits as C
//! source: one [`FieldLayout`] per field, one [`MessageLayout`] per message,
//! one [`ExtensionLayout`] per extension. Cross-references are ids into a
//! [`LayoutPool`] rather than pointers, so recursive schemas need no special
//! handling.

use crate::wire::WireType;

/// Index of a message layout in a [`LayoutPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayoutId(pub u32);

/// Index of an extension layout in a [`LayoutPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtId(pub u32);

/// Declared field type, numbered as in descriptor.proto.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DescriptorType {
    Double = 1,
    Float = 2,
    Int64 = 3,
    Uint64 = 4,
    Int32 = 5,
    Fixed64 = 6,
    Fixed32 = 7,
    Bool = 8,
    String = 9,
    Group = 10,
    Message = 11,
    Bytes = 12,
    Uint32 = 13,
    Enum = 14,
    Sfixed32 = 15,
    Sfixed64 = 16,
    Sint32 = 17,
    Sint64 = 18,
}

impl DescriptorType {
    /// The wire type a singular (or unpacked element) value uses.
    pub fn wire_type(self) -> WireType {
        match self {
            DescriptorType::Double | DescriptorType::Fixed64 | DescriptorType::Sfixed64 => {
                WireType::Fixed64
            }
            DescriptorType::Float | DescriptorType::Fixed32 | DescriptorType::Sfixed32 => {
                WireType::Fixed32
            }
            DescriptorType::String | DescriptorType::Bytes | DescriptorType::Message => {
                WireType::Delimited
            }
            DescriptorType::Group => WireType::StartGroup,
            _ => WireType::Varint,
        }
    }
}

/// Storage class of a field, carried in the high mode bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Rep {
    OneByte = 0,
    FourByte = 1,
    EightByte = 2,
    StrView = 3,
}

impl Rep {
    /// Cell width in the 64-bit message image.
    pub fn cell_len(self) -> usize {
        match self {
            Rep::OneByte => 1,
            Rep::FourByte => 4,
            Rep::EightByte => 8,
            Rep::StrView => 16,
        }
    }
}

/// Scalar / array / map selector, in the low mode bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FieldKind {
    Scalar = 0,
    Array = 1,
    Map = 2,
}

/// Mode bit layout: bits 0-2 kind, bit 3 packed, bit 4 extension,
/// bits 6-7 representation tag.
pub mod mode {
    pub const KIND_MASK: u8 = 0x07;
    pub const IS_PACKED: u8 = 1 << 3;
    pub const IS_EXTENSION: u8 = 1 << 4;
    pub const REP_SHIFT: u32 = 6;
}

/// Pack the mode byte from its parts.
pub fn make_mode(kind: FieldKind, rep: Rep) -> u8 {
    kind as u8 | (rep as u8) << mode::REP_SHIFT
}

/// One field record.
///
/// `presence` is 0 for fields with no presence (proto3 defaults, repeated
/// fields, maps), a positive hasbit index, or the bitwise NOT of the oneof
/// case offset. Index 0 is never a valid hasbit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct FieldLayout {
    pub number: u32,
    pub offset: u32,
    pub presence: i32,
    pub submsg_index: u8,
    pub descriptor_type: DescriptorType,
    pub mode: u8,
}

const _: () = assert!(std::mem::size_of::<FieldLayout>() == 16);

impl FieldLayout {
    pub fn kind(&self) -> FieldKind {
        match self.mode & mode::KIND_MASK {
            0 => FieldKind::Scalar,
            1 => FieldKind::Array,
            2 => FieldKind::Map,
            other => panic!("invalid field kind bits: {other}"),
        }
    }

    pub fn rep(&self) -> Rep {
        match self.mode >> mode::REP_SHIFT {
            0 => Rep::OneByte,
            1 => Rep::FourByte,
            2 => Rep::EightByte,
            _ => Rep::StrView,
        }
    }

    pub fn is_packed(&self) -> bool {
        self.mode & mode::IS_PACKED != 0
    }

    pub fn is_extension(&self) -> bool {
        self.mode & mode::IS_EXTENSION != 0
    }

    /// The oneof case-slot offset for oneof members (`presence < 0`).
    pub fn case_offset(&self) -> u32 {
        debug_assert!(self.presence < 0);
        !self.presence as u32
    }
}

/// Extension storage discipline of a message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExtMode {
    #[default]
    None,
    Extendable,
    MsgSet,
}

/// One message layout.
///
/// `fields` is ordered by field number; `dense_below` is the length of the
/// prefix whose numbers are exactly `1..=dense_below`.
#[derive(Clone, Debug, Default)]
pub struct MessageLayout {
    pub subs: Vec<LayoutId>,
    pub fields: Vec<FieldLayout>,
    pub size: u32,
    pub ext: ExtMode,
    pub dense_below: u8,
}

/// One extension record: the field layout (offset, presence and submsg
/// index are all zero; the value lives in the extension cell, not the
/// message image), the extendee, and the value layout for message-typed
/// extensions.
#[derive(Clone, Debug)]
pub struct ExtensionLayout {
    pub field: FieldLayout,
    pub extendee: LayoutId,
    pub sub: Option<LayoutId>,
}

/// All layouts of a compiled schema.
#[derive(Clone, Debug, Default)]
pub struct LayoutPool {
    pub msgs: Vec<MessageLayout>,
    pub exts: Vec<ExtensionLayout>,
}

impl LayoutPool {
    pub fn msg(&self, id: LayoutId) -> &MessageLayout {
        &self.msgs[id.0 as usize]
    }

    pub fn ext(&self, id: ExtId) -> &ExtensionLayout {
        &self.exts[id.0 as usize]
    }

    pub fn add_msg(&mut self, layout: MessageLayout) -> LayoutId {
        let id = LayoutId(self.msgs.len() as u32);
        self.msgs.push(layout);
        id
    }

    pub fn add_ext(&mut self, layout: ExtensionLayout) -> ExtId {
        let id = ExtId(self.exts.len() as u32);
        self.exts.push(layout);
        id
    }
}
