//! The descriptor pool: files, messages, enums, fields.
//!
//! Descriptors are flat records addressed by typed indices into a [`Pool`].
//! Cross-references (submessage targets, enum targets, dependencies) are
//! stored as ids, so the whole graph is cycle-safe and trivially shareable.

/// Index of a file in the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// Index of a message in the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u32);

/// Index of an enum in the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(pub u32);

/// File syntax level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syntax {
    Proto2,
    Proto3,
}

/// Field cardinality label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Label {
    Optional,
    Required,
    Repeated,
}

/// Declared field type, numbered as in descriptor.proto.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
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

/// In-memory representation class of a field (protobuf "cpp type").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CType {
    Bool,
    Float,
    Double,
    Int32,
    Int64,
    UInt32,
    UInt64,
    Enum,
    String,
    Message,
}

impl FieldType {
    /// The representation class of this declared type.
    pub fn ctype(self) -> CType {
        match self {
            FieldType::Double => CType::Double,
            FieldType::Float => CType::Float,
            FieldType::Int64 | FieldType::Sfixed64 | FieldType::Sint64 => CType::Int64,
            FieldType::Uint64 | FieldType::Fixed64 => CType::UInt64,
            FieldType::Int32 | FieldType::Sfixed32 | FieldType::Sint32 => CType::Int32,
            FieldType::Uint32 | FieldType::Fixed32 => CType::UInt32,
            FieldType::Bool => CType::Bool,
            FieldType::String | FieldType::Bytes => CType::String,
            FieldType::Group | FieldType::Message => CType::Message,
            FieldType::Enum => CType::Enum,
        }
    }

    /// Whether a repeated field of this type may use packed encoding.
    pub fn is_packable(self) -> bool {
        !matches!(
            self,
            FieldType::String | FieldType::Bytes | FieldType::Group | FieldType::Message
        )
    }
}

/// Parsed default value of a singular field.
#[derive(Clone, Debug, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    /// Default text for string and bytes fields, unescaped.
    String(String),
    /// Default enum value number.
    Enum(i32),
}

/// A field or extension.
#[derive(Clone, Debug)]
pub struct Field {
    pub name: String,
    pub number: u32,
    pub field_type: FieldType,
    pub label: Label,
    /// Explicit `[packed = ...]` option, if present.
    pub packed: Option<bool>,
    /// Index into the containing message's oneof list.
    pub oneof: Option<usize>,
    /// Set for proto3 `optional` fields (members of a synthetic oneof).
    pub proto3_optional: bool,
    pub is_extension: bool,
    /// File the field is declared in.
    pub file: FileId,
    /// Message the field belongs to; for extensions, the extendee.
    pub containing: MessageId,
    /// Message inside which the `extend` block is nested, if any.
    pub extension_scope: Option<MessageId>,
    /// Target message for message/group fields (and map fields).
    pub message_type: Option<MessageId>,
    /// Target enum for enum fields.
    pub enum_type: Option<EnumId>,
    pub default: Option<DefaultValue>,
}

impl Field {
    pub fn ctype(&self) -> CType {
        self.field_type.ctype()
    }

    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }

    /// A map field is a repeated field whose entry message has `map_entry` set.
    pub fn is_map(&self, pool: &Pool) -> bool {
        self.is_repeated()
            && self
                .message_type
                .is_some_and(|id| pool.message(id).map_entry)
    }

    /// The declared (non-synthetic) oneof containing this field, if any.
    pub fn real_oneof<'a>(&self, message: &'a Message) -> Option<(usize, &'a Oneof)> {
        let idx = self.oneof?;
        let oneof = &message.oneofs[idx];
        if oneof.synthetic {
            None
        } else {
            Some((idx, oneof))
        }
    }

    /// Whether the field tracks explicit presence.
    ///
    /// Repeated fields and maps never do. Singular submessage fields and
    /// oneof members always do. Scalars do under proto2, and under proto3
    /// only when declared `optional`.
    pub fn has_presence(&self, syntax: Syntax) -> bool {
        if self.is_repeated() {
            return false;
        }
        match self.ctype() {
            CType::Message => true,
            _ => {
                self.oneof.is_some()
                    || self.proto3_optional
                    || syntax == Syntax::Proto2
            }
        }
    }

    /// Whether a repeated field uses packed wire encoding.
    pub fn is_packed(&self, syntax: Syntax) -> bool {
        if !self.is_repeated() || !self.field_type.is_packable() {
            return false;
        }
        match self.packed {
            Some(explicit) => explicit,
            None => syntax == Syntax::Proto3,
        }
    }
}

/// A oneof declaration. Synthetic oneofs back proto3 `optional` fields and
/// are invisible to layout and accessor generation.
#[derive(Clone, Debug)]
pub struct Oneof {
    pub name: String,
    pub full_name: String,
    pub synthetic: bool,
}

/// A message descriptor.
#[derive(Clone, Debug)]
pub struct Message {
    pub name: String,
    pub full_name: String,
    pub file: FileId,
    pub fields: Vec<Field>,
    pub oneofs: Vec<Oneof>,
    pub nested: Vec<MessageId>,
    pub enums: Vec<EnumId>,
    pub extensions: Vec<Field>,
    pub extension_ranges: Vec<(u32, u32)>,
    pub map_entry: bool,
    pub message_set_wire_format: bool,
}

impl Message {
    /// Key and value fields of a map entry message.
    ///
    /// # Panics
    /// Panics if the message is not a well-formed map entry.
    pub fn map_key_value(&self) -> (&Field, &Field) {
        debug_assert!(self.map_entry);
        let key = self
            .fields
            .iter()
            .find(|f| f.number == 1)
            .expect("map entry without a key field");
        let val = self
            .fields
            .iter()
            .find(|f| f.number == 2)
            .expect("map entry without a value field");
        (key, val)
    }
}

/// An enum value.
#[derive(Clone, Debug)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
}

/// An enum descriptor.
#[derive(Clone, Debug)]
pub struct Enum {
    pub name: String,
    pub full_name: String,
    /// Scope the values live in (the enum's parent, per C++ scoping rules).
    pub parent_scope: String,
    pub file: FileId,
    pub values: Vec<EnumValue>,
}

impl Enum {
    /// Full name of a value: values are scoped to the enum's parent.
    pub fn value_full_name(&self, value: &EnumValue) -> String {
        if self.parent_scope.is_empty() {
            value.name.clone()
        } else {
            format!("{}.{}", self.parent_scope, value.name)
        }
    }
}

/// A file descriptor.
#[derive(Clone, Debug)]
pub struct File {
    pub name: String,
    pub package: String,
    pub syntax: Syntax,
    pub dependencies: Vec<FileId>,
    /// Indices into `dependencies` that are re-exported.
    pub public_dependencies: Vec<usize>,
    /// Top-level messages, in declaration order.
    pub messages: Vec<MessageId>,
    /// Top-level enums, in declaration order.
    pub enums: Vec<EnumId>,
    /// File-level extensions, in declaration order.
    pub extensions: Vec<Field>,
}

/// The descriptor pool: all loaded files and their definitions.
#[derive(Clone, Debug, Default)]
pub struct Pool {
    pub files: Vec<File>,
    pub messages: Vec<Message>,
    pub enums: Vec<Enum>,
}

impl Pool {
    pub fn file(&self, id: FileId) -> &File {
        &self.files[id.0 as usize]
    }

    pub fn message(&self, id: MessageId) -> &Message {
        &self.messages[id.0 as usize]
    }

    pub fn enum_(&self, id: EnumId) -> &Enum {
        &self.enums[id.0 as usize]
    }

    pub fn find_file(&self, name: &str) -> Option<FileId> {
        self.files
            .iter()
            .position(|f| f.name == name)
            .map(|i| FileId(i as u32))
    }

    pub fn syntax(&self, field: &Field) -> Syntax {
        self.file(field.file).syntax
    }

    /// All messages defined in `file`, parents before their nested messages.
    pub fn file_messages(&self, file: FileId) -> Vec<MessageId> {
        let mut out = Vec::new();
        fn add(pool: &Pool, id: MessageId, out: &mut Vec<MessageId>) {
            out.push(id);
            for &nested in &pool.message(id).nested {
                add(pool, nested, out);
            }
        }
        for &id in &self.file(file).messages {
            add(self, id, &mut out);
        }
        out
    }

    /// All enums defined in `file`, sorted by full name.
    pub fn file_enums(&self, file: FileId) -> Vec<EnumId> {
        let mut out: Vec<EnumId> = Vec::new();
        for &id in &self.file(file).enums {
            out.push(id);
        }
        for &msg in &self.file_messages(file) {
            out.extend(self.message(msg).enums.iter().copied());
        }
        out.sort_by(|&a, &b| self.enum_(a).full_name.cmp(&self.enum_(b).full_name));
        out
    }

    /// All extensions defined in `file`: file-level first, then per message
    /// in definition order.
    pub fn file_extensions(&self, file: FileId) -> Vec<Field> {
        let mut out: Vec<Field> = self.file(file).extensions.clone();
        for &msg in &self.file_messages(file) {
            out.extend(self.message(msg).extensions.iter().cloned());
        }
        out
    }
}
