//! JSON deserialization for descriptor sets.
//!
//! Consumes a `FileDescriptorSet` in JSON field naming (`messageType`,
//! `nestedType`, `oneofIndex`, ...) and builds a resolved [`Pool`]. Loading
//! is two-pass: first every message and enum is registered under its full
//! name, then fields, defaults and dependencies are resolved by name.

use std::collections::HashMap;

use serde::Deserialize;

use crate::descriptor::{
    CType, DefaultValue, Enum, EnumId, EnumValue, Field, FieldType, File, FileId, Label, Message,
    MessageId, Oneof, Pool, Syntax,
};

/// Error while building a pool from a descriptor set.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown type reference: {0}")]
    UnknownType(String),
    #[error("unknown field type: {0}")]
    UnknownFieldType(String),
    #[error("unknown label: {0}")]
    UnknownLabel(String),
    #[error("unknown dependency: {0}")]
    UnknownDependency(String),
    #[error("oneof index {index} out of range in {message}")]
    BadOneofIndex { message: String, index: usize },
    #[error("bad default value `{value}` for field {field}")]
    BadDefault { field: String, value: String },
    #[error("extension field {0} has no extendee")]
    MissingExtendee(String),
}

impl Pool {
    /// Build a pool from a descriptor-set JSON document.
    pub fn from_json(json: &str) -> Result<Self, PoolError> {
        let raw: RawFileSet = serde_json::from_str(json)?;
        Loader::default().load(&raw)
    }
}

// Raw structures matching the descriptor-set JSON shape.

#[derive(Debug, Deserialize)]
struct RawFileSet {
    #[serde(default)]
    file: Vec<RawFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawFile {
    name: String,
    package: String,
    syntax: Option<String>,
    dependency: Vec<String>,
    public_dependency: Vec<usize>,
    message_type: Vec<RawMessage>,
    enum_type: Vec<RawEnum>,
    extension: Vec<RawField>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawMessage {
    name: String,
    field: Vec<RawField>,
    nested_type: Vec<RawMessage>,
    enum_type: Vec<RawEnum>,
    extension: Vec<RawField>,
    extension_range: Vec<RawExtensionRange>,
    oneof_decl: Vec<RawOneof>,
    options: RawMessageOptions,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawMessageOptions {
    map_entry: bool,
    message_set_wire_format: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawField {
    name: String,
    number: u32,
    label: String,
    #[serde(rename = "type")]
    field_type: String,
    type_name: Option<String>,
    extendee: Option<String>,
    default_value: Option<String>,
    oneof_index: Option<usize>,
    proto3_optional: bool,
    options: RawFieldOptions,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawFieldOptions {
    packed: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawEnum {
    name: String,
    value: Vec<RawEnumValue>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawEnumValue {
    name: String,
    number: i32,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawOneof {
    name: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawExtensionRange {
    start: u32,
    end: u32,
}

#[derive(Default)]
struct Loader {
    pool: Pool,
    msg_by_name: HashMap<String, MessageId>,
    enum_by_name: HashMap<String, EnumId>,
}

impl Loader {
    fn load(mut self, raw: &RawFileSet) -> Result<Pool, PoolError> {
        // Pass 1: register every file, message and enum under its full name.
        let mut pending: Vec<(MessageId, &RawMessage)> = Vec::new();
        for (fi, rf) in raw.file.iter().enumerate() {
            let file_id = FileId(fi as u32);
            let syntax = match rf.syntax.as_deref() {
                Some("proto3") => Syntax::Proto3,
                _ => Syntax::Proto2,
            };
            let mut file = File {
                name: rf.name.clone(),
                package: rf.package.clone(),
                syntax,
                dependencies: Vec::new(),
                public_dependencies: rf.public_dependency.clone(),
                messages: Vec::new(),
                enums: Vec::new(),
                extensions: Vec::new(),
            };
            for rm in &rf.message_type {
                let id = self.register_message(rm, &rf.package, file_id, &mut pending);
                file.messages.push(id);
            }
            for re in &rf.enum_type {
                let id = self.register_enum(re, &rf.package, file_id);
                file.enums.push(id);
            }
            self.pool.files.push(file);
        }

        // Pass 2: resolve dependencies, fields and extensions.
        for (fi, rf) in raw.file.iter().enumerate() {
            let file_id = FileId(fi as u32);
            let mut deps = Vec::with_capacity(rf.dependency.len());
            for dep in &rf.dependency {
                let id = self
                    .pool
                    .find_file(dep)
                    .ok_or_else(|| PoolError::UnknownDependency(dep.clone()))?;
                deps.push(id);
            }
            self.pool.files[fi].dependencies = deps;

            let mut exts = Vec::with_capacity(rf.extension.len());
            for re in &rf.extension {
                exts.push(self.resolve_extension(re, file_id, None)?);
            }
            self.pool.files[fi].extensions = exts;
        }
        for &(id, rm) in &pending {
            self.resolve_message(id, rm)?;
        }

        Ok(self.pool)
    }

    fn register_message<'a>(
        &mut self,
        rm: &'a RawMessage,
        scope: &str,
        file: FileId,
        pending: &mut Vec<(MessageId, &'a RawMessage)>,
    ) -> MessageId {
        let full_name = join_scope(scope, &rm.name);
        let id = MessageId(self.pool.messages.len() as u32);
        self.pool.messages.push(Message {
            name: rm.name.clone(),
            full_name: full_name.clone(),
            file,
            fields: Vec::new(),
            oneofs: rm
                .oneof_decl
                .iter()
                .map(|o| Oneof {
                    name: o.name.clone(),
                    full_name: format!("{}.{}", full_name, o.name),
                    synthetic: false,
                })
                .collect(),
            nested: Vec::new(),
            enums: Vec::new(),
            extensions: Vec::new(),
            extension_ranges: rm.extension_range.iter().map(|r| (r.start, r.end)).collect(),
            map_entry: rm.options.map_entry,
            message_set_wire_format: rm.options.message_set_wire_format,
        });
        self.msg_by_name.insert(full_name.clone(), id);
        pending.push((id, rm));

        let mut nested = Vec::with_capacity(rm.nested_type.len());
        for child in &rm.nested_type {
            nested.push(self.register_message(child, &full_name, file, pending));
        }
        let mut enums = Vec::with_capacity(rm.enum_type.len());
        for re in &rm.enum_type {
            enums.push(self.register_enum(re, &full_name, file));
        }
        let msg = &mut self.pool.messages[id.0 as usize];
        msg.nested = nested;
        msg.enums = enums;
        id
    }

    fn register_enum(&mut self, re: &RawEnum, scope: &str, file: FileId) -> EnumId {
        let full_name = join_scope(scope, &re.name);
        let id = EnumId(self.pool.enums.len() as u32);
        self.pool.enums.push(Enum {
            name: re.name.clone(),
            full_name: full_name.clone(),
            parent_scope: scope.to_string(),
            file,
            values: re
                .value
                .iter()
                .map(|v| EnumValue {
                    name: v.name.clone(),
                    number: v.number,
                })
                .collect(),
        });
        self.enum_by_name.insert(full_name, id);
        id
    }

    fn resolve_message(&mut self, id: MessageId, rm: &RawMessage) -> Result<(), PoolError> {
        let file = self.pool.message(id).file;
        let mut fields = Vec::with_capacity(rm.field.len());
        let mut synthetic = Vec::new();
        for rf in &rm.field {
            let field = self.resolve_field(rf, file, id)?;
            if let Some(idx) = field.oneof {
                if idx >= self.pool.message(id).oneofs.len() {
                    return Err(PoolError::BadOneofIndex {
                        message: self.pool.message(id).full_name.clone(),
                        index: idx,
                    });
                }
                if field.proto3_optional {
                    synthetic.push(idx);
                }
            }
            fields.push(field);
        }
        let mut exts = Vec::with_capacity(rm.extension.len());
        for re in &rm.extension {
            exts.push(self.resolve_extension(re, file, Some(id))?);
        }
        let msg = &mut self.pool.messages[id.0 as usize];
        msg.fields = fields;
        msg.extensions = exts;
        for idx in synthetic {
            msg.oneofs[idx].synthetic = true;
        }
        Ok(())
    }

    fn resolve_field(
        &self,
        rf: &RawField,
        file: FileId,
        containing: MessageId,
    ) -> Result<Field, PoolError> {
        let field_type = parse_field_type(&rf.field_type)
            .ok_or_else(|| PoolError::UnknownFieldType(rf.field_type.clone()))?;
        let label = match rf.label.as_str() {
            "LABEL_OPTIONAL" => Label::Optional,
            "LABEL_REQUIRED" => Label::Required,
            "LABEL_REPEATED" => Label::Repeated,
            other => return Err(PoolError::UnknownLabel(other.to_string())),
        };

        let mut message_type = None;
        let mut enum_type = None;
        if let Some(type_name) = &rf.type_name {
            let name = type_name.trim_start_matches('.');
            match field_type.ctype() {
                CType::Message => {
                    message_type = Some(
                        self.msg_by_name
                            .get(name)
                            .copied()
                            .ok_or_else(|| PoolError::UnknownType(name.to_string()))?,
                    );
                }
                CType::Enum => {
                    enum_type = Some(
                        self.enum_by_name
                            .get(name)
                            .copied()
                            .ok_or_else(|| PoolError::UnknownType(name.to_string()))?,
                    );
                }
                _ => {}
            }
        }

        let default = match &rf.default_value {
            Some(text) => Some(self.parse_default(rf, field_type, enum_type, text)?),
            None => None,
        };

        Ok(Field {
            name: rf.name.clone(),
            number: rf.number,
            field_type,
            label,
            packed: rf.options.packed,
            oneof: rf.oneof_index,
            proto3_optional: rf.proto3_optional,
            is_extension: false,
            file,
            containing,
            extension_scope: None,
            message_type,
            enum_type,
            default,
        })
    }

    fn resolve_extension(
        &self,
        rf: &RawField,
        file: FileId,
        scope: Option<MessageId>,
    ) -> Result<Field, PoolError> {
        let extendee = rf
            .extendee
            .as_deref()
            .ok_or_else(|| PoolError::MissingExtendee(rf.name.clone()))?;
        let name = extendee.trim_start_matches('.');
        let containing = self
            .msg_by_name
            .get(name)
            .copied()
            .ok_or_else(|| PoolError::UnknownType(name.to_string()))?;

        let mut field = self.resolve_field(rf, file, containing)?;
        field.is_extension = true;
        field.extension_scope = scope;
        field.oneof = None;
        Ok(field)
    }

    fn parse_default(
        &self,
        rf: &RawField,
        field_type: FieldType,
        enum_type: Option<EnumId>,
        text: &str,
    ) -> Result<DefaultValue, PoolError> {
        let bad = || PoolError::BadDefault {
            field: rf.name.clone(),
            value: text.to_string(),
        };
        Ok(match field_type.ctype() {
            CType::Bool => DefaultValue::Bool(match text {
                "true" => true,
                "false" => false,
                _ => return Err(bad()),
            }),
            CType::Int32 | CType::Int64 => {
                DefaultValue::Int(text.parse().map_err(|_| bad())?)
            }
            CType::UInt32 | CType::UInt64 => {
                DefaultValue::Uint(text.parse().map_err(|_| bad())?)
            }
            CType::Float | CType::Double => DefaultValue::Float(match text {
                "inf" => f64::INFINITY,
                "-inf" => f64::NEG_INFINITY,
                "nan" => f64::NAN,
                _ => text.parse().map_err(|_| bad())?,
            }),
            CType::String => DefaultValue::String(text.to_string()),
            CType::Enum => {
                let id = enum_type.ok_or_else(bad)?;
                let desc = self.pool.enum_(id);
                let value = desc
                    .values
                    .iter()
                    .find(|v| v.name == text)
                    .ok_or_else(bad)?;
                DefaultValue::Enum(value.number)
            }
            CType::Message => return Err(bad()),
        })
    }
}

fn join_scope(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

fn parse_field_type(s: &str) -> Option<FieldType> {
    Some(match s {
        "TYPE_DOUBLE" => FieldType::Double,
        "TYPE_FLOAT" => FieldType::Float,
        "TYPE_INT64" => FieldType::Int64,
        "TYPE_UINT64" => FieldType::Uint64,
        "TYPE_INT32" => FieldType::Int32,
        "TYPE_FIXED64" => FieldType::Fixed64,
        "TYPE_FIXED32" => FieldType::Fixed32,
        "TYPE_BOOL" => FieldType::Bool,
        "TYPE_STRING" => FieldType::String,
        "TYPE_GROUP" => FieldType::Group,
        "TYPE_MESSAGE" => FieldType::Message,
        "TYPE_BYTES" => FieldType::Bytes,
        "TYPE_UINT32" => FieldType::Uint32,
        "TYPE_ENUM" => FieldType::Enum,
        "TYPE_SFIXED32" => FieldType::Sfixed32,
        "TYPE_SFIXED64" => FieldType::Sfixed64,
        "TYPE_SINT32" => FieldType::Sint32,
        "TYPE_SINT64" => FieldType::Sint64,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const TWO_FIELDS: &str = indoc! {r#"
        {
          "file": [{
            "name": "test.proto",
            "package": "unit",
            "syntax": "proto3",
            "messageType": [{
              "name": "Pair",
              "field": [
                {"name": "id", "number": 1, "label": "LABEL_OPTIONAL", "type": "TYPE_INT32"},
                {"name": "label", "number": 2, "label": "LABEL_OPTIONAL", "type": "TYPE_STRING"}
              ]
            }]
          }]
        }
    "#};

    #[test]
    fn loads_simple_message() {
        let pool = Pool::from_json(TWO_FIELDS).unwrap();
        assert_eq!(pool.files.len(), 1);
        assert_eq!(pool.messages.len(), 1);

        let msg = pool.message(MessageId(0));
        assert_eq!(msg.full_name, "unit.Pair");
        assert_eq!(msg.fields.len(), 2);
        assert_eq!(msg.fields[0].number, 1);
        assert_eq!(msg.fields[0].field_type, FieldType::Int32);
        assert_eq!(msg.fields[1].field_type, FieldType::String);
    }

    #[test]
    fn resolves_nested_and_references() {
        let json = indoc! {r#"
            {
              "file": [{
                "name": "tree.proto",
                "package": "t",
                "syntax": "proto3",
                "messageType": [{
                  "name": "Node",
                  "field": [
                    {"name": "child", "number": 1, "label": "LABEL_OPTIONAL",
                     "type": "TYPE_MESSAGE", "typeName": ".t.Node.Leaf"}
                  ],
                  "nestedType": [{"name": "Leaf"}]
                }]
              }]
            }
        "#};
        let pool = Pool::from_json(json).unwrap();
        assert_eq!(pool.messages.len(), 2);
        let node = pool.message(MessageId(0));
        assert_eq!(node.nested, vec![MessageId(1)]);
        assert_eq!(node.fields[0].message_type, Some(MessageId(1)));
        assert_eq!(pool.message(MessageId(1)).full_name, "t.Node.Leaf");
    }

    #[test]
    fn unknown_type_reference_is_an_error() {
        let json = indoc! {r#"
            {
              "file": [{
                "name": "bad.proto",
                "messageType": [{
                  "name": "M",
                  "field": [
                    {"name": "x", "number": 1, "label": "LABEL_OPTIONAL",
                     "type": "TYPE_MESSAGE", "typeName": ".missing.Type"}
                  ]
                }]
              }]
            }
        "#};
        let err = Pool::from_json(json).unwrap_err();
        assert!(matches!(err, PoolError::UnknownType(name) if name == "missing.Type"));
    }

    #[test]
    fn synthetic_oneof_is_marked() {
        let json = indoc! {r#"
            {
              "file": [{
                "name": "opt.proto",
                "package": "o",
                "syntax": "proto3",
                "messageType": [{
                  "name": "M",
                  "field": [
                    {"name": "x", "number": 1, "label": "LABEL_OPTIONAL",
                     "type": "TYPE_INT32", "oneofIndex": 0, "proto3Optional": true}
                  ],
                  "oneofDecl": [{"name": "_x"}]
                }]
              }]
            }
        "#};
        let pool = Pool::from_json(json).unwrap();
        let msg = pool.message(MessageId(0));
        assert!(msg.oneofs[0].synthetic);
        assert!(msg.fields[0].real_oneof(msg).is_none());
        assert!(msg.fields[0].has_presence(Syntax::Proto3));
    }

    #[test]
    fn map_entry_detection() {
        let json = indoc! {r#"
            {
              "file": [{
                "name": "map.proto",
                "package": "m",
                "syntax": "proto3",
                "messageType": [{
                  "name": "Dict",
                  "field": [
                    {"name": "items", "number": 1, "label": "LABEL_REPEATED",
                     "type": "TYPE_MESSAGE", "typeName": ".m.Dict.ItemsEntry"}
                  ],
                  "nestedType": [{
                    "name": "ItemsEntry",
                    "field": [
                      {"name": "key", "number": 1, "label": "LABEL_OPTIONAL", "type": "TYPE_STRING"},
                      {"name": "value", "number": 2, "label": "LABEL_OPTIONAL", "type": "TYPE_INT32"}
                    ],
                    "options": {"mapEntry": true}
                  }]
                }]
              }]
            }
        "#};
        let pool = Pool::from_json(json).unwrap();
        let dict = pool.message(MessageId(0));
        assert!(dict.fields[0].is_map(&pool));
        let entry = pool.message(MessageId(1));
        assert!(entry.map_entry);
        let (key, val) = entry.map_key_value();
        assert_eq!(key.name, "key");
        assert_eq!(val.name, "value");
    }
}
