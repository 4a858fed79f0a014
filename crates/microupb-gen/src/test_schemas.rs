//! Shared descriptor fixtures for generator tests.

use microupb_core::Pool;

pub fn load(json: &str) -> Pool {
    Pool::from_json(json).expect("fixture must load")
}

/// One proto3 message, one int32 field.
pub const SIMPLE: &str = r#"
{
  "file": [{
    "name": "test.proto",
    "package": "unit",
    "syntax": "proto3",
    "messageType": [{
      "name": "Msg",
      "field": [
        {"name": "value", "number": 1, "label": "LABEL_OPTIONAL", "type": "TYPE_INT32"}
      ]
    }]
  }]
}
"#;

/// Proto3 scalar spread across every size class.
pub const SCALARS: &str = r#"
{
  "file": [{
    "name": "scalars.proto",
    "package": "unit",
    "syntax": "proto3",
    "messageType": [{
      "name": "Scalars",
      "field": [
        {"name": "i", "number": 1, "label": "LABEL_OPTIONAL", "type": "TYPE_INT32"},
        {"name": "s", "number": 2, "label": "LABEL_OPTIONAL", "type": "TYPE_STRING"},
        {"name": "b", "number": 3, "label": "LABEL_OPTIONAL", "type": "TYPE_BOOL"},
        {"name": "d", "number": 4, "label": "LABEL_OPTIONAL", "type": "TYPE_DOUBLE"},
        {"name": "u", "number": 5, "label": "LABEL_OPTIONAL", "type": "TYPE_UINT64"}
      ]
    }]
  }]
}
"#;

/// Proto2 message whose singular fields all carry hasbits.
pub const PROTO2: &str = r#"
{
  "file": [{
    "name": "legacy.proto",
    "package": "unit",
    "syntax": "proto2",
    "messageType": [{
      "name": "Legacy",
      "field": [
        {"name": "a", "number": 1, "label": "LABEL_OPTIONAL", "type": "TYPE_INT32"},
        {"name": "b", "number": 2, "label": "LABEL_OPTIONAL", "type": "TYPE_STRING"},
        {"name": "c", "number": 3, "label": "LABEL_OPTIONAL", "type": "TYPE_FIXED64"}
      ]
    }]
  }]
}
"#;

/// A declared oneof plus a plain field.
pub const ONEOF: &str = r#"
{
  "file": [{
    "name": "choice.proto",
    "package": "unit",
    "syntax": "proto3",
    "messageType": [{
      "name": "Choice",
      "field": [
        {"name": "num", "number": 1, "label": "LABEL_OPTIONAL", "type": "TYPE_INT32", "oneofIndex": 0},
        {"name": "text", "number": 2, "label": "LABEL_OPTIONAL", "type": "TYPE_STRING", "oneofIndex": 0},
        {"name": "other", "number": 3, "label": "LABEL_OPTIONAL", "type": "TYPE_INT32"}
      ],
      "oneofDecl": [{"name": "kind"}]
    }]
  }]
}
"#;

/// A map field and its synthesized entry message.
pub const MAP: &str = r#"
{
  "file": [{
    "name": "dict.proto",
    "package": "unit",
    "syntax": "proto3",
    "messageType": [{
      "name": "Dict",
      "field": [
        {"name": "items", "number": 7, "label": "LABEL_REPEATED",
         "type": "TYPE_MESSAGE", "typeName": ".unit.Dict.ItemsEntry"}
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
"#;

/// Submessage references: two fields sharing one target plus one other.
pub const NESTED: &str = r#"
{
  "file": [{
    "name": "tree.proto",
    "package": "unit",
    "syntax": "proto3",
    "messageType": [
      {
        "name": "Outer",
        "field": [
          {"name": "left", "number": 1, "label": "LABEL_OPTIONAL",
           "type": "TYPE_MESSAGE", "typeName": ".unit.Zebra"},
          {"name": "right", "number": 2, "label": "LABEL_OPTIONAL",
           "type": "TYPE_MESSAGE", "typeName": ".unit.Apple"},
          {"name": "more", "number": 3, "label": "LABEL_OPTIONAL",
           "type": "TYPE_MESSAGE", "typeName": ".unit.Zebra"}
        ]
      },
      {"name": "Zebra"},
      {"name": "Apple"}
    ]
  }]
}
"#;

/// Proto2 extensions, including a MessageSet-formatted host.
pub const EXTENSIONS: &str = r#"
{
  "file": [{
    "name": "ext.proto",
    "package": "unit",
    "syntax": "proto2",
    "messageType": [
      {
        "name": "Host",
        "extensionRange": [{"start": 100, "end": 200}]
      },
      {
        "name": "Payload",
        "field": [
          {"name": "id", "number": 1, "label": "LABEL_OPTIONAL", "type": "TYPE_INT32"}
        ]
      }
    ],
    "extension": [
      {"name": "tag", "number": 100, "label": "LABEL_OPTIONAL", "type": "TYPE_INT32",
       "extendee": ".unit.Host"},
      {"name": "payload", "number": 101, "label": "LABEL_OPTIONAL", "type": "TYPE_MESSAGE",
       "typeName": ".unit.Payload", "extendee": ".unit.Host"}
    ]
  }]
}
"#;

/// A top-level enum and a message using it.
pub const ENUMS: &str = r#"
{
  "file": [{
    "name": "color.proto",
    "package": "unit",
    "syntax": "proto3",
    "enumType": [{
      "name": "Color",
      "value": [
        {"name": "COLOR_RED", "number": 1},
        {"name": "COLOR_UNKNOWN", "number": 0}
      ]
    }],
    "messageType": [{
      "name": "Paint",
      "field": [
        {"name": "color", "number": 1, "label": "LABEL_OPTIONAL",
         "type": "TYPE_ENUM", "typeName": ".unit.Color"}
      ]
    }]
  }]
}
"#;

/// Packed and unpacked repeated fields.
pub const REPEATED: &str = r#"
{
  "file": [{
    "name": "rep.proto",
    "package": "unit",
    "syntax": "proto3",
    "messageType": [{
      "name": "Rep",
      "field": [
        {"name": "nums", "number": 4, "label": "LABEL_REPEATED", "type": "TYPE_INT32"},
        {"name": "names", "number": 5, "label": "LABEL_REPEATED", "type": "TYPE_STRING"},
        {"name": "loose", "number": 6, "label": "LABEL_REPEATED", "type": "TYPE_INT32",
         "options": {"packed": false}}
      ]
    }]
  }]
}
"#;
