//! Tests for the dynamic message representation.

use crate::message::*;
use crate::table::{
    make_mode, DescriptorType, FieldKind, FieldLayout, MessageLayout, Rep,
};

fn scalar(number: u32, ty: DescriptorType, offset: u32, presence: i32, rep: Rep) -> FieldLayout {
    FieldLayout {
        number,
        offset,
        presence,
        submsg_index: 0,
        descriptor_type: ty,
        mode: make_mode(FieldKind::Scalar, rep),
    }
}

fn layout_of(fields: Vec<FieldLayout>, size: u32) -> MessageLayout {
    MessageLayout {
        subs: Vec::new(),
        fields,
        size,
        ext: Default::default(),
        dense_below: 0,
    }
}

#[test]
fn hasbit_presence_set_and_clear() {
    // Hasbit block byte at offset 0 (padded to 4), i32 cell at offset 4.
    let f = scalar(1, DescriptorType::Int32, 4, 1, Rep::FourByte);
    let layout = layout_of(vec![f], 8);
    let mut msg = Message::new(&layout);

    assert!(!msg.has(&f));
    msg.set(&f, Value::I32(0));
    // Explicit presence: even the default value counts as set.
    assert!(msg.has(&f));

    msg.set(&f, Value::I32(41));
    assert_eq!(msg.get(&f), Value::I32(41));

    msg.clear(&f);
    assert!(!msg.has(&f));
    assert_eq!(msg.get(&f), Value::I32(0));
}

#[test]
fn proto3_implicit_presence_tracks_value() {
    let f = scalar(1, DescriptorType::Int32, 0, 0, Rep::FourByte);
    let layout = layout_of(vec![f], 8);
    let mut msg = Message::new(&layout);

    assert!(!msg.has(&f));
    msg.set(&f, Value::I32(7));
    assert!(msg.has(&f));
    msg.set(&f, Value::I32(0));
    assert!(!msg.has(&f));
}

#[test]
fn oneof_members_are_exclusive() {
    // Case slot at offset 0, shared data cell at offset 4.
    let f1 = scalar(1, DescriptorType::Int32, 4, !0i32, Rep::FourByte);
    let f2 = scalar(2, DescriptorType::Uint32, 4, !0i32, Rep::FourByte);
    let layout = layout_of(vec![f1, f2], 8);
    let mut msg = Message::new(&layout);

    assert!(!msg.has(&f1));
    assert!(!msg.has(&f2));

    msg.set(&f1, Value::I32(-5));
    assert!(msg.has(&f1));
    assert!(!msg.has(&f2));
    assert_eq!(msg.oneof_case(0), 1);

    msg.set(&f2, Value::U32(9));
    assert!(!msg.has(&f1));
    assert!(msg.has(&f2));
    assert_eq!(msg.oneof_case(0), 2);

    // Clearing the inactive member leaves the active one alone.
    msg.clear(&f1);
    assert!(msg.has(&f2));
    assert_eq!(msg.get(&f2), Value::U32(9));

    msg.clear(&f2);
    assert!(!msg.has(&f2));
    assert_eq!(msg.oneof_case(0), 0);
}

#[test]
fn string_cell_holds_slot_and_length() {
    let f = scalar(1, DescriptorType::String, 0, 0, Rep::StrView);
    let layout = layout_of(vec![f], 16);
    let mut msg = Message::new(&layout);

    assert!(!msg.has(&f));
    assert_eq!(msg.str_bytes(&f), None);

    msg.set_str(&f, b"hello");
    assert!(msg.has(&f));
    assert_eq!(msg.str_bytes(&f), Some(&b"hello"[..]));

    // An empty string has no implicit presence.
    msg.set_str(&f, b"");
    assert!(!msg.has(&f));
    assert_eq!(msg.str_bytes(&f), Some(&b""[..]));
}

#[test]
fn array_is_lazily_allocated() {
    let f = FieldLayout {
        number: 1,
        offset: 0,
        presence: 0,
        submsg_index: 0,
        descriptor_type: DescriptorType::Int32,
        mode: make_mode(FieldKind::Array, Rep::EightByte),
    };
    let layout = layout_of(vec![f], 8);
    let mut msg = Message::new(&layout);

    assert!(msg.array(&f).is_none());
    msg.array_mut(&f).push(Value::I32(3));
    msg.array_mut(&f).push(Value::I32(4));
    assert_eq!(msg.array(&f).unwrap().len(), 2);
    assert!(msg.has(&f));
}

#[test]
fn map_preserves_insertion_order() {
    let f = FieldLayout {
        number: 1,
        offset: 0,
        presence: 0,
        submsg_index: 0,
        descriptor_type: DescriptorType::Message,
        mode: make_mode(FieldKind::Map, Rep::EightByte),
    };
    let layout = layout_of(vec![f], 8);
    let mut msg = Message::new(&layout);

    msg.map_mut(&f)
        .insert(MapKey::Str(b"b".to_vec()), Value::I32(2));
    msg.map_mut(&f)
        .insert(MapKey::Str(b"a".to_vec()), Value::I32(1));

    let keys: Vec<_> = msg.map(&f).unwrap().keys().cloned().collect();
    assert_eq!(keys, vec![MapKey::Str(b"b".to_vec()), MapKey::Str(b"a".to_vec())]);
}

#[test]
fn submessage_pointer_presence() {
    let inner_layout = layout_of(Vec::new(), 0);
    let f = scalar(1, DescriptorType::Message, 4, 1, Rep::EightByte);
    // Hasbit byte, pad, 8-byte pointer cell. Offsets here are hand-picked
    // for the test; real layouts align the cell to 8.
    let layout = layout_of(vec![f], 12);
    let mut msg = Message::new(&layout);

    assert!(msg.submsg(&f).is_none());
    msg.set_submsg(&f, Message::new(&inner_layout));
    assert!(msg.has(&f));
    assert!(msg.submsg(&f).is_some());
}

#[test]
fn oneof_switch_does_not_resurrect_stale_slots() {
    // Member 1 is a message pointer, member 2 a plain u64; both share the
    // 8-byte data cell at offset 8 (case slot at 0).
    let sub_layout = layout_of(Vec::new(), 0);
    let f1 = scalar(1, DescriptorType::Message, 8, !0i32, Rep::EightByte);
    let f2 = scalar(2, DescriptorType::Uint64, 8, !0i32, Rep::EightByte);
    let layout = layout_of(vec![f1, f2], 16);
    let mut msg = Message::new(&layout);

    msg.set_submsg(&f1, Message::new(&sub_layout));
    msg.set(&f2, Value::U64(1)); // overwrites the slot handle bytes
    assert!(msg.submsg(&f1).is_none());
    assert_eq!(msg.get(&f2), Value::U64(1));

    // Switching back allocates a fresh slot instead of trusting stale bytes.
    msg.set_submsg(&f1, Message::new(&sub_layout));
    assert!(msg.submsg(&f1).is_some());
    assert!(!msg.has(&f2));
}

#[test]
fn map_keys_order_for_deterministic_encoding() {
    let mut keys = vec![
        MapKey::I32(3),
        MapKey::I32(-1),
        MapKey::I32(0),
    ];
    keys.sort();
    assert_eq!(keys, vec![MapKey::I32(-1), MapKey::I32(0), MapKey::I32(3)]);

    let mut keys = vec![MapKey::Str(b"b".to_vec()), MapKey::Str(b"ab".to_vec())];
    keys.sort();
    assert_eq!(keys, vec![MapKey::Str(b"ab".to_vec()), MapKey::Str(b"b".to_vec())]);
}
