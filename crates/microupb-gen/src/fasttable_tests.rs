//! Fast-dispatch table builder tests.

use microupb_core::{MessageId, Pool};

use crate::fasttable::{
    fast_decode_table, table_mask, table_slot, try_fill_entry, TableEntry, GENERIC_HANDLER,
};
use crate::layout::MessageLayout;
use crate::submsg::SubmsgArray;
use crate::test_schemas::{self, load};

fn build(pool: &Pool, index: u32) -> Vec<TableEntry> {
    let layout = MessageLayout::new(pool, MessageId(index));
    fast_decode_table(pool, MessageId(index), &layout)
}

fn fill(pool: &Pool, index: u32, name: &str) -> Option<TableEntry> {
    let id = MessageId(index);
    let layout = MessageLayout::new(pool, id);
    let submsgs = SubmsgArray::new(pool, id);
    let field = pool
        .message(id)
        .fields
        .iter()
        .find(|f| f.name == name)
        .unwrap();
    try_fill_entry(pool, id, &layout, &submsgs, field)
}

#[test]
fn scalar_entries_pack_offset_presence_and_tag() {
    let pool = load(test_schemas::SCALARS);
    let table = build(&pool, 0);

    // Slots 1-5 are claimed, table grows to the next power of two.
    assert_eq!(table.len(), 8);
    assert_eq!(table_mask(table.len()), 56);
    assert!(table[0].is_generic());
    assert!(table[6].is_generic());
    assert!(table[7].is_generic());

    // int32 field 1 at offset 32 with no hasbit (bit 63 sentinel).
    assert_eq!(table[1].function, "upb_psv4_1bt");
    assert_eq!(table[1].data, (32u64 << 48) | (63 << 24) | 0x08);

    // proto3 string field 2 validates UTF-8.
    assert_eq!(table[2].function, "upb_pss_1bt");
    assert_eq!(table[2].data, (63 << 24) | 0x12);

    assert_eq!(table[3].function, "upb_psb1_1bt");
    assert_eq!(table[4].function, "upb_psf8_1bt");
    assert_eq!(table[4].data, (16u64 << 48) | (63 << 24) | 0x21);
    assert_eq!(table[5].function, "upb_psv8_1bt");
}

#[test]
fn every_installed_entry_matches_its_slot() {
    for schema in [
        test_schemas::SCALARS,
        test_schemas::ONEOF,
        test_schemas::NESTED,
        test_schemas::REPEATED,
    ] {
        let pool = load(schema);
        let table = build(&pool, 0);
        assert!(table.is_empty() || table.len().is_power_of_two());
        for (slot, entry) in table.iter().enumerate() {
            if entry.is_generic() {
                continue;
            }
            assert_eq!(((entry.data & 0xf8) >> 3) as usize, slot);
        }
    }
}

#[test]
fn oneof_entries_carry_case_offset_and_number() {
    let pool = load(test_schemas::ONEOF);
    let table = build(&pool, 0);

    // Member data cell at 8, case slot at 0, field numbers in the
    // presence byte.
    assert_eq!(table[1].function, "upb_pov4_1bt");
    assert_eq!(table[1].data, (8u64 << 48) | (1 << 24) | 0x08);
    assert_eq!(table[2].function, "upb_pos_1bt");
    assert_eq!(table[2].data, (8u64 << 48) | (2 << 24) | 0x12);

    // The plain field still uses the hasbit sentinel.
    assert_eq!(table[3].data, (24u64 << 48) | (63 << 24) | 0x18);
}

#[test]
fn repeated_entries_have_no_presence_word() {
    let pool = load(test_schemas::REPEATED);
    let table = build(&pool, 0);

    assert_eq!(table[4].function, "upb_ppv4_1bt");
    assert_eq!(table[4].data, 0x22);
    assert_eq!(table[5].function, "upb_prs_1bt");
    assert_eq!(table[5].data, (8u64 << 48) | 0x2A);
    assert_eq!(table[6].function, "upb_prv4_1bt");
    assert_eq!(table[6].data, (16u64 << 48) | 0x30);
}

#[test]
fn submessage_entries_bucket_by_size() {
    let pool = load(test_schemas::NESTED);
    let table = build(&pool, 0);

    // Both targets are empty messages: size 0 + 8 fits the 64 bucket.
    assert_eq!(table[1].function, "upb_psm_1bt_max64b");
    assert_eq!(table[1].data, (8u64 << 48) | (1 << 24) | (1 << 16) | 0x0A);
    assert_eq!(table[2].function, "upb_psm_1bt_max64b");
    assert_eq!(table[2].data, (16u64 << 48) | (2 << 24) | 0x12);
    assert_eq!(table[3].data, (24u64 << 48) | (3 << 24) | (1 << 16) | 0x1A);
}

#[test]
fn map_fields_are_ineligible() {
    let pool = load(test_schemas::MAP);
    assert_eq!(fill(&pool, 0, "items"), None);
    let table = build(&pool, 0);
    assert!(table.is_empty());
    assert_eq!(table_mask(table.len()), 0xff);
}

#[test]
fn wide_tags_use_two_byte_handlers() {
    let json = r#"
    {
      "file": [{
        "name": "wide.proto",
        "package": "unit",
        "syntax": "proto3",
        "messageType": [{
          "name": "Wide",
          "field": [
            {"name": "hi", "number": 16, "label": "LABEL_OPTIONAL", "type": "TYPE_INT32"}
          ]
        }]
      }]
    }
    "#;
    let pool = load(json);
    let field = &pool.message(MessageId(0)).fields[0];

    // Tag 0x80 0x01 reads as 0x0180 little-endian: slot 16, two tag bytes.
    assert_eq!(table_slot(&pool, field), Some(16));
    let entry = fill(&pool, 0, "hi").unwrap();
    assert_eq!(entry.function, "upb_psv4_2bt");
    assert_eq!(entry.data & 0xffff, 0x0180);

    let table = build(&pool, 0);
    assert_eq!(table.len(), 32);
    assert_eq!(table_mask(table.len()), 248);
}

#[test]
fn three_byte_tags_do_not_fit() {
    let json = r#"
    {
      "file": [{
        "name": "far.proto",
        "package": "unit",
        "syntax": "proto3",
        "messageType": [{
          "name": "Far",
          "field": [
            {"name": "far", "number": 2048, "label": "LABEL_OPTIONAL", "type": "TYPE_INT32"}
          ]
        }]
      }]
    }
    "#;
    let pool = load(json);
    let field = &pool.message(MessageId(0)).fields[0];
    assert_eq!(table_slot(&pool, field), None);
    assert!(build(&pool, 0).is_empty());
}

#[test]
fn colliding_slots_keep_the_hotter_field() {
    // Fields 17 and 33 share first tag byte 0x88, hence slot 17.
    let json = r#"
    {
      "file": [{
        "name": "clash.proto",
        "package": "unit",
        "syntax": "proto3",
        "messageType": [{
          "name": "Clash",
          "field": [
            {"name": "hot", "number": 17, "label": "LABEL_OPTIONAL", "type": "TYPE_INT32"},
            {"name": "cold", "number": 33, "label": "LABEL_OPTIONAL", "type": "TYPE_INT32"}
          ]
        }]
      }]
    }
    "#;
    let pool = load(json);
    let msg = pool.message(MessageId(0));
    assert_eq!(table_slot(&pool, &msg.fields[0]), Some(17));
    assert_eq!(table_slot(&pool, &msg.fields[1]), Some(17));

    let table = build(&pool, 0);
    assert_eq!(table[17].function, "upb_psv4_2bt");
    assert_eq!(table[17].data & 0xffff, 0x0188);
    assert_eq!(
        table.iter().filter(|e| !e.is_generic()).count(),
        1,
        "the colder field must lose the slot"
    );
}

#[test]
fn hasbit_indices_past_31_are_rejected() {
    // 40 proto2 optional fields allocate hasbits 1..=40.
    let mut fields = String::new();
    for number in 1..=40 {
        if number > 1 {
            fields.push(',');
        }
        fields.push_str(&format!(
            r#"{{"name": "f{number}", "number": {number}, "label": "LABEL_OPTIONAL", "type": "TYPE_INT32"}}"#
        ));
    }
    let json = format!(
        r#"{{"file": [{{"name": "many.proto", "package": "unit", "syntax": "proto2",
            "messageType": [{{"name": "Many", "field": [{fields}]}}]}}]}}"#
    );
    let pool = load(&json);

    assert!(fill(&pool, 0, "f10").is_some());
    assert_eq!(fill(&pool, 0, "f35"), None);
}

#[test]
fn group_fields_are_ineligible() {
    let json = r#"
    {
      "file": [{
        "name": "grp.proto",
        "package": "unit",
        "syntax": "proto2",
        "messageType": [{
          "name": "Outer",
          "field": [
            {"name": "inner", "number": 1, "label": "LABEL_OPTIONAL",
             "type": "TYPE_GROUP", "typeName": ".unit.Outer.Inner"}
          ],
          "nestedType": [{"name": "Inner"}]
        }]
      }]
    }
    "#;
    let pool = load(json);
    assert_eq!(fill(&pool, 0, "inner"), None);
}
