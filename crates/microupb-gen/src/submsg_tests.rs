//! Submessage index table tests.

use microupb_core::MessageId;

use crate::submsg::SubmsgArray;
use crate::test_schemas::{self, load};

#[test]
fn deduplicates_and_sorts_by_target_name() {
    let pool = load(test_schemas::NESTED);
    let outer = pool.message(MessageId(0));
    let subs = SubmsgArray::new(&pool, MessageId(0));

    // Outer references Zebra twice and Apple once; the table is
    // name-sorted and deduplicated.
    assert_eq!(subs.len(), 2);
    let targets: Vec<_> = subs
        .submsgs()
        .map(|id| pool.message(id).full_name.clone())
        .collect();
    assert_eq!(targets, vec!["unit.Apple", "unit.Zebra"]);

    let left = outer.fields.iter().find(|f| f.name == "left").unwrap();
    let right = outer.fields.iter().find(|f| f.name == "right").unwrap();
    let more = outer.fields.iter().find(|f| f.name == "more").unwrap();
    assert_eq!(subs.index_of(left), 1); // Zebra
    assert_eq!(subs.index_of(right), 0); // Apple
    assert_eq!(subs.index_of(more), 1); // Zebra again, same index
}

#[test]
fn map_values_contribute_entry_layouts() {
    let pool = load(test_schemas::MAP);
    let subs = SubmsgArray::new(&pool, MessageId(0));
    assert_eq!(subs.len(), 1);
    let target = subs.submsgs().next().unwrap();
    assert_eq!(pool.message(target).full_name, "unit.Dict.ItemsEntry");
}

#[test]
fn messages_without_submessages_are_empty() {
    let pool = load(test_schemas::SCALARS);
    let subs = SubmsgArray::new(&pool, MessageId(0));
    assert!(subs.is_empty());
}

#[test]
fn index_assignment_is_stable() {
    let pool = load(test_schemas::NESTED);
    let first = SubmsgArray::new(&pool, MessageId(0));
    let second = SubmsgArray::new(&pool, MessageId(0));
    assert_eq!(
        first.submsgs().collect::<Vec<_>>(),
        second.submsgs().collect::<Vec<_>>()
    );
}
