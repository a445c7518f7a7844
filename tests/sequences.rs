mod support;

use std::collections::HashSet;

use taskmd::error::Error;
use taskmd::model::Task;

use support::TestRoot;

fn family(root: &TestRoot, children: &[&str]) {
    root.add("parent", None);
    for child in children {
        root.add_with(child, |task| {
            task.relations.parent_task = Some("parent".to_string())
        });
    }
}

fn sequences(root: &TestRoot, ids: &[&str]) -> Vec<String> {
    ids.iter()
        .map(|id| root.get(id).sequence.unwrap_or_default())
        .collect()
}

#[test]
fn make_parallel_shares_the_smallest_base() {
    let root = TestRoot::new();
    family(&root, &["one", "two", "three"]);
    assert_eq!(sequences(&root, &["one", "two", "three"]), vec!["01", "02", "03"]);

    let outcome = root
        .store()
        .make_parallel("parent", &["two".to_string(), "three".to_string()])
        .unwrap();
    assert!(outcome.is_clean());
    assert_eq!(sequences(&root, &["one", "two", "three"]), vec!["01", "02a", "02b"]);

    let groups = root.store().parallel_groups("parent").unwrap();
    assert_eq!(groups.len(), 2);
    assert!(groups[1].parallel);
    assert_eq!(groups[1].base.as_deref(), Some("02"));
    assert_eq!(groups[1].tasks, vec!["two", "three"]);
}

#[test]
fn make_parallel_skips_letters_held_by_other_siblings() {
    let root = TestRoot::new();
    family(&root, &["one", "two", "three", "four"]);
    root.store()
        .make_parallel("parent", &["two".to_string(), "three".to_string()])
        .unwrap();

    // four joins base 02 without stealing a or b
    root.store()
        .make_parallel("parent", &["four".to_string(), "two".to_string()])
        .unwrap();
    let tokens = sequences(&root, &["two", "three", "four"]);
    let unique: HashSet<&String> = tokens.iter().collect();
    assert_eq!(unique.len(), 3);
    assert_eq!(root.get("three").sequence.as_deref(), Some("02b"));
    assert_eq!(root.get("four").sequence.as_deref(), Some("02a"));
    assert_eq!(root.get("two").sequence.as_deref(), Some("02c"));
}

#[test]
fn make_parallel_needs_an_existing_sequence() {
    let root = TestRoot::new();
    root.add("parent", None);
    for (id, token) in [("x", "later"), ("y", "someday")] {
        let mut task = Task::new(id, id);
        task.relations.parent_task = Some("parent".to_string());
        task.sequence = Some(token.to_string());
        root.store().create(task, None).unwrap();
    }

    let err = root
        .store()
        .make_parallel("parent", &["x".to_string(), "y".to_string()])
        .unwrap_err();
    assert!(matches!(err, Error::NoValidSequence(_)));
}

#[test]
fn make_parallel_rejects_strangers_and_empty_sets() {
    let root = TestRoot::new();
    family(&root, &["one"]);
    root.add("outsider", None);

    let err = root
        .store()
        .make_parallel("parent", &["one".to_string(), "outsider".to_string()])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let err = root.store().make_parallel("parent", &[]).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let too_many: Vec<String> = (0..27).map(|n| format!("t{n}")).collect();
    let err = root.store().make_parallel("parent", &too_many).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn reorder_renumbers_in_list_order() {
    let root = TestRoot::new();
    family(&root, &["one", "two", "three"]);

    let outcome = root
        .store()
        .reorder_subtasks(
            "parent",
            &["three".to_string(), "one".to_string(), "two".to_string()],
        )
        .unwrap();
    let ordered: Vec<String> = outcome.data.iter().map(|task| task.id.clone()).collect();
    assert_eq!(ordered, vec!["three", "one", "two"]);
    assert_eq!(sequences(&root, &["three", "one", "two"]), vec!["01", "02", "03"]);
}

#[test]
fn partial_reorder_keeps_sequences_unique() {
    let root = TestRoot::new();
    family(&root, &["one", "two", "three"]);

    // three takes 01; one would collide, so it moves past the highest number
    root.store()
        .reorder_subtasks("parent", &["three".to_string()])
        .unwrap();
    let tokens = sequences(&root, &["one", "two", "three"]);
    assert_eq!(tokens[2], "01");
    assert_eq!(tokens[1], "02");
    assert_eq!(tokens[0], "04");

    let unique: HashSet<&String> = tokens.iter().collect();
    assert_eq!(unique.len(), tokens.len());
    assert!(root.store().audit().unwrap().is_empty());
}

#[test]
fn reorder_ignores_ids_that_are_not_subtasks() {
    let root = TestRoot::new();
    family(&root, &["one", "two"]);
    root.add("outsider", None);

    root.store()
        .reorder_subtasks("parent", &["outsider".to_string(), "two".to_string()])
        .unwrap();
    // two keeps its list position
    assert_eq!(root.get("two").sequence.as_deref(), Some("02"));
    assert_eq!(root.get("one").sequence.as_deref(), Some("01"));
    assert_eq!(root.get("outsider").sequence, None);
}

#[test]
fn reorder_numbers_by_list_position() {
    let root = TestRoot::new();
    family(&root, &["one", "two", "three"]);

    root.store()
        .reorder_subtasks(
            "parent",
            &["ghost".to_string(), "three".to_string(), "one".to_string()],
        )
        .unwrap();
    // two held 02, now taken by three, so it moves past the highest number
    assert_eq!(sequences(&root, &["three", "one", "two"]), vec!["02", "03", "04"]);
    assert!(root.store().audit().unwrap().is_empty());
}
