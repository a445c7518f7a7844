mod support;

use taskmd::model::{Location, Priority, Task, TaskStatus, OVERVIEW_ID};
use taskmd::query::TaskFilter;

use support::{ids, TestRoot};

#[test]
fn next_task_prefers_in_progress_then_priority() {
    let root = TestRoot::new();
    root.add_with("low", |task| task.priority = Priority::Low);
    root.add_with("urgent", |task| task.priority = Priority::Critical);
    root.add_with("started", |task| {
        task.status = TaskStatus::InProgress;
        task.priority = Priority::Low;
    });

    let next = root.store().find_next_task(None).unwrap().expect("a task");
    assert_eq!(next.id, "started");

    let patch = taskmd::TaskPatch {
        status: Some(TaskStatus::Done),
        ..Default::default()
    };
    root.store().update("started", &patch, None).unwrap();
    let next = root.store().find_next_task(None).unwrap().expect("a task");
    assert_eq!(next.id, "urgent");
}

#[test]
fn next_task_waits_for_dependencies() {
    let root = TestRoot::new();
    root.add_with("build", |task| task.priority = Priority::Low);
    root.add_with("ship", |task| {
        task.priority = Priority::Critical;
        task.relations.depends_on = vec!["build".to_string()];
    });
    root.add_with("stuck", |task| {
        task.priority = Priority::Critical;
        task.status = TaskStatus::Blocked;
    });

    let next = root.store().find_next_task(None).unwrap().expect("a task");
    assert_eq!(next.id, "build");
}

#[test]
fn next_task_follows_phase_order_and_scope() {
    let root = TestRoot::new();
    root.store()
        .create_phase("later", None, None, Some(2))
        .unwrap();
    root.store()
        .create_phase("first", None, None, Some(1))
        .unwrap();
    root.add("b-task", Some(&Location::in_phase("later")));
    root.add("a-task", Some(&Location::in_phase("first")));

    let next = root.store().find_next_task(None).unwrap().expect("a task");
    assert_eq!(next.id, "a-task");

    let scoped = root
        .store()
        .find_next_task(Some("later"))
        .unwrap()
        .expect("a task");
    assert_eq!(scoped.id, "b-task");
}

#[test]
fn nothing_ready_gives_none() {
    let root = TestRoot::new();
    root.add_with("done", |task| task.status = TaskStatus::Done);
    assert!(root.store().find_next_task(None).unwrap().is_none());
}

#[test]
fn list_filters_and_hides_completed_by_default() {
    let root = TestRoot::new();
    root.add_with("open", |task| task.tags = vec!["backend".to_string()]);
    root.add_with("closed", |task| {
        task.status = TaskStatus::Done;
        task.tags = vec!["backend".to_string()];
    });
    root.add_with("other", |task| task.assigned_to = Some("sam".to_string()));

    let default = ids(&root.store().list(&TaskFilter::default()).unwrap());
    assert!(default.contains(&"open".to_string()));
    assert!(!default.contains(&"closed".to_string()));

    let tagged = TaskFilter {
        tag: Some("BACKEND".to_string()),
        include_completed: true,
        ..TaskFilter::default()
    };
    let mut tagged = ids(&root.store().list(&tagged).unwrap());
    tagged.sort();
    assert_eq!(tagged, vec!["closed", "open"]);

    let done = TaskFilter {
        status: Some(TaskStatus::Done),
        ..TaskFilter::default()
    };
    assert_eq!(ids(&root.store().list(&done).unwrap()), vec!["closed"]);

    let assigned = TaskFilter {
        assigned_to: Some("sam".to_string()),
        ..TaskFilter::default()
    };
    assert_eq!(ids(&root.store().list(&assigned).unwrap()), vec!["other"]);
}

#[test]
fn listing_skips_unreadable_documents() {
    let root = TestRoot::new();
    root.add("good", None);
    root.write_file("broken.md", "---\nid: [unterminated\n---\n");

    let listed = ids(&root.store().list(&TaskFilter::default()).unwrap());
    assert_eq!(listed, vec!["good"]);
}

#[test]
fn dependency_lookups_go_both_ways() {
    let root = TestRoot::new();
    root.add("base", None);
    root.add_with("top", |task| {
        task.relations.depends_on = vec!["base".to_string(), "ghost".to_string()]
    });

    assert_eq!(ids(&root.store().dependents_of("base").unwrap()), vec!["top"]);
    assert_eq!(ids(&root.store().dependencies_of("top").unwrap()), vec!["base"]);
}

#[test]
fn siblings_share_a_parent_in_sequence_order() {
    let root = TestRoot::new();
    root.add("parent", None);
    for id in ["c1", "c2", "c3"] {
        root.add_with(id, |task| task.relations.parent_task = Some("parent".to_string()));
    }
    root.add("loose", None);
    root.store()
        .reorder_subtasks(
            "parent",
            &["c3".to_string(), "c1".to_string(), "c2".to_string()],
        )
        .unwrap();

    assert_eq!(ids(&root.store().siblings_of("c1").unwrap()), vec!["c3", "c2"]);
    assert_eq!(ids(&root.store().siblings_of("c3").unwrap()), vec!["c1", "c2"]);
}

#[test]
fn parentless_siblings_stay_in_their_directory() {
    let root = TestRoot::new();
    root.add("b", None);
    root.add("a", None);
    root.add("elsewhere", Some(&Location::in_phase("alpha")));
    root.add_with("child", |task| task.relations.parent_task = Some("a".to_string()));
    root.store()
        .create(Task::new(OVERVIEW_ID, "Root overview"), None)
        .unwrap();

    assert_eq!(ids(&root.store().siblings_of("b").unwrap()), vec!["a"]);
    assert!(root.store().siblings_of("elsewhere").unwrap().is_empty());
    assert!(root.store().siblings_of("ghost").unwrap_err().is_not_found());
}
