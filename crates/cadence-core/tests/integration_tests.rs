use cadence_core::db::establish_connection;
use cadence_core::error::CoreError;
use cadence_core::lifecycle::{Mutation, ScopeAction};
use cadence_core::models::*;
use cadence_core::recurrence::is_valid_occurrence;
use cadence_core::repository::{
    MaterializationRepository, ScopeRepository, SeriesRepository, SqliteRepository, TaskStore,
};
use cadence_core::timezone::Clock;
use chrono::{Duration, NaiveDate};
use tempfile::TempDir;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Helper function to create a test database
async fn setup_test_db(generation_limit: u32, today: NaiveDate) -> (SqliteRepository, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = establish_connection(&db_path.to_string_lossy())
        .await
        .expect("Failed to establish test database connection");

    let config = SeriesConfig {
        generation_limit,
        ..Default::default()
    };
    let repository = SqliteRepository::new(pool, config).with_clock(Clock::fixed_on(today));

    (repository, temp_dir)
}

fn template(title: &str, due_date: Option<NaiveDate>) -> NewTaskData {
    NewTaskData {
        title: title.to_string(),
        description: Some(format!("Test series: {}", title)),
        priority: Some(TaskPriority::Medium),
        effort: Some(3),
        due_date,
        ..Default::default()
    }
}

/// Daily series anchored at `start`.
async fn create_daily(repo: &SqliteRepository, start: NaiveDate, end: EndCondition) -> SeriesCreated {
    repo.create_series(
        template("Daily review", Some(start)),
        RecurrenceConfig::new(Frequency::Daily, 1).with_end(end),
        vec![],
        vec![],
    )
    .await
    .expect("Failed to create daily series")
}

async fn task_on(repo: &SqliteRepository, master_id: Uuid, day: NaiveDate) -> Option<Task> {
    repo.find_series_tasks(master_id)
        .await
        .expect("Failed to load series tasks")
        .into_iter()
        .find(|t| t.due_date == Some(day))
}

fn rename(title: &str) -> UpdateTaskData {
    UpdateTaskData {
        title: Some(title.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_weekly_series_with_count_is_fully_materialized() {
    let (repo, _temp_dir) = setup_test_db(20, date(2025, 1, 6)).await;

    let config = RecurrenceConfig::new(Frequency::Weekly, 1)
        .with_days_of_week([1, 3, 5])
        .with_end(EndCondition::Count(6));
    let created = repo
        .create_series(template("Gym", Some(date(2025, 1, 6))), config, vec![], vec![])
        .await
        .unwrap();

    assert_eq!(
        created.rule.rrule,
        "DTSTART:20250106T000000Z\nRRULE:FREQ=WEEKLY;INTERVAL=1;BYDAY=MO,WE,FR;COUNT=6"
    );
    assert_eq!(created.rule.days_of_week.as_deref(), Some("1,3,5"));
    assert_eq!(created.rule.end_type, EndType::Count);
    assert_eq!(created.rule.end_count, Some(6));
    assert_eq!(created.rule.last_generated_date, Some(date(2025, 1, 17)));

    let dates: Vec<NaiveDate> = created.instances.iter().map(|i| i.instance.original_date).collect();
    assert_eq!(
        dates,
        vec![
            date(2025, 1, 6),
            date(2025, 1, 8),
            date(2025, 1, 10),
            date(2025, 1, 13),
            date(2025, 1, 15),
            date(2025, 1, 17),
        ]
    );

    assert!(created.master_task.is_master());
    for materialized in &created.instances {
        assert_eq!(materialized.task.recurring_master_id, Some(created.master_task.id));
        assert_eq!(materialized.task.due_date, Some(materialized.instance.original_date));
        assert_eq!(materialized.task.status, TaskStatus::Todo);
        assert_eq!(materialized.task.title, "Gym");
        assert!(!materialized.task.is_recurring);
    }

    // The rule is exhausted, so a further call yields nothing
    let more = repo
        .generate_instances(created.rule.id, date(2025, 1, 6), 20)
        .await
        .unwrap();
    assert!(more.is_empty());
}

#[tokio::test]
async fn test_anchor_defaults_to_today_in_series_timezone() {
    let (repo, _temp_dir) = setup_test_db(3, date(2025, 1, 6)).await;

    let config = RecurrenceConfig::new(Frequency::Weekly, 1)
        .with_days_of_week([3])
        .with_timezone("Europe/Berlin");
    let created = repo
        .create_series(template("Sync", None), config, vec![], vec![])
        .await
        .unwrap();

    assert_eq!(created.master_task.due_date, Some(date(2025, 1, 6)));
    assert_eq!(created.rule.start_date, date(2025, 1, 6));
    assert_eq!(created.rule.timezone, "Europe/Berlin");
    assert_eq!(created.instances.len(), 3);
    assert_eq!(created.instances[0].instance.original_date, date(2025, 1, 8));
}

#[tokio::test]
async fn test_generation_is_bounded_and_idempotent() {
    let start = date(2025, 2, 1);
    let (repo, _temp_dir) = setup_test_db(5, start).await;
    let created = create_daily(&repo, start, EndCondition::Never).await;
    assert_eq!(created.instances.len(), 5);

    // Requests above the limit are clamped
    let next = repo.generate_instances(created.rule.id, start, 100).await.unwrap();
    let dates: Vec<NaiveDate> = next.iter().map(|i| i.instance.original_date).collect();
    assert_eq!(dates, (5..10).map(|d| start + Duration::days(d)).collect::<Vec<_>>());

    let rule = repo.find_rule_by_id(created.rule.id).await.unwrap().unwrap();
    assert_eq!(rule.last_generated_date, Some(start + Duration::days(9)));

    // Nothing already materialized is created twice
    let instances = repo.find_instances(created.rule.id).await.unwrap();
    assert_eq!(instances.len(), 10);
    let mut unique: Vec<_> = instances.iter().map(|i| i.original_date).collect();
    unique.dedup();
    assert_eq!(unique.len(), 10);
}

#[tokio::test]
async fn test_tags_and_assignees_are_copied_to_instances() {
    let start = date(2025, 2, 1);
    let (repo, _temp_dir) = setup_test_db(2, start).await;
    let tag = Uuid::now_v7();
    let assignee = Uuid::now_v7();

    let created = repo
        .create_series(
            template("Standup", Some(start)),
            RecurrenceConfig::new(Frequency::Daily, 1),
            vec![tag],
            vec![assignee],
        )
        .await
        .unwrap();

    for materialized in &created.instances {
        assert_eq!(repo.find_task_tags(materialized.task.id).await.unwrap(), vec![tag]);
        assert_eq!(
            repo.find_task_assignees(materialized.task.id).await.unwrap(),
            vec![assignee]
        );
        assert_eq!(materialized.task.effort, Some(3));
        assert_eq!(materialized.task.priority, TaskPriority::Medium);
    }
}

#[tokio::test]
async fn test_future_update_leaves_past_instances_alone() {
    let (d1, d2, d3) = (date(2025, 3, 3), date(2025, 3, 4), date(2025, 3, 5));
    let (repo, _temp_dir) = setup_test_db(20, d2).await;
    let created = create_daily(&repo, d1, EndCondition::Count(3)).await;
    let master_id = created.master_task.id;

    let target = task_on(&repo, master_id, d2).await.unwrap();
    let outcome = repo
        .update_series(target.id, rename("Evening review"), EditScope::Future)
        .await
        .unwrap();
    assert_eq!(outcome.task_ids.len(), 3);

    let master = repo.find_task_by_id(master_id).await.unwrap().unwrap();
    assert_eq!(master.title, "Evening review");
    assert_eq!(task_on(&repo, master_id, d1).await.unwrap().title, "Daily review");
    assert_eq!(task_on(&repo, master_id, d2).await.unwrap().title, "Evening review");
    assert_eq!(task_on(&repo, master_id, d3).await.unwrap().title, "Evening review");
}

#[tokio::test]
async fn test_this_update_detaches_from_series_edits() {
    let (d1, d2, d3) = (date(2025, 3, 3), date(2025, 3, 4), date(2025, 3, 5));
    let (repo, _temp_dir) = setup_test_db(20, d2).await;
    let created = create_daily(&repo, d1, EndCondition::Count(3)).await;
    let master_id = created.master_task.id;

    let first = task_on(&repo, master_id, d1).await.unwrap();
    repo.update_series(first.id, rename("Special review"), EditScope::This)
        .await
        .unwrap();

    let instance = repo.find_instance_by_task(first.id).await.unwrap().unwrap();
    assert_eq!(instance.state(), InstanceState::Exception);

    let master = repo.find_task_by_id(master_id).await.unwrap().unwrap();
    assert_eq!(master.title, "Daily review");

    repo.update_series(master_id, rename("Renamed"), EditScope::All)
        .await
        .unwrap();

    assert_eq!(task_on(&repo, master_id, d1).await.unwrap().title, "Special review");
    assert_eq!(task_on(&repo, master_id, d2).await.unwrap().title, "Renamed");
    assert_eq!(task_on(&repo, master_id, d3).await.unwrap().title, "Renamed");
    let master = repo.find_task_by_id(master_id).await.unwrap().unwrap();
    assert_eq!(master.title, "Renamed");
}

#[tokio::test]
async fn test_future_delete_ends_the_rule() {
    let (d1, d2, d3) = (date(2025, 3, 3), date(2025, 3, 4), date(2025, 3, 5));
    let (repo, _temp_dir) = setup_test_db(20, d2).await;
    let created = create_daily(&repo, d1, EndCondition::Never).await;
    let master_id = created.master_task.id;
    assert_eq!(created.instances.len(), 20);

    let target = task_on(&repo, master_id, d2).await.unwrap();
    let outcome = repo.delete_series(target.id, EditScope::Future).await.unwrap();
    assert_eq!(outcome.task_ids.len(), 19);

    let rule = outcome.rule.expect("rule should be rewritten");
    assert_eq!(rule.end_type, EndType::Until);
    // The rule stops producing dates from d2 on
    assert_eq!(rule.end_date, Some(d1));
    assert!(rule.rrule.ends_with("UNTIL=20250303T235959Z"));
    assert!(!is_valid_occurrence(&rule.rrule, d2).unwrap());

    let remaining = repo.find_series_tasks(master_id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].due_date, Some(d1));

    let instances = repo.find_instances(created.rule.id).await.unwrap();
    assert_eq!(instances.len(), 20);
    for instance in instances.iter().filter(|i| i.original_date >= d2) {
        assert_eq!(instance.state(), InstanceState::Deleted);
        assert_eq!(instance.task_id, None);
    }

    assert!(task_on(&repo, master_id, d3).await.is_none());
    let more = repo.generate_instances(created.rule.id, d1, 20).await.unwrap();
    assert!(more.is_empty());

    // Master and rule are kept for history
    assert!(repo.find_task_by_id(master_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_future_delete_keeps_exhausted_count() {
    let start = date(2025, 1, 1);
    let (repo, _temp_dir) = setup_test_db(20, date(2025, 1, 10)).await;
    let created = create_daily(&repo, start, EndCondition::Count(3)).await;
    let master_id = created.master_task.id;
    assert_eq!(created.instances.len(), 3);

    let outcome = repo.delete_series(master_id, EditScope::Future).await.unwrap();
    let rule = outcome.rule.expect("rule should be reported");
    assert_eq!(rule.end_type, EndType::Count);
    assert_eq!(rule.end_count, Some(3));
    assert!(rule.rrule.ends_with("COUNT=3"));
    assert!(!is_valid_occurrence(&rule.rrule, date(2025, 1, 4)).unwrap());

    let more = repo.generate_instances(created.rule.id, start, 20).await.unwrap();
    assert!(more.is_empty());
    let instances = repo.find_instances(created.rule.id).await.unwrap();
    assert_eq!(instances.len(), 3);
}

#[tokio::test]
async fn test_future_delete_inside_count_range() {
    let start = date(2025, 1, 1);
    let today = date(2025, 1, 3);
    let (repo, _temp_dir) = setup_test_db(20, today).await;
    let created = create_daily(&repo, start, EndCondition::Count(5)).await;
    let master_id = created.master_task.id;
    assert_eq!(created.instances.len(), 5);

    let target = task_on(&repo, master_id, today).await.unwrap();
    let outcome = repo.delete_series(target.id, EditScope::Future).await.unwrap();
    let rule = outcome.rule.expect("rule should be rewritten");
    assert_eq!(rule.end_type, EndType::Until);
    assert_eq!(rule.end_date, Some(date(2025, 1, 2)));

    let more = repo.generate_instances(created.rule.id, start, 20).await.unwrap();
    assert!(more.is_empty());
    let instances = repo.find_instances(created.rule.id).await.unwrap();
    assert!(instances.len() <= 5);

    let remaining = repo.find_series_tasks(master_id).await.unwrap();
    let dates: Vec<NaiveDate> = remaining.iter().filter_map(|t| t.due_date).collect();
    assert_eq!(dates, vec![start, date(2025, 1, 2)]);
}

#[tokio::test]
async fn test_deleted_occurrence_is_never_regenerated() {
    let (d1, d2) = (date(2025, 3, 3), date(2025, 3, 4));
    let (repo, _temp_dir) = setup_test_db(3, d1).await;
    let created = create_daily(&repo, d1, EndCondition::Never).await;
    let master_id = created.master_task.id;

    let target = task_on(&repo, master_id, d2).await.unwrap();
    let outcome = repo.delete_series(target.id, EditScope::This).await.unwrap();
    assert_eq!(outcome.task_ids, vec![target.id]);
    assert!(outcome.rule.is_none());
    assert!(repo.find_task_by_id(target.id).await.unwrap().is_none());

    let next = repo.generate_instances(created.rule.id, d1, 3).await.unwrap();
    let dates: Vec<NaiveDate> = next.iter().map(|i| i.instance.original_date).collect();
    assert_eq!(dates, vec![date(2025, 3, 6), date(2025, 3, 7), date(2025, 3, 8)]);
    assert!(task_on(&repo, master_id, d2).await.is_none());
}

#[tokio::test]
async fn test_all_delete_cascades() {
    let d1 = date(2025, 3, 3);
    let (repo, _temp_dir) = setup_test_db(4, d1).await;
    let created = create_daily(&repo, d1, EndCondition::Never).await;
    let master_id = created.master_task.id;
    let instance_task = created.instances[2].task.id;

    let outcome = repo.delete_series(instance_task, EditScope::All).await.unwrap();
    assert_eq!(outcome.task_ids.len(), 5);
    assert_eq!(outcome.task_ids[0], master_id);

    assert!(repo.find_task_by_id(master_id).await.unwrap().is_none());
    assert!(repo.find_task_by_id(instance_task).await.unwrap().is_none());
    assert!(repo.find_rule_by_id(created.rule.id).await.unwrap().is_none());
    assert!(repo.find_instances(created.rule.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_plan_scope_matches_what_delete_touches() {
    let (d1, d2) = (date(2025, 3, 3), date(2025, 3, 4));
    let (repo, _temp_dir) = setup_test_db(3, d2).await;
    let created = create_daily(&repo, d1, EndCondition::Never).await;

    let plan = repo
        .plan_scope(created.master_task.id, Mutation::Delete, EditScope::Future)
        .await
        .unwrap();
    assert!(matches!(plan.action, ScopeAction::DeleteInstances { .. }));
    assert_eq!(plan.affected_dates(), vec![d2, date(2025, 3, 5)]);

    // Planning changes nothing
    assert_eq!(repo.find_series_tasks(created.master_task.id).await.unwrap().len(), 3);

    let outcome = repo
        .delete_series(created.master_task.id, EditScope::Future)
        .await
        .unwrap();
    assert_eq!(outcome.task_ids, plan.affected_task_ids());
}

#[tokio::test]
async fn test_moving_onto_occupied_date_conflicts() {
    // Mondays
    let start = date(2025, 1, 6);
    let (repo, _temp_dir) = setup_test_db(3, start).await;
    let created = repo
        .create_series(
            template("Planning", Some(start)),
            RecurrenceConfig::new(Frequency::Weekly, 1).with_days_of_week([1]),
            vec![],
            vec![],
        )
        .await
        .unwrap();
    let first = created.instances[0].task.id;

    let onto_next_monday = UpdateTaskData {
        due_date: Some(date(2025, 1, 13)),
        ..Default::default()
    };
    let err = repo
        .update_series(first, onto_next_monday, EditScope::This)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ScopeFailed { scope: EditScope::This, .. }));
    assert!(matches!(err.root(), CoreError::Conflict(_)));

    // Tuesday is not produced by the rule, so the move is free
    let onto_tuesday = UpdateTaskData {
        due_date: Some(date(2025, 1, 7)),
        ..Default::default()
    };
    repo.update_series(first, onto_tuesday, EditScope::This).await.unwrap();
    let moved = repo.find_task_by_id(first).await.unwrap().unwrap();
    assert_eq!(moved.due_date, Some(date(2025, 1, 7)));

    // The original slot stays reserved
    let instance = repo.find_instance_by_task(first).await.unwrap().unwrap();
    assert_eq!(instance.original_date, start);
    assert!(instance.is_exception);
}

#[tokio::test]
async fn test_due_date_change_requires_this_scope() {
    let start = date(2025, 1, 6);
    let (repo, _temp_dir) = setup_test_db(3, start).await;
    let created = create_daily(&repo, start, EndCondition::Never).await;

    let updates = UpdateTaskData {
        due_date: Some(date(2025, 2, 1)),
        ..Default::default()
    };
    let err = repo
        .update_series(created.instances[0].task.id, updates, EditScope::Future)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn test_this_scope_on_master_is_rejected() {
    let start = date(2025, 1, 6);
    let (repo, _temp_dir) = setup_test_db(3, start).await;
    let created = create_daily(&repo, start, EndCondition::Never).await;

    let err = repo
        .delete_series(created.master_task.id, EditScope::This)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn test_paused_rule_generates_nothing() {
    let start = date(2025, 1, 6);
    let (repo, _temp_dir) = setup_test_db(3, start).await;
    let created = create_daily(&repo, start, EndCondition::Never).await;

    let paused = repo.set_paused(created.rule.id, true).await.unwrap();
    assert!(paused.is_paused);
    assert!(repo
        .generate_instances(created.rule.id, start, 3)
        .await
        .unwrap()
        .is_empty());

    repo.set_paused(created.rule.id, false).await.unwrap();
    let resumed = repo.generate_instances(created.rule.id, start, 3).await.unwrap();
    assert_eq!(resumed.len(), 3);
}

#[tokio::test]
async fn test_update_pattern_rewrites_both_representations() {
    let start = date(2025, 1, 6);
    let (repo, _temp_dir) = setup_test_db(2, start).await;
    let created = repo
        .create_series(
            template("Lessons", Some(start)),
            RecurrenceConfig::new(Frequency::Weekly, 1).with_days_of_week([1]),
            vec![],
            vec![],
        )
        .await
        .unwrap();

    let instance_task = created.instances[0].task.id;
    let new_config = RecurrenceConfig::new(Frequency::Weekly, 1)
        .with_days_of_week([2, 4])
        .with_end(EndCondition::Count(4));
    let rule = repo.update_pattern(instance_task, new_config).await.unwrap();

    assert_eq!(rule.id, created.rule.id);
    assert_eq!(rule.start_date, start);
    assert!(rule.rrule.contains("BYDAY=TU,TH;COUNT=4"));
    assert_eq!(rule.days_of_week.as_deref(), Some("2,4"));
    assert_eq!(rule.end_type, EndType::Count);
    assert_eq!(rule.end_count, Some(4));

    // Existing instances are untouched
    assert_eq!(repo.find_instances(rule.id).await.unwrap().len(), 2);

    let next = repo.generate_instances(rule.id, start, 2).await.unwrap();
    let dates: Vec<NaiveDate> = next.iter().map(|i| i.instance.original_date).collect();
    assert_eq!(dates, vec![date(2025, 1, 7), date(2025, 1, 9)]);
}

#[tokio::test]
async fn test_invalid_pattern_is_rejected_without_side_effects() {
    let start = date(2025, 1, 6);
    let (repo, _temp_dir) = setup_test_db(3, start).await;

    let err = repo
        .create_series(
            template("Broken", Some(start)),
            RecurrenceConfig::new(Frequency::Monthly, 1),
            vec![],
            vec![],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let err = repo
        .create_series(
            template("Broken", Some(start)),
            RecurrenceConfig::new(Frequency::Daily, 1).with_timezone("Mars/Olympus"),
            vec![],
            vec![],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidTimezone(_)));

    assert!(repo.find_tasks_by_short_id_prefix("").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_plain_tasks_are_not_recurring() {
    let start = date(2025, 1, 6);
    let (repo, _temp_dir) = setup_test_db(3, start).await;

    let task = repo
        .add_task(template("One-off", Some(start)), vec![], vec![])
        .await
        .unwrap();
    assert!(!task.is_master());
    assert!(!task.is_instance());

    let err = repo.find_rule_for_task(task.id).await.unwrap_err();
    assert!(matches!(err, CoreError::NotRecurring(id) if id == task.id));

    let err = repo.delete_series(task.id, EditScope::All).await.unwrap_err();
    assert!(matches!(err, CoreError::NotRecurring(_)));

    let updated = repo.update_task(task.id, rename("Renamed")).await.unwrap();
    assert_eq!(updated.title, "Renamed");

    let short = &task.id.simple().to_string()[..8];
    let found = repo.find_tasks_by_short_id_prefix(short).await.unwrap();
    assert!(found.iter().any(|t| t.id == task.id));

    repo.delete_task(task.id).await.unwrap();
    assert!(repo.find_task_by_id(task.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_series_tasks_refuse_plain_edits() {
    let start = date(2025, 1, 6);
    let (repo, _temp_dir) = setup_test_db(3, start).await;
    let created = create_daily(&repo, start, EndCondition::Never).await;

    let err = repo
        .update_task(created.instances[0].task.id, rename("Nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    let err = repo.delete_task(created.master_task.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test]
async fn test_missing_records_are_not_found() {
    let start = date(2025, 1, 6);
    let (repo, _temp_dir) = setup_test_db(3, start).await;

    let err = repo
        .generate_instances(Uuid::now_v7(), start, 3)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    let err = repo
        .update_series(Uuid::now_v7(), rename("Ghost"), EditScope::All)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    let err = repo.set_paused(Uuid::now_v7(), true).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}
