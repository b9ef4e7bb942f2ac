//! End-to-end tests across cache, sync and calendar resolution.
//!
//! The remote catalog is a mockito server; the cache is a real SQLite file
//! in a temp directory.

use std::sync::Arc;

use campuscal_core::auth::DatabaseTokenStore;
use campuscal_core::calendar::{EventSchedule, Shape};
use campuscal_core::storage::{Config, Database};
use campuscal_core::{
    generate, ingest_all, resolve, AuthTokenGuard, EventRecord, EventType, HttpCatalog,
    SyncCoordinator, SyncResult, UserIdentity,
};
use chrono::NaiveDate;

// ============================================================================
// Test Helpers
// ============================================================================

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn open_db(dir: &tempfile::TempDir) -> Arc<Database> {
    Arc::new(Database::open_at(&dir.path().join("campuscal.db")).unwrap())
}

fn logged_in(db: &Arc<Database>) -> Arc<AuthTokenGuard> {
    let guard = AuthTokenGuard::new(DatabaseTokenStore::new(Arc::clone(db))).unwrap();
    guard
        .save_auth_data("e2e-token", "2099-12-31T00:00:00Z", UserIdentity::new("student-1"))
        .unwrap();
    Arc::new(guard)
}

async fn mock_catalog(server: &mut mockito::ServerGuard) {
    server
        .mock("GET", "/organizations")
        .match_header("authorization", "Bearer e2e-token")
        .with_status(200)
        .with_body(r#"{"items":[{"id":"o1","name":"Faculty of Science"}],"total":1}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/channels")
        .with_status(200)
        .with_body(
            r#"{"items":[
                {"id":"ch-1","organizationId":"o1","name":"Robotics Club"},
                {"id":"ch-2","organizationId":"o1","name":"Chess Club"}
            ],"total":2}"#,
        )
        .create_async()
        .await;
    server
        .mock("GET", "/users/student-1/subscriptions")
        .with_status(200)
        .with_body(
            r#"{"items":[{"id":"s1","userId":"student-1","channelId":"ch-1","createdAt":"2025-01-02T08:00:00Z"}],"total":1}"#,
        )
        .create_async()
        .await;
}

// ============================================================================
// Sync
// ============================================================================

#[tokio::test]
async fn sync_fills_cache_from_remote() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir);
    let auth = logged_in(&db);
    let mut server = mockito::Server::new_async().await;
    mock_catalog(&mut server).await;

    let mut config = Config::default();
    config.remote.base_url = server.url();
    let catalog = HttpCatalog::new(&config.remote, Arc::clone(&auth)).unwrap();
    let sync = SyncCoordinator::new(catalog, Arc::clone(&db), auth, config.sync.clone());

    assert!(sync.should_sync());
    let result = sync.sync_all().await;
    assert!(result.is_success(), "{result}");
    assert!(!sync.should_sync());

    assert_eq!(db.list_organizations().unwrap().len(), 1);
    assert_eq!(db.list_channels().unwrap().len(), 2);
    assert_eq!(db.list_subscriptions().unwrap()[0].channel_id, "ch-1");
}

#[tokio::test]
async fn failing_endpoint_gives_partial_success() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir);
    let auth = logged_in(&db);
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/organizations")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;
    server
        .mock("GET", "/channels")
        .with_status(200)
        .with_body(r#"{"items":[],"total":0}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/users/student-1/subscriptions")
        .with_status(200)
        .with_body(r#"{"items":[],"total":0}"#)
        .create_async()
        .await;

    let mut config = Config::default();
    config.remote.base_url = server.url();
    let catalog = HttpCatalog::new(&config.remote, Arc::clone(&auth)).unwrap();
    let sync = SyncCoordinator::new(catalog, Arc::clone(&db), auth, config.sync);

    match sync.sync_all().await {
        SyncResult::PartialSuccess { errors, .. } => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].starts_with("organizations: "));
            assert!(errors[0].contains("500"));
        }
        other => panic!("expected partial success, got {other:?}"),
    }
    assert!(sync.state().last_sync_at.is_some());
}

#[tokio::test]
async fn logged_out_user_cannot_sync() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir);
    let auth = logged_in(&db);
    auth.clear_auth_data().unwrap();

    let mut server = mockito::Server::new_async().await;
    let never = server
        .mock("GET", mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let mut config = Config::default();
    config.remote.base_url = server.url();
    let catalog = HttpCatalog::new(&config.remote, Arc::clone(&auth)).unwrap();
    let sync = SyncCoordinator::new(catalog, Arc::clone(&db), auth, config.sync);

    let result = sync.sync_all().await;
    assert_eq!(result.message(), "not authenticated");
    never.assert_async().await;
}

// ============================================================================
// Cache to month view
// ============================================================================

#[test]
fn cached_events_resolve_into_month_view() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir);

    let mut lab = EventRecord::new(
        "lab",
        "Physics lab week",
        EventSchedule::Dated {
            start: date(2025, 1, 10),
            end: date(2025, 1, 12),
        },
        EventType::Personal,
    );
    lab.location = Some("Building C".into());
    let club = EventRecord::new(
        "club",
        "Robotics kickoff",
        EventSchedule::Dated {
            start: date(2025, 1, 11),
            end: date(2025, 1, 11),
        },
        EventType::Subscribed,
    );
    let exams = EventRecord::new(
        "exams",
        "Exam period",
        EventSchedule::LegacyMonth { month: 1 },
        EventType::Institutional,
    );
    let mut hidden = EventRecord::new(
        "party",
        "Hidden party",
        EventSchedule::Dated {
            start: date(2025, 1, 20),
            end: date(2025, 1, 20),
        },
        EventType::Personal,
    );
    hidden.visible = false;

    for record in [&lab, &club, &exams, &hidden] {
        db.upsert_event(record).unwrap();
    }

    let events = ingest_all(&db.list_events().unwrap(), 2025).unwrap();
    let grid = generate(2025, 1).unwrap();
    let occurrences = resolve(&events, 2025, 1).unwrap();

    assert_eq!(grid.day_count(), 31);
    // The legacy month event covers every day.
    assert_eq!(occurrences.len(), 31);

    assert_eq!(occurrences[&1].shape, Shape::Start);
    assert_eq!(occurrences[&31].shape, Shape::End);

    // Institutional outranks personal.
    let day10 = &occurrences[&10];
    assert_eq!(day10.primary.id, "exams");
    assert_eq!(day10.shape, Shape::Middle);
    assert_eq!(day10.additional[0].id, "lab");

    let day11 = &occurrences[&11];
    assert_eq!(day11.primary.id, "exams");
    let ids: Vec<&str> = day11.events().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["exams", "club", "lab"]);

    assert!(occurrences[&20].events().all(|e| e.id != "party"));
}

#[test]
fn month_view_is_deterministic_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = open_db(&dir);
        db.upsert_event(&EventRecord::new(
            "fair",
            "Career fair",
            EventSchedule::Dated {
                start: date(2025, 2, 27),
                end: date(2025, 3, 2),
            },
            EventType::Institutional,
        ))
        .unwrap();
    }

    let db = open_db(&dir);
    let events = ingest_all(&db.list_events().unwrap(), 2025).unwrap();
    let first = resolve(&events, 2025, 3).unwrap();
    let second = resolve(&events, 2025, 3).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );

    // Clipped at the month boundary: no Start in March.
    assert_eq!(first[&1].shape, Shape::Middle);
    assert_eq!(first[&2].shape, Shape::End);
    assert!(!first.contains_key(&3));
}
