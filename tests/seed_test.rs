mod helpers;

use filedrop::services::object_store::ObjectStore;
use filedrop::services::reader::RECENT_LIMIT;
use filedrop::services::seed::seed_catalog;
use filedrop::services::seen::SeenFiles;
use tempfile::TempDir;

use helpers::{BUCKET, TestApp, collect};

#[tokio::test]
async fn seed_ingests_directory_files_in_name_order() {
    let app = TestApp::new().await;
    let seed_dir = TempDir::new().unwrap();
    std::fs::write(seed_dir.path().join("b.csv"), "id,qty\n1,4\n").unwrap();
    std::fs::write(seed_dir.path().join("a.txt"), "hello").unwrap();
    std::fs::create_dir(seed_dir.path().join("nested")).unwrap();

    let seeded = seed_catalog(&app.state.catalog, &app.state.pipeline, seed_dir.path())
        .await
        .expect("seed failed");

    assert_eq!(seeded, 2);
    assert_eq!(app.file_count().await, 2);
    assert!(app.notifier.sent().is_empty());

    let first = app.state.catalog.get(1).await.unwrap();
    assert_eq!(first.name, "a.txt");
    assert_eq!(first.size, 5);
    let (_, body) = app.store.get(BUCKET, &first.object_key).await.unwrap();
    assert_eq!(collect(body).await, b"hello");

    let listed = app
        .state
        .reader
        .list_recent(RECENT_LIMIT, &SeenFiles::new(50))
        .await
        .unwrap();
    assert_eq!(listed[0].file.name, "b.csv");
}

#[tokio::test]
async fn seed_fails_for_missing_directory() {
    let app = TestApp::new().await;
    let missing = std::env::temp_dir().join("filedrop-no-such-seed-dir");

    let result = seed_catalog(&app.state.catalog, &app.state.pipeline, &missing).await;

    assert!(result.is_err());
    assert_eq!(app.file_count().await, 0);
}
