use strata::db;
use strata::db::migrations::{
    get_embedding_model, get_schema_version, run_migrations, CURRENT_SCHEMA_VERSION,
    LEGACY_EMBEDDING_MODEL,
};
use tempfile::TempDir;

#[test]
fn fresh_db_migrates_to_current_version() {
    let conn = db::open_in_memory().unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn migrations_are_idempotent() {
    let mut conn = db::open_in_memory().unwrap();
    run_migrations(&mut conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn v1_db_on_disk_upgrades_when_opened() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("project.db");

    // Simulate a database written before the model key was tracked.
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        db::schema::init_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
        assert!(get_embedding_model(&conn).unwrap().is_none());
    }

    let conn = db::open_database(&path).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    assert_eq!(
        get_embedding_model(&conn).unwrap().as_deref(),
        Some(LEGACY_EMBEDDING_MODEL)
    );
}
