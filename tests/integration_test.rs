// tests/integration_test.rs

//! Integration tests for pkcore
//!
//! These tests drive the backend operations against a real SQLite database
//! and a repository directory on disk.

use pkcore::backend;
use pkcore::config::EngineConfig;
use pkcore::db::lock::DatabaseLock;
use pkcore::db::models::{Changeset, InstalledPackage};
use pkcore::db::{self, SqliteDatabase};
use pkcore::filter::FilterSpec;
use pkcore::job::RecordingSink;
use pkcore::package::PackageId;
use pkcore::query::Info;
use pkcore::{ErrorKind, repository};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir, tempdir};

fn write_index(dir: &Path, packages: &str) {
    let index = format!(r#"{{"name": "current", "packages": [{}]}}"#, packages);
    fs::write(dir.join(repository::INDEX_FILE), index).unwrap();
}

const LIBFOO_1_0: &str = r#"{"name": "libfoo", "version": "1.0_1", "architecture": "x86_64",
    "description": "Foo runtime library"}"#;
const LIBFOO_1_1: &str = r#"{"name": "libfoo", "version": "1.1_1", "architecture": "x86_64",
    "description": "Foo runtime library"}"#;
const FOO: &str = r#"{"name": "foo", "version": "2.0_1", "architecture": "x86_64",
    "description": "The foo tool", "dependencies": ["libfoo>=1.0_1"]}"#;

struct Fixture {
    _temp: TempDir,
    repo_dir: PathBuf,
    config: EngineConfig,
    db: SqliteDatabase,
}

fn setup() -> Fixture {
    let temp = tempdir().unwrap();
    let repo_dir = temp.path().join("current");
    fs::create_dir_all(&repo_dir).unwrap();
    write_index(&repo_dir, &[LIBFOO_1_0, FOO].join(","));

    let db_path = temp.path().join("pkcore.db");
    let config = EngineConfig::new(db_path.to_str().unwrap()).with_arch("x86_64");
    let db = SqliteDatabase::open(&config).unwrap();
    repository::add_repository(
        db.connection(),
        "current".to_string(),
        repo_dir.to_str().unwrap().to_string(),
        true,
        0,
    )
    .unwrap();

    let mut fixture = Fixture {
        _temp: temp,
        repo_dir,
        config,
        db,
    };
    let mut sink = RecordingSink::default();
    backend::refresh_cache(&mut fixture.db, false, &mut sink);
    assert!(sink.errors.is_empty(), "refresh failed: {:?}", sink.errors);
    fixture
}

fn id(name: &str, version: &str) -> PackageId {
    PackageId::new(name, version, "x86_64", "current")
}

fn installed_names(db: &SqliteDatabase) -> Vec<String> {
    let mut names: Vec<String> = InstalledPackage::list_all(db.connection())
        .unwrap()
        .into_iter()
        .map(|p| format!("{}-{}", p.name, p.version))
        .collect();
    names.sort();
    names
}

#[test]
fn test_database_lifecycle() {
    let temp_file = NamedTempFile::new().unwrap();
    let db_path = temp_file.path().to_str().unwrap().to_string();
    drop(temp_file);

    db::init(&db_path).unwrap();
    assert!(Path::new(&db_path).exists());

    let conn = db::open(&db_path).unwrap();
    let result: i32 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
    assert_eq!(result, 1);
}

#[test]
fn test_refresh_and_list_available() {
    let fixture = setup();
    let mut sink = RecordingSink::default();
    backend::get_packages(&fixture.db, FilterSpec::NONE, &mut sink);

    assert_eq!(sink.finished, 1);
    assert!(sink.errors.is_empty());
    let ids: Vec<String> = sink.packages.iter().map(|e| e.id.to_string()).collect();
    assert_eq!(
        ids,
        vec!["libfoo;1.0_1;x86_64;current", "foo;2.0_1;x86_64;current"]
    );
    assert!(sink.packages.iter().all(|e| e.info == Info::Available));
}

#[test]
fn test_install_pulls_dependencies() {
    let mut fixture = setup();
    let mut sink = RecordingSink::default();
    backend::install_packages(&mut fixture.db, &[id("foo", "2.0_1")], &mut sink);

    assert!(sink.errors.is_empty(), "install failed: {:?}", sink.errors);
    assert_eq!(sink.finished, 1);
    assert_eq!(installed_names(&fixture.db), vec!["foo-2.0_1", "libfoo-1.0_1"]);

    let mut sink = RecordingSink::default();
    backend::get_packages(&fixture.db, "installed".parse().unwrap(), &mut sink);
    assert_eq!(sink.packages.len(), 2);
    assert!(sink.packages.iter().all(|e| e.info == Info::Installed));

    let history = Changeset::list_all(fixture.db.connection()).unwrap();
    assert_eq!(history.len(), 1);

    // Installing again is already satisfied
    let mut sink = RecordingSink::default();
    backend::install_packages(&mut fixture.db, &[id("foo", "2.0_1")], &mut sink);
    assert_eq!(sink.errors[0].kind, ErrorKind::AlreadySatisfied);
}

#[test]
fn test_install_blocked_by_lock_holder() {
    let mut fixture = setup();
    let mut holder = DatabaseLock::new(fixture.config.lock_path.clone());
    holder.acquire().unwrap();

    let mut sink = RecordingSink::default();
    backend::install_packages(&mut fixture.db, &[id("libfoo", "1.0_1")], &mut sink);
    assert_eq!(sink.errors.len(), 1);
    assert_eq!(sink.errors[0].kind, ErrorKind::LockUnavailable);
    assert_eq!(sink.finished, 1);
    assert!(installed_names(&fixture.db).is_empty());

    holder.release();
    let mut sink = RecordingSink::default();
    backend::install_packages(&mut fixture.db, &[id("libfoo", "1.0_1")], &mut sink);
    assert!(sink.errors.is_empty());
}

#[test]
fn test_remove_dependency_requires_allow_deps() {
    let mut fixture = setup();
    let mut sink = RecordingSink::default();
    backend::install_packages(&mut fixture.db, &[id("foo", "2.0_1")], &mut sink);
    assert!(sink.errors.is_empty());

    let mut sink = RecordingSink::default();
    backend::remove_packages(&mut fixture.db, &[id("libfoo", "1.0_1")], false, false, &mut sink);
    assert_eq!(sink.errors[0].kind, ErrorKind::DependencyError);
    assert_eq!(installed_names(&fixture.db).len(), 2);

    let mut sink = RecordingSink::default();
    backend::remove_packages(&mut fixture.db, &[id("libfoo", "1.0_1")], true, false, &mut sink);
    assert!(sink.errors.is_empty(), "remove failed: {:?}", sink.errors);
    assert!(installed_names(&fixture.db).is_empty());
}

#[test]
fn test_autoremove_drops_unused_dependencies() {
    let mut fixture = setup();
    let mut sink = RecordingSink::default();
    backend::install_packages(&mut fixture.db, &[id("foo", "2.0_1")], &mut sink);

    let mut sink = RecordingSink::default();
    backend::remove_packages(&mut fixture.db, &[id("foo", "2.0_1")], false, true, &mut sink);
    assert!(sink.errors.is_empty());
    assert!(installed_names(&fixture.db).is_empty());
}

#[test]
fn test_detect_and_apply_update() {
    let mut fixture = setup();
    let mut sink = RecordingSink::default();
    backend::install_packages(&mut fixture.db, &[id("foo", "2.0_1")], &mut sink);

    let mut sink = RecordingSink::default();
    backend::get_updates(&fixture.db, FilterSpec::NONE, &mut sink);
    assert!(sink.packages.is_empty());

    write_index(&fixture.repo_dir, &[LIBFOO_1_1, FOO].join(","));
    let mut sink = RecordingSink::default();
    backend::refresh_cache(&mut fixture.db, true, &mut sink);
    assert!(sink.errors.is_empty());

    let mut sink = RecordingSink::default();
    backend::get_updates(&fixture.db, FilterSpec::NONE, &mut sink);
    assert_eq!(sink.packages.len(), 1);
    assert_eq!(sink.packages[0].info, Info::Normal);
    assert_eq!(sink.packages[0].id, id("libfoo", "1.1_1"));

    let mut sink = RecordingSink::default();
    backend::update_packages(&mut fixture.db, &[id("libfoo", "1.1_1")], &mut sink);
    assert!(sink.errors.is_empty(), "update failed: {:?}", sink.errors);
    assert_eq!(installed_names(&fixture.db), vec!["foo-2.0_1", "libfoo-1.1_1"]);

    let mut sink = RecordingSink::default();
    backend::get_updates(&fixture.db, FilterSpec::NONE, &mut sink);
    assert!(sink.packages.is_empty());
}

#[test]
fn test_search_and_resolve() {
    let mut fixture = setup();
    let mut sink = RecordingSink::default();
    backend::install_packages(&mut fixture.db, &[id("libfoo", "1.0_1")], &mut sink);

    let mut sink = RecordingSink::default();
    backend::search_details(&fixture.db, FilterSpec::NONE, &["TOOL".to_string()], &mut sink);
    assert_eq!(sink.packages.len(), 1);
    assert_eq!(sink.packages[0].id.name, "foo");

    let mut sink = RecordingSink::default();
    let names = vec!["libfoo".to_string(), "foo".to_string(), "missing".to_string()];
    backend::resolve(&fixture.db, FilterSpec::NONE, &names, &mut sink);
    let tagged: Vec<(Info, String)> = sink
        .packages
        .iter()
        .map(|e| (e.info, e.id.name.clone()))
        .collect();
    assert_eq!(
        tagged,
        vec![
            (Info::Installed, "libfoo".to_string()),
            (Info::Available, "foo".to_string())
        ]
    );
}
