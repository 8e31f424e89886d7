//! Tree reconciliation tests against the scripted daemon
//!
//! Covers:
//! - list-before-exists ordering of every `List`
//! - case-insensitive folder and file matching
//! - first-sync and timestamp upload decisions
//! - extension filter, nested remote folders, dry run and cleanup

mod common;

use common::{local_tree, rom, test_config, Call, MockTransport};
use romsync::{NoCallbacks, SyncManager, SyncStatus};

fn manager(mock: &MockTransport, config: romsync::SyncConfig) -> SyncManager {
	SyncManager::with_transport(config, mock.boxed(), Box::new(NoCallbacks))
}

#[tokio::test(start_paused = true)]
async fn test_kaizo_end_to_end() {
	let local = local_tree();
	rom(local.path(), "Kaizo/hack1.smc", b"hack one", 100);
	rom(local.path(), "Kaizo/hack2.smc", b"hack two", 50);
	let mock = MockTransport::new().with_file("/ROMs/kaizo/hack2.smc", b"old");

	let report = manager(&mock, test_config()).sync(local.path(), 60.0, false).await;

	assert_eq!(report.status, SyncStatus::Completed, "{:?}", report.error);
	assert_eq!(report.uploaded(), 1);
	assert_eq!(report.counters.skipped, 1);
	assert_eq!(report.counters.dirs_created, 0);
	assert_eq!(mock.put_paths(), vec!["/ROMs/kaizo/hack1.smc"]);
	assert_eq!(mock.file("/ROMs/kaizo/hack1.smc").unwrap(), b"hack one".to_vec());
	assert_eq!(mock.file("/ROMs/kaizo/hack2.smc").unwrap(), b"old".to_vec());

	// Root listed once, existing folder descended without re-listing its parent
	let lists = mock.listed_paths();
	assert_eq!(lists.iter().filter(|p| p.as_str() == "/").count(), 1);
	assert_eq!(&lists[..3], &["/", "/ROMs", "/ROMs/kaizo"]);
	mock.assert_lists_confirmed();
}

#[tokio::test(start_paused = true)]
async fn test_missing_folders_are_created_before_listing() {
	let local = local_tree();
	rom(local.path(), "top.sfc", b"top", 100);
	rom(local.path(), "Kaizo/Deep/a.smc", b"a", 100);
	let mock = MockTransport::new();

	let report = manager(&mock, test_config()).sync(local.path(), 0.0, false).await;

	assert!(report.is_complete(), "{:?}", report.error);
	assert_eq!(mock.made_dirs(), vec!["/ROMs", "/ROMs/Kaizo", "/ROMs/Kaizo/Deep"]);
	assert_eq!(report.counters.dirs_created, 3);
	assert_eq!(mock.put_paths(), vec!["/ROMs/top.sfc", "/ROMs/Kaizo/Deep/a.smc"]);
	mock.assert_lists_confirmed();

	let calls = mock.calls();
	let made = calls.iter().position(|c| *c == Call::MakeDir("/ROMs/Kaizo".into())).unwrap();
	let listed = calls
		.iter()
		.position(|c| matches!(c, Call::List { path, .. } if path == "/ROMs/Kaizo"))
		.unwrap();
	assert!(made < listed);
}

#[tokio::test(start_paused = true)]
async fn test_first_sync_reuploads_existing_names() {
	let local = local_tree();
	rom(local.path(), "hack1.smc", b"new build", 100);
	let mock = MockTransport::new().with_file("/ROMs/hack1.smc", b"stale");

	let report = manager(&mock, test_config()).sync(local.path(), 0.0, false).await;

	assert_eq!(report.uploaded(), 1);
	assert_eq!(mock.file("/ROMs/hack1.smc").unwrap(), b"new build".to_vec());
}

#[tokio::test(start_paused = true)]
async fn test_existing_file_keeps_device_casing() {
	let local = local_tree();
	rom(local.path(), "Hack1.SMC", b"v2", 500);
	let mock = MockTransport::new().with_file("/roms/hack1.smc", b"v1");

	let report = manager(&mock, test_config()).sync(local.path(), 100.0, false).await;

	assert_eq!(report.uploaded(), 1);
	assert_eq!(mock.put_paths(), vec!["/roms/hack1.smc"]);
	assert!(mock.made_dirs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_only_rom_extensions_are_candidates() {
	let local = local_tree();
	rom(local.path(), "readme.txt", b"notes", 100);
	rom(local.path(), "hack.smc", b"rom", 100);
	let mock = MockTransport::new().with_dir("/ROMs");

	let report = manager(&mock, test_config()).sync(local.path(), 0.0, false).await;

	assert_eq!(report.uploaded(), 1);
	assert_eq!(mock.put_paths(), vec!["/ROMs/hack.smc"]);
}

#[tokio::test(start_paused = true)]
async fn test_nested_remote_folder_resolves_each_component() {
	let local = local_tree();
	rom(local.path(), "a.smc", b"a", 100);
	let mock = MockTransport::new().with_dir("/ROMs");
	let mut config = test_config();
	config.remote_folder = "roms\\Kaizo".to_string();

	let report = manager(&mock, config).sync(local.path(), 0.0, false).await;

	assert!(report.is_complete(), "{:?}", report.error);
	assert_eq!(mock.made_dirs(), vec!["/ROMs/Kaizo"]);
	assert_eq!(mock.put_paths(), vec!["/ROMs/Kaizo/a.smc"]);
	mock.assert_lists_confirmed();
}

#[tokio::test(start_paused = true)]
async fn test_local_folder_named_like_remote_file_fails_branch() {
	let local = local_tree();
	rom(local.path(), "a.smc", b"a", 100);
	rom(local.path(), "Kaizo/b.smc", b"b", 100);
	let mock = MockTransport::new().with_file("/ROMs/KAIZO", b"not a folder");

	let report = manager(&mock, test_config()).sync(local.path(), 0.0, false).await;

	assert_eq!(report.status, SyncStatus::Failed);
	assert_eq!(report.error.as_deref(), Some("/ROMs/Kaizo exists on the device as a file"));
	assert_eq!(mock.put_paths(), vec!["/ROMs/a.smc"]);
	assert!(mock.made_dirs().is_empty());
	assert!(!mock.listed_paths().iter().any(|p| p.eq_ignore_ascii_case("/ROMs/Kaizo")));
	mock.assert_lists_confirmed();
}

#[tokio::test(start_paused = true)]
async fn test_remote_folder_that_is_a_file_is_not_created() {
	let local = local_tree();
	rom(local.path(), "a.smc", b"a", 100);
	let mock = MockTransport::new().with_file("/ROMs", b"not a folder");

	let report = manager(&mock, test_config()).sync(local.path(), 0.0, false).await;

	assert_eq!(report.status, SyncStatus::Failed);
	assert_eq!(report.error.as_deref(), Some("/ROMs exists on the device as a file"));
	assert!(mock.made_dirs().is_empty());
	assert!(mock.put_paths().is_empty());
	assert_eq!(mock.listed_paths(), vec!["/"]);
}

#[tokio::test(start_paused = true)]
async fn test_dry_run_writes_nothing() {
	let local = local_tree();
	rom(local.path(), "a.smc", b"a", 100);
	rom(local.path(), "Kaizo/b.smc", b"b", 100);
	let mock = MockTransport::new();
	let mut config = test_config();
	config.dry_run = true;

	let report = manager(&mock, config).sync(local.path(), 0.0, true).await;

	assert_eq!(report.status, SyncStatus::Completed);
	assert_eq!(report.uploaded(), 2);
	assert_eq!(report.counters.dirs_created, 2);
	assert!(mock.made_dirs().is_empty());
	assert!(mock.put_paths().is_empty());
	// Folders that were never created are never listed either
	assert_eq!(mock.listed_paths(), vec!["/"]);
	mock.assert_lists_confirmed();
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_removes_only_listed_roms() {
	let local = local_tree();
	rom(local.path(), "keep.smc", b"keep", 100);
	let mock = MockTransport::new()
		.with_file("/ROMs/KEEP.SMC", b"keep")
		.with_file("/ROMs/old.sfc", b"old")
		.with_file("/ROMs/notes.txt", b"notes")
		.with_dir("/ROMs/Archive");

	let report = manager(&mock, test_config()).sync(local.path(), 200.0, true).await;

	assert!(report.is_complete(), "{:?}", report.error);
	assert_eq!(report.counters.removed, 1);
	assert_eq!(report.counters.skipped, 1);
	let removed: Vec<Call> =
		mock.calls().into_iter().filter(|c| matches!(c, Call::Remove(_))).collect();
	assert_eq!(removed, vec![Call::Remove("/ROMs/old.sfc".into())]);
	assert!(mock.file("/ROMs/notes.txt").is_some());
	assert!(mock.file("/ROMs/KEEP.SMC").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_without_cleanup_nothing_is_removed() {
	let local = local_tree();
	rom(local.path(), "keep.smc", b"keep", 100);
	let mock = MockTransport::new().with_file("/ROMs/old.sfc", b"old");

	let report = manager(&mock, test_config()).sync(local.path(), 200.0, false).await;

	assert_eq!(report.counters.removed, 0);
	assert!(mock.file("/ROMs/old.sfc").is_some());
}

// vim: ts=4
