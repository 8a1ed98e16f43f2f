//! Store contract tests, run against every backend.
//!
//! Each test opens a fresh store per backend in its own scratch directory and
//! checks one property of the `PlayerStore` contract. Failures name the
//! backend that broke it.

use std::sync::Arc;
use std::thread;

use roster_store::{
    open_store, BackendKind, InMemoryPlayerStore, Player, PlayerStore, RandomAccessStore,
    StoreConfig, StoreError,
};

fn config_for(dir: &tempfile::TempDir, kind: BackendKind) -> StoreConfig {
    StoreConfig::new(kind, dir.path().join(format!("players.{kind}")))
}

/// Run `check` once per file backend and once against the in-memory store.
fn for_each_store(check: impl Fn(&str, &dyn PlayerStore)) {
    for kind in BackendKind::ALL {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&config_for(&dir, kind)).unwrap();
        check(kind.as_str(), store.as_ref());
    }
    check("memory", &InMemoryPlayerStore::new());
}

fn ann() -> Player {
    Player::new(1, "Ann", 10, 1, 0)
}

fn bob() -> Player {
    Player::new(2, "Bob", 20, 2, 5)
}

// =============================================================================
// Identity
// =============================================================================

#[test]
fn distinct_ids_are_retrieved_independently() {
    for_each_store(|name, store| {
        assert!(store.add(&ann()).unwrap(), "{name}");
        assert!(store.add(&bob()).unwrap(), "{name}");
        assert_eq!(store.get(1).unwrap(), Some(ann()), "{name}");
        assert_eq!(store.get(2).unwrap(), Some(bob()), "{name}");
    });
}

#[test]
fn duplicate_add_is_refused_and_keeps_original() {
    for_each_store(|name, store| {
        assert!(store.add(&ann()).unwrap(), "{name}");
        assert!(!store.add(&Player::new(1, "Impostor", 99, 99, 99)).unwrap(), "{name}");
        assert_eq!(store.get(1).unwrap(), Some(ann()), "{name}");
        assert_eq!(store.len().unwrap(), 1, "{name}");
    });
}

#[test]
fn non_positive_ids_are_never_stored() {
    for_each_store(|name, store| {
        for id in [0, -1, i32::MIN] {
            let err = store.add(&Player::new(id, "ghost", 0, 0, 0)).unwrap_err();
            assert!(matches!(err, StoreError::InvalidRecord(_)), "{name}: {err}");
            assert_eq!(store.get(id).unwrap(), None, "{name}");
            assert!(!store.remove(id).unwrap(), "{name}");
        }
        assert!(store.is_empty().unwrap(), "{name}");
    });
}

// =============================================================================
// Round trip
// =============================================================================

#[test]
fn add_then_get_returns_equal_record() {
    let records = [
        Player::new(7, "", 0, 0, 0),
        Player::new(8, "Zoë ✓", -5, i32::MAX, i32::MIN),
        Player::new(i32::MAX, "max", 1, 2, 3),
    ];
    for_each_store(|name, store| {
        for r in &records {
            assert!(store.add(r).unwrap(), "{name}");
            assert_eq!(store.get(r.id).unwrap().as_ref(), Some(r), "{name}");
        }
    });
}

#[test]
fn list_preserves_insertion_order() {
    for_each_store(|name, store| {
        for id in [5, 3, 9, 1] {
            store.add(&Player::new(id, format!("p{id}"), id, id, id)).unwrap();
        }
        let ids: Vec<i32> = store.list().unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![5, 3, 9, 1], "{name}");
    });
}

// =============================================================================
// Removal
// =============================================================================

#[test]
fn removed_record_is_invisible() {
    for_each_store(|name, store| {
        store.add(&ann()).unwrap();
        store.add(&bob()).unwrap();
        assert!(store.remove(1).unwrap(), "{name}");
        assert_eq!(store.get(1).unwrap(), None, "{name}");
        assert!(!store.contains(1).unwrap(), "{name}");
        assert_eq!(store.list().unwrap(), vec![bob()], "{name}");
    });
}

#[test]
fn second_remove_returns_false() {
    for_each_store(|name, store| {
        store.add(&ann()).unwrap();
        assert!(store.remove(1).unwrap(), "{name}");
        assert!(!store.remove(1).unwrap(), "{name}");
        assert!(!store.remove(42).unwrap(), "{name}");
    });
}

#[test]
fn removed_id_can_be_added_again() {
    for_each_store(|name, store| {
        store.add(&ann()).unwrap();
        store.remove(1).unwrap();
        let again = Player::new(1, "Ann II", 0, 0, 0);
        assert!(store.add(&again).unwrap(), "{name}");
        assert_eq!(store.get(1).unwrap(), Some(again), "{name}");
    });
}

// =============================================================================
// Update
// =============================================================================

#[test]
fn update_preserves_identity_and_count() {
    for_each_store(|name, store| {
        store.add(&ann()).unwrap();
        store.add(&bob()).unwrap();
        let changed = Player::new(1, "Annabel", 11, 2, 3);
        store.update(1, &changed).unwrap();
        assert_eq!(store.len().unwrap(), 2, "{name}");
        assert_eq!(store.get(1).unwrap(), Some(changed), "{name}");
        assert_eq!(store.get(2).unwrap(), Some(bob()), "{name}");
    });
}

#[test]
fn update_of_missing_id_changes_nothing() {
    for_each_store(|name, store| {
        store.add(&ann()).unwrap();
        store.update(3, &Player::new(3, "nobody", 0, 0, 0)).unwrap();
        assert_eq!(store.list().unwrap(), vec![ann()], "{name}");
    });
}

#[test]
fn update_with_mismatched_id_is_rejected() {
    for_each_store(|name, store| {
        store.add(&ann()).unwrap();
        store.add(&bob()).unwrap();
        let err = store.update(1, &Player::new(2, "clash", 0, 0, 0)).unwrap_err();
        assert!(
            matches!(err, StoreError::IdMismatch { expected: 1, actual: 2 }),
            "{name}: {err}"
        );
        assert_eq!(store.list().unwrap(), vec![ann(), bob()], "{name}");
    });
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn closed_store_fails_every_operation() {
    for_each_store(|name, store| {
        store.add(&ann()).unwrap();
        store.close().unwrap();
        store.close().unwrap();
        assert!(matches!(store.add(&bob()), Err(StoreError::Closed)), "{name}");
        assert!(matches!(store.remove(1), Err(StoreError::Closed)), "{name}");
        assert!(matches!(store.update(1, &ann()), Err(StoreError::Closed)), "{name}");
        assert!(matches!(store.get(1), Err(StoreError::Closed)), "{name}");
        assert!(matches!(store.list(), Err(StoreError::Closed)), "{name}");
    });
}

#[test]
fn records_survive_reopen() {
    for kind in BackendKind::ALL {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&dir, kind);

        let store = open_store(&config).unwrap();
        store.add(&ann()).unwrap();
        store.add(&bob()).unwrap();
        store.remove(1).unwrap();
        store.close().unwrap();

        let reopened = open_store(&config).unwrap();
        assert_eq!(reopened.list().unwrap(), vec![bob()], "{kind}");
    }
}

#[test]
fn concurrent_adds_are_all_kept() {
    for kind in BackendKind::ALL {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn PlayerStore> = Arc::from(open_store(&config_for(&dir, kind)).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..10 {
                        let id = t * 10 + i + 1;
                        assert!(store.add(&Player::new(id, format!("t{t}"), i, 0, 0)).unwrap());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len().unwrap(), 40, "{kind}");
    }
}

#[cfg(unix)]
#[test]
fn mutations_keep_file_permissions() {
    use std::os::unix::fs::PermissionsExt;

    for kind in BackendKind::ALL {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&dir, kind);
        let store = open_store(&config).unwrap();
        store.add(&ann()).unwrap();
        std::fs::set_permissions(&config.path, std::fs::Permissions::from_mode(0o640)).unwrap();

        store.add(&bob()).unwrap();
        store.update(2, &Player::new(2, "Robert", 0, 0, 0)).unwrap();
        assert!(store.remove(1).unwrap(), "{kind}");

        let mode = std::fs::metadata(&config.path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640, "{kind}");
    }
}

// =============================================================================
// I/O failures
// =============================================================================

#[test]
fn directory_in_place_of_store_file_is_an_io_error() {
    for kind in BackendKind::ALL {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&dir, kind);
        std::fs::create_dir(&config.path).unwrap();

        match open_store(&config) {
            Err(err) => assert!(matches!(err, StoreError::Io(_)), "{kind}: {err}"),
            Ok(store) => {
                let listed = store.list();
                assert!(matches!(listed, Err(StoreError::Io(_))), "{kind}: {listed:?}");
                let added = store.add(&ann());
                assert!(matches!(added, Err(StoreError::Io(_))), "{kind}: {added:?}");
            }
        }
    }
}

#[test]
fn vanished_directory_fails_mutations_with_io_error() {
    // The fixed-width store keeps its file handle open, so only the backends
    // that reopen the file per operation notice the directory going away.
    let kinds = [
        BackendKind::Text,
        BackendKind::Stream,
        BackendKind::Snapshot,
        BackendKind::Document,
    ];
    for kind in kinds {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("data").join(format!("players.{kind}"));
        let store = open_store(&StoreConfig::new(kind, &path)).unwrap();
        std::fs::remove_dir_all(root.path().join("data")).unwrap();

        let added = store.add(&ann());
        assert!(matches!(added, Err(StoreError::Io(_))), "{kind}: {added:?}");
        assert!(!path.exists(), "{kind}");
    }
}

// =============================================================================
// Fixed-width layout
// =============================================================================

#[test]
fn fixed_width_remove_keeps_file_length() {
    let dir = tempfile::tempdir().unwrap();
    let store = RandomAccessStore::open(&dir.path().join("players.dat")).unwrap();

    store.add(&ann()).unwrap();
    store.add(&bob()).unwrap();
    assert_eq!(store.file_len().unwrap(), 112);

    assert!(store.remove(1).unwrap());
    assert_eq!(store.list().unwrap(), vec![bob()]);
    assert_eq!(store.get(1).unwrap(), None);
    assert_eq!(store.file_len().unwrap(), 112);
    assert_eq!(store.slot_count().unwrap(), 2);
}

#[test]
fn fixed_width_truncates_long_nick() {
    let dir = tempfile::tempdir().unwrap();
    let store = RandomAccessStore::open(&dir.path().join("players.dat")).unwrap();

    let long = Player::new(1, "abcdefghijklmnopqrstuvwxyz", 0, 0, 0);
    assert!(store.add(&long).unwrap());
    assert_eq!(store.get(1).unwrap().unwrap().nick, "abcdefghijklmnopqrst");
    assert_eq!(store.file_len().unwrap(), 56);
}
