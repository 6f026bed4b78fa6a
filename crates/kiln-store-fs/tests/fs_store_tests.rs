// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
use std::sync::Arc;

use kiln_core::{DesignArchive, DesignError, DesignRecord, DesignStore, StoreError};
use kiln_dry_tests::DesignBuilder;
use kiln_store_fs::FsDesignStore;

#[test]
fn raw_blobs_round_trip_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsDesignStore::at(dir.path().join("designs")).unwrap();

    store.save_raw("reservoir", b"{}").unwrap();
    assert!(store.root().join("reservoir.json").is_file());
    assert!(!store.root().join("reservoir.json.tmp").exists());
    assert_eq!(store.load_raw("reservoir").unwrap(), b"{}");

    store.save_raw("reservoir", b"[]").unwrap();
    assert_eq!(store.load_raw("reservoir").unwrap(), b"[]");

    store.remove("reservoir").unwrap();
    assert!(matches!(store.load_raw("reservoir"), Err(StoreError::NotFound)));
    assert!(matches!(store.remove("reservoir"), Err(StoreError::NotFound)));
}

#[test]
fn names_lists_saved_designs_only() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsDesignStore::at(dir.path()).unwrap();
    store.save_raw("b", b"1").unwrap();
    store.save_raw("a", b"2").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    assert_eq!(store.names().unwrap(), ["a", "b"]);
}

#[test]
fn escaping_names_never_touch_the_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsDesignStore::at(dir.path().join("inner")).unwrap();

    for name in ["../outside", ".hidden", "a/b", ""] {
        assert!(matches!(
            store.save_raw(name, b"x"),
            Err(StoreError::Other(_))
        ));
    }
    assert!(!dir.path().join("outside.json").exists());
    assert!(store.names().unwrap().is_empty());
}

#[test]
fn archive_over_files_restores_the_design() {
    let dir = tempfile::tempdir().unwrap();
    let archive = DesignArchive::new(FsDesignStore::at(dir.path()).unwrap());
    let (mut design, _) = DesignBuilder::new()
        .stock("pool", "100")
        .flow("drain", "pool * 0.1")
        .drains("pool", "drain")
        .build()
        .unwrap();
    let mut frame = design.create_frame();
    frame.create_unstructured(kiln_core::catalog::NOTE).unwrap();
    design.accept(frame).unwrap();
    design.undo().unwrap();

    archive.save("bathtub", &design).unwrap();
    let loaded = archive
        .load("bathtub", Arc::clone(design.metamodel()))
        .unwrap()
        .unwrap();
    assert_eq!(DesignRecord::capture(&loaded), DesignRecord::capture(&design));
    assert!(loaded.can_redo());

    archive.remove("bathtub").unwrap();
    assert!(archive
        .load("bathtub", Arc::clone(design.metamodel()))
        .unwrap()
        .is_none());
    assert!(matches!(
        archive.remove("bathtub"),
        Err(DesignError::PersistentStore(StoreError::NotFound))
    ));
}
