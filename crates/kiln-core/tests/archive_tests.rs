// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
use std::sync::Arc;

use kiln_core::catalog::{self, ATTR_FORMULA, ATTR_NAME, ATTR_POINTS};
use kiln_core::{
    Design, DesignArchive, DesignError, DesignRecord, FrameView, Metamodel, ObjectError, StoreError,
    Variant,
};
use kiln_dry_tests::{commit, stock_flow_design, InMemoryDesignStore};

/// Three commits with one undone, so undo and redo are both non-empty.
fn design_with_history() -> Design {
    let mut design = stock_flow_design();
    for (name, formula) in [("a", "1"), ("b", "2"), ("c", "3")] {
        commit(&mut design, |f| {
            f.create_node(catalog::STOCK, [(ATTR_NAME, name), (ATTR_FORMULA, formula)])?;
            Ok(())
        });
    }
    design.undo().unwrap();
    design
}

#[test]
fn saved_design_loads_with_its_history() {
    let store = InMemoryDesignStore::new();
    let archive = DesignArchive::new(store.clone());
    let design = design_with_history();

    archive.save("model", &design).unwrap();
    let loaded = archive
        .load("model", Arc::clone(design.metamodel()))
        .unwrap()
        .unwrap();

    assert_eq!(loaded.current_frame(), design.current_frame());
    assert_eq!(loaded.undoable_frames(), design.undoable_frames());
    assert_eq!(loaded.redoable_frames(), design.redoable_frames());
    for id in design.frame_ids() {
        assert_eq!(
            loaded.frame(id).unwrap().state_hash(),
            design.frame(id).unwrap().state_hash()
        );
    }
    assert_eq!(DesignRecord::capture(&loaded), DesignRecord::capture(&design));
    assert_eq!((store.save_count(), store.load_count()), (1, 1));
}

#[test]
fn loaded_designs_keep_issuing_fresh_ids() {
    let archive = DesignArchive::new(InMemoryDesignStore::new());
    let design = design_with_history();
    archive.save("model", &design).unwrap();
    let mut loaded = archive
        .load("model", Arc::clone(design.metamodel()))
        .unwrap()
        .unwrap();

    let existing: Vec<_> = design
        .frame_ids()
        .flat_map(|id| design.frame(id).unwrap().objects().map(|o| o.id()).collect::<Vec<_>>())
        .collect();
    let mut created = None;
    commit(&mut loaded, |f| {
        created = Some(f.create_node(catalog::AUXILIARY, [(ATTR_NAME, "x"), (ATTR_FORMULA, "1")])?);
        Ok(())
    });
    let created = created.unwrap();
    assert!(existing.iter().all(|id| *id < created));
    assert!(!loaded.can_redo());
}

#[test]
fn missing_and_empty_blobs_load_as_none() {
    let store = InMemoryDesignStore::new();
    let archive = DesignArchive::new(store.clone());
    let metamodel = Arc::new(catalog::stock_flow());

    assert!(archive.load("nothing", Arc::clone(&metamodel)).unwrap().is_none());
    store.insert_raw("blank", Vec::new());
    assert!(archive.load("blank", metamodel).unwrap().is_none());
}

#[test]
fn failed_saves_are_reported_as_unable_to_save() {
    let store = InMemoryDesignStore::new();
    store.set_fail_on_save(true);
    let archive = DesignArchive::new(store.clone());

    let err = archive.save("model", &design_with_history()).unwrap_err();
    assert!(matches!(err, DesignError::UnableToSaveDesign(StoreError::Other(_))));
    assert!(!store.contains("model"));
    assert_eq!(store.save_count(), 1);
}

#[test]
fn failed_loads_are_persistent_store_errors() {
    let store = InMemoryDesignStore::new();
    let archive = DesignArchive::new(store.clone());
    archive.save("model", &design_with_history()).unwrap();
    store.set_fail_on_load(true);

    let err = archive
        .load("model", Arc::new(catalog::stock_flow()))
        .unwrap_err();
    assert!(matches!(err, DesignError::PersistentStore(StoreError::Other(_))));
}

#[test]
fn garbage_bytes_are_persistent_store_errors() {
    let store = InMemoryDesignStore::new();
    store.insert_raw("model", b"not json".to_vec());
    let archive = DesignArchive::new(store);

    let err = archive
        .load("model", Arc::new(catalog::stock_flow()))
        .unwrap_err();
    assert!(matches!(err, DesignError::PersistentStore(StoreError::Serde(_))));
}

#[test]
fn designs_only_load_against_their_metamodel() {
    let archive = DesignArchive::new(InMemoryDesignStore::new());
    archive.save("model", &design_with_history()).unwrap();
    let ledger = Arc::new(Metamodel::builder("ledger").build().unwrap());

    let err = archive.load("model", ledger).unwrap_err();
    let DesignError::PersistentStore(StoreError::MetamodelMismatch { expected, found }) = err else {
        panic!("expected a metamodel mismatch, got {err:?}");
    };
    assert_eq!(expected, "ledger");
    assert_eq!(found, catalog::stock_flow().name());
}

#[test]
fn tampered_blobs_fail_to_restore() {
    let store = InMemoryDesignStore::new();
    let archive = DesignArchive::new(store.clone());
    archive.save("model", &design_with_history()).unwrap();

    let text = String::from_utf8(store.raw("model").unwrap()).unwrap();
    let tampered = text.replacen("\"b\"", "\"z\"", 1);
    assert_ne!(text, tampered);
    store.insert_raw("model", tampered.into_bytes());

    let err = archive
        .load("model", Arc::new(catalog::stock_flow()))
        .unwrap_err();
    assert!(matches!(err, DesignError::PersistentStore(StoreError::Corrupt(_))));
}

#[test]
fn removed_designs_are_gone() {
    let store = InMemoryDesignStore::new();
    let archive = DesignArchive::new(store.clone());
    archive.save("model", &design_with_history()).unwrap();

    archive.remove("model").unwrap();
    assert!(store.names().is_empty());
    assert!(matches!(
        archive.remove("model"),
        Err(DesignError::PersistentStore(StoreError::NotFound))
    ));
    assert_eq!(store.remove_count(), 2);
}

#[test]
fn every_committed_double_survives_a_reload() {
    let archive = DesignArchive::new(InMemoryDesignStore::new());
    let mut design = stock_flow_design();
    let mut frame = design.create_frame();
    let curve = frame
        .create_node(catalog::GRAPHICAL_FUNCTION, [(ATTR_NAME, "curve")])
        .unwrap();
    frame
        .require_mut(curve)
        .unwrap()
        .set_attribute(ATTR_POINTS, vec![f64::NAN, 1.0]);

    let (mut frame, err) = design.accept(frame).unwrap_err().into_parts();
    let DesignError::ConstraintViolation(failure) = &err else {
        panic!("expected a constraint violation, got {err:?}");
    };
    assert_eq!(
        failure.errors_for(curve),
        &[ObjectError::NonFiniteNumber(ATTR_POINTS.into())]
    );

    frame
        .require_mut(curve)
        .unwrap()
        .set_attribute(ATTR_POINTS, vec![0.1, 1.0 / 3.0, 2.5, f64::MAX]);
    design.accept(frame).unwrap();
    archive.save("curve", &design).unwrap();
    let loaded = archive
        .load("curve", Arc::clone(design.metamodel()))
        .unwrap()
        .unwrap();
    assert_eq!(
        loaded.current().unwrap().object(curve).unwrap().attribute(ATTR_POINTS),
        Some(&Variant::from(vec![0.1, 1.0 / 3.0, 2.5, f64::MAX]))
    );
}
