// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kiln_core::catalog::{self, ATTR_FORMULA, ATTR_NAME, ATTR_TEXT};
use kiln_core::{
    DesignError, ForeignFrame, ForeignFrameError, ForeignFrameReader, ForeignObject, FrameView,
    Structure, Variant,
};
use kiln_dry_tests::{commit, stock_flow_design};

/// Reader serving frames from memory, keyed by path.
#[derive(Default)]
struct BundleReader {
    frames: BTreeMap<PathBuf, ForeignFrame>,
}

impl BundleReader {
    fn with(mut self, path: &str, frame: ForeignFrame) -> Self {
        self.frames.insert(PathBuf::from(path), frame);
        self
    }
}

impl ForeignFrameReader for BundleReader {
    fn read(&self, path: &Path) -> Result<ForeignFrame, ForeignFrameError> {
        self.frames
            .get(path)
            .cloned()
            .ok_or_else(|| ForeignFrameError::Io {
                path: path.to_owned(),
                source: std::io::ErrorKind::NotFound.into(),
            })
    }
}

fn tank_model() -> ForeignFrame {
    ForeignFrame {
        objects: vec![
            ForeignObject::edge(catalog::DRAINS, "tank", "leak"),
            ForeignObject::node("tank", catalog::STOCK)
                .with_attribute(ATTR_NAME, "tank")
                .with_attribute(ATTR_FORMULA, "50"),
            ForeignObject::node("leak", catalog::FLOW)
                .with_attribute(ATTR_NAME, "leak")
                .with_attribute(ATTR_FORMULA, "tank / 10"),
            ForeignObject::unstructured(catalog::NOTE).with_attribute(ATTR_TEXT, "imported"),
        ],
    }
}

#[test]
fn imported_objects_get_fresh_ids_and_commit() {
    let reader = BundleReader::default().with("models/tank.json", tank_model());
    let mut design = stock_flow_design();
    let existing = commit(&mut design, |f| {
        f.create_node(catalog::AUXILIARY, [(ATTR_NAME, "k"), (ATTR_FORMULA, "1")])?;
        Ok(())
    });

    let foreign = reader.read(Path::new("models/tank.json")).unwrap();
    let mut frame = design.create_frame();
    let ids = frame.import_foreign(&foreign).unwrap();
    assert_eq!(ids.len(), 4);
    let before = design.frame(existing).unwrap();
    assert!(ids.iter().all(|id| !before.contains(*id)));

    let tank = frame.object_named("tank").unwrap().id();
    let leak = frame.object_named("leak").unwrap().id();
    assert_eq!(
        frame.object(ids[0]).unwrap().structure(),
        Structure::Edge {
            origin: tank,
            target: leak
        }
    );
    assert_eq!(
        frame.object(ids[3]).unwrap().attribute(ATTR_TEXT),
        Some(&Variant::from("imported"))
    );

    let committed = design.accept(frame).unwrap();
    assert_eq!(design.frame(committed).unwrap().len(), 5);
}

#[test]
fn unreadable_paths_surface_as_foreign_frame_errors() {
    let reader = BundleReader::default();
    let err: DesignError = reader.read(Path::new("missing.json")).unwrap_err().into();
    assert!(matches!(
        err,
        DesignError::ForeignFrame(ForeignFrameError::Io { .. })
    ));
    assert!(err.to_string().contains("missing.json"));
}

#[test]
fn failed_imports_leave_the_frame_untouched() {
    let design = stock_flow_design();
    let mut frame = design.create_frame();
    frame.create_unstructured(catalog::NOTE).unwrap();

    let dangling = ForeignFrame {
        objects: vec![
            ForeignObject::node("a", catalog::STOCK),
            ForeignObject::edge(catalog::PARAMETER, "a", "nowhere"),
        ],
    };
    assert!(matches!(
        frame.import_foreign(&dangling),
        Err(DesignError::ForeignFrame(ForeignFrameError::UnknownReference(r))) if r == "nowhere"
    ));

    let duplicate = ForeignFrame {
        objects: vec![
            ForeignObject::node("a", catalog::STOCK),
            ForeignObject::node("a", catalog::FLOW),
        ],
    };
    assert!(matches!(
        frame.import_foreign(&duplicate),
        Err(DesignError::ForeignFrame(ForeignFrameError::DuplicateId(_)))
    ));

    let unknown = ForeignFrame {
        objects: vec![ForeignObject::node("x", "Reservoir")],
    };
    assert!(matches!(
        frame.import_foreign(&unknown),
        Err(DesignError::UnknownObjectType(name)) if name == "Reservoir"
    ));

    let misshapen = ForeignFrame {
        objects: vec![ForeignObject::node("p", catalog::PARAMETER)],
    };
    assert!(matches!(
        frame.import_foreign(&misshapen),
        Err(DesignError::StructuralTypeMismatch { .. })
    ));

    assert_eq!(frame.len(), 1);
}

#[test]
fn foreign_frames_deserialize_from_json() {
    let text = r#"{
        "objects": [
            { "id": "s", "type_name": "Stock", "structure": "Node",
              "attributes": { "name": { "String": "s" }, "formula": { "String": "1" } } }
        ]
    }"#;
    let foreign: ForeignFrame = serde_json::from_str(text).unwrap();
    let mut design = stock_flow_design();
    let mut frame = design.create_frame();
    frame.import_foreign(&foreign).unwrap();
    assert!(design.accept(frame).is_ok());
}
