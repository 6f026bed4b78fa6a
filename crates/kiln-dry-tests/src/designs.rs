// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Design builders over the stock-and-flow catalog.

use kiln_core::catalog::{
    self, ATTR_FORMULA, ATTR_NAME, ATTR_POINTS, AUXILIARY, DRAINS, FILLS, FLOW,
    GRAPHICAL_FUNCTION, PARAMETER, STOCK,
};
use kiln_core::{
    Design, DesignError, ForeignFrameError, FrameId, ObjectId, PendingFrame, Variant, VariantArray,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Empty design over the stock-and-flow catalog.
pub fn stock_flow_design() -> Design {
    Design::new(Arc::new(catalog::stock_flow()))
}

/// Derives a frame from the current one, applies `edit` and accepts it.
///
/// # Panics
/// Panics when `edit` fails or the frame is rejected; fixtures are expected
/// to describe valid edits.
#[allow(clippy::expect_used)]
pub fn commit<F>(design: &mut Design, edit: F) -> FrameId
where
    F: FnOnce(&mut PendingFrame) -> Result<(), DesignError>,
{
    let mut frame = design.create_frame();
    edit(&mut frame).expect("fixture edit should succeed");
    design.accept(frame).expect("fixture frame should validate")
}

/// Builds one committed frame of named stock-and-flow variables.
///
/// Edges refer to variables by name. The first error is kept and returned
/// by [`DesignBuilder::build`].
///
/// # Example
///
/// ```
/// use kiln_dry_tests::DesignBuilder;
///
/// let (design, ids) = DesignBuilder::new()
///     .stock("pool", "100")
///     .flow("drain", "pool * 0.1")
///     .drains("pool", "drain")
///     .parameter("pool", "drain")
///     .build()
///     .unwrap();
/// assert!(design.current().is_some());
/// assert_eq!(ids.len(), 2);
/// ```
pub struct DesignBuilder {
    design: Design,
    frame: PendingFrame,
    ids: BTreeMap<String, ObjectId>,
    error: Option<DesignError>,
}

impl Default for DesignBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DesignBuilder {
    /// Builder over an empty stock-and-flow design.
    pub fn new() -> Self {
        Self::on(stock_flow_design())
    }

    /// Builder whose frame derives from the current frame of `design`.
    pub fn on(design: Design) -> Self {
        let frame = design.create_frame();
        Self {
            design,
            frame,
            ids: BTreeMap::new(),
            error: None,
        }
    }

    fn apply<F>(mut self, edit: F) -> Self
    where
        F: FnOnce(&mut PendingFrame, &BTreeMap<String, ObjectId>) -> Result<(), DesignError>,
    {
        if self.error.is_none() {
            if let Err(e) = edit(&mut self.frame, &self.ids) {
                self.error = Some(e);
            }
        }
        self
    }

    fn variable(mut self, type_name: &str, name: &str, formula: Option<&str>) -> Self {
        let mut attrs = vec![(ATTR_NAME, Variant::from(name))];
        if let Some(formula) = formula {
            attrs.push((ATTR_FORMULA, Variant::from(formula)));
        }
        let mut created = None;
        self = self.apply(|frame, _| {
            created = Some(frame.create_node(type_name, attrs)?);
            Ok(())
        });
        if let Some(id) = created {
            self.ids.insert(name.to_owned(), id);
        }
        self
    }

    fn edge(self, type_name: &str, origin: &str, target: &str) -> Self {
        self.apply(|frame, ids| {
            let lookup = |name: &str| -> Result<ObjectId, DesignError> {
                ids.get(name)
                    .copied()
                    .ok_or_else(|| ForeignFrameError::UnknownReference(name.to_owned()).into())
            };
            frame.create_edge(type_name, lookup(origin)?, lookup(target)?)?;
            Ok(())
        })
    }

    /// Adds a stock with an initial value.
    pub fn stock(self, name: &str, initial: &str) -> Self {
        self.variable(STOCK, name, Some(initial))
    }

    /// Adds a flow.
    pub fn flow(self, name: &str, formula: &str) -> Self {
        self.variable(FLOW, name, Some(formula))
    }

    /// Adds an auxiliary.
    pub fn auxiliary(self, name: &str, formula: &str) -> Self {
        self.variable(AUXILIARY, name, Some(formula))
    }

    /// Adds a graphical function with flattened x/y samples.
    pub fn graphical_function(mut self, name: &str, points: &[f64]) -> Self {
        self = self.variable(GRAPHICAL_FUNCTION, name, None);
        let Some(id) = self.ids.get(name).copied() else {
            return self;
        };
        let points = Variant::Array(VariantArray::Double(points.to_vec()));
        self.apply(|frame, _| {
            frame.require_mut(id)?.set_attribute(ATTR_POINTS, points);
            Ok(())
        })
    }

    /// Adds a `Drains` edge from `stock` to `flow`.
    pub fn drains(self, stock: &str, flow: &str) -> Self {
        self.edge(DRAINS, stock, flow)
    }

    /// Adds a `Fills` edge from `flow` to `stock`.
    pub fn fills(self, flow: &str, stock: &str) -> Self {
        self.edge(FILLS, flow, stock)
    }

    /// Adds a `Parameter` edge from `input` to `user`.
    pub fn parameter(self, input: &str, user: &str) -> Self {
        self.edge(PARAMETER, input, user)
    }

    /// Accepts the frame and returns the design with the ids by name.
    pub fn build(self) -> Result<(Design, BTreeMap<String, ObjectId>), DesignError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let mut design = self.design;
        design.accept(self.frame)?;
        Ok((design, self.ids))
    }
}
