// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Built-in stock-and-flow catalog.
//!
//! Node types carry a `name` and a `formula`; edges wire them together:
//! `Parameter` (value dependency), `Drains` (stock → flow) and `Fills`
//! (flow → stock). The reference compiler in [`crate::plan`] interprets
//! designs built from this catalog.
use crate::metamodel::{Attribute, Metamodel, ObjectType, StructuralKind};
use crate::value::{AtomType, ValueType, Variant, VariantArray};

/// Name of the built-in catalog (recorded in archives).
pub const STOCK_FLOW: &str = "stock-flow";

/// Accumulating node.
pub const STOCK: &str = "Stock";
/// Rate node moving quantity between stocks.
pub const FLOW: &str = "Flow";
/// Intermediate computed node.
pub const AUXILIARY: &str = "Auxiliary";
/// Table-driven node mapping an input through sampled points.
pub const GRAPHICAL_FUNCTION: &str = "GraphicalFunction";
/// Free-text annotation.
pub const NOTE: &str = "Note";
/// Value dependency edge (`origin` is used by `target`).
pub const PARAMETER: &str = "Parameter";
/// Outflow edge from a stock to a flow.
pub const DRAINS: &str = "Drains";
/// Inflow edge from a flow to a stock.
pub const FILLS: &str = "Fills";

/// `name` attribute.
pub const ATTR_NAME: &str = "name";
/// `formula` attribute.
pub const ATTR_FORMULA: &str = "formula";
/// `allows_negative` attribute of stocks.
pub const ATTR_ALLOWS_NEGATIVE: &str = "allows_negative";
/// `points` attribute of graphical functions (flattened x/y pairs).
pub const ATTR_POINTS: &str = "points";
/// `text` attribute of notes.
pub const ATTR_TEXT: &str = "text";

fn name() -> Attribute {
    Attribute::new(ATTR_NAME, ValueType::STRING).with_abstract("Variable name")
}

fn formula() -> Attribute {
    Attribute::new(ATTR_FORMULA, ValueType::STRING)
        .with_abstract("Arithmetic expression or initial value")
}

/// Builds the stock-and-flow catalog.
#[must_use]
pub fn stock_flow() -> Metamodel {
    Metamodel::from_trusted(
        STOCK_FLOW,
        vec![
            ObjectType::new(
                STOCK,
                StructuralKind::Node,
                vec![
                    name(),
                    formula(),
                    Attribute::new(ATTR_ALLOWS_NEGATIVE, ValueType::BOOL)
                        .with_default(false)
                        .with_abstract("Whether the stock may drop below zero"),
                ],
            ),
            ObjectType::new(FLOW, StructuralKind::Node, vec![name(), formula()]),
            ObjectType::new(AUXILIARY, StructuralKind::Node, vec![name(), formula()]),
            ObjectType::new(
                GRAPHICAL_FUNCTION,
                StructuralKind::Node,
                vec![
                    name(),
                    Attribute::new(ATTR_POINTS, ValueType::Array(AtomType::Double))
                        .with_default(Variant::Array(VariantArray::Double(Vec::new())))
                        .with_abstract("Flattened x/y sample pairs"),
                ],
            ),
            ObjectType::new(
                NOTE,
                StructuralKind::Unstructured,
                vec![Attribute::new(ATTR_TEXT, ValueType::STRING).with_default("")],
            ),
            ObjectType::new(PARAMETER, StructuralKind::Edge, vec![]),
            ObjectType::new(DRAINS, StructuralKind::Edge, vec![]),
            ObjectType::new(FILLS, StructuralKind::Edge, vec![]),
        ],
    )
}
