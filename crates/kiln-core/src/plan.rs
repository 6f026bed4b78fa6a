// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reference compiler for the built-in stock-and-flow catalog.
//!
//! Edge conventions:
//! - `Drains`: origin is the stock, target is the flow emptying it.
//! - `Fills`: origin is the flow, target is the stock it fills.
//! - `Parameter`: origin is an input of the target's formula.
//!
//! Stocks are integrated state, so `Parameter` edges into or out of a stock
//! never form a computation cycle. Among the other variables the plan fixes an
//! evaluation order; any cycle is reported on every object that lies on it.
use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::{
    ATTR_ALLOWS_NEGATIVE, ATTR_FORMULA, ATTR_POINTS, AUXILIARY, DRAINS, FILLS, FLOW,
    GRAPHICAL_FUNCTION, PARAMETER, STOCK,
};
use crate::compile::{CompilerError, CompilerIssue, FrameCompiler, IssueMap};
use crate::frame::{FrameView, StableFrame};
use crate::ident::ObjectId;
use crate::object::DesignObject;
use crate::value::{AtomType, ValueType, Variant, VariantArray};

/// A stock and the flows attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct StockPlan {
    /// Stock object.
    pub id: ObjectId,
    /// Variable name.
    pub name: String,
    /// Initial value expression.
    pub initial: String,
    /// Whether the level may go negative.
    pub allows_negative: bool,
    /// Flows filling the stock, ascending.
    pub inflows: Vec<ObjectId>,
    /// Flows draining the stock, ascending.
    pub outflows: Vec<ObjectId>,
}

/// A flow and the stocks it connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowPlan {
    /// Flow object.
    pub id: ObjectId,
    /// Variable name.
    pub name: String,
    /// Rate expression.
    pub formula: String,
    /// Stock the flow drains, if any.
    pub drains: Option<ObjectId>,
    /// Stock the flow fills, if any.
    pub fills: Option<ObjectId>,
}

/// An auxiliary variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxiliaryPlan {
    /// Auxiliary object.
    pub id: ObjectId,
    /// Variable name.
    pub name: String,
    /// Expression.
    pub formula: String,
}

/// A piecewise-linear lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicalFunctionPlan {
    /// Function object.
    pub id: ObjectId,
    /// Variable name.
    pub name: String,
    /// `(x, y)` samples with strictly increasing `x`.
    pub points: Vec<(f64, f64)>,
}

/// Compiled stock-and-flow model handed to a solver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationPlan {
    /// Stocks in ascending id order.
    pub stocks: Vec<StockPlan>,
    /// Flows in ascending id order.
    pub flows: Vec<FlowPlan>,
    /// Auxiliaries in ascending id order.
    pub auxiliaries: Vec<AuxiliaryPlan>,
    /// Graphical functions in ascending id order.
    pub graphical_functions: Vec<GraphicalFunctionPlan>,
    /// Evaluation order of every non-stock variable; inputs come first.
    pub computation_order: Vec<ObjectId>,
}

impl SimulationPlan {
    /// Number of variables in the plan.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.stocks.len() + self.flows.len() + self.auxiliaries.len() + self.graphical_functions.len()
    }
}

/// Compiles frames built from [`crate::catalog::stock_flow`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StockFlowCompiler;

impl FrameCompiler for StockFlowCompiler {
    type Plan = SimulationPlan;

    fn compile(&self, frame: &StableFrame) -> Result<SimulationPlan, CompilerError> {
        let mut issues = IssueMap::new();
        let variables: Vec<&DesignObject> = frame.nodes().filter(|o| is_variable(o)).collect();

        check_names(&variables, &mut issues);
        for object in &variables {
            match object.type_name() {
                STOCK | FLOW | AUXILIARY => check_formula(object, &mut issues),
                GRAPHICAL_FUNCTION => {
                    check_points(object, &mut issues);
                }
                _ => {}
            }
        }
        let links = check_links(frame, &mut issues);
        let order = computation_order(frame, &variables, &mut issues);

        if !issues.is_empty() {
            return Err(CompilerError::Issues(issues));
        }
        Ok(assemble(&variables, &links, order))
    }
}

fn is_variable(object: &DesignObject) -> bool {
    matches!(
        object.type_name(),
        STOCK | FLOW | AUXILIARY | GRAPHICAL_FUNCTION
    )
}

fn text(object: &DesignObject, attribute: &str) -> String {
    object
        .attribute(attribute)
        .and_then(|v| v.convert(ValueType::STRING).ok())
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default()
}

fn flag(object: &DesignObject, attribute: &str) -> bool {
    object
        .attribute(attribute)
        .and_then(|v| v.convert(ValueType::BOOL).ok())
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn samples(object: &DesignObject) -> Vec<f64> {
    match object
        .attribute(ATTR_POINTS)
        .and_then(|v| v.convert(ValueType::Array(AtomType::Double)).ok())
    {
        Some(Variant::Array(VariantArray::Double(values))) => values,
        _ => Vec::new(),
    }
}

fn check_names(variables: &[&DesignObject], issues: &mut IssueMap) {
    let mut holders: BTreeMap<&str, Vec<ObjectId>> = BTreeMap::new();
    for object in variables {
        match object.name().map(str::trim) {
            None | Some("") => issues.push(
                object.id(),
                CompilerIssue::with_hint("variable has no name", "set the name attribute"),
            ),
            Some(name) => holders.entry(name).or_default().push(object.id()),
        }
    }
    for (name, ids) in holders.into_iter().filter(|(_, ids)| ids.len() > 1) {
        for id in ids {
            issues.push(
                id,
                CompilerIssue::with_hint(
                    format!("name `{name}` is used by more than one variable"),
                    "rename one of the variables",
                ),
            );
        }
    }
}

fn check_formula(object: &DesignObject, issues: &mut IssueMap) {
    if text(object, ATTR_FORMULA).trim().is_empty() {
        let hint = if object.type_name() == STOCK {
            "give the stock an initial value"
        } else {
            "write an expression for the formula attribute"
        };
        issues.push(object.id(), CompilerIssue::with_hint("formula is empty", hint));
    }
}

fn check_points(object: &DesignObject, issues: &mut IssueMap) {
    let values = samples(object);
    if values.len() % 2 == 1 {
        issues.push(
            object.id(),
            CompilerIssue::with_hint(
                format!("points hold {} values, expected x/y pairs", values.len()),
                "list points as [x0, y0, x1, y1, ...]",
            ),
        );
        return;
    }
    if values.len() < 4 {
        issues.push(
            object.id(),
            CompilerIssue::with_hint(
                "graphical function needs at least two points",
                "add another x/y pair",
            ),
        );
        return;
    }
    let increasing = values
        .chunks_exact(2)
        .zip(values.chunks_exact(2).skip(1))
        .all(|(a, b)| a[0] < b[0]);
    if !increasing {
        issues.push(
            object.id(),
            CompilerIssue::new("x values of the points must strictly increase"),
        );
    }
}

/// Stock-flow connections resolved from `Drains` and `Fills` edges.
#[derive(Debug, Default)]
struct Links {
    drains: BTreeMap<ObjectId, Vec<ObjectId>>,
    fills: BTreeMap<ObjectId, Vec<ObjectId>>,
}

fn check_links(frame: &StableFrame, issues: &mut IssueMap) -> Links {
    let mut links = Links::default();
    let type_of = |id| frame.object(id).map(DesignObject::type_name);
    for edge in frame.edges() {
        let Some((origin, target)) = edge.structure().endpoints() else {
            continue;
        };
        let (stock, flow, slot) = match edge.type_name() {
            DRAINS => (origin, target, &mut links.drains),
            FILLS => (target, origin, &mut links.fills),
            _ => continue,
        };
        if type_of(stock) != Some(STOCK) || type_of(flow) != Some(FLOW) {
            issues.push(
                edge.id(),
                CompilerIssue::with_hint(
                    format!("{} must connect a stock and a flow", edge.type_name()),
                    "drains run stock to flow, fills run flow to stock",
                ),
            );
            continue;
        }
        slot.entry(flow).or_default().push(stock);
    }
    for (flow, stocks) in &links.drains {
        if stocks.len() > 1 {
            issues.push(
                *flow,
                CompilerIssue::with_hint(
                    format!("flow drains {} stocks", stocks.len()),
                    "a flow drains at most one stock",
                ),
            );
        }
    }
    for (flow, stocks) in &links.fills {
        if stocks.len() > 1 {
            issues.push(
                *flow,
                CompilerIssue::with_hint(
                    format!("flow fills {} stocks", stocks.len()),
                    "a flow fills at most one stock",
                ),
            );
        }
    }
    links
}

/// Orders non-stock variables so every `Parameter` input precedes its user.
///
/// Ties resolve by ascending id. Objects on a cycle get one issue each and
/// are left out of the order.
fn computation_order(
    frame: &StableFrame,
    variables: &[&DesignObject],
    issues: &mut IssueMap,
) -> Vec<ObjectId> {
    let computed: BTreeSet<ObjectId> = variables
        .iter()
        .filter(|o| o.type_name() != STOCK)
        .map(|o| o.id())
        .collect();
    let mut inputs: BTreeMap<ObjectId, BTreeSet<ObjectId>> =
        computed.iter().map(|id| (*id, BTreeSet::new())).collect();
    let mut users: BTreeMap<ObjectId, BTreeSet<ObjectId>> = BTreeMap::new();
    for edge in frame.objects_of_type(PARAMETER) {
        let Some((from, to)) = edge.structure().endpoints() else {
            continue;
        };
        if computed.contains(&from) && computed.contains(&to) {
            inputs.entry(to).or_default().insert(from);
            users.entry(from).or_default().insert(to);
        }
    }

    let mut ready: BTreeSet<ObjectId> = inputs
        .iter()
        .filter(|(_, deps)| deps.is_empty())
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(computed.len());
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for user in users.get(&next).into_iter().flatten() {
            if let Some(deps) = inputs.get_mut(user) {
                deps.remove(&next);
                if deps.is_empty() {
                    ready.insert(*user);
                }
            }
        }
    }
    if order.len() == computed.len() {
        return order;
    }

    let blocked: BTreeSet<ObjectId> = computed
        .iter()
        .filter(|id| !order.contains(*id))
        .copied()
        .collect();
    for id in &blocked {
        if reaches(&users, *id, *id) {
            issues.push(
                *id,
                CompilerIssue::with_hint(
                    "variable depends on itself through a cycle of parameters",
                    "break the cycle with a stock or remove a parameter link",
                ),
            );
        }
    }
    order
}

fn reaches(users: &BTreeMap<ObjectId, BTreeSet<ObjectId>>, from: ObjectId, goal: ObjectId) -> bool {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<ObjectId> = users.get(&from).into_iter().flatten().copied().collect();
    while let Some(id) = stack.pop() {
        if id == goal {
            return true;
        }
        if seen.insert(id) {
            stack.extend(users.get(&id).into_iter().flatten().copied());
        }
    }
    false
}

fn assemble(variables: &[&DesignObject], links: &Links, order: Vec<ObjectId>) -> SimulationPlan {
    let first = |map: &BTreeMap<ObjectId, Vec<ObjectId>>, flow| {
        map.get(&flow).and_then(|stocks| stocks.first().copied())
    };
    let attached = |map: &BTreeMap<ObjectId, Vec<ObjectId>>, stock| {
        map.iter()
            .filter(|(_, stocks)| stocks.contains(&stock))
            .map(|(flow, _)| *flow)
            .collect::<Vec<_>>()
    };
    let mut plan = SimulationPlan {
        computation_order: order,
        ..SimulationPlan::default()
    };
    for object in variables {
        let id = object.id();
        let name = object.name().unwrap_or_default().trim().to_owned();
        match object.type_name() {
            STOCK => plan.stocks.push(StockPlan {
                id,
                name,
                initial: text(object, ATTR_FORMULA),
                allows_negative: flag(object, ATTR_ALLOWS_NEGATIVE),
                inflows: attached(&links.fills, id),
                outflows: attached(&links.drains, id),
            }),
            FLOW => plan.flows.push(FlowPlan {
                id,
                name,
                formula: text(object, ATTR_FORMULA),
                drains: first(&links.drains, id),
                fills: first(&links.fills, id),
            }),
            AUXILIARY => plan.auxiliaries.push(AuxiliaryPlan {
                id,
                name,
                formula: text(object, ATTR_FORMULA),
            }),
            GRAPHICAL_FUNCTION => plan.graphical_functions.push(GraphicalFunctionPlan {
                id,
                name,
                points: samples(object)
                    .chunks_exact(2)
                    .map(|pair| (pair[0], pair[1]))
                    .collect(),
            }),
            _ => {}
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{self, ATTR_NAME};
    use crate::frame::PendingFrame;
    use crate::ident::{FrameId, IdentitySequence};

    fn pending() -> PendingFrame {
        PendingFrame::derive(
            FrameId::from_raw(1),
            None,
            Arc::new(catalog::stock_flow()),
            IdentitySequence::starting_at(1),
        )
    }

    #[test]
    fn compiles_a_draining_stock() {
        let mut frame = pending();
        let pool = frame
            .create_node(STOCK, [(ATTR_NAME, "pool"), (ATTR_FORMULA, "100")])
            .unwrap();
        let rate = frame
            .create_node(AUXILIARY, [(ATTR_NAME, "rate"), (ATTR_FORMULA, "0.1")])
            .unwrap();
        let out = frame
            .create_node(FLOW, [(ATTR_NAME, "out"), (ATTR_FORMULA, "pool * rate")])
            .unwrap();
        frame.create_edge(DRAINS, pool, out).unwrap();
        frame.create_edge(PARAMETER, pool, out).unwrap();
        frame.create_edge(PARAMETER, rate, out).unwrap();

        let plan = StockFlowCompiler.compile(&frame.freeze()).unwrap();
        assert_eq!(plan.stocks[0].outflows, vec![out]);
        assert!(plan.stocks[0].inflows.is_empty());
        assert_eq!(plan.flows[0].drains, Some(pool));
        assert_eq!(plan.computation_order, vec![rate, out]);
        assert_eq!(plan.variable_count(), 3);
    }

    #[test]
    fn parameter_cycle_is_reported_on_each_member() {
        let mut frame = pending();
        let a = frame
            .create_node(AUXILIARY, [(ATTR_NAME, "a"), (ATTR_FORMULA, "b")])
            .unwrap();
        let b = frame
            .create_node(AUXILIARY, [(ATTR_NAME, "b"), (ATTR_FORMULA, "a")])
            .unwrap();
        let c = frame
            .create_node(AUXILIARY, [(ATTR_NAME, "c"), (ATTR_FORMULA, "a")])
            .unwrap();
        frame.create_edge(PARAMETER, a, b).unwrap();
        frame.create_edge(PARAMETER, b, a).unwrap();
        frame.create_edge(PARAMETER, a, c).unwrap();

        let Err(CompilerError::Issues(issues)) = StockFlowCompiler.compile(&frame.freeze()) else {
            panic!("cycle must fail");
        };
        assert_eq!(issues.len(), 2);
        assert_eq!(issues.issues_for(a).len(), 1);
        assert_eq!(issues.issues_for(b).len(), 1);
        assert!(issues.issues_for(c).is_empty());
    }

    #[test]
    fn stocks_break_cycles() {
        let mut frame = pending();
        let level = frame
            .create_node(STOCK, [(ATTR_NAME, "level"), (ATTR_FORMULA, "1")])
            .unwrap();
        let inflow = frame
            .create_node(FLOW, [(ATTR_NAME, "in"), (ATTR_FORMULA, "level")])
            .unwrap();
        frame.create_edge(FILLS, inflow, level).unwrap();
        frame.create_edge(PARAMETER, level, inflow).unwrap();
        let plan = StockFlowCompiler.compile(&frame.freeze()).unwrap();
        assert_eq!(plan.stocks[0].inflows, vec![inflow]);
        assert_eq!(plan.computation_order, vec![inflow]);
    }

    #[test]
    fn naming_and_shape_issues_are_collected() {
        let mut frame = pending();
        let s1 = frame
            .create_node(STOCK, [(ATTR_NAME, "x"), (ATTR_FORMULA, "")])
            .unwrap();
        let s2 = frame
            .create_node(STOCK, [(ATTR_NAME, "x"), (ATTR_FORMULA, "2")])
            .unwrap();
        let f = frame.create_node(FLOW, [(ATTR_FORMULA, "1")]).unwrap();
        frame.create_edge(DRAINS, s1, f).unwrap();
        frame.create_edge(DRAINS, s2, f).unwrap();
        let g = frame
            .create_node(GRAPHICAL_FUNCTION, [(ATTR_NAME, "lookup")])
            .unwrap();
        frame
            .require_mut(g)
            .unwrap()
            .set_attribute_from_text(ATTR_POINTS, "[0, 1, 2]")
            .unwrap();

        let Err(CompilerError::Issues(issues)) = StockFlowCompiler.compile(&frame.freeze()) else {
            panic!("issues expected");
        };
        assert_eq!(issues.issues_for(s1).len(), 2, "duplicate name and empty formula");
        assert_eq!(issues.issues_for(s2).len(), 1);
        assert_eq!(issues.issues_for(f).len(), 2, "no name and two drained stocks");
        assert_eq!(issues.issues_for(g).len(), 1);
    }
}
