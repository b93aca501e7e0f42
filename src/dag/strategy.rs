// src/dag/strategy.rs

//! Run strategies: what to do with the terminal state.

use std::collections::HashSet;
use std::io::Write;

use tracing::info;

use crate::dag::{EvaluationContext, EvaluationStatus, StateGraph, StateId};
use crate::errors::{PrimerError, Result};

/// Policy applied to the terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStrategy {
    /// Evaluate the terminal state and use its `i32` value as exit code.
    #[default]
    ExitCodeReporter,
    /// Print the declared dependency tree; evaluate nothing.
    GraphPrinter,
}

impl RunStrategy {
    /// Execute against `terminal`, returning the process exit code.
    ///
    /// Only `GraphPrinter` writes to `out`.
    pub fn execute(
        self,
        ctx: &EvaluationContext,
        terminal: &StateId,
        out: &mut dyn Write,
    ) -> Result<i32> {
        match self {
            RunStrategy::ExitCodeReporter => {
                let exit_code = ctx.evaluate_as::<i32>(terminal.clone())?;
                info!(state = %terminal, exit_code, "terminal state evaluated");
                Ok(exit_code)
            }
            RunStrategy::GraphPrinter => {
                print_graph(ctx.graph(), terminal, out)?;
                Ok(0)
            }
        }
    }
}

/// Render the declared dependency tree rooted at `root`.
///
/// Nodes already printed are marked `(*)` and not expanded again; unknown
/// ids and edges that loop back into the current path are marked as such.
pub fn print_graph(graph: &StateGraph, root: &StateId, out: &mut dyn Write) -> Result<()> {
    let mut printer = TreePrinter {
        graph,
        out,
        expanded: HashSet::new(),
        path: Vec::new(),
    };
    printer.print_node(root, "", "")
}

struct TreePrinter<'g, 'o> {
    graph: &'g StateGraph,
    out: &'o mut dyn Write,
    expanded: HashSet<StateId>,
    path: Vec<StateId>,
}

impl TreePrinter<'_, '_> {
    fn print_node(&mut self, id: &StateId, first_prefix: &str, rest_prefix: &str) -> Result<()> {
        let graph = self.graph;
        let node = match graph.lookup(id) {
            Ok(node) => node,
            Err(PrimerError::UnknownState(_)) => {
                writeln!(self.out, "{first_prefix}{id} (unknown)")?;
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        if self.path.contains(id) {
            writeln!(self.out, "{first_prefix}{id} (cycle)")?;
            return Ok(());
        }
        if self.expanded.contains(id) {
            writeln!(self.out, "{first_prefix}{id} (*)")?;
            return Ok(());
        }

        match node.status() {
            EvaluationStatus::Unstarted => writeln!(self.out, "{first_prefix}{id}")?,
            status => writeln!(self.out, "{first_prefix}{id} [{}]", status.name())?,
        }

        self.expanded.insert(id.clone());
        self.path.push(id.clone());

        let parents = node.parents();
        for (index, parent) in parents.iter().enumerate() {
            let last = index + 1 == parents.len();
            let (branch, continuation) = if last {
                ("└── ", "    ")
            } else {
                ("├── ", "│   ")
            };
            self.print_node(
                parent,
                &format!("{rest_prefix}{branch}"),
                &format!("{rest_prefix}{continuation}"),
            )?;
        }

        self.path.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::dag::{EnvSnapshot, StateNode, state_value};
    use crate::exec::backend::RefusingBackend;

    fn context() -> EvaluationContext {
        EvaluationContext::new(EnvSnapshot::default(), Box::new(RefusingBackend)).unwrap()
    }

    fn tracked(id: &'static str, parents: &[&'static str], calls: &Rc<Cell<u32>>) -> StateNode {
        let calls = Rc::clone(calls);
        StateNode::from_fn(
            id,
            parents.iter().map(|p| StateId::from_static(*p)).collect(),
            move |_| {
                calls.set(calls.get() + 1);
                Ok(state_value(0_i32))
            },
        )
    }

    #[test]
    fn printer_renders_tree_without_evaluating() {
        let mut ctx = context();
        let calls = Rc::new(Cell::new(0));
        ctx.register_bootstrapper(tracked("top", &["left", "right"], &calls))
            .unwrap();
        ctx.register_bootstrapper(tracked("left", &["base"], &calls)).unwrap();
        ctx.register_bootstrapper(tracked("right", &["base", "ghost"], &calls))
            .unwrap();
        ctx.register_bootstrapper(tracked("base", &[], &calls)).unwrap();

        let mut out = Vec::new();
        let code = RunStrategy::GraphPrinter
            .execute(&ctx, &"top".into(), &mut out)
            .unwrap();

        assert_eq!(code, 0);
        assert_eq!(calls.get(), 0);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "top\n\
             ├── left\n\
             │   └── base\n\
             └── right\n\
             \u{20}   ├── base (*)\n\
             \u{20}   └── ghost (unknown)\n"
        );
        for id in ["top", "left", "right", "base"] {
            let node = ctx.graph().lookup(&StateId::from_static(id)).unwrap();
            assert_eq!(node.status(), EvaluationStatus::Unstarted);
            assert!(node.cached_value().is_none());
        }
    }

    #[test]
    fn printer_marks_cycles() {
        let mut ctx = context();
        let calls = Rc::new(Cell::new(0));
        ctx.register_bootstrapper(tracked("a", &["b"], &calls)).unwrap();
        ctx.register_bootstrapper(tracked("b", &["a"], &calls)).unwrap();

        let mut out = Vec::new();
        print_graph(ctx.graph(), &"a".into(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "a\n└── b\n    └── a (cycle)\n");
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn reporter_forwards_exit_code() {
        let mut ctx = context();
        ctx.register_bootstrapper(StateNode::from_fn("done", vec![], |_| Ok(state_value(3_i32))))
            .unwrap();
        let mut out = Vec::new();
        let code = RunStrategy::ExitCodeReporter
            .execute(&ctx, &"done".into(), &mut out)
            .unwrap();
        assert_eq!(code, 3);
        assert!(out.is_empty());
    }

    #[test]
    fn printer_shows_status_of_evaluated_nodes() {
        let mut ctx = context();
        ctx.register_bootstrapper(StateNode::from_fn("done", vec![], |_| Ok(state_value(0_i32))))
            .unwrap();
        ctx.evaluate(&"done".into()).unwrap();

        let mut out = Vec::new();
        print_graph(ctx.graph(), &"done".into(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "done [completed]\n");
    }
}
