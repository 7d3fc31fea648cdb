//! A one-shot dependency graph of tasks executed on a rayon pool.
//!
//! Nodes are closures; edges say "this task must finish before that one
//! starts". [`TaskGraph::run`] checks the graph for cycles, then dispatches
//! every task whose predecessors are done onto the pool and blocks the
//! caller until nothing is left to run.
//!
//! The graph is built fresh every frame, so it borrows whatever the frame
//! needs for lifetime `'a` instead of requiring `'static` tasks.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use rayon::{Scope, ThreadPool};
use tracing::trace;

use crate::error::{EcsError, Result};

/// Index of a task within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(usize);

type Work<'a> = Box<dyn Fn() -> Result<()> + Send + Sync + 'a>;

struct Node<'a> {
    name: String,
    work: Work<'a>,
    successors: Vec<usize>,
    predecessors: usize,
}

/// Directed acyclic graph of tasks.
#[derive(Default)]
pub struct TaskGraph<'a> {
    nodes: Vec<Node<'a>>,
}

/// Shared bookkeeping for one [`TaskGraph::run`].
struct RunState {
    pending: Vec<AtomicUsize>,
    failed: AtomicBool,
    failure: Mutex<Option<EcsError>>,
}

impl<'a> TaskGraph<'a> {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Add a task and return its id.
    pub fn add_task(
        &mut self,
        name: impl Into<String>,
        work: impl Fn() -> Result<()> + Send + Sync + 'a,
    ) -> TaskId {
        self.nodes.push(Node {
            name: name.into(),
            work: Box::new(work),
            successors: Vec::new(),
            predecessors: 0,
        });
        TaskId(self.nodes.len() - 1)
    }

    /// Require `first` to finish before `then` starts.
    ///
    /// Duplicate edges are ignored.
    pub fn precede(&mut self, first: TaskId, then: TaskId) {
        if self.nodes[first.0].successors.contains(&then.0) {
            return;
        }
        self.nodes[first.0].successors.push(then.0);
        self.nodes[then.0].predecessors += 1;
    }

    /// Require `task` to start only after `after` finishes.
    pub fn succeed(&mut self, task: TaskId, after: TaskId) {
        self.precede(after, task);
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.successors.len()).sum()
    }

    /// Name of a task.
    #[must_use]
    pub fn name(&self, task: TaskId) -> &str {
        &self.nodes[task.0].name
    }

    /// Drop every task and edge.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Check that the graph is acyclic.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidGraph`] naming the tasks that sit on a cycle.
    pub fn validate(&self) -> Result<()> {
        let n = self.nodes.len();
        let mut indegree: Vec<usize> = self.nodes.iter().map(|node| node.predecessors).collect();
        let mut ready: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut removed = vec![false; n];

        while let Some(i) = ready.pop_front() {
            removed[i] = true;
            for &succ in &self.nodes[i].successors {
                indegree[succ] -= 1;
                if indegree[succ] == 0 {
                    ready.push_back(succ);
                }
            }
        }

        if removed.iter().all(|&r| r) {
            return Ok(());
        }

        // Peel off tasks that merely hang below a cycle, leaving the cycle.
        loop {
            let mut changed = false;
            for i in 0..n {
                if !removed[i] && self.nodes[i].successors.iter().all(|&s| removed[s]) {
                    removed[i] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let cycle: Vec<String> = (0..n)
            .filter(|&i| !removed[i])
            .map(|i| self.nodes[i].name.clone())
            .collect();
        Err(EcsError::InvalidGraph { cycle })
    }

    /// Validate the graph, then run it to completion on `pool`.
    ///
    /// Blocks until every dispatched task has finished. Once a task fails no
    /// further tasks are dispatched; tasks already running finish normally.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidGraph`] if the graph has a cycle, or the first
    /// error returned by a task.
    pub fn run(&self, pool: &ThreadPool) -> Result<()> {
        self.validate()?;
        if self.nodes.is_empty() {
            return Ok(());
        }

        trace!(
            tasks = self.nodes.len(),
            edges = self.edge_count(),
            "running task graph"
        );

        let state = RunState {
            pending: self
                .nodes
                .iter()
                .map(|node| AtomicUsize::new(node.predecessors))
                .collect(),
            failed: AtomicBool::new(false),
            failure: Mutex::new(None),
        };

        pool.scope(|scope| {
            for (i, node) in self.nodes.iter().enumerate() {
                if node.predecessors == 0 {
                    self.dispatch(scope, i, &state);
                }
            }
        });

        match state.failure.into_inner() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn dispatch<'s>(&'s self, scope: &Scope<'s>, index: usize, state: &'s RunState) {
        scope.spawn(move |scope| {
            if state.failed.load(Ordering::Acquire) {
                return;
            }
            let node = &self.nodes[index];
            if let Err(err) = (node.work)() {
                state.failed.store(true, Ordering::Release);
                let mut slot = state.failure.lock();
                if slot.is_none() {
                    *slot = Some(err);
                }
                return;
            }
            for &succ in &node.successors {
                if state.pending[succ].fetch_sub(1, Ordering::AcqRel) == 1 {
                    self.dispatch(scope, succ, state);
                }
            }
        });
    }
}

impl fmt::Debug for TaskGraph<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for node in &self.nodes {
            let successors: Vec<&str> = node
                .successors
                .iter()
                .map(|&s| self.nodes[s].name.as_str())
                .collect();
            list.entry(&(node.name.as_str(), successors));
        }
        list.finish()
    }
}
