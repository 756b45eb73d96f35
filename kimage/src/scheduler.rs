use std::{
    collections::VecDeque,
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicBool, Ordering},
        Condvar, Mutex,
    },
    thread,
};

use log::debug;

/// How a node of the graph ended up.
#[derive(Debug)]
pub enum Finished<T, E> {
    Ran(Result<T, E>),
    /// The node was not run because the node at this index failed.
    DependencyFailed(usize),
    /// The node was not started before cancellation was requested.
    Cancelled,
}

struct State<T, E> {
    /// Number of unfinished dependencies per node.
    waiting_on: Vec<usize>,
    ready: VecDeque<usize>,
    running: usize,
    results: Vec<Option<Finished<T, E>>>,
}

impl<T, E> State<T, E> {
    fn fail_dependents(&mut self, dependents: &[Vec<usize>], failed: usize) {
        let mut stack = vec![failed];
        while let Some(index) = stack.pop() {
            for &dependent in &dependents[index] {
                if self.results[dependent].is_none() {
                    self.results[dependent] = Some(Finished::DependencyFailed(index));
                    stack.push(dependent);
                }
            }
        }
    }
}

/// A node a worker has taken. Dropping it records the result and wakes the other workers, also when
/// `work` panicked and no result was set, in which case the dependents are failed.
struct Claim<'a, T, E> {
    state: &'a Mutex<State<T, E>>,
    changed: &'a Condvar,
    dependents: &'a [Vec<usize>],
    index: usize,
    result: Option<Result<T, E>>,
}

impl<T, E> Drop for Claim<'_, T, E> {
    fn drop(&mut self) {
        let index = self.index;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.running -= 1;
        match self.result.take() {
            Some(result) => {
                if result.is_ok() {
                    for &dependent in &self.dependents[index] {
                        state.waiting_on[dependent] -= 1;
                        if state.waiting_on[dependent] == 0 && state.results[dependent].is_none() {
                            state.ready.push_back(dependent);
                        }
                    }
                } else {
                    state.fail_dependents(self.dependents, index);
                }
                state.results[index] = Some(Finished::Ran(result));
            }
            None => state.fail_dependents(self.dependents, index),
        }
        drop(state);
        self.changed.notify_all();
    }
}

/// Runs `work` for every node of a dependency graph on up to `jobs` threads. A node starts only
/// after all of its dependencies finished successfully; unrelated nodes run in no particular order.
/// Once `cancel` is set no further nodes are started, nodes already running are finished.
///
/// `dependencies[i]` lists the nodes node `i` depends on. The graph must be acyclic.
pub fn run<T, E, F>(
    dependencies: &[Vec<usize>],
    jobs: NonZeroUsize,
    cancel: &AtomicBool,
    work: F,
) -> Vec<Finished<T, E>>
where
    T: Send,
    E: Send,
    F: Fn(usize) -> Result<T, E> + Sync,
{
    let len = dependencies.len();
    let mut dependents = vec![Vec::new(); len];
    for (index, node_dependencies) in dependencies.iter().enumerate() {
        for &dependency in node_dependencies {
            dependents[dependency].push(index);
        }
    }

    let state = Mutex::new(State {
        waiting_on: dependencies.iter().map(Vec::len).collect(),
        ready: (0..len)
            .filter(|&index| dependencies[index].is_empty())
            .collect(),
        running: 0,
        results: (0..len).map(|_| None).collect(),
    });
    let changed = Condvar::new();

    let next = || -> Option<usize> {
        let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if cancel.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(index) = state.ready.pop_front() {
                state.running += 1;
                return Some(index);
            }
            if state.running == 0 {
                return None;
            }
            state = changed.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    };

    let workers = jobs.get().min(len.max(1));
    debug!("running {len} tasks on {workers} workers");

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                while let Some(index) = next() {
                    let mut claim = Claim {
                        state: &state,
                        changed: &changed,
                        dependents: &dependents,
                        index,
                        result: None,
                    };
                    claim.result = Some(work(index));
                }
                // Wake the others so they notice cancellation or that no work is left.
                changed.notify_all();
            });
        }
    });

    state
        .into_inner()
        .unwrap_or_else(|e| e.into_inner())
        .results
        .into_iter()
        .map(|result| result.unwrap_or(Finished::Cancelled))
        .collect()
}
