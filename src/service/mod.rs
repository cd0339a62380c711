//! Request dispatching.
//!
//! The [`Dispatcher`] owns the planning engine and the post-solve hooks, and
//! borrows the scene through a [`SceneProvider`]. It handles one request at a
//! time: a plan request takes a snapshot, solves, reads the explored-state
//! record of that very solve and runs the hooks before returning. The engine's
//! outcome is returned untouched.

mod bootstrap;
mod hooks;

pub use bootstrap::{PlanningService, bootstrap, bootstrap_with_engine, load_robot_description};
pub use hooks::{PostSolveHook, SolveEvent};

use log::{info, warn};
use std::sync::Arc;

use crate::DispatchError;
use crate::robot::SceneProvider;
use crate::planning::{BenchmarkOutcome, BenchmarkRequest, EngineStatus, PlanRequest, PlanningEngine, SolveOutcome};

/// Snapshot of what the dispatcher has done so far.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherStatus {
    /// Engine-reported status
    pub engine: EngineStatus,
    /// Names of the registered post-solve hooks
    pub hooks: Vec<String>,
    /// Plan requests handled
    pub plans_served: u64,
    /// Benchmark requests handled
    pub benchmarks_served: u64,
    /// Always true once constructed
    pub ready: bool,
}

/// Routes plan and benchmark requests to an engine.
pub struct Dispatcher<E: PlanningEngine> {
    engine: E,
    scene: Arc<dyn SceneProvider>,
    hooks: Vec<Box<dyn PostSolveHook>>,
    plans_served: u64,
    benchmarks_served: u64,
}

impl<E: PlanningEngine> Dispatcher<E> {
    /// Dispatcher with no hooks.
    pub fn new(engine: E, scene: Arc<dyn SceneProvider>) -> Self {
        Dispatcher { engine, scene, hooks: Vec::new(), plans_served: 0, benchmarks_served: 0 }
    }

    /// Registers a hook run after every plan request.
    pub fn add_hook(&mut self, hook: Box<dyn PostSolveHook>) {
        self.hooks.push(hook);
    }

    /// Builder form of [`add_hook`](Self::add_hook).
    pub fn with_hook(mut self, hook: Box<dyn PostSolveHook>) -> Self {
        self.add_hook(hook);
        self
    }

    /// The engine requests are delegated to
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Plans `request` against the current scene.
    ///
    /// Only an unusable scene is an error; a failed solve is returned as an
    /// outcome with `success == false`.
    pub fn handle_plan(&mut self, request: &PlanRequest) -> Result<SolveOutcome, DispatchError> {
        info!("Received new planning request for group '{}'...", request.group_name);
        let scene = self.scene.current_snapshot()?;
        let outcome = self.engine.solve(&scene, request);
        self.plans_served += 1;

        // Read the record before anything else can run a solve.
        let explored = self.engine.last_explored_states().filter(|record| {
            let matches = record.group_name == request.group_name;
            if !matches {
                warn!(
                    "Discarding explored states for group '{}' after a request for '{}'",
                    record.group_name, request.group_name
                );
            }
            matches
        });

        let event = SolveEvent {
            scene: &scene,
            request,
            success: outcome.success,
            explored: explored.as_deref(),
        };
        for hook in &mut self.hooks {
            hook.after_solve(&event);
        }

        info!("Planning request finished: {}", outcome.response.error_code);
        Ok(outcome)
    }

    /// Benchmarks `request` against the current scene. No hooks run.
    pub fn handle_benchmark(&mut self, request: &BenchmarkRequest) -> Result<BenchmarkOutcome, DispatchError> {
        info!("Received new benchmark request '{}' ({} runs)...", request.label, request.runs);
        let scene = self.scene.current_snapshot()?;
        let outcome = self.engine.benchmark(&scene, request);
        self.benchmarks_served += 1;
        info!(
            "Benchmark finished: {}/{} runs succeeded",
            outcome.result.success_count(),
            outcome.result.runs.len()
        );
        Ok(outcome)
    }

    /// Logs engine status and readiness, and returns them.
    pub fn report_status(&self) -> DispatcherStatus {
        let engine = self.engine.status();
        info!("Planning engine: {}", engine.name);
        for line in &engine.details {
            info!("  {}", line);
        }
        info!("Responding to planning and benchmark requests");
        DispatcherStatus {
            engine,
            hooks: self.hooks.iter().map(|h| h.name().to_string()).collect(),
            plans_served: self.plans_served,
            benchmarks_served: self.benchmarks_served,
            ready: true,
        }
    }
}
