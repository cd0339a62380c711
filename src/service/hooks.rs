//! Post-solve event and the hook trait that consumes it.

use crate::robot::SceneSnapshot;
use crate::planning::{ExploredStateRecord, PlanRequest};

/// Everything a hook may look at once a solve has returned.
#[derive(Debug, Clone, Copy)]
pub struct SolveEvent<'a> {
    /// Snapshot the solve ran against
    pub scene: &'a SceneSnapshot,
    /// Request that was solved
    pub request: &'a PlanRequest,
    /// Success flag reported by the engine
    pub success: bool,
    /// States explored by this solve, if the engine kept any
    pub explored: Option<&'a ExploredStateRecord>,
}

/// Side effect run after every plan request, whatever its outcome.
///
/// Hooks cannot fail the request; they report their own problems.
pub trait PostSolveHook: Send {
    /// Short name for status reports
    fn name(&self) -> &str;

    /// Called once per plan request, right after the solve returned.
    fn after_solve(&mut self, event: &SolveEvent<'_>);
}
