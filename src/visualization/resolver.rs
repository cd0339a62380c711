//! Maps explored configurations to world-frame link positions.

use log::debug;
use nalgebra::Point3;

use crate::ResolveError;
use crate::robot::KinematicState;
use crate::planning::ExploredStateRecord;

/// Position of `link` after applying `configuration` to `group`.
///
/// Works on a private copy of `base`, so no resolution ever observes the
/// configuration of another. Units are whatever the model uses.
pub fn resolve_link_position(
    base: &KinematicState,
    group: &str,
    configuration: &[f64],
    link: &str,
) -> Result<Point3<f64>, ResolveError> {
    let mut working = base.clone();
    working.set_group_positions(group, configuration)?;
    working.update_link_transforms(group)?;
    let position = working.link_position(link)?;
    if position.coords.iter().all(|c| c.is_finite()) {
        Ok(position)
    } else {
        Err(ResolveError::NonFinite { link: link.to_string() })
    }
}

/// Resolves every state of `record`, pairing each position with the state's
/// index in the record. States that fail to resolve are left out.
pub fn resolve_record(base: &KinematicState, record: &ExploredStateRecord, link: &str) -> Vec<(usize, Point3<f64>)> {
    record
        .states
        .iter()
        .enumerate()
        .filter_map(|(i, state)| match resolve_link_position(base, &record.group_name, state, link) {
            Ok(p) => Some((i, p)),
            Err(e) => {
                debug!("Skipping explored state {}: {}", i, e);
                None
            }
        })
        .collect()
}
