// robot/state.rs

// Joint values plus cached global link transforms for one robot configuration.
// Cloning yields an independent working copy; nothing here is shared mutably.

use nalgebra::{Isometry3, Point3};
use std::sync::Arc;

use super::model::{JointGroup, KinematicModel};
use crate::KinematicsError;

/// Configuration of the whole robot with forward kinematics applied.
#[derive(Debug, Clone)]
pub struct KinematicState {
    model: Arc<KinematicModel>,
    positions: Vec<f64>,
    link_transforms: Vec<Isometry3<f64>>,
}

impl KinematicState {
    /// Creates a state at the default position of every joint, transforms up to date.
    pub fn new(model: Arc<KinematicModel>) -> Self {
        let mut positions = vec![0.0; model.variable_count()];
        for joint in model.joints() {
            if let Some(v) = joint.variable_index() {
                positions[v] = joint.default_position();
            }
        }
        let link_transforms = vec![Isometry3::identity(); model.links().len()];
        let mut state = KinematicState { model, positions, link_transforms };
        state.update_all_transforms();
        state
    }

    /// Model this state belongs to
    pub fn model(&self) -> &Arc<KinematicModel> {
        &self.model
    }

    /// All joint variable values
    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    /// Sets one joint by name. Transforms are not recomputed.
    pub fn set_joint_position(&mut self, joint: &str, value: f64) -> Result<(), KinematicsError> {
        let var = self
            .model
            .joint(joint)
            .ok_or_else(|| KinematicsError::UnknownJoint(joint.to_string()))?
            .variable_index()
            .ok_or_else(|| KinematicsError::FixedJoint(joint.to_string()))?;
        self.positions[var] = value;
        Ok(())
    }

    /// Copies `values` into the group's variables. Transforms are not recomputed.
    pub fn set_group_positions(&mut self, group: &str, values: &[f64]) -> Result<(), KinematicsError> {
        let model = Arc::clone(&self.model);
        let group = lookup_group(&model, group)?;
        if values.len() != group.variable_count() {
            return Err(KinematicsError::DimensionMismatch {
                group: group.name().to_string(),
                expected: group.variable_count(),
                actual: values.len(),
            });
        }
        for (&var, &value) in group.variables().iter().zip(values) {
            self.positions[var] = value;
        }
        Ok(())
    }

    /// Current values of the group's variables, in group order.
    pub fn group_positions(&self, group: &str) -> Result<Vec<f64>, KinematicsError> {
        let group = lookup_group(&self.model, group)?;
        Ok(group.variables().iter().map(|&v| self.positions[v]).collect())
    }

    /// Recomputes the transforms of every link downstream of the group's joints.
    pub fn update_link_transforms(&mut self, group: &str) -> Result<(), KinematicsError> {
        let model = Arc::clone(&self.model);
        let group = lookup_group(&model, group)?;
        for &link in group.updated_links() {
            self.update_link(&model, link);
        }
        Ok(())
    }

    /// Recomputes every link transform.
    pub fn update_all_transforms(&mut self) {
        let model = Arc::clone(&self.model);
        for link in 1..model.links().len() {
            self.update_link(&model, link);
        }
    }

    fn update_link(&mut self, model: &KinematicModel, link: usize) {
        if let Some(joint) = model.parent_joint_of(link) {
            let q = joint.variable_index().map_or(0.0, |v| self.positions[v]);
            let parent = self.link_transforms[joint.parent_link()];
            self.link_transforms[link] = parent * joint.transform(q);
        }
    }

    /// Global transform of a link, as of the last update.
    pub fn global_link_transform(&self, link: &str) -> Result<&Isometry3<f64>, KinematicsError> {
        self.model
            .link_id(link)
            .map(|i| &self.link_transforms[i])
            .ok_or_else(|| KinematicsError::UnknownLink(link.to_string()))
    }

    /// Origin of a link in the root frame, as of the last update.
    pub fn link_position(&self, link: &str) -> Result<Point3<f64>, KinematicsError> {
        Ok(Point3::from(self.global_link_transform(link)?.translation.vector))
    }
}

fn lookup_group<'a>(model: &'a KinematicModel, name: &str) -> Result<&'a JointGroup, KinematicsError> {
    model.group(name).ok_or_else(|| KinematicsError::UnknownGroup(name.to_string()))
}
