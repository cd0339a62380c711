// robot/model.rs

// Robot description format and the kinematic model built from it. The model is
// immutable once built and shared between the scene monitor, the planning
// backend and every working copy of the kinematic state.

use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ConfigError;

/// Robot description as loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotDescription {
    /// Robot name, informational only
    pub name: String,
    /// Link every other link hangs from
    pub root_link: String,
    /// Reference frame markers and snapshots are expressed in (defaults to `root_link`)
    #[serde(default)]
    pub planning_frame: Option<String>,
    /// Joints connecting parent and child links
    #[serde(default)]
    pub joints: Vec<JointDescription>,
    /// Named joint groups requests refer to
    #[serde(default)]
    pub groups: Vec<GroupDescription>,
}

/// One joint of the robot description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointDescription {
    /// Joint name
    pub name: String,
    /// Joint kind
    #[serde(rename = "type")]
    pub kind: JointKind,
    /// Parent link name
    pub parent: String,
    /// Child link name
    pub child: String,
    /// Fixed offset from the parent link frame to the joint frame
    #[serde(default)]
    pub origin: Origin,
    /// Motion axis in the joint frame
    #[serde(default = "default_axis")]
    pub axis: [f64; 3],
    /// Position limits, required for anything but continuous and fixed joints
    #[serde(default)]
    pub limits: Option<JointLimits>,
}

/// Joint kinds understood by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JointKind {
    /// Rotation about the axis, bounded
    Revolute,
    /// Rotation about the axis, unbounded
    Continuous,
    /// Translation along the axis
    Prismatic,
    /// No motion
    Fixed,
}

/// Translation and roll/pitch/yaw of a joint origin.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Origin {
    /// Translation in meters
    #[serde(default)]
    pub xyz: [f64; 3],
    /// Roll, pitch, yaw in radians
    #[serde(default)]
    pub rpy: [f64; 3],
}

/// Position limits of a joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
}

/// Named group of joints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDescription {
    /// Group name
    pub name: String,
    /// Ordered joint names; the order defines the group's variable order
    pub joints: Vec<String>,
}

fn default_axis() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}

impl RobotDescription {
    /// Parses a YAML robot description.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Err(ConfigError::MissingRobotDescription);
        }
        serde_yaml::from_str(text).map_err(|e| ConfigError::InvalidRobotDescription(e.to_string()))
    }
}

/// Joint as stored in the model.
#[derive(Debug, Clone)]
pub struct JointModel {
    name: String,
    kind: JointKind,
    parent_link: usize,
    origin: Isometry3<f64>,
    axis: Unit<Vector3<f64>>,
    limits: Option<JointLimits>,
    variable_index: Option<usize>,
}

impl JointModel {
    /// Joint name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Joint kind
    pub fn kind(&self) -> JointKind {
        self.kind
    }

    /// Position limits, if bounded
    pub fn limits(&self) -> Option<JointLimits> {
        self.limits
    }

    pub(crate) fn parent_link(&self) -> usize {
        self.parent_link
    }

    /// Index into the state's variable vector, `None` for fixed joints
    pub fn variable_index(&self) -> Option<usize> {
        self.variable_index
    }

    /// Transform from the parent link frame to the child link frame at position `q`.
    pub fn transform(&self, q: f64) -> Isometry3<f64> {
        let motion = match self.kind {
            JointKind::Revolute | JointKind::Continuous => Isometry3::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_axis_angle(&self.axis, q),
            ),
            JointKind::Prismatic => Isometry3::from_parts(
                Translation3::from(self.axis.into_inner() * q),
                UnitQuaternion::identity(),
            ),
            JointKind::Fixed => Isometry3::identity(),
        };
        self.origin * motion
    }

    /// Whether `q` lies within the joint's limits (always true when unbounded).
    pub fn satisfies_bounds(&self, q: f64, margin: f64) -> bool {
        match self.limits {
            Some(l) => q >= l.lower - margin && q <= l.upper + margin,
            None => q.is_finite(),
        }
    }

    /// Position used before any joint state has been received.
    pub fn default_position(&self) -> f64 {
        match self.limits {
            Some(l) => 0.0_f64.clamp(l.lower, l.upper),
            None => 0.0,
        }
    }
}

/// Link as stored in the model.
#[derive(Debug, Clone)]
pub struct LinkModel {
    name: String,
    parent_joint: Option<usize>,
}

impl LinkModel {
    /// Link name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Group of joints with its precomputed variable and update sets.
#[derive(Debug, Clone)]
pub struct JointGroup {
    name: String,
    joints: Vec<usize>,
    variables: Vec<usize>,
    updated_links: Vec<usize>,
}

impl JointGroup {
    /// Group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of variables the group controls
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Variable indices in group order
    pub fn variables(&self) -> &[usize] {
        &self.variables
    }

    /// Joint indices in group order
    pub fn joints(&self) -> &[usize] {
        &self.joints
    }

    /// Links whose global transform depends on the group's joints, in topological order
    pub fn updated_links(&self) -> &[usize] {
        &self.updated_links
    }
}

/// Immutable kinematic tree built from a [`RobotDescription`].
#[derive(Debug, Clone)]
pub struct KinematicModel {
    name: String,
    planning_frame: String,
    links: Vec<LinkModel>,
    joints: Vec<JointModel>,
    groups: Vec<JointGroup>,
    link_index: HashMap<String, usize>,
    joint_index: HashMap<String, usize>,
    group_index: HashMap<String, usize>,
    variable_count: usize,
}

impl KinematicModel {
    /// Builds and validates the model. Any inconsistency is a configuration error.
    pub fn from_description(desc: &RobotDescription) -> Result<Self, ConfigError> {
        if desc.root_link.is_empty() {
            return Err(invalid("root_link is empty"));
        }

        let mut joint_index = HashMap::new();
        let mut child_of: HashMap<&str, usize> = HashMap::new();
        for (i, j) in desc.joints.iter().enumerate() {
            if joint_index.insert(j.name.clone(), i).is_some() {
                return Err(invalid(format!("duplicate joint '{}'", j.name)));
            }
            if j.child == desc.root_link {
                return Err(invalid(format!("joint '{}' has the root link as child", j.name)));
            }
            if child_of.insert(j.child.as_str(), i).is_some() {
                return Err(invalid(format!("link '{}' has more than one parent joint", j.child)));
            }
            if let Some(l) = j.limits {
                if !(l.lower <= l.upper) {
                    return Err(invalid(format!("joint '{}' has lower limit above upper", j.name)));
                }
            } else if matches!(j.kind, JointKind::Revolute | JointKind::Prismatic) {
                return Err(invalid(format!("joint '{}' needs limits", j.name)));
            }
            if j.kind != JointKind::Fixed && Vector3::from(j.axis).norm() < 1e-12 {
                return Err(invalid(format!("joint '{}' has a zero axis", j.name)));
            }
        }

        // Breadth-first from the root gives the topological link order and
        // catches joints whose parent is unreachable (dangling or cyclic).
        let mut links = vec![LinkModel { name: desc.root_link.clone(), parent_joint: None }];
        let mut link_index = HashMap::from([(desc.root_link.clone(), 0usize)]);
        let mut joint_links: Vec<Option<(usize, usize)>> = vec![None; desc.joints.len()];
        let mut cursor = 0;
        while cursor < links.len() {
            let parent_name = links[cursor].name.clone();
            for (i, j) in desc.joints.iter().enumerate() {
                if j.parent == parent_name {
                    let child = links.len();
                    links.push(LinkModel { name: j.child.clone(), parent_joint: Some(i) });
                    link_index.insert(j.child.clone(), child);
                    joint_links[i] = Some((cursor, child));
                }
            }
            cursor += 1;
        }

        let mut joints = Vec::with_capacity(desc.joints.len());
        let mut variable_count = 0;
        for (j, placement) in desc.joints.iter().zip(&joint_links) {
            let (parent_link, _child) = placement.ok_or_else(|| {
                invalid(format!("joint '{}' is not connected to root '{}'", j.name, desc.root_link))
            })?;
            let variable_index = (j.kind != JointKind::Fixed).then(|| {
                variable_count += 1;
                variable_count - 1
            });
            let [x, y, z] = j.origin.xyz;
            let [roll, pitch, yaw] = j.origin.rpy;
            joints.push(JointModel {
                name: j.name.clone(),
                kind: j.kind,
                parent_link,
                origin: Isometry3::from_parts(
                    Translation3::new(x, y, z),
                    UnitQuaternion::from_euler_angles(roll, pitch, yaw),
                ),
                axis: Unit::new_normalize(if j.kind == JointKind::Fixed {
                    Vector3::z()
                } else {
                    Vector3::from(j.axis)
                }),
                limits: j.limits,
                variable_index,
            });
        }

        let mut model = KinematicModel {
            name: desc.name.clone(),
            planning_frame: desc.planning_frame.clone().unwrap_or_else(|| desc.root_link.clone()),
            links,
            joints,
            groups: Vec::new(),
            link_index,
            joint_index,
            group_index: HashMap::new(),
            variable_count,
        };
        if !model.link_index.contains_key(&model.planning_frame) {
            return Err(invalid(format!("planning frame '{}' is not a link", model.planning_frame)));
        }

        for g in &desc.groups {
            let group = model.build_group(g)?;
            if model.group_index.insert(g.name.clone(), model.groups.len()).is_some() {
                return Err(invalid(format!("duplicate group '{}'", g.name)));
            }
            model.groups.push(group);
        }

        Ok(model)
    }

    /// Parses and builds in one step.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Self::from_description(&RobotDescription::from_yaml_str(text)?)
    }

    fn build_group(&self, g: &GroupDescription) -> Result<JointGroup, ConfigError> {
        if g.joints.is_empty() {
            return Err(invalid(format!("group '{}' has no joints", g.name)));
        }
        let mut joints = Vec::with_capacity(g.joints.len());
        let mut variables = Vec::with_capacity(g.joints.len());
        for name in &g.joints {
            let idx = *self
                .joint_index
                .get(name)
                .ok_or_else(|| invalid(format!("group '{}' names unknown joint '{}'", g.name, name)))?;
            let var = self.joints[idx]
                .variable_index
                .ok_or_else(|| invalid(format!("group '{}' contains fixed joint '{}'", g.name, name)))?;
            if joints.contains(&idx) {
                return Err(invalid(format!("group '{}' lists joint '{}' twice", g.name, name)));
            }
            joints.push(idx);
            variables.push(var);
        }

        // A link is downstream when some ancestor joint belongs to the group.
        // Links are in topological order, so one forward pass suffices.
        let mut downstream = vec![false; self.links.len()];
        for (i, link) in self.links.iter().enumerate() {
            if let Some(pj) = link.parent_joint {
                downstream[i] = joints.contains(&pj) || downstream[self.joints[pj].parent_link];
            }
        }
        let updated_links = (0..self.links.len()).filter(|&i| downstream[i]).collect();

        Ok(JointGroup { name: g.name.clone(), joints, variables, updated_links })
    }

    /// Robot name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reference frame of snapshots and markers
    pub fn planning_frame(&self) -> &str {
        &self.planning_frame
    }

    /// Total number of joint variables
    pub fn variable_count(&self) -> usize {
        self.variable_count
    }

    /// Links in topological order
    pub fn links(&self) -> &[LinkModel] {
        &self.links
    }

    /// Joints in description order
    pub fn joints(&self) -> &[JointModel] {
        &self.joints
    }

    /// Configured groups
    pub fn groups(&self) -> &[JointGroup] {
        &self.groups
    }

    /// Looks up a link index by name
    pub fn link_id(&self, name: &str) -> Option<usize> {
        self.link_index.get(name).copied()
    }

    /// Looks up a joint by name
    pub fn joint(&self, name: &str) -> Option<&JointModel> {
        self.joint_index.get(name).map(|&i| &self.joints[i])
    }

    /// Looks up a group by name
    pub fn group(&self, name: &str) -> Option<&JointGroup> {
        self.group_index.get(name).map(|&i| &self.groups[i])
    }

    /// Joint names of a group, in variable order
    pub fn group_joint_names(&self, group: &JointGroup) -> Vec<String> {
        group.joints.iter().map(|&j| self.joints[j].name.clone()).collect()
    }

    /// Joint models of a group, in variable order
    pub fn group_joint_models<'a>(&'a self, group: &'a JointGroup) -> impl Iterator<Item = &'a JointModel> {
        group.joints.iter().map(move |&j| &self.joints[j])
    }

    pub(crate) fn parent_joint_of(&self, link: usize) -> Option<&JointModel> {
        self.links[link].parent_joint.map(|j| &self.joints[j])
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::InvalidRobotDescription(msg.into())
}
