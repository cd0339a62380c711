// src/ros_interface/subscriber.rs
// Feeds joint states from ROS 2 into the scene monitor.

use futures::{Stream, StreamExt};
use log::{debug, warn};
use r2r::QosProfile;
use r2r::sensor_msgs::msg::JointState;
use std::sync::Arc;

use crate::robot::SceneMonitor;

/// Subscribes to `topic` and returns the stream of joint states.
pub fn joint_state_stream(
    node: &mut r2r::Node,
    topic: &str,
) -> Result<impl Stream<Item = JointState> + Unpin, r2r::Error> {
    node.subscribe::<JointState>(topic, QosProfile::default())
}

/// Applies every received joint state to `monitor` until the stream ends.
pub async fn track_joint_states(mut states: impl Stream<Item = JointState> + Unpin, monitor: Arc<SceneMonitor>) {
    while let Some(msg) = states.next().await {
        match monitor.update_joint_positions(&msg.name, &msg.position) {
            Ok(applied) => debug!("Applied {} of {} joint positions", applied, msg.name.len()),
            Err(e) => warn!("Dropping joint state: {}", e),
        }
    }
}
