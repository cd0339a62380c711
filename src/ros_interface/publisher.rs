use r2r::QosProfile;
use r2r::visualization_msgs::msg::MarkerArray;
use std::sync::Mutex;

use super::messages::to_marker_array;
use crate::PublishError;
use crate::visualization::{MarkerBatch, MarkerSink};

/// Marker array publisher; each batch goes out as one MarkerArray message.
pub struct MarkerPublisher {
    inner: Mutex<r2r::Publisher<MarkerArray>>,
}

impl MarkerPublisher {
    /// Advertises the marker array topic with the given queue depth.
    pub fn new(node: &mut r2r::Node, topic: &str, depth: usize) -> Result<Self, r2r::Error> {
        let publisher = node.create_publisher::<MarkerArray>(topic, QosProfile::default().keep_last(depth as u32))?;
        Ok(MarkerPublisher { inner: Mutex::new(publisher) })
    }
}

impl MarkerSink for MarkerPublisher {
    fn publish(&self, batch: &MarkerBatch) -> Result<(), PublishError> {
        let message = to_marker_array(batch);
        self.inner
            .lock()
            .map_err(|_| PublishError::Unavailable("marker publisher lock poisoned".to_string()))?
            .publish(&message)
            .map_err(|e| PublishError::Unavailable(e.to_string()))
    }
}
