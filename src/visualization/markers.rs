//! Marker records and batch construction.
//!
//! A [`MarkerBatch`] is published as one unit so a renderer never shows half
//! of an exploration cloud. Every marker in a batch shares the batch's frame
//! and stamp.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// RGBA color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorRgba {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Opacity
    pub a: f32,
}

impl ColorRgba {
    /// Opaque red
    pub const RED: ColorRgba = ColorRgba { r: 1.0, g: 0.0, b: 0.0, a: 1.0 };
}

/// Marker geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerShape {
    /// Sphere with diameter `scale`
    Sphere,
}

/// Visual attributes shared by every marker of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerStyle {
    /// Namespace tag separating this source from other marker publishers
    pub namespace: String,
    /// Geometry
    pub shape: MarkerShape,
    /// Uniform size in model units
    pub scale: f64,
    /// Fill color
    pub color: ColorRgba,
    /// How long a renderer keeps the marker before expiring it
    pub lifetime: Duration,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        MarkerStyle {
            namespace: "planner_data".to_string(),
            shape: MarkerShape::Sphere,
            scale: 0.035,
            color: ColorRgba::RED,
            lifetime: Duration::from_secs(10),
        }
    }
}

/// One visual element.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRecord {
    /// Index of the explored state the marker stands for
    pub id: usize,
    /// Namespace tag
    pub namespace: String,
    /// Reference frame of `position`
    pub frame_id: String,
    /// Construction time of the batch
    pub stamp: SystemTime,
    /// Geometry
    pub shape: MarkerShape,
    /// Marker center
    pub position: Point3<f64>,
    /// Always identity
    pub orientation: UnitQuaternion<f64>,
    /// Per-axis size
    pub scale: Vector3<f64>,
    /// Fill color
    pub color: ColorRgba,
    /// Time to live
    pub lifetime: Duration,
}

/// Markers published together.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerBatch {
    /// Namespace tag shared by all markers
    pub namespace: String,
    /// Frame shared by all markers
    pub frame_id: String,
    /// Stamp shared by all markers
    pub stamp: SystemTime,
    /// Markers in index order
    pub markers: Vec<MarkerRecord>,
}

impl MarkerBatch {
    /// Number of markers
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Whether the batch holds no markers
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Builds one batch from indexed positions; `None` when there is nothing to show.
pub fn build_batch(
    positions: impl IntoIterator<Item = (usize, Point3<f64>)>,
    frame_id: &str,
    stamp: SystemTime,
    style: &MarkerStyle,
) -> Option<MarkerBatch> {
    let markers: Vec<MarkerRecord> = positions
        .into_iter()
        .map(|(id, position)| MarkerRecord {
            id,
            namespace: style.namespace.clone(),
            frame_id: frame_id.to_string(),
            stamp,
            shape: style.shape,
            position,
            orientation: UnitQuaternion::identity(),
            scale: Vector3::repeat(style.scale),
            color: style.color,
            lifetime: style.lifetime,
        })
        .collect();

    (!markers.is_empty()).then(|| MarkerBatch {
        namespace: style.namespace.clone(),
        frame_id: frame_id.to_string(),
        stamp,
        markers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_shares_frame_stamp_and_style() {
        let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(42);
        let positions = vec![(0, Point3::new(1.0, 0.0, 0.0)), (2, Point3::new(0.0, 1.0, 0.0))];
        let batch = build_batch(positions, "odom_combined", stamp, &MarkerStyle::default()).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.namespace, "planner_data");
        for m in &batch.markers {
            assert_eq!(m.frame_id, "odom_combined");
            assert_eq!(m.stamp, stamp);
            assert_eq!(m.shape, MarkerShape::Sphere);
            assert_eq!(m.color, ColorRgba::RED);
            assert_eq!(m.scale, Vector3::repeat(0.035));
            assert_eq!(m.orientation, UnitQuaternion::identity());
            assert_eq!(m.lifetime, Duration::from_secs(10));
        }
        let ids: Vec<_> = batch.markers.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn nothing_to_show_yields_no_batch() {
        assert!(build_batch(Vec::new(), "base", SystemTime::now(), &MarkerStyle::default()).is_none());
    }
}
