//! Axis-aligned bounding-box overlap ratios.
//!
//! Boxes are coordinate vectors holding the minimum corner followed by the
//! maximum corner (`[min_0, ..., min_k, max_0, ..., max_k]`), in inclusive
//! voxel coordinates: a box whose corners coincide spans one voxel per
//! axis.

use crate::error::{MeasureError, MeasureResult};

/// Volume of a box, in voxels.
pub fn box_area(bx: &[f64]) -> MeasureResult<f64> {
    let half = half_len(bx)?;
    Ok(bx[half..]
        .iter()
        .zip(&bx[..half])
        .map(|(max, min)| max + 1.0 - min)
        .product())
}

/// Volume of the intersection of two boxes, zero when they are disjoint.
pub fn box_intersection(box1: &[f64], box2: &[f64]) -> MeasureResult<f64> {
    let half = check_pair(box1, box2)?;
    let mut volume = 1.0;
    for axis in 0..half {
        let lower = box1[axis].max(box2[axis]);
        let upper = box1[half + axis].min(box2[half + axis]);
        volume *= (upper + 1.0 - lower).max(0.0);
    }
    Ok(volume)
}

/// Volume of the union of two boxes.
pub fn box_union(box1: &[f64], box2: &[f64]) -> MeasureResult<f64> {
    Ok(box_area(box1)? + box_area(box2)? - box_intersection(box1, box2)?)
}

/// Intersection over union of two boxes.
pub fn box_iou(box1: &[f64], box2: &[f64]) -> MeasureResult<f64> {
    Ok(box_intersection(box1, box2)? / box_union(box1, box2)?)
}

/// Intersection over the volume of the second box.
pub fn box_ior(box1: &[f64], box2: &[f64]) -> MeasureResult<f64> {
    Ok(box_intersection(box1, box2)? / box_area(box2)?)
}

fn half_len(bx: &[f64]) -> MeasureResult<usize> {
    if bx.is_empty() || bx.len() % 2 != 0 {
        return Err(MeasureError::InvalidBox {
            reason: format!("corner vector must have a non-zero even length, got {}", bx.len()),
        });
    }
    Ok(bx.len() / 2)
}

fn check_pair(box1: &[f64], box2: &[f64]) -> MeasureResult<usize> {
    let half = half_len(box1)?;
    if box1.len() != box2.len() {
        return Err(MeasureError::InvalidBox {
            reason: format!("corner vectors disagree in length: {} vs {}", box1.len(), box2.len()),
        });
    }
    Ok(half)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn identical_boxes_have_unit_iou() {
        let bx = [0.0, 0.0, 2.0, 2.0];
        assert_relative_eq!(box_iou(&bx, &bx).unwrap(), 1.0);
        assert_relative_eq!(box_area(&bx).unwrap(), 9.0);
    }

    #[test]
    fn disjoint_boxes_do_not_intersect() {
        let a = [0.0, 0.0, 1.0, 1.0];
        let b = [5.0, 5.0, 6.0, 6.0];
        assert_relative_eq!(box_intersection(&a, &b).unwrap(), 0.0);
        assert_relative_eq!(box_iou(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn partial_overlap_in_three_dimensions() {
        let a = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let b = [1.0, 1.0, 1.0, 2.0, 2.0, 2.0];
        assert_relative_eq!(box_intersection(&a, &b).unwrap(), 1.0);
        assert_relative_eq!(box_ior(&a, &b).unwrap(), 1.0 / 8.0);
    }

    #[test]
    fn malformed_boxes_are_rejected() {
        assert!(matches!(
            box_area(&[0.0, 1.0, 2.0]),
            Err(MeasureError::InvalidBox { .. })
        ));
        assert!(matches!(
            box_iou(&[0.0, 1.0], &[0.0, 0.0, 1.0, 1.0]),
            Err(MeasureError::InvalidBox { .. })
        ));
    }
}
