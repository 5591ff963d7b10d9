//! Border extraction, connected-component labeling and component
//! correspondence between a prediction and a reference mask.

use crate::grid::{c_strides, unravel, Mask};

/// A connected-component labeling. Component ids run `1..=count`, 0 is
/// background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labeling {
    pub labels: Vec<u32>,
    pub count: u32,
}

/// Independent labelings of both masks plus the component ids that touch
/// the voxel-wise intersection.
#[derive(Debug, Clone)]
pub struct ComponentMatch {
    pub reference: Labeling,
    pub prediction: Labeling,
    /// Reference component ids intersecting the prediction.
    pub matched_reference: Vec<u32>,
    /// Prediction component ids intersecting the reference.
    pub matched_prediction: Vec<u32>,
}

/// Voxel maps derived from the component correspondence: the union of all
/// matched components, and the unmatched components of each mask.
#[derive(Debug, Clone)]
pub struct ErrorMaps {
    pub matched: Vec<bool>,
    pub unmatched_reference: Vec<bool>,
    pub unmatched_prediction: Vec<bool>,
}

/// Maps a `num_neighbors` value onto the neighborhood order (the maximum
/// number of axes an offset may move along at once).
///
/// 2-D: 4 -> 1, 8 -> 2. 3-D: 6 -> 1, 18 -> 2, 26 -> 3, with the 2-D values
/// 4 and 8 accepted as aliases of the axis and full neighborhoods.
pub(crate) fn neighborhood_order(rank: usize, num_neighbors: usize) -> Option<usize> {
    match (rank, num_neighbors) {
        (2, 4) => Some(1),
        (2, 8) => Some(2),
        (3, 4) | (3, 6) => Some(1),
        (3, 18) => Some(2),
        (3, 8) | (3, 26) => Some(3),
        _ => None,
    }
}

/// All neighbor offsets in `{-1, 0, 1}^rank` moving along at most `order`
/// axes.
pub(crate) fn neighbor_offsets(rank: usize, order: usize) -> Vec<Vec<isize>> {
    let mut offsets = Vec::new();
    let total = 3usize.pow(rank as u32);
    for code in 0..total {
        let mut offset = Vec::with_capacity(rank);
        let mut rest = code;
        for _ in 0..rank {
            offset.push((rest % 3) as isize - 1);
            rest /= 3;
        }
        let moved = offset.iter().filter(|&&d| d != 0).count();
        if moved >= 1 && moved <= order {
            offsets.push(offset);
        }
    }
    offsets
}

/// One-voxel-wide boundary shell of a mask.
///
/// A foreground voxel belongs to the border when at least one of its axis
/// neighbors is background or lies outside the grid. This is the erosion
/// difference in 2-D and the six-neighbor comparison in 3-D.
pub fn border_map(mask: &Mask) -> Mask {
    let shape = mask.shape();
    let strides = c_strides(shape);
    let mut border = vec![false; mask.len()];

    for idx in 0..mask.len() {
        if !mask.get(idx) {
            continue;
        }
        let coords = unravel(idx, shape);
        for axis in 0..shape.len() {
            let exposed = coords[axis] == 0
                || coords[axis] + 1 == shape[axis]
                || !mask.get(idx - strides[axis])
                || !mask.get(idx + strides[axis]);
            if exposed {
                border[idx] = true;
                break;
            }
        }
    }

    Mask::from_parts(shape.to_vec(), border)
}

/// Labels the connected components of a mask by flood fill under the given
/// neighborhood order.
pub fn label_components(mask: &Mask, order: usize) -> Labeling {
    let shape = mask.shape();
    let strides = c_strides(shape);
    let offsets = neighbor_offsets(shape.len(), order);
    let mut labels = vec![0u32; mask.len()];
    let mut count = 0u32;
    let mut stack = Vec::new();

    for start in 0..mask.len() {
        if !mask.get(start) || labels[start] != 0 {
            continue;
        }
        count += 1;
        labels[start] = count;
        stack.push(start);

        while let Some(idx) = stack.pop() {
            let coords = unravel(idx, shape);
            'offsets: for offset in &offsets {
                let mut neighbor = idx;
                for axis in 0..shape.len() {
                    let coord = coords[axis] as isize + offset[axis];
                    if coord < 0 || coord as usize >= shape[axis] {
                        continue 'offsets;
                    }
                    neighbor = (neighbor as isize + offset[axis] * strides[axis] as isize) as usize;
                }
                if mask.get(neighbor) && labels[neighbor] == 0 {
                    labels[neighbor] = count;
                    stack.push(neighbor);
                }
            }
        }
    }

    Labeling { labels, count }
}

/// Labels both masks independently and records which components of each
/// intersect the other mask.
pub fn match_components(pred: &Mask, reference: &Mask, order: usize) -> ComponentMatch {
    let ref_labeling = label_components(reference, order);
    let pred_labeling = label_components(pred, order);

    let mut ref_hit = vec![false; ref_labeling.count as usize + 1];
    let mut pred_hit = vec![false; pred_labeling.count as usize + 1];
    for idx in 0..reference.len() {
        if reference.get(idx) && pred.get(idx) {
            ref_hit[ref_labeling.labels[idx] as usize] = true;
            pred_hit[pred_labeling.labels[idx] as usize] = true;
        }
    }

    let matched_reference = (1..=ref_labeling.count).filter(|&id| ref_hit[id as usize]).collect();
    let matched_prediction =
        (1..=pred_labeling.count).filter(|&id| pred_hit[id as usize]).collect();

    ComponentMatch {
        reference: ref_labeling,
        prediction: pred_labeling,
        matched_reference,
        matched_prediction,
    }
}

/// Expands a component correspondence into voxel-level error maps.
pub fn error_maps(matching: &ComponentMatch) -> ErrorMaps {
    let len = matching.reference.labels.len();
    let ref_matched = membership(matching.reference.count, &matching.matched_reference);
    let pred_matched = membership(matching.prediction.count, &matching.matched_prediction);

    let mut matched = vec![false; len];
    let mut unmatched_reference = vec![false; len];
    let mut unmatched_prediction = vec![false; len];

    for idx in 0..len {
        let ref_label = matching.reference.labels[idx] as usize;
        let pred_label = matching.prediction.labels[idx] as usize;
        if ref_label > 0 {
            if ref_matched[ref_label] {
                matched[idx] = true;
            } else {
                unmatched_reference[idx] = true;
            }
        }
        if pred_label > 0 {
            if pred_matched[pred_label] {
                matched[idx] = true;
            } else {
                unmatched_prediction[idx] = true;
            }
        }
    }

    ErrorMaps { matched, unmatched_reference, unmatched_prediction }
}

fn membership(count: u32, ids: &[u32]) -> Vec<bool> {
    let mut member = vec![false; count as usize + 1];
    for &id in ids {
        member[id as usize] = true;
    }
    member
}
