//! Topology-preserving thinning of binary masks down to one-voxel-wide
//! centrelines.

use crate::grid::Mask;

/// Skeletons of both masks of a comparison.
#[derive(Debug, Clone)]
pub struct SkeletonPair {
    pub reference: Mask,
    pub prediction: Mask,
}

/// Thins a mask to its centreline with Zhang-Suen two-subiteration
/// thinning.
///
/// Rank-3 grids are thinned plane by plane along the trailing axis, the
/// same image-stack convention the per-image false-positive measures use.
pub fn skeletonize(mask: &Mask) -> Mask {
    let shape = mask.shape();
    let mut data = mask.data().to_vec();

    match *shape {
        [h, w] => thin_plane(&mut data, h, w),
        [h, w, planes] => {
            let mut plane = vec![false; h * w];
            for p in 0..planes {
                for i in 0..h * w {
                    plane[i] = data[i * planes + p];
                }
                thin_plane(&mut plane, h, w);
                for i in 0..h * w {
                    data[i * planes + p] = plane[i];
                }
            }
        }
        _ => {}
    }

    Mask::from_parts(shape.to_vec(), data)
}

/// One plane of Zhang-Suen thinning, in place. Out-of-bounds neighbors
/// count as background.
fn thin_plane(grid: &mut [bool], h: usize, w: usize) {
    let mut to_clear = Vec::new();
    loop {
        let mut changed = false;
        for step in 0..2 {
            to_clear.clear();
            for y in 0..h {
                for x in 0..w {
                    if grid[y * w + x] && deletable(grid, h, w, y, x, step) {
                        to_clear.push(y * w + x);
                    }
                }
            }
            if !to_clear.is_empty() {
                changed = true;
                for &idx in &to_clear {
                    grid[idx] = false;
                }
            }
        }
        if !changed {
            break;
        }
    }
}

fn deletable(grid: &[bool], h: usize, w: usize, y: usize, x: usize, step: usize) -> bool {
    // P2..P9, clockwise from the north neighbor.
    let p = [
        at(grid, h, w, y as isize - 1, x as isize),
        at(grid, h, w, y as isize - 1, x as isize + 1),
        at(grid, h, w, y as isize, x as isize + 1),
        at(grid, h, w, y as isize + 1, x as isize + 1),
        at(grid, h, w, y as isize + 1, x as isize),
        at(grid, h, w, y as isize + 1, x as isize - 1),
        at(grid, h, w, y as isize, x as isize - 1),
        at(grid, h, w, y as isize - 1, x as isize - 1),
    ];

    let neighbors = p.iter().filter(|&&v| v).count();
    if !(2..=6).contains(&neighbors) {
        return false;
    }

    let transitions = (0..8).filter(|&i| !p[i] && p[(i + 1) % 8]).count();
    if transitions != 1 {
        return false;
    }

    if step == 0 {
        !(p[0] && p[2] && p[4]) && !(p[2] && p[4] && p[6])
    } else {
        !(p[0] && p[2] && p[6]) && !(p[0] && p[4] && p[6])
    }
}

#[inline]
fn at(grid: &[bool], h: usize, w: usize, y: isize, x: isize) -> bool {
    y >= 0 && x >= 0 && (y as usize) < h && (x as usize) < w && grid[y as usize * w + x as usize]
}
