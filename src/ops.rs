//! # ops
//!
//! Point-cloud comparison operations.

use ndarray::{s, Array2};

/// Result of matching one echo return of a sweep against the other.
#[derive(Clone, Debug)]
pub struct EchoComparison {
    /// The larger of the two clouds.
    pub master: Array2<f32>,
    /// Per-master-point flag: the point also appears in the smaller cloud
    /// within the index-shift window and lies beyond the range cutoff.
    pub mask: Vec<bool>,
    /// Row count of the last-echo cloud.
    pub num_last: usize,
    /// Row count of the strongest-echo cloud.
    pub num_strongest: usize,
    /// Size difference between the clouds, bounding the matching window.
    pub diff: usize,
}

/// Match the strongest-echo cloud of a sweep against its last-echo cloud.
///
/// The two returns of one sweep are identical except for beams whose
/// echoes diverge, so a point of the larger cloud is looked up in the
/// smaller one at the same row index, shifted backwards by at most the
/// cloud size difference. Points closer than `min_dist` are masked out
/// regardless of a match.
pub fn compare_echo_points(last: Array2<f32>, strongest: Array2<f32>, min_dist: f32) -> EchoComparison {
    let num_last = last.shape()[0];
    let num_strongest = strongest.shape()[0];
    let (master, slave) = if num_strongest > num_last {
        (strongest, last)
    } else {
        (last, strongest)
    };
    let diff = num_last.abs_diff(num_strongest);

    let num_master = master.shape()[0];
    let num_slave = slave.shape()[0];
    let mut mask = Vec::with_capacity(num_master);
    for i in 0..num_master {
        let mut match_found = false;
        for j in 0..=diff {
            if j > i {
                break;
            }
            let slave_index = i - j;
            if slave_index >= num_slave {
                continue;
            }
            if master.slice(s![i, ..3]) == slave.slice(s![slave_index, ..3]) {
                match_found = true;
                break;
            }
        }
        let point = master.slice(s![i, ..3]);
        let in_range = point.dot(&point).sqrt() > min_dist;
        mask.push(match_found && in_range);
    }

    EchoComparison {
        master,
        mask,
        num_last,
        num_strongest,
        diff,
    }
}
