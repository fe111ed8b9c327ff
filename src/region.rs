//! Partition of the sky by which frequencies observe each pixel.
//!
//! Every availability pattern over the k incomplete frequencies is tested
//! against every pixel, so the cost is O(2^k * npix). k is expected to stay in
//! single digits and is capped at [`MAX_INCOMPLETE_FREQS`].

use ndarray::ArrayView2;

use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    map::is_valid,
};

pub const MAX_INCOMPLETE_FREQS: usize = 16;

/// Pixels sharing one availability pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    /// Bit i set means incomplete frequency i is observed.
    pub pattern: u32,
    pub mask: Vec<bool>,
    /// Sorted row indices of every frequency valid in the region.
    pub freq_idx: Vec<usize>,
}

impl Region {
    pub fn npix(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    pub fn pixels(&self) -> Vec<usize> {
        self.mask
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| if m { Some(i) } else { None })
            .collect()
    }
}

/// Splits frequency rows into (complete, incomplete) by whether every pixel
/// holds data. NaN and zero both mean no data.
pub fn classify_frequencies(cube: ArrayView2<f64>) -> (Vec<usize>, Vec<usize>) {
    (0..cube.nrows()).partition(|&f| cube.row(f).iter().all(|&x| is_valid(x)))
}

pub fn partition(cube: ArrayView2<f64>) -> Result<Vec<Region>> {
    let (complete, incomplete) = classify_frequencies(cube);
    let k = incomplete.len();
    if k > MAX_INCOMPLETE_FREQS {
        return Err(Error::TooManyIncompleteFrequencies {
            k,
            max: MAX_INCOMPLETE_FREQS,
        });
    }
    info!(
        "partitioning {} pixels: {} complete, {} incomplete frequencies",
        cube.ncols(),
        complete.len(),
        k
    );

    let regions: Vec<Region> = (0..1_u32 << k)
        .filter_map(|pattern| {
            let mask: Vec<bool> = (0..cube.ncols())
                .map(|p| {
                    incomplete.iter().enumerate().all(|(bit, &f)| {
                        is_valid(cube[(f, p)]) == ((pattern >> bit) & 1 == 1)
                    })
                })
                .collect();
            if !mask.iter().any(|&m| m) {
                return None;
            }
            let mut freq_idx: Vec<usize> = complete
                .iter()
                .cloned()
                .chain(
                    incomplete
                        .iter()
                        .enumerate()
                        .filter(|(bit, _)| (pattern >> *bit) & 1 == 1)
                        .map(|(_, &f)| f),
                )
                .collect();
            freq_idx.sort_unstable();
            let region = Region {
                pattern,
                mask,
                freq_idx,
            };
            debug!(
                "region {:#b}: {} pixels, frequencies {:?}",
                pattern,
                region.npix(),
                region.freq_idx
            );
            Some(region)
        })
        .collect();
    Ok(regions)
}
