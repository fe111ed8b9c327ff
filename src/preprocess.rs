//! Mask-aware smoothing and resampling of a single survey plane.
//!
//! Smoothing a map whose missing pixels have been zeroed produces a ramp
//! towards zero along every edge of the missing region. The preprocessor
//! first erodes the usable region by `edge_width`, smooths, then masks every
//! pixel whose smoothed badness exceeds `leak_tolerance`.

use tracing::debug;

use crate::{
    error::Result,
    map::SkyMap,
    smoothing::{smooth, smooth_mask},
    ud_grade::ud_grade,
};

/// Smoothed badness above which the erosion pass flags a pixel.
pub const EROSION_THRESHOLD: f64 = 0.25;

pub const DEFAULT_LEAK_TOLERANCE: f64 = 0.01;

#[derive(Clone, Copy, Debug)]
pub struct PreprocessParams {
    pub nside_out: usize,
    /// radians
    pub fwhm: f64,
    /// radians
    pub edge_width: f64,
    pub leak_tolerance: f64,
}

impl PreprocessParams {
    pub fn new(nside_out: usize, fwhm: f64, edge_width: f64) -> Self {
        Self {
            nside_out,
            fwhm,
            edge_width,
            leak_tolerance: DEFAULT_LEAK_TOLERANCE,
        }
    }
}

fn flag_above(mask: &mut [bool], badness: &[f64], threshold: f64) {
    mask.iter_mut()
        .zip(badness)
        .for_each(|(m, &b)| *m = *m || b > threshold);
}

pub fn preprocess(map: &SkyMap, params: &PreprocessParams) -> Result<SkyMap> {
    let mut bad = map.bad_mask();
    let n_bad0 = bad.iter().filter(|&&b| b).count();

    if params.edge_width > 0.0 {
        let badness = smooth_mask(&bad, map, params.edge_width)?;
        flag_above(&mut bad, &badness, EROSION_THRESHOLD);
    }

    // holes enter the convolution as zeros
    let holed = map.with_values(
        map.values()
            .iter()
            .zip(&bad)
            .map(|(&v, &b)| if b { f64::NAN } else { v })
            .collect(),
    )?;
    let smoothed = smooth(&holed, params.fwhm)?;

    if params.fwhm > 0.0 {
        let badness = smooth_mask(&bad, map, params.fwhm)?;
        flag_above(&mut bad, &badness, params.leak_tolerance);
    }
    debug!(
        "preprocess: {} bad pixels before, {} after erosion and leakage masking",
        n_bad0,
        bad.iter().filter(|&&b| b).count()
    );

    let masked = smoothed.with_values(
        smoothed
            .values()
            .iter()
            .zip(&bad)
            .map(|(&v, &b)| if b { f64::NAN } else { v })
            .collect(),
    )?;
    ud_grade(&masked, params.nside_out)
}
