use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    map::{is_valid, SkyMap},
    pixel::nside2npix,
    ud_grade::ud_grade,
};

/// Merged map plus the amplitude factor applied to each input.
#[derive(Clone, Debug)]
pub struct MergeReport {
    pub map: SkyMap,
    pub scales: Vec<f64>,
}

/// Least-squares amplitude matching `incoming` onto `existing` over the
/// pixels both cover.
pub fn overlap_scale(incoming: &[f64], existing: &[f64], filled: &[bool], index: usize) -> Result<f64> {
    let (num, den, n) = incoming
        .iter()
        .zip(existing.iter().zip(filled))
        .filter(|&(&x, (_, &f))| f && is_valid(x))
        .fold((0.0, 0.0, 0_usize), |(num, den, n), (&x, (&y, _))| {
            (num + x * y, den + x * x, n + 1)
        });
    if n == 0 || den == 0.0 {
        return Err(Error::EmptyOverlap { index });
    }
    Ok(num / den)
}

/// Combines partial-sky maps. Earlier maps win: a pixel once filled is never
/// overwritten. `nside` defaults to the coarsest input; the output keeps the
/// pixel order of the first map.
pub fn merge_maps(maps: &[SkyMap], nside: Option<usize>, renormalize: bool) -> Result<MergeReport> {
    let first = maps.first().ok_or(Error::EmptyInput("no maps to merge"))?;
    let nside = nside.unwrap_or_else(|| maps.iter().map(SkyMap::nside).min().unwrap_or(1));
    let order = first.order();
    let npix = nside2npix(nside);

    let mut merged = vec![f64::NAN; npix];
    let mut filled = vec![false; npix];
    let mut scales = Vec::with_capacity(maps.len());

    for (index, m) in maps.iter().enumerate() {
        let m = ud_grade(&m.to_order(order)?, nside)?;
        let mut scale = 1.0;
        if renormalize && index > 0 {
            match overlap_scale(m.values(), &merged, &filled, index) {
                Ok(s) => scale = s,
                Err(e @ Error::EmptyOverlap { .. }) => warn!("{}, merging unscaled", e),
                Err(e) => return Err(e),
            }
        }
        let mut n_new = 0;
        for ((dst, f), &x) in merged.iter_mut().zip(filled.iter_mut()).zip(m.values()) {
            if is_valid(x) && !*f {
                *dst = x * scale;
                *f = true;
                n_new += 1;
            }
        }
        debug!("merge input {}: scale {:.4}, {} new pixels", index, scale, n_new);
        scales.push(scale);
    }

    Ok(MergeReport {
        map: SkyMap::new(merged, order)?,
        scales,
    })
}
