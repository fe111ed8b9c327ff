use tracing::debug;

use crate::{
    error::Result,
    map::SkyMap,
    pixel::{nside2depth, nside2npix, reorder, PixelOrder},
};

/// Nested-order degrade (`nside_out < nside_in`) or upgrade. Degrading averages
/// the children; upgrading copies the parent into every child.
fn ud_grade_nested<T, F>(values: &[T], nside_in: usize, nside_out: usize, reduce: F) -> Vec<T>
where
    T: Copy,
    F: Fn(&[T]) -> T,
{
    if nside_out < nside_in {
        let nchild = (nside_in / nside_out).pow(2);
        values.chunks(nchild).map(&reduce).collect()
    } else {
        let nchild = (nside_out / nside_in).pow(2);
        values
            .iter()
            .flat_map(|&v| std::iter::repeat(v).take(nchild))
            .collect()
    }
}

/// Changes the resolution of `map`. Pixels flagged bad (NaN, infinite, zero)
/// poison every output pixel they contribute to.
pub fn ud_grade(map: &SkyMap, nside_out: usize) -> Result<SkyMap> {
    if map.nside() == nside_out {
        return Ok(map.clone());
    }
    nside2depth(nside_out)?;
    debug!("ud_grade nside {} -> {}", map.nside(), nside_out);

    let order = map.order();
    let bad = reorder(&map.bad_mask(), order, PixelOrder::Nested)?;
    let values = reorder(map.values(), order, PixelOrder::Nested)?;

    let bad = ud_grade_nested(&bad, map.nside(), nside_out, |c| c.iter().any(|&b| b));
    let values = ud_grade_nested(&values, map.nside(), nside_out, |c| {
        c.iter().sum::<f64>() / c.len() as f64
    });
    debug_assert_eq!(values.len(), nside2npix(nside_out));

    let values: Vec<f64> = values
        .into_iter()
        .zip(bad)
        .map(|(v, b)| if b { f64::NAN } else { v })
        .collect();
    SkyMap::new(reorder(&values, PixelOrder::Nested, order)?, order)
}
