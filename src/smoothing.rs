use std::f64::consts::PI;

use tracing::debug;

use crate::{
    error::Result,
    map::SkyMap,
    pixel::{angular_distance, layer, pix2vec_all, reorder, PixelOrder},
};

/// Kernel support in units of sigma.
pub const KERNEL_TRUNCATION: f64 = 3.0;

pub fn fwhm2sigma(fwhm: f64) -> f64 {
    fwhm / (8.0 * 2_f64.ln()).sqrt()
}

/// Gaussian beam convolution of a nested-order map. Non-finite samples
/// contribute zero; weights are normalized over the full kernel footprint.
fn gaussian_smooth_nested(values: &[f64], nside: usize, fwhm: f64) -> Result<Vec<f64>> {
    let layer = layer(nside)?;
    let sigma = fwhm2sigma(fwhm);
    let radius = KERNEL_TRUNCATION * sigma;
    let vecs = pix2vec_all(nside, PixelOrder::Nested)?;
    let sample = |j: usize| {
        let v = values[j];
        if v.is_finite() {
            v
        } else {
            0.0
        }
    };

    let result = (0..values.len())
        .map(|i| {
            let mut acc = 0.0;
            let mut norm = 0.0;
            let mut add = |j: usize| {
                let d = angular_distance(&vecs[i], &vecs[j]);
                if d <= radius {
                    let w = (-d * d / (2.0 * sigma * sigma)).exp();
                    acc += w * sample(j);
                    norm += w;
                }
            };
            if radius >= PI {
                (0..values.len()).for_each(&mut add);
            } else {
                let (lon, lat) = layer.center(i as u64);
                layer
                    .cone_coverage_approx(lon, lat, radius)
                    .flat_iter()
                    .for_each(|j| add(j as usize));
            }
            if norm > 0.0 {
                acc / norm
            } else {
                sample(i)
            }
        })
        .collect();
    Ok(result)
}

/// Smooths `map` with a Gaussian beam of full width `fwhm` (radians).
/// `fwhm <= 0` returns the map unchanged.
pub fn smooth(map: &SkyMap, fwhm: f64) -> Result<SkyMap> {
    if fwhm <= 0.0 {
        return Ok(map.clone());
    }
    debug!("smoothing nside {} map, fwhm {:.4} rad", map.nside(), fwhm);
    let nested = map.to_order(PixelOrder::Nested)?;
    let smoothed = gaussian_smooth_nested(nested.values(), map.nside(), fwhm)?;
    SkyMap::new(smoothed, PixelOrder::Nested)?.to_order(map.order())
}

/// Smoothed fraction of flagged pixels around each pixel. `mask` is laid out
/// like `template`; the result is a plain fraction in [0, 1], not a map, so
/// zeros are kept.
pub fn smooth_mask(mask: &[bool], template: &SkyMap, fwhm: f64) -> Result<Vec<f64>> {
    let as_float: Vec<f64> = mask.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect();
    if fwhm <= 0.0 {
        return Ok(as_float);
    }
    let nested = reorder(&as_float, template.order(), PixelOrder::Nested)?;
    let smoothed = gaussian_smooth_nested(&nested, template.nside(), fwhm)?;
    reorder(&smoothed, PixelOrder::Nested, template.order())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::nside2npix;
    use approx::assert_abs_diff_eq;

    #[test]
    fn nonpositive_fwhm_is_identity() {
        let m = SkyMap::new((1..=48).map(|i| i as f64).collect(), PixelOrder::Ring).unwrap();
        assert_eq!(smooth(&m, 0.0).unwrap(), m);
        assert_eq!(smooth(&m, -1.0).unwrap(), m);
    }

    #[test]
    fn constant_map_is_preserved() {
        for order in [PixelOrder::Ring, PixelOrder::Nested] {
            let m = SkyMap::filled(8, order, 5.0).unwrap();
            let s = smooth(&m, 20_f64.to_radians()).unwrap();
            assert_eq!(s.order(), order);
            for &v in s.values() {
                assert_abs_diff_eq!(v, 5.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn ordering_does_not_change_result() {
        let values: Vec<f64> = (0..nside2npix(8)).map(|i| (i % 7) as f64 + 1.0).collect();
        let ring = SkyMap::new(values, PixelOrder::Ring).unwrap();
        let nest = ring.to_order(PixelOrder::Nested).unwrap();
        let a = smooth(&ring, 15_f64.to_radians()).unwrap();
        let b = smooth(&nest, 15_f64.to_radians())
            .unwrap()
            .to_order(PixelOrder::Ring)
            .unwrap();
        for (x, y) in a.values().iter().zip(b.values()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn smoothing_leaks_into_zeroed_neighbourhood() {
        let nside = 8;
        let mut values = vec![1.0; nside2npix(nside)];
        values[..nside2npix(nside) / 2].fill(0.0);
        let m = SkyMap::new(values, PixelOrder::Ring).unwrap();
        let s = smooth(&m, 10_f64.to_radians()).unwrap();
        // the pixel just before the boundary picks up signal across it
        let last_north = nside2npix(nside) / 2 - 1;
        assert!(s.values()[last_north] > 0.0);
        // nothing reaches the pole, which stays a hole
        assert!(s.values()[0].is_nan());
    }

    #[test]
    fn mask_fraction_keeps_zeros() {
        let nside = 4;
        let template = SkyMap::filled(nside, PixelOrder::Ring, 1.0).unwrap();
        let mut mask = vec![false; nside2npix(nside)];
        mask[nside2npix(nside) - 1] = true;
        let frac = smooth_mask(&mask, &template, 10_f64.to_radians()).unwrap();
        assert_eq!(frac[0], 0.0);
        assert!(frac[nside2npix(nside) - 1] > 0.0);
        assert!(frac.iter().all(|&x| (0.0..=1.0).contains(&x)));
    }
}
