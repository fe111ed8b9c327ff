use std::{f64::consts::FRAC_PI_2, ops::Range};

use cdshealpix::nested::{self, Layer};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// HEALPix pixel-index convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelOrder {
    Ring,
    Nested,
}

pub const MAX_DEPTH: u8 = 29;

pub fn nside2npix(nside: usize) -> usize {
    12 * nside * nside
}

pub fn npix2nside(npix: usize) -> Result<usize> {
    let nside = ((npix / 12) as f64).sqrt().round() as usize;
    if nside == 0 || nside2npix(nside) != npix {
        return Err(Error::InvalidNpix(npix));
    }
    Ok(nside)
}

pub fn nside2depth(nside: usize) -> Result<u8> {
    if !nside.is_power_of_two() || nside > 1 << MAX_DEPTH {
        return Err(Error::InvalidNside(nside));
    }
    Ok(nside.trailing_zeros() as u8)
}

pub fn nside2nring(nside: usize) -> usize {
    4 * nside - 1
}

pub(crate) fn layer(nside: usize) -> Result<&'static Layer> {
    Ok(nested::get(nside2depth(nside)?))
}

/// Nested index of a pixel given in `order`.
pub(crate) fn to_nested(layer: &Layer, order: PixelOrder, ipix: usize) -> usize {
    match order {
        PixelOrder::Nested => ipix,
        PixelOrder::Ring => layer.from_ring(ipix as u64) as usize,
    }
}

pub fn ring2nest<T: Copy>(values: &[T]) -> Result<Vec<T>> {
    let nside = npix2nside(values.len())?;
    let layer = layer(nside)?;
    let mut result = values.to_vec();
    for (iring, &v) in values.iter().enumerate() {
        result[layer.from_ring(iring as u64) as usize] = v;
    }
    Ok(result)
}

pub fn nest2ring<T: Copy>(values: &[T]) -> Result<Vec<T>> {
    let nside = npix2nside(values.len())?;
    let layer = layer(nside)?;
    Ok((0..values.len())
        .map(|iring| values[layer.from_ring(iring as u64) as usize])
        .collect())
}

pub fn reorder<T: Copy>(values: &[T], from: PixelOrder, to: PixelOrder) -> Result<Vec<T>> {
    match (from, to) {
        (PixelOrder::Ring, PixelOrder::Nested) => ring2nest(values),
        (PixelOrder::Nested, PixelOrder::Ring) => nest2ring(values),
        _ => Ok(values.to_vec()),
    }
}

/// (colatitude, longitude) of the pixel center, both in radians.
pub fn pix2ang(nside: usize, order: PixelOrder, ipix: usize) -> Result<(f64, f64)> {
    let layer = layer(nside)?;
    let (lon, lat) = layer.center(to_nested(layer, order, ipix) as u64);
    Ok((FRAC_PI_2 - lat, lon))
}

/// Index in `order` of the pixel containing (colatitude, longitude).
pub fn ang2pix(nside: usize, order: PixelOrder, colat: f64, lon: f64) -> Result<usize> {
    let layer = layer(nside)?;
    let hash = layer.hash(lon.rem_euclid(2.0 * std::f64::consts::PI), FRAC_PI_2 - colat);
    Ok(match order {
        PixelOrder::Nested => hash as usize,
        PixelOrder::Ring => layer.to_ring(hash) as usize,
    })
}

/// Unit vectors of every pixel center, indexed in `order`.
pub fn pix2vec_all(nside: usize, order: PixelOrder) -> Result<Vec<[f64; 3]>> {
    let layer = layer(nside)?;
    Ok((0..nside2npix(nside))
        .map(|ipix| {
            let (lon, lat) = layer.center(to_nested(layer, order, ipix) as u64);
            [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
        })
        .collect())
}

/// Ring-ordered index range of every iso-latitude ring, north to south.
pub fn ring_layout(nside: usize) -> Vec<Range<usize>> {
    let npix = nside2npix(nside);
    (1..=nside2nring(nside))
        .map(|iring| {
            if iring < nside {
                let start = 2 * iring * (iring - 1);
                start..start + 4 * iring
            } else if iring <= 3 * nside {
                let start = 2 * nside * (nside - 1) + (iring - nside) * 4 * nside;
                start..start + 4 * nside
            } else {
                let j = 4 * nside - iring;
                let start = npix - 2 * j * (j + 1);
                start..start + 4 * j
            }
        })
        .collect()
}

pub fn angular_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
    let cross = [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ];
    let cross_norm = (cross[0].powi(2) + cross[1].powi(2) + cross[2].powi(2)).sqrt();
    cross_norm.atan2(dot)
}
