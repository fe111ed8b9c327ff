//! Equirectangular raster to HEALPix resampling.

use std::f64::consts::PI;

use ndarray::{Array2, ArrayView2, Axis};

use tracing::debug;

use crate::{
    error::{Error, Result},
    map::SkyMap,
    pixel::{layer, nside2npix, ring_layout, PixelOrder},
};

/// Samples over (colatitude, longitude). Rows follow `colat`, which descends
/// from pi to 0; columns follow `lon`, which ascends from 0 to 2 pi.
#[derive(Clone, Debug)]
pub struct LatLonRaster {
    data: Array2<f64>,
    colat: Vec<f64>,
    lon: Vec<f64>,
}

fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => (0..n)
            .map(|i| start + (stop - start) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

fn strictly_monotonic(axis: &[f64]) -> bool {
    axis.windows(2).all(|w| w[0] < w[1]) || axis.windows(2).all(|w| w[0] > w[1])
}

impl LatLonRaster {
    /// Axes derived from the raster shape, endpoints included.
    pub fn new(data: Array2<f64>) -> Result<Self> {
        let (nrow, ncol) = data.dim();
        Self::with_axes(data, linspace(PI, 0.0, nrow), linspace(0.0, 2.0 * PI, ncol))
    }

    /// Either axis may ascend or descend, but strictly.
    pub fn with_axes(data: Array2<f64>, colat: Vec<f64>, lon: Vec<f64>) -> Result<Self> {
        if data.dim() != (colat.len(), lon.len()) || colat.len() < 2 || lon.len() < 2 {
            return Err(Error::ShapeMismatch {
                expected: (colat.len(), lon.len()),
                found: data.dim(),
            });
        }
        if !strictly_monotonic(&colat) {
            return Err(Error::NonMonotonicAxis("colatitude"));
        }
        if !strictly_monotonic(&lon) {
            return Err(Error::NonMonotonicAxis("longitude"));
        }
        Ok(Self { data, colat, lon })
    }

    pub fn data(&self) -> ArrayView2<f64> {
        self.data.view()
    }

    pub fn colat(&self) -> &[f64] {
        &self.colat
    }

    pub fn lon(&self) -> &[f64] {
        &self.lon
    }
}

/// A 2D interpolant evaluated one iso-latitude row at a time.
pub trait Interpolant2d {
    /// `lon` must be sorted ascending.
    fn eval_row(&self, colat: f64, lon: &[f64]) -> Vec<f64>;
}

/// Bilinear interpolation; points outside the axes are clamped to the edge.
pub struct BilinearInterpolant {
    // stored with colatitude ascending
    colat: Vec<f64>,
    lon: Vec<f64>,
    data: Array2<f64>,
}

impl BilinearInterpolant {
    pub fn new(raster: &LatLonRaster) -> Self {
        let mut colat = raster.colat.clone();
        let mut data = raster.data.clone();
        if colat.first() > colat.last() {
            colat.reverse();
            data.invert_axis(Axis(0));
        }
        let mut lon = raster.lon.clone();
        if lon.first() > lon.last() {
            lon.reverse();
            data.invert_axis(Axis(1));
        }
        Self { colat, lon, data }
    }
}

/// Lower bracket index and fractional offset of `x` in ascending `axis`.
fn bracket(axis: &[f64], x: f64) -> (usize, f64) {
    let n = axis.len();
    if x <= axis[0] {
        return (0, 0.0);
    }
    if x >= axis[n - 1] {
        return (n - 2, 1.0);
    }
    let i = axis.partition_point(|&a| a <= x) - 1;
    let i = i.min(n - 2);
    (i, (x - axis[i]) / (axis[i + 1] - axis[i]))
}

impl Interpolant2d for BilinearInterpolant {
    fn eval_row(&self, colat: f64, lon: &[f64]) -> Vec<f64> {
        let (i, t) = bracket(&self.colat, colat);
        let row0 = self.data.row(i);
        let row1 = self.data.row(i + 1);
        lon.iter()
            .map(|&phi| {
                let (j, u) = bracket(&self.lon, phi);
                let a = row0[j] * (1.0 - u) + row0[j + 1] * u;
                let b = row1[j] * (1.0 - u) + row1[j + 1] * u;
                a * (1.0 - t) + b * t
            })
            .collect()
    }
}

/// Resample with any interpolant. Evaluation happens ring by ring with the
/// ring's longitudes sorted, and results are written back to the pixel they
/// were computed for.
pub fn resample_with<I: Interpolant2d>(
    interp: &I,
    nside: usize,
    order: PixelOrder,
) -> Result<SkyMap> {
    let layer = layer(nside)?;
    let mut values = vec![f64::NAN; nside2npix(nside)];
    for ring in ring_layout(nside) {
        let (_, lat) = layer.center(layer.from_ring(ring.start as u64));
        let colat = PI / 2.0 - lat;
        let mut pixels: Vec<(f64, usize)> = ring
            .map(|iring| {
                let inest = layer.from_ring(iring as u64);
                let (lon, _) = layer.center(inest);
                let ipix = match order {
                    PixelOrder::Ring => iring,
                    PixelOrder::Nested => inest as usize,
                };
                (lon, ipix)
            })
            .collect();
        pixels.sort_by(|a, b| a.0.total_cmp(&b.0));
        let lons: Vec<f64> = pixels.iter().map(|p| p.0).collect();
        let row = interp.eval_row(colat, &lons);
        for ((_, ipix), v) in pixels.into_iter().zip(row) {
            values[ipix] = v;
        }
    }
    SkyMap::new(values, order)
}

pub fn raster_to_healpix(raster: &LatLonRaster, nside: usize, order: PixelOrder) -> Result<SkyMap> {
    debug!(
        "resampling {}x{} raster to nside {}",
        raster.data.nrows(),
        raster.data.ncols(),
        nside
    );
    resample_with(&BilinearInterpolant::new(raster), nside, order)
}
