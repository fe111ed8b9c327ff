//! Per-region generalized least-squares fit of principal maps on a shared
//! spectral basis.

use nalgebra::DMatrix;

use ndarray::Array2;

use tracing::{debug, info};

use crate::{
    eigen::EigenSystem,
    error::{Error, Result},
};

/// Leading eigenvectors of the region observed at the most frequencies.
#[derive(Clone, Debug)]
pub struct PrincipalBasis {
    pub freq_idx: Vec<usize>,
    /// (freq_idx.len(), k)
    pub vectors: DMatrix<f64>,
    pub eigenvalues: Vec<f64>,
    pub source_pattern: u32,
}

impl PrincipalBasis {
    pub fn ncomp(&self) -> usize {
        self.vectors.ncols()
    }

    fn row_of(&self, freq: usize) -> Option<usize> {
        self.freq_idx.iter().position(|&f| f == freq)
    }
}

/// Ties on frequency count go to the region with more pixels.
pub fn principal_basis(systems: &[EigenSystem], ncomp: usize) -> Result<PrincipalBasis> {
    let best = systems
        .iter()
        .max_by(|a, b| {
            a.nfreq()
                .cmp(&b.nfreq())
                .then(a.pixels.len().cmp(&b.pixels.len()))
        })
        .ok_or(Error::EmptyInput("no eigen systems"))?;
    if ncomp == 0 || ncomp > best.nfreq() {
        return Err(Error::SingularMatrix {
            pattern: best.pattern,
            freqs: best.freq_idx.clone(),
        });
    }
    info!(
        "principal basis: {} components from region {:#b} ({} frequencies)",
        ncomp,
        best.pattern,
        best.nfreq()
    );
    Ok(PrincipalBasis {
        freq_idx: best.freq_idx.clone(),
        vectors: best.eigenvectors.columns(0, ncomp).into_owned(),
        eigenvalues: best.eigenvalues.iter().take(ncomp).cloned().collect(),
        source_pattern: best.pattern,
    })
}

/// Full-sky outputs of the fit, all indexed by cube row and pixel.
#[derive(Clone, Debug)]
pub struct PrincipalFit {
    /// (k, npix)
    pub maps: Array2<f64>,
    /// `maps` divided by each pixel's normalization factor.
    pub shape_maps: Array2<f64>,
    /// Region-normalized data, (nfreq, npix), NaN where not fitted.
    pub data: Array2<f64>,
    /// basis * maps, (nfreq, npix).
    pub model: Array2<f64>,
}

impl PrincipalFit {
    pub fn residual(&self) -> Array2<f64> {
        &self.data - &self.model
    }
}

/// Generalized least-squares coefficients of one region.
fn fit_region(sys: &EigenSystem, basis: &PrincipalBasis) -> Result<(Vec<usize>, DMatrix<f64>)> {
    // region rows (local) that the basis also covers
    let (local, basis_rows): (Vec<usize>, Vec<usize>) = sys
        .freq_idx
        .iter()
        .enumerate()
        .filter_map(|(i, &f)| basis.row_of(f).map(|b| (i, b)))
        .unzip();
    let singular = || Error::SingularMatrix {
        pattern: sys.pattern,
        freqs: sys.freq_idx.clone(),
    };
    if local.len() < basis.ncomp() {
        return Err(singular());
    }

    let a = basis.vectors.select_rows(basis_rows.iter());
    let w = sys
        .covariance
        .select_rows(local.iter())
        .select_columns(local.iter())
        .try_inverse()
        .ok_or_else(singular)?;
    let atw = a.transpose() * &w;
    let normal = (&atw * &a).try_inverse().ok_or_else(singular)?;
    let y = sys.normalized.select_rows(local.iter());
    let coeffs = normal * atw * y;
    Ok((local, coeffs))
}

pub fn fit_principal_maps(
    systems: &[EigenSystem],
    basis: &PrincipalBasis,
    nfreq: usize,
    npix: usize,
) -> Result<PrincipalFit> {
    let k = basis.ncomp();
    let mut maps = Array2::from_elem((k, npix), f64::NAN);
    let mut shape_maps = Array2::from_elem((k, npix), f64::NAN);
    let mut data = Array2::from_elem((nfreq, npix), f64::NAN);
    let mut model = Array2::from_elem((nfreq, npix), f64::NAN);

    for sys in systems {
        let (local, coeffs) = fit_region(sys, basis)?;
        debug!(
            "fitted region {:#b} on {} of {} frequencies",
            sys.pattern,
            local.len(),
            sys.nfreq()
        );
        for (p, &pix) in sys.pixels.iter().enumerate() {
            for c in 0..k {
                maps[(c, pix)] = coeffs[(c, p)];
                shape_maps[(c, pix)] = coeffs[(c, p)] / sys.pixel_norm[p];
            }
            for &i in local.iter() {
                let f = sys.freq_idx[i];
                data[(f, pix)] = sys.normalized[(i, p)];
                if let Some(b) = basis.row_of(f) {
                    model[(f, pix)] = (0..k).map(|c| basis.vectors[(b, c)] * coeffs[(c, p)]).sum();
                }
            }
        }
    }

    Ok(PrincipalFit {
        maps,
        shape_maps,
        data,
        model,
    })
}
