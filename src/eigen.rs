//! Frequency-covariance eigen-decomposition of one region.
//!
//! The covariance is symmetric by construction; it is explicitly symmetrized
//! and handed to a symmetric eigensolver, which returns real eigenpairs even
//! when rounding makes the computed Gram matrix slightly asymmetric.

use nalgebra::{DMatrix, DVector, SymmetricEigen};

use ndarray::ArrayView2;

use tracing::debug;

use crate::{
    error::{Error, Result},
    region::Region,
};

#[derive(Clone, Debug)]
pub struct EigenSystem {
    pub pattern: u32,
    pub freq_idx: Vec<usize>,
    pub pixels: Vec<usize>,
    /// L2 norm of every frequency row over the region.
    pub freq_norm: DVector<f64>,
    /// Frequency rows divided by `freq_norm`, shape (nfreq, npix).
    pub normalized: DMatrix<f64>,
    /// RMS over frequencies of `normalized`, divided by sqrt(nfreq).
    pub pixel_norm: DVector<f64>,
    pub covariance: DMatrix<f64>,
    /// Descending.
    pub eigenvalues: DVector<f64>,
    /// One eigenvector per column; the last row of every column is >= 0.
    pub eigenvectors: DMatrix<f64>,
}

impl EigenSystem {
    pub fn nfreq(&self) -> usize {
        self.freq_idx.len()
    }
}

pub fn decompose_region(cube: ArrayView2<f64>, region: &Region) -> Result<EigenSystem> {
    let pixels = region.pixels();
    let nf = region.freq_idx.len();
    if nf == 0 || pixels.is_empty() {
        return Err(Error::EmptyInput("region without frequencies or pixels"));
    }
    let data = DMatrix::from_fn(nf, pixels.len(), |f, p| cube[(region.freq_idx[f], pixels[p])]);

    let freq_norm = DVector::from_fn(nf, |f, _| data.row(f).norm());
    let mut normalized = data;
    for (f, mut row) in normalized.row_iter_mut().enumerate() {
        if freq_norm[f] > 0.0 {
            row /= freq_norm[f];
        }
    }

    let gram = &normalized * normalized.transpose() / nf as f64;
    let covariance = (&gram + gram.transpose()) * 0.5;

    let eig = SymmetricEigen::new(covariance.clone());
    let mut order: Vec<usize> = (0..nf).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));
    let eigenvalues = DVector::from_iterator(nf, order.iter().map(|&j| eig.eigenvalues[j]));
    let mut eigenvectors = DMatrix::from_fn(nf, nf, |r, c| eig.eigenvectors[(r, order[c])]);
    for mut col in eigenvectors.column_iter_mut() {
        if col[nf - 1] < 0.0 {
            col.neg_mut();
        }
    }

    let pixel_norm = DVector::from_iterator(
        pixels.len(),
        normalized
            .column_iter()
            .map(|c| (c.norm_squared() / nf as f64).sqrt() / (nf as f64).sqrt()),
    );

    debug!(
        "region {:#b}: {} frequencies, leading eigenvalue {:.4e}",
        region.pattern, nf, eigenvalues[0]
    );

    Ok(EigenSystem {
        pattern: region.pattern,
        freq_idx: region.freq_idx.clone(),
        pixels,
        freq_norm,
        normalized,
        pixel_norm,
        covariance,
        eigenvalues,
        eigenvectors,
    })
}
