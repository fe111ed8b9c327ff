//! On-disk cache of the harmonized frequency cube.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use ndarray::{arr1, Array1, Array2};

use ndarray_npy::{NpzReader, NpzWriter};

use tracing::{info, warn};

use crate::{
    catalog::FrequencyCube,
    error::{Error, Result},
    pixel::npix2nside,
};

/// Bump whenever the harmonization output changes meaning.
pub const CACHE_VERSION: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CacheKey {
    pub nside: usize,
    /// radians
    pub fwhm: f64,
    /// radians
    pub edge_width: f64,
    pub remove_cmb: bool,
    pub include_pol: bool,
    pub version: u32,
}

impl CacheKey {
    pub fn file_name(&self) -> String {
        format!(
            "cube_nside{}_fwhm{:.4}_edge{:.4}_cmb{}_pol{}_v{}.npz",
            self.nside,
            self.fwhm.to_degrees(),
            self.edge_width.to_degrees(),
            self.remove_cmb as u8,
            self.include_pol as u8,
            self.version
        )
    }

    pub fn path_in<P: AsRef<Path>>(&self, dir: P) -> PathBuf {
        dir.as_ref().join(self.file_name())
    }

    fn to_array(self) -> Array1<f64> {
        arr1(&[
            self.nside as f64,
            self.fwhm,
            self.edge_width,
            self.remove_cmb as u8 as f64,
            self.include_pol as u8 as f64,
            self.version as f64,
        ])
    }
}

pub fn save_cube<P: AsRef<Path>>(path: P, key: &CacheKey, cube: &FrequencyCube) -> Result<()> {
    let mut npz = NpzWriter::new_compressed(File::create(path.as_ref())?);
    npz.add_array("key.npy", &key.to_array())?;
    npz.add_array("freqs.npy", &Array1::from(cube.freqs.clone()))?;
    npz.add_array("cube_i.npy", &cube.i)?;
    if let (true, Some((q, u))) = (key.include_pol, cube.qu.as_ref()) {
        npz.add_array("cube_q.npy", q)?;
        npz.add_array("cube_u.npy", u)?;
    }
    npz.finish()?;
    info!("cached frequency cube to {}", path.as_ref().display());
    Ok(())
}

/// `Ok(None)` when the file is missing or was written under another key.
pub fn load_cube<P: AsRef<Path>>(path: P, key: &CacheKey) -> Result<Option<FrequencyCube>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let mut npz = NpzReader::new(File::open(path)?)?;
    let stored: Array1<f64> = npz.by_name("key.npy")?;
    if stored != key.to_array() {
        warn!("cache {} has a different key, ignoring it", path.display());
        return Ok(None);
    }
    let freqs: Array1<f64> = npz.by_name("freqs.npy")?;
    let i: Array2<f64> = npz.by_name("cube_i.npy")?;
    if i.nrows() != freqs.len() {
        return Err(Error::ShapeMismatch {
            expected: (freqs.len(), i.ncols()),
            found: i.dim(),
        });
    }
    let qu = if key.include_pol && npz.names()?.iter().any(|n| n.starts_with("cube_q")) {
        let q: Array2<f64> = npz.by_name("cube_q.npy")?;
        let u: Array2<f64> = npz.by_name("cube_u.npy")?;
        Some((q, u))
    } else {
        None
    };
    info!("loaded cached frequency cube from {}", path.display());
    Ok(Some(FrequencyCube {
        nside: npix2nside(i.ncols())?,
        freqs: freqs.to_vec(),
        i,
        qu,
    }))
}
