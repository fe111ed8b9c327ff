use std::{fs::File, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    cache::{CacheKey, CACHE_VERSION},
    error::Result,
    pixel::PixelOrder,
    preprocess::{PreprocessParams, DEFAULT_LEAK_TOLERANCE},
};

fn default_leak_tolerance() -> f64 {
    DEFAULT_LEAK_TOLERANCE
}

fn default_scale() -> f64 {
    1.0
}

fn default_n_components() -> usize {
    3
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineCfg {
    pub nside: usize,
    pub fwhm_deg: f64,
    pub edge_width_deg: f64,
    #[serde(default = "default_leak_tolerance")]
    pub leak_tolerance: f64,
    #[serde(default)]
    pub remove_cmb: bool,
    /// CMB template in thermodynamic K, required when `remove_cmb` is set.
    #[serde(default)]
    pub cmb_map: Option<MapSource>,
    #[serde(default)]
    pub include_pol: bool,
    #[serde(default)]
    pub renormalize_overlaps: bool,
    #[serde(default = "default_n_components")]
    pub n_components: usize,
    pub cache_dir: String,
    pub surveys: Vec<SurveyCfg>,
}

/// One survey plane set. Surveys sharing a frequency are merged, lowest
/// `priority` first.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SurveyCfg {
    pub name: String,
    pub freq_ghz: f64,
    #[serde(default)]
    pub priority: u32,
    /// Multiplied into every plane on load, e.g. a unit conversion.
    #[serde(default = "default_scale")]
    pub scale: f64,
    pub i: MapSource,
    #[serde(default)]
    pub q: Option<MapSource>,
    #[serde(default)]
    pub u: Option<MapSource>,
}

/// A `.npy` file holding either a HEALPix vector or a lat/lon raster.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MapSource {
    Healpix { path: String, order: PixelOrder },
    Raster { path: String },
}

impl PipelineCfg {
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut cfgfile = File::open(path)?;
        Ok(serde_yaml::from_reader(&mut cfgfile)?)
    }

    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut outfile = File::create(path)?;
        serde_yaml::to_writer(&mut outfile, self)?;
        Ok(())
    }

    pub fn preprocess_params(&self) -> PreprocessParams {
        PreprocessParams {
            nside_out: self.nside,
            fwhm: self.fwhm_deg.to_radians(),
            edge_width: self.edge_width_deg.to_radians(),
            leak_tolerance: self.leak_tolerance,
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            nside: self.nside,
            fwhm: self.fwhm_deg.to_radians(),
            edge_width: self.edge_width_deg.to_radians(),
            remove_cmb: self.remove_cmb,
            include_pol: self.include_pol,
            version: CACHE_VERSION,
        }
    }
}
