//! Harmonization of full-sky survey maps onto a common HEALPix grid and
//! region-aware principal-component decomposition of their spectra.

pub mod cache;
pub mod catalog;
pub mod cmb;
pub mod config;
pub mod eigen;
pub mod error;
pub mod fit;
pub mod grid;
pub mod io;
pub mod map;
pub mod merge;
pub mod pipeline;
pub mod pixel;
pub mod preprocess;
pub mod region;
pub mod smoothing;
pub mod ud_grade;

pub use crate::{
    cache::{load_cube, save_cube, CacheKey, CACHE_VERSION},
    catalog::{FrequencyCube, SurveyCatalog},
    config::{MapSource, PipelineCfg, SurveyCfg},
    eigen::{decompose_region, EigenSystem},
    error::{Error, Result},
    fit::{fit_principal_maps, principal_basis, PrincipalBasis, PrincipalFit},
    grid::{raster_to_healpix, LatLonRaster},
    map::{SkyMap, StokesMap},
    merge::{merge_maps, MergeReport},
    pipeline::{decompose, harmonize, load_or_harmonize, Decomposition},
    pixel::{nside2npix, npix2nside, PixelOrder},
    preprocess::{preprocess, PreprocessParams},
    region::{partition, Region},
    smoothing::smooth,
    ud_grade::ud_grade,
};
