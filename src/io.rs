//! `.npy` exchange of survey planes.

use std::path::Path;

use ndarray::{Array1, Array2};

use ndarray_npy::{read_npy, write_npy};

use tracing::debug;

use crate::{
    config::{MapSource, PipelineCfg, SurveyCfg},
    error::Result,
    grid::{raster_to_healpix, LatLonRaster},
    map::{SkyMap, StokesMap},
    pixel::PixelOrder,
};

/// Rasters are resampled straight onto `nside` in RING order; HEALPix
/// vectors keep their own resolution and order.
pub fn read_plane<P: AsRef<Path>>(base: P, src: &MapSource, nside: usize, scale: f64) -> Result<SkyMap> {
    let map = match src {
        MapSource::Healpix { path, order } => {
            let data: Array1<f64> = read_npy(base.as_ref().join(path))?;
            debug!("read {} ({} pixels)", path, data.len());
            SkyMap::new(data.to_vec(), *order)?
        }
        MapSource::Raster { path } => {
            let data: Array2<f64> = read_npy(base.as_ref().join(path))?;
            debug!("read {} ({:?} raster)", path, data.dim());
            raster_to_healpix(&LatLonRaster::new(data)?, nside, PixelOrder::Ring)?
        }
    };
    Ok(map.map_values(|x| x * scale))
}

pub fn read_survey<P: AsRef<Path>>(base: P, survey: &SurveyCfg, nside: usize) -> Result<StokesMap> {
    let base = base.as_ref();
    let i = read_plane(base, &survey.i, nside, survey.scale)?;
    match (&survey.q, &survey.u) {
        (Some(q), Some(u)) => StokesMap::polarized(
            i,
            read_plane(base, q, nside, survey.scale)?,
            read_plane(base, u, nside, survey.scale)?,
        ),
        _ => Ok(StokesMap::intensity(i)),
    }
}

/// Every configured survey, plus the CMB template when one is named.
/// Relative paths resolve against `base`.
pub fn read_inputs<P: AsRef<Path>>(
    base: P,
    cfg: &PipelineCfg,
) -> Result<(Vec<(SurveyCfg, StokesMap)>, Option<SkyMap>)> {
    let base = base.as_ref();
    let surveys = cfg
        .surveys
        .iter()
        .map(|s| Ok((s.clone(), read_survey(base, s, cfg.nside)?)))
        .collect::<Result<Vec<_>>>()?;
    let cmb = match &cfg.cmb_map {
        Some(src) => Some(read_plane(base, src, cfg.nside, 1.0)?),
        None => None,
    };
    Ok((surveys, cmb))
}

pub fn write_map<P: AsRef<Path>>(path: P, map: &SkyMap) -> Result<()> {
    write_npy(path, &Array1::from(map.values().to_vec()))?;
    Ok(())
}

pub fn write_raster<P: AsRef<Path>>(path: P, data: &Array2<f64>) -> Result<()> {
    write_npy(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healpix_plane_is_scaled_and_zeros_become_holes() {
        let dir = tempfile::tempdir().unwrap();
        let mut values = vec![2.0; 12];
        values[3] = 0.0;
        write_map(dir.path().join("m.npy"), &SkyMap::new(values, PixelOrder::Ring).unwrap()).unwrap();

        let src = MapSource::Healpix {
            path: "m.npy".to_string(),
            order: PixelOrder::Ring,
        };
        let m = read_plane(dir.path(), &src, 1, 1.5).unwrap();
        assert_eq!(m.values()[0], 3.0);
        assert!(m.values()[3].is_nan());
        assert_eq!(m.count_valid(), 11);
    }

    #[test]
    fn raster_plane_lands_on_requested_nside() {
        let dir = tempfile::tempdir().unwrap();
        write_raster(dir.path().join("r.npy"), &Array2::from_elem((9, 17), 4.0)).unwrap();
        let src = MapSource::Raster {
            path: "r.npy".to_string(),
        };
        let m = read_plane(dir.path(), &src, 2, 1.0).unwrap();
        assert_eq!(m.nside(), 2);
        assert_eq!(m.order(), PixelOrder::Ring);
        assert!(m.values().iter().all(|&x| (x - 4.0).abs() < 1e-12));
    }
}
