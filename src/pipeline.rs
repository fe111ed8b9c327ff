//! Stage orchestration: survey maps to frequency cube to principal maps.

use std::path::Path;

use tracing::info;

use crate::{
    cache::{load_cube, save_cube},
    catalog::{same_freq, FrequencyCube, SurveyCatalog},
    cmb::remove_cmb,
    config::{PipelineCfg, SurveyCfg},
    eigen::{decompose_region, EigenSystem},
    error::{Error, Result},
    fit::{fit_principal_maps, principal_basis, PrincipalBasis, PrincipalFit},
    map::{SkyMap, StokesMap},
    merge::merge_maps,
    preprocess::preprocess,
    region::{partition, Region},
};

/// Groups surveys observed at the same frequency, each group sorted by
/// priority. Groups come out in ascending frequency.
fn group_by_freq(surveys: Vec<(SurveyCfg, StokesMap)>) -> Vec<(f64, Vec<(SurveyCfg, StokesMap)>)> {
    let mut groups: Vec<(f64, Vec<(SurveyCfg, StokesMap)>)> = Vec::new();
    for (cfg, map) in surveys {
        match groups.iter_mut().find(|(f, _)| same_freq(*f, cfg.freq_ghz)) {
            Some((_, members)) => members.push((cfg, map)),
            None => groups.push((cfg.freq_ghz, vec![(cfg, map)])),
        }
    }
    groups.iter_mut().for_each(|(_, members)| members.sort_by_key(|(cfg, _)| cfg.priority));
    groups.sort_by(|a, b| a.0.total_cmp(&b.0));
    groups
}

fn merge_planes(planes: Vec<SkyMap>, nside: usize, renormalize: bool) -> Result<SkyMap> {
    Ok(merge_maps(&planes, Some(nside), renormalize)?.map)
}

/// Preprocesses and merges all surveys into a cube at `cfg.nside`. Survey
/// maps are dropped as soon as they are merged into the catalog.
pub fn harmonize(
    cfg: &PipelineCfg,
    surveys: Vec<(SurveyCfg, StokesMap)>,
    cmb: Option<&SkyMap>,
) -> Result<FrequencyCube> {
    if surveys.is_empty() {
        return Err(Error::EmptyInput("no surveys configured"));
    }
    let params = cfg.preprocess_params();
    let mut catalog = SurveyCatalog::new();

    for (freq, members) in group_by_freq(surveys) {
        let names: Vec<&str> = members.iter().map(|(s, _)| s.name.as_str()).collect();
        info!("harmonizing {} GHz from {:?}", freq, names);

        let mut i_planes = Vec::with_capacity(members.len());
        let mut q_planes = Vec::new();
        let mut u_planes = Vec::new();
        for (_, map) in members.iter() {
            let cleaned = map.try_map_planes(|plane| preprocess(plane, &params))?;
            i_planes.push(cleaned.i);
            if let Some((q, u)) = cleaned.qu {
                q_planes.push(q);
                u_planes.push(u);
            }
        }
        drop(members);

        let mut i = merge_planes(i_planes, cfg.nside, cfg.renormalize_overlaps)?;
        if cfg.remove_cmb {
            let cmb = cmb.ok_or(Error::EmptyInput("CMB removal requested without a template"))?;
            i = remove_cmb(&i, cmb, freq)?;
        }
        let entry = if cfg.include_pol && !q_planes.is_empty() {
            StokesMap::polarized(
                i,
                merge_planes(q_planes, cfg.nside, false)?,
                merge_planes(u_planes, cfg.nside, false)?,
            )?
        } else {
            StokesMap::intensity(i)
        };
        catalog.insert(freq, entry)?;
    }

    FrequencyCube::from_catalog(&catalog, cfg.nside, cfg.include_pol)
}

/// Loads the cached cube for `cfg`, or harmonizes from the surveys returned
/// by `load` and caches the result.
pub fn load_or_harmonize<F>(cfg: &PipelineCfg, mut load: F) -> Result<FrequencyCube>
where
    F: FnMut(&PipelineCfg) -> Result<(Vec<(SurveyCfg, StokesMap)>, Option<SkyMap>)>,
{
    let key = cfg.cache_key();
    let path = key.path_in(&cfg.cache_dir);
    if let Some(cube) = load_cube(&path, &key)? {
        return Ok(cube);
    }
    let (surveys, cmb) = load(cfg)?;
    let cube = harmonize(cfg, surveys, cmb.as_ref())?;
    std::fs::create_dir_all(Path::new(&cfg.cache_dir))?;
    save_cube(&path, &key, &cube)?;
    Ok(cube)
}

#[derive(Clone, Debug)]
pub struct Decomposition {
    pub regions: Vec<Region>,
    pub systems: Vec<EigenSystem>,
    pub basis: PrincipalBasis,
    pub fit: PrincipalFit,
}

/// Any region whose fit is singular aborts the whole decomposition; the
/// error names that region.
pub fn decompose(cube: &FrequencyCube, n_components: usize) -> Result<Decomposition> {
    let intensity = cube.intensity();
    let regions = partition(intensity)?;
    let systems = regions
        .iter()
        .map(|r| decompose_region(intensity, r))
        .collect::<Result<Vec<_>>>()?;
    let basis = principal_basis(&systems, n_components)?;
    let fit = fit_principal_maps(&systems, &basis, cube.nfreq(), cube.npix())?;
    info!(
        "decomposed {} regions into {} principal maps",
        regions.len(),
        basis.ncomp()
    );
    Ok(Decomposition {
        regions,
        systems,
        basis,
        fit,
    })
}
