use std::cell::Cell;

use approx::assert_abs_diff_eq;

use ndarray::Array2;

use foreground_pca::{
    decompose, decompose_region, harmonize,
    io::{read_inputs, write_map},
    load_or_harmonize, partition, Error, FrequencyCube, MapSource, PipelineCfg, PixelOrder,
    SkyMap, StokesMap, SurveyCfg,
};

fn survey(name: &str, freq_ghz: f64, priority: u32) -> SurveyCfg {
    SurveyCfg {
        name: name.to_string(),
        freq_ghz,
        priority,
        scale: 1.0,
        i: MapSource::Healpix {
            path: format!("{}.npy", name),
            order: PixelOrder::Ring,
        },
        q: None,
        u: None,
    }
}

fn cfg(nside: usize, cache_dir: &std::path::Path, surveys: Vec<SurveyCfg>) -> PipelineCfg {
    PipelineCfg {
        nside,
        fwhm_deg: 0.0,
        edge_width_deg: 0.0,
        leak_tolerance: 0.01,
        remove_cmb: false,
        cmb_map: None,
        include_pol: false,
        renormalize_overlaps: true,
        n_components: 3,
        cache_dir: cache_dir.to_string_lossy().into_owned(),
        surveys,
    }
}

/// Frequency 0 everywhere, frequency 1 on pixels 0..6, frequency 2 on 6..12.
fn split_cube() -> FrequencyCube {
    let i = Array2::from_shape_fn((3, 12), |(f, p)| match (f, p) {
        (1, p) if p >= 6 => f64::NAN,
        (2, p) if p < 6 => f64::NAN,
        _ => 1.0 + f as f64 + ((p * (f + 2)) % 5) as f64,
    });
    FrequencyCube {
        nside: 1,
        freqs: vec![0.408, 1.42, 23.0],
        i,
        qu: None,
    }
}

#[test]
fn split_coverage_gives_two_regions() {
    let cube = split_cube();
    let regions = partition(cube.intensity()).unwrap();
    assert_eq!(regions.len(), 2);
    assert_eq!(regions[0].pixels(), (0..6).collect::<Vec<_>>());
    assert_eq!(regions[0].freq_idx, vec![0, 1]);
    assert_eq!(regions[1].pixels(), (6..12).collect::<Vec<_>>());
    assert_eq!(regions[1].freq_idx, vec![0, 2]);
    for r in regions.iter() {
        let sys = decompose_region(cube.intensity(), r).unwrap();
        assert_eq!(sys.covariance.shape(), (2, 2));
        assert!(sys.eigenvalues[0] >= sys.eigenvalues[1]);
    }
}

#[test]
fn one_component_is_fitted_across_both_regions() {
    let cube = split_cube();
    let result = decompose(&cube, 1).unwrap();
    assert_eq!(result.basis.freq_idx, vec![0, 2]);
    assert!(result.fit.maps.iter().all(|x| x.is_finite()));
    // frequency 1 is outside the basis, so pixel 0 is fitted on frequency 0 alone
    assert!(result.fit.data[(0, 0)].is_finite());
    assert!(result.fit.model[(0, 0)].is_finite());
    assert!(result.fit.data[(1, 0)].is_nan());
    assert!(result.fit.model[(1, 0)].is_nan());
    assert!(result.fit.model[(2, 6)].is_finite());
}

#[test]
fn too_many_components_for_the_overlap_is_singular() {
    let cube = split_cube();
    match decompose(&cube, 2) {
        Err(Error::SingularMatrix { pattern, freqs }) => {
            assert_eq!(pattern, 0b01);
            assert_eq!(freqs, vec![0, 1]);
        }
        other => panic!("expected a singular region, got {:?}", other.map(|d| d.basis)),
    }
}

#[test]
fn partial_surveys_are_merged_and_cached() {
    let dir = tempfile::tempdir().unwrap();
    let truth = |p: usize| 1.0 + p as f64;
    let north = SkyMap::new(
        (0..12).map(|p| if p < 8 { truth(p) } else { f64::NAN }).collect(),
        PixelOrder::Ring,
    )
    .unwrap();
    // south survey is calibrated a factor of two high
    let south = SkyMap::new(
        (0..12).map(|p| if p >= 4 { 2.0 * truth(p) } else { f64::NAN }).collect(),
        PixelOrder::Ring,
    )
    .unwrap();
    let full = SkyMap::new((0..12).map(|p| 3.0 + truth(p)).collect(), PixelOrder::Ring).unwrap();

    let surveys = vec![survey("south", 1.42, 1), survey("north", 1.42, 0), survey("full", 30.0, 0)];
    let cfg = cfg(1, &dir.path().join("cache"), surveys.clone());
    let inputs = || {
        vec![
            (surveys[0].clone(), StokesMap::intensity(south.clone())),
            (surveys[1].clone(), StokesMap::intensity(north.clone())),
            (surveys[2].clone(), StokesMap::intensity(full.clone())),
        ]
    };

    let cube = harmonize(&cfg, inputs(), None).unwrap();
    assert_eq!(cube.freqs, vec![1.42, 30.0]);
    for p in 0..12 {
        assert_abs_diff_eq!(cube.i[(0, p)], truth(p), epsilon = 1e-12);
    }

    let calls = Cell::new(0);
    let first = load_or_harmonize(&cfg, |_| {
        calls.set(calls.get() + 1);
        Ok((inputs(), None))
    })
    .unwrap();
    let second = load_or_harmonize(&cfg, |_| {
        calls.set(calls.get() + 1);
        Err(Error::EmptyInput("cache should have been used"))
    })
    .unwrap();
    assert_eq!(calls.get(), 1);
    assert_eq!(first.i, cube.i);
    assert_eq!(second.i, cube.i);
    assert_eq!(second.freqs, cube.freqs);
}

#[test]
fn maps_on_disk_decompose_exactly_with_full_basis() {
    let dir = tempfile::tempdir().unwrap();
    let freqs = [0.408, 1.42, 23.0];
    let spectra = [[1.0, 0.5, 0.25], [0.2, 0.4, 0.8], [1.0, 1.0, 1.0]];
    let mut surveys = Vec::new();
    for (f, &freq) in freqs.iter().enumerate() {
        let name = format!("s{}", f);
        let values = (0..48)
            .map(|p| {
                let a = 1.0 + (p % 5) as f64;
                let b = 0.5 + (p % 3) as f64;
                let c = 0.3 + 0.1 * (p % 7) as f64;
                a * spectra[0][f] + b * spectra[1][f] + c * spectra[2][f]
            })
            .collect();
        write_map(
            dir.path().join(format!("{}.npy", name)),
            &SkyMap::new(values, PixelOrder::Ring).unwrap(),
        )
        .unwrap();
        surveys.push(survey(&name, freq, 0));
    }
    cfg(2, &dir.path().join("cache"), surveys)
        .to_yaml(dir.path().join("cfg.yaml"))
        .unwrap();

    let cfg = PipelineCfg::from_yaml(dir.path().join("cfg.yaml")).unwrap();
    let cube = load_or_harmonize(&cfg, |c| read_inputs(dir.path(), c)).unwrap();
    assert_eq!(cube.i.dim(), (3, 48));

    let result = decompose(&cube, cfg.n_components).unwrap();
    assert_eq!(result.regions.len(), 1);
    for r in result.fit.residual().iter() {
        assert_abs_diff_eq!(*r, 0.0, epsilon = 1e-9);
    }
}

#[test]
fn polarization_is_kept_where_any_survey_has_it() {
    let dir = tempfile::tempdir().unwrap();
    let truth = |p: usize| 1.0 + p as f64;
    let north_only = |f: &dyn Fn(usize) -> f64| {
        SkyMap::new(
            (0..12).map(|p| if p < 8 { f(p) } else { f64::NAN }).collect(),
            PixelOrder::Ring,
        )
        .unwrap()
    };
    let polarized = StokesMap::polarized(
        north_only(&truth),
        north_only(&|p| -0.1 * truth(p)),
        north_only(&|p| 0.2 * truth(p)),
    )
    .unwrap();
    let south = SkyMap::new(
        (0..12).map(|p| if p >= 4 { 2.0 * truth(p) } else { f64::NAN }).collect(),
        PixelOrder::Ring,
    )
    .unwrap();
    let full = SkyMap::new((0..12).map(|p| 5.0 + truth(p)).collect(), PixelOrder::Ring).unwrap();

    let surveys = vec![survey("north_pol", 1.42, 0), survey("south", 1.42, 1), survey("full", 30.0, 0)];
    let mut cfg = cfg(1, &dir.path().join("cache"), surveys.clone());
    cfg.include_pol = true;
    let inputs = || {
        vec![
            (surveys[1].clone(), StokesMap::intensity(south.clone())),
            (surveys[0].clone(), polarized.clone()),
            (surveys[2].clone(), StokesMap::intensity(full.clone())),
        ]
    };

    let cube = load_or_harmonize(&cfg, |_| Ok((inputs(), None))).unwrap();
    for p in 0..12 {
        assert_abs_diff_eq!(cube.i[(0, p)], truth(p), epsilon = 1e-12);
    }
    let (q, u) = cube.qu.as_ref().unwrap();
    for p in 0..12 {
        if p < 8 {
            assert_abs_diff_eq!(q[(0, p)], -0.1 * truth(p), epsilon = 1e-12);
            assert_abs_diff_eq!(u[(0, p)], 0.2 * truth(p), epsilon = 1e-12);
        } else {
            assert!(q[(0, p)].is_nan());
            assert!(u[(0, p)].is_nan());
        }
    }
    // no survey at 30 GHz is polarized
    assert!(q.row(1).iter().all(|v| v.is_nan()));
    assert!(u.row(1).iter().all(|v| v.is_nan()));

    let cached = load_or_harmonize(&cfg, |_| {
        Err(Error::EmptyInput("cache should have been used"))
    })
    .unwrap();
    let (cq, cu) = cached.qu.as_ref().unwrap();
    for p in 0..8 {
        assert_eq!(cq[(0, p)], q[(0, p)]);
        assert_eq!(cu[(0, p)], u[(0, p)]);
    }

    cfg.include_pol = false;
    let intensity_only = harmonize(&cfg, inputs(), None).unwrap();
    assert!(intensity_only.qu.is_none());
    assert_eq!(intensity_only.i.row(0).to_vec(), cube.i.row(0).to_vec());
}
