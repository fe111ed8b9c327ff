extern crate foreground_pca;

use std::{
    f64::consts::PI
    , fs::create_dir_all
    , path::Path
};

use anyhow::{
    Context
    , Result
};

use clap::{
    Command, Arg
};

use ndarray::Array2;

use rand::{
    rngs::StdRng
    , Rng
    , SeedableRng
};

use tracing_subscriber::EnvFilter;

use foreground_pca::{
    config::{
        MapSource
        , PipelineCfg
        , SurveyCfg
    }
    , io::{
        write_map
        , write_raster
    }
    , pixel::{
        ang2pix
        , nside2npix
        , pix2ang
    }
    , smooth
    , PixelOrder
    , SkyMap
};

/// Smooth positive random field.
fn random_template(rng: &mut StdRng, nside: usize, fwhm_deg: f64)->Result<SkyMap>{
    let white: Vec<f64>=(0..nside2npix(nside))
        .map(|_| rng.gen_range(0.0..1.0))
        .collect();
    let m=smooth(&SkyMap::new(white, PixelOrder::Ring)?, fwhm_deg.to_radians())?;
    Ok(m.map_values(|x| 0.2 + x))
}

fn main()->Result<()>{
    tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?)
    .init();

    let matches=Command::new("synth_sky")
    .arg(
        Arg::new("nside")
        .short('n')
        .long("nside")
        .takes_value(true)
        .value_name("nside")
        .required(true)
        .help("resolution of the synthetic surveys")
    )
    .arg(
        Arg::new("outdir")
        .short('o')
        .long("out")
        .takes_value(true)
        .value_name("output dir")
        .required(true)
        .help("directory for .npy maps and cfg.yaml")
    )
    .arg(
        Arg::new("seed")
        .short('s')
        .long("seed")
        .takes_value(true)
        .value_name("seed")
        .required(false)
        .help("rng seed")
    )
    .get_matches();

    let nside=matches.value_of("nside").unwrap_or_default().parse::<usize>().context("nside")?;
    let outdir=Path::new(matches.value_of("outdir").unwrap_or_default());
    let seed=matches.value_of("seed").unwrap_or("0").parse::<u64>().context("seed")?;
    create_dir_all(outdir)?;
    let mut rng=StdRng::seed_from_u64(seed);

    // synchrotron, free-free and dust templates with power-law spectra
    let components=[
        (random_template(&mut rng, nside, 20.0)?, -2.8),
        (random_template(&mut rng, nside, 10.0)?, -2.1),
        (random_template(&mut rng, nside, 5.0)?, 1.6),
    ];
    let sky_at=|freq_ghz: f64, ipix: usize| -> f64 {
        components
            .iter()
            .map(|(t, beta)| t.values()[ipix] * (freq_ghz / 30.0).powf(*beta))
            .sum()
    };

    let mut surveys=Vec::new();
    for &freq in [0.408, 2.3, 23.0, 100.0, 353.0].iter() {
        let name=format!("full_{}", freq);
        let values: Vec<f64>=(0..nside2npix(nside))
            .map(|i| sky_at(freq, i) * (1.0 + 0.01 * rng.gen_range(-1.0..1.0)))
            .collect();
        write_map(outdir.join(format!("{}.npy", name)), &SkyMap::new(values, PixelOrder::Ring)?)?;
        surveys.push(SurveyCfg {
            name: name.clone(),
            freq_ghz: freq,
            priority: 0,
            scale: 1.0,
            i: MapSource::Healpix {
                path: format!("{}.npy", name),
                order: PixelOrder::Ring,
            },
            q: None,
            u: None,
        });
    }

    // two partial surveys at 1.42 GHz, north and south, merged by priority
    for (priority, north) in [(0_u32, true), (1_u32, false)] {
        let name=format!("partial_1.42_{}", if north { "north" } else { "south" });
        let values: Vec<f64>=(0..nside2npix(nside))
            .map(|i| -> foreground_pca::Result<f64> {
                let (theta, _)=pix2ang(nside, PixelOrder::Ring, i)?;
                let covered=if north {
                    theta < 100_f64.to_radians()
                } else {
                    theta > 80_f64.to_radians()
                };
                Ok(if covered { sky_at(1.42, i) } else { 0.0 })
            })
            .collect::<foreground_pca::Result<_>>()?;
        write_map(outdir.join(format!("{}.npy", name)), &SkyMap::new(values, PixelOrder::Ring)?)?;
        surveys.push(SurveyCfg {
            name: name.clone(),
            freq_ghz: 1.42,
            priority,
            scale: 1.0,
            i: MapSource::Healpix {
                path: format!("{}.npy", name),
                order: PixelOrder::Ring,
            },
            q: None,
            u: None,
        });
    }

    // a southern-only survey delivered as a lat/lon raster
    let (nrow, ncol)=(4 * nside + 1, 8 * nside + 1);
    let template=SkyMap::new(
        (0..nside2npix(nside)).map(|i| sky_at(5.0, i)).collect(),
        PixelOrder::Ring,
    )?;
    let mut raster=Array2::from_elem((nrow, ncol), f64::NAN);
    for ((r, c), v) in raster.indexed_iter_mut() {
        let theta=PI * (1.0 - r as f64 / (nrow - 1) as f64);
        let phi=2.0 * PI * c as f64 / (ncol - 1) as f64;
        if theta >= 60_f64.to_radians() {
            *v = template.values()[ang2pix(nside, PixelOrder::Ring, theta, phi)?];
        }
    }
    write_raster(outdir.join("raster_5.npy"), &raster)?;
    surveys.push(SurveyCfg {
        name: "raster_5".to_string(),
        freq_ghz: 5.0,
        priority: 0,
        scale: 1.0,
        i: MapSource::Raster {
            path: "raster_5.npy".to_string(),
        },
        q: None,
        u: None,
    });

    let cfg=PipelineCfg {
        nside,
        fwhm_deg: 3.0 * 58.6 / nside as f64,
        edge_width_deg: 58.6 / nside as f64,
        leak_tolerance: 0.01,
        remove_cmb: false,
        cmb_map: None,
        include_pol: false,
        renormalize_overlaps: true,
        n_components: 3,
        cache_dir: "cache".to_string(),
        surveys,
    };
    cfg.to_yaml(outdir.join("cfg.yaml"))?;
    println!("wrote {} surveys to {}", cfg.surveys.len(), outdir.display());
    Ok(())
}
