extern crate foreground_pca;

use std::{
    fs::File
    , path::Path
};

use anyhow::{
    Context
    , Result
};

use clap::{
    Command, Arg
};

use ndarray::{
    Array1
    , Array2
};

use ndarray_npy::NpzWriter;

use tracing::info;

use tracing_subscriber::EnvFilter;

use foreground_pca::{
    decompose
    , io::read_inputs
    , load_or_harmonize
    , PipelineCfg
};

fn main()->Result<()>{
    tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?)
    .init();

    let matches=Command::new("decompose")
    .arg(
        Arg::new("cfg")
        .short('c')
        .long("cfg")
        .takes_value(true)
        .value_name("config file")
        .required(true)
        .help("pipeline yaml config")
    )
    .arg(
        Arg::new("outfile")
        .short('o')
        .long("out")
        .takes_value(true)
        .value_name("out file")
        .required(true)
        .help("output npz file")
    )
    .arg(
        Arg::new("ncomp")
        .short('k')
        .long("ncomp")
        .takes_value(true)
        .value_name("n")
        .required(false)
        .help("number of principal components, overrides the config")
    )
    .get_matches();

    let cfg_path=Path::new(matches.value_of("cfg").unwrap_or_default());
    let base=cfg_path.parent().unwrap_or_else(|| Path::new("."));
    let mut cfg=PipelineCfg::from_yaml(cfg_path)
        .with_context(|| format!("reading {}", cfg_path.display()))?;
    cfg.cache_dir=base.join(&cfg.cache_dir).to_string_lossy().into_owned();
    if let Some(k)=matches.value_of("ncomp"){
        cfg.n_components=k.parse().context("ncomp")?;
    }

    let cube=load_or_harmonize(&cfg, |cfg| read_inputs(base, cfg))?;
    let result=decompose(&cube, cfg.n_components)?;
    for sys in result.systems.iter(){
        info!("region {:#b}: {} pixels, eigenvalues {:?}", sys.pattern, sys.pixels.len(), sys.eigenvalues.as_slice());
    }

    let basis=&result.basis;
    let basis_vectors=Array2::from_shape_fn(basis.vectors.shape(), |(i, j)| basis.vectors[(i, j)]);
    let basis_freqs:Array1<f64>=basis.freq_idx.iter().map(|&i| cube.freqs[i]).collect();
    let mut region_id=Array1::<u32>::from_elem(cube.npix(), u32::MAX);
    for r in result.regions.iter(){
        r.pixels().into_iter().for_each(|p| region_id[p]=r.pattern);
    }

    let outfile=matches.value_of("outfile").unwrap_or_default();
    let mut npz=NpzWriter::new_compressed(File::create(outfile)?);
    npz.add_array("freqs.npy", &Array1::from(cube.freqs.clone()))?;
    npz.add_array("basis_freqs.npy", &basis_freqs)?;
    npz.add_array("eigenvalues.npy", &Array1::from(basis.eigenvalues.clone()))?;
    npz.add_array("basis.npy", &basis_vectors)?;
    npz.add_array("region.npy", &region_id)?;
    npz.add_array("maps.npy", &result.fit.maps)?;
    npz.add_array("shape_maps.npy", &result.fit.shape_maps)?;
    npz.add_array("data.npy", &result.fit.data)?;
    npz.add_array("model.npy", &result.fit.model)?;
    npz.add_array("residual.npy", &result.fit.residual())?;
    npz.finish()?;
    info!("wrote {}", outfile);
    Ok(())
}
