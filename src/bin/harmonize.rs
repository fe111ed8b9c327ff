extern crate foreground_pca;

use std::{
    path::Path
};

use anyhow::{
    Context
    , Result
};

use clap::{
    Command, Arg
};

use tracing::info;

use tracing_subscriber::EnvFilter;

use foreground_pca::{
    io::read_inputs
    , load_or_harmonize
    , PipelineCfg
};

fn main()->Result<()>{
    tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?)
    .init();

    let matches=Command::new("harmonize")
    .arg(
        Arg::new("cfg")
        .short('c')
        .long("cfg")
        .takes_value(true)
        .value_name("config file")
        .required(true)
        .help("pipeline yaml config")
    )
    .get_matches();

    let cfg_path=Path::new(matches.value_of("cfg").unwrap_or_default());
    let base=cfg_path.parent().unwrap_or_else(|| Path::new("."));
    let mut cfg=PipelineCfg::from_yaml(cfg_path)
        .with_context(|| format!("reading {}", cfg_path.display()))?;
    cfg.cache_dir=base.join(&cfg.cache_dir).to_string_lossy().into_owned();

    let cube=load_or_harmonize(&cfg, |cfg| read_inputs(base, cfg))?;
    for (f, row) in cube.freqs.iter().zip(cube.i.outer_iter()){
        let nvalid=row.iter().filter(|x| x.is_finite()).count();
        info!("{:>10.4} GHz: {}/{} valid pixels", f, nvalid, cube.npix());
    }
    println!("{}", cfg.cache_key().path_in(&cfg.cache_dir).display());
    Ok(())
}
