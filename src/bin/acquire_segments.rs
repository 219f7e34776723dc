
//! Configures the scope named in an INI file for segmented capture, then
//! acquires and transfers the segments one or more times.

extern crate keysight_segmented as ks;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::process;

use clap::{Arg, ArgAction, Command};

use ks::config::DEFAULT_SECTION;
use ks::{Acquisition, ScopeConfig, DSOX3000};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn save(path:&Path, runs:&[Acquisition]) -> ks::Result<()> {
    let out = BufWriter::new(File::create(path)?);
    let is_json = path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::to_writer(out, &runs).map_err(|e| ks::Error::Io(e.into()))?;
    } else {
        serde_cbor::to_writer(out, &runs).map_err(|e| ks::Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    }
    Ok(())
}

fn run() -> ks::Result<()> {
    let args = Command::new("acquire_segments")
        .version(VERSION)
        .about("Segmented waveform capture from a Keysight InfiniiVision scope.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .action(ArgAction::Set)
                .default_value("config.ini")
                .help("INI file holding the scope settings")
        )
        .arg(
            Arg::new("section")
                .short('s')
                .long("section")
                .action(ArgAction::Set)
                .default_value(DEFAULT_SECTION)
                .help("Section of the INI file to read")
        )
        .arg(
            Arg::new("runs")
                .short('n')
                .long("runs")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(u32))
                .default_value("1")
                .help("Number of segmented acquisitions to take")
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .action(ArgAction::Set)
                .help("Save the acquisitions here (JSON for *.json, CBOR otherwise)")
        )
        .get_matches();

    let config_path = args.get_one::<String>("config").map(String::as_str).unwrap_or("config.ini");
    let section = args.get_one::<String>("section").map(String::as_str).unwrap_or(DEFAULT_SECTION);
    let runs:u32 = args.get_one::<u32>("runs").copied().unwrap_or(1);

    let conf = ScopeConfig::from_file(config_path, section)?;
    let mut scope = DSOX3000::connect(&conf)?;
    scope.configure()?;

    let mut acquisitions:Vec<Acquisition> = Vec::with_capacity(runs as usize);
    for _ in 0..runs {
        let acq = scope.read_data()?;
        println!("len xax: {}", acq.time.len());
        println!("nr of wfs: {}", acq.segments.len());
        acquisitions.push(acq);
    }

    scope.close()?;

    if let Some(path) = args.get_one::<String>("output") {
        save(Path::new(path), &acquisitions)?;
        log::info!("saved {} acquisitions to {}", acquisitions.len(), path);
    }

    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}
