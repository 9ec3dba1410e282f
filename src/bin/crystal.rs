// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

extern crate clap;
extern crate crystal;
extern crate env_logger;
#[macro_use]
extern crate log;
extern crate num_cpus;

use clap::{App, Arg, ArgMatches};
use crystal::config::{MAX_CAPTURE, MAX_COSINES, MAX_FPS, MAX_WAVES, MAX_WORKERS};
use crystal::{Animation, Config, FrameSink, NullSink, Renderer, SnapshotSink};
use env_logger::{Builder, Env};
use std::process;
use std::str::FromStr;

fn parse_pair<T: FromStr>(s: &str, separator: char) -> Option<(T, T)> {
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + PartialOrd>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

fn validate_finite(s: &str, err: &str) -> Result<(), String> {
    match f64::from_str(s) {
        Ok(v) if v.is_finite() => Ok(()),
        _ => Err(err.to_string()),
    }
}

const VERBOSE: &str = "verbose";
const WAVES: &str = "waves";
const COSINES: &str = "cosines";
const WORKERS: &str = "workers";
const SIZE: &str = "size";
const FPS: &str = "fps";
const CAPTURE: &str = "capture";
const SPEED: &str = "speed";
const OFFSET: &str = "offset";
const ROTATION: &str = "rotation";
const TILE_SIZE: &str = "tile-size";
const FRAMES: &str = "frames";
const OUTPUT: &str = "output";

fn args<'a>() -> ArgMatches<'a> {
    App::new("crystal")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Animated crystal interference pattern renderer")
        .arg(
            Arg::with_name(VERBOSE)
                .long(VERBOSE)
                .short("v")
                .help("Enable verbose output"),
        )
        .arg(
            Arg::with_name(WAVES)
                .long(WAVES)
                .short("n")
                .takes_value(true)
                .default_value("7")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        MAX_WAVES,
                        "Could not parse wave count",
                        &format!("Wave count must be between 1 and {}", MAX_WAVES),
                    )
                })
                .help("Number of waves in the crystal"),
        )
        .arg(
            Arg::with_name(COSINES)
                .long(COSINES)
                .short("c")
                .takes_value(true)
                .default_value("1024")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        MAX_COSINES,
                        "Could not parse cosine table size",
                        &format!("Cosine table size must be between 1 and {}", MAX_COSINES),
                    )
                })
                .help("Size of the cos(x) lookup table"),
        )
        .arg(
            Arg::with_name(WORKERS)
                .long(WORKERS)
                .short("j")
                .takes_value(true)
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        MAX_WORKERS,
                        "Could not parse worker count",
                        &format!("Worker count must be between 1 and {}", MAX_WORKERS),
                    )
                })
                .help("Number of worker threads [default: number of CPUs]"),
        )
        .arg(
            Arg::with_name(SIZE)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("800x600")
                .validator(|s| validate_pair::<usize>(&s, 'x', "Could not parse image size"))
                .help("Framebuffer size, W pixels wide and H pixels tall"),
        )
        .arg(
            Arg::with_name(FPS)
                .long(FPS)
                .short("f")
                .takes_value(true)
                .default_value("30")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        MAX_FPS,
                        "Could not parse frame rate",
                        &format!("Frame rate must be between 1 and {}", MAX_FPS),
                    )
                })
                .help("Target frames per second"),
        )
        .arg(
            Arg::with_name(CAPTURE)
                .long(CAPTURE)
                .short("C")
                .takes_value(true)
                .default_value("0")
                .validator(|s| {
                    validate_range(
                        &s,
                        0,
                        MAX_CAPTURE,
                        "Could not parse capture count",
                        &format!("Capture count must be at most {}", MAX_CAPTURE),
                    )
                })
                .help("Save N frames as BMP files, then stop"),
        )
        .arg(
            Arg::with_name(SPEED)
                .long(SPEED)
                .takes_value(true)
                .default_value("0.25")
                .validator(|s| validate_finite(&s, "Could not parse time speed"))
                .help("Pattern time per second of animation"),
        )
        .arg(
            Arg::with_name(OFFSET)
                .long(OFFSET)
                .takes_value(true)
                .default_value("0")
                .allow_hyphen_values(true)
                .validator(|s| validate_finite(&s, "Could not parse time offset"))
                .help("Pattern time at the start of the animation"),
        )
        .arg(
            Arg::with_name(ROTATION)
                .long(ROTATION)
                .takes_value(true)
                .default_value("0")
                .allow_hyphen_values(true)
                .validator(|s| validate_finite(&s, "Could not parse rotation rate"))
                .help("Rotation in radians per second of animation"),
        )
        .arg(
            Arg::with_name(TILE_SIZE)
                .long(TILE_SIZE)
                .takes_value(true)
                .default_value("4096")
                .validator(|s| {
                    validate_range(
                        &s,
                        1usize,
                        1 << 24,
                        "Could not parse tile size",
                        "Tile size must be between 1 and 16777216",
                    )
                })
                .help("Pixels per scheduling tile"),
        )
        .arg(
            Arg::with_name(FRAMES)
                .long(FRAMES)
                .takes_value(true)
                .default_value("0")
                .validator(|s| {
                    validate_range(
                        &s,
                        0,
                        u64::max_value(),
                        "Could not parse frame count",
                        "Frame count out of range",
                    )
                })
                .help("Stop after N frames; 0 runs until the capture is done or forever"),
        )
        .arg(
            Arg::with_name(OUTPUT)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .default_value(".")
                .help("Directory for captured frames"),
        )
        .get_matches()
}

fn value<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<T, String> {
    matches
        .value_of(name)
        .and_then(|s| T::from_str(s).ok())
        .ok_or_else(|| format!("Could not parse --{}", name))
}

fn build_config(matches: &ArgMatches) -> Result<Config, String> {
    let (width, height) = matches
        .value_of(SIZE)
        .and_then(|s| parse_pair(s, 'x'))
        .ok_or_else(|| "Could not parse image size".to_string())?;
    let workers = match matches.value_of(WORKERS) {
        Some(_) => value(matches, WORKERS)?,
        None => num_cpus::get().min(MAX_WORKERS),
    };

    Ok(Config {
        verbose: matches.is_present(VERBOSE),
        workers,
        width,
        height,
        waves: value(matches, WAVES)?,
        cosines: value(matches, COSINES)?,
        fps: value(matches, FPS)?,
        capture: value(matches, CAPTURE)?,
        time_speed: value(matches, SPEED)?,
        time_offset: value(matches, OFFSET)?,
        rotation_rate: value(matches, ROTATION)?,
        tile_size: value(matches, TILE_SIZE)?,
    })
}

fn main() {
    let matches = args();
    let level = if matches.is_present(VERBOSE) { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(level)).init();

    let config = build_config(&matches)
        .and_then(|c| c.validate().map(|_| c).map_err(|e| e.to_string()));
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };
    info!("{:?}", config);

    let frame_limit = match value::<u64>(&matches, FRAMES) {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(n),
    };
    let output = matches.value_of(OUTPUT).unwrap_or(".");
    let mut sink: Box<dyn FrameSink> = if config.capture > 0 {
        Box::new(SnapshotSink::new(output, config.capture))
    } else {
        if frame_limit.is_none() {
            info!("nothing to capture and no frame limit, rendering until interrupted");
        }
        Box::new(NullSink::default())
    };

    let mut renderer = match Renderer::new(&config) {
        Ok(renderer) => renderer,
        Err(e) => {
            error!("Render failure: {}", e);
            process::exit(1);
        }
    };

    let outcome = Animation::new(&config).run(&mut renderer, sink.as_mut(), frame_limit);
    renderer.shutdown();
    match outcome {
        Ok(stats) => info!("{} frames in {:.3} sec", stats.frames, stats.elapsed),
        Err(e) => {
            error!("Render failure: {}", e);
            process::exit(1);
        }
    }
}
