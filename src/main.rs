extern crate clap;
#[macro_use] extern crate log;
extern crate fern;
extern crate chrono;
extern crate term_grid;

pub mod preprocessor;

use clap::{Arg, ArgMatches, App};

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use preprocessor::Config;

fn main() {
    let args = process_arguments();
    initialize_logging(args.occurrences_of("verbose"));

    debug!("Arguments:\n\tVerbosity: {}\n\tPrint Tables: {}\n\tMax Depth: {}\n\tOutfile: {}\n\tInfile: {}",
        verbosity_filter(args.occurrences_of("verbose")),
        args.is_present("print-tables"),
        args.value_of("max-depth").unwrap_or("default"),
        args.value_of("output").unwrap_or("None"),
        args.value_of("INPUT").unwrap_or("None"),
    );

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(err) => {
            error!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // INPUT is a required argument, so clap guarantees its presence.
    let ipath = Path::new(args.value_of("INPUT").unwrap_or_default());

    let ifile = match File::open(&ipath) {
        Err(err) => {
            error!("fatal: unable to open input file `{}`: {}", ipath.display(), err);
            std::process::exit(1);
        },
        Ok(file) => file,
    };

    let lines = match preprocessor::lexer::read_lines(Box::new(ifile)) {
        Err(err) => {
            error!("fatal: unable to read input file `{}`: {}", ipath.display(), err);
            std::process::exit(1);
        },
        Ok(lines) => lines,
    };

    let result = match preprocessor::preprocess(lines, &config) {
        Ok(result) => result,
        Err(errors) => {
            error!("fatal: {} macro definition error(s) in `{}`; nothing was expanded.", errors.len(), ipath.display());
            std::process::exit(1);
        }
    };

    if args.is_present("print-tables") {
        if result.tables.is_empty() {
            info!("No macros are defined in `{}`.", ipath.display());
        }
        println!("{}", preprocessor::printer::render_tables(&result.tables));
        println!("{}", preprocessor::printer::render_calls(&result.expansion.calls));
    }

    let opath = match args.value_of("output") {
        Some(filename) => PathBuf::from(filename),
        None => ipath.with_extension("exp"),
    };

    let mut ofile = match File::create(&opath) {
        Err(err) => {
            error!("fatal: unable to open output file `{}`: {}", opath.display(), err);
            std::process::exit(1);
        },
        Ok(file) => file,
    };

    for line in result.expansion.lines.iter() {
        if let Err(err) = writeln!(ofile, "{}", line) {
            error!("fatal: unable to write to output file `{}`: {}", opath.display(), err);
            std::process::exit(1);
        }
    }

    if !result.expansion.errors.is_empty() {
        error!("{} macro call(s) in `{}` could not be expanded.", result.expansion.errors.len(), ipath.display());
        std::process::exit(1);
    }
}

fn process_arguments() -> ArgMatches<'static> {
    App::new(option_env!("CARGO_PKG_NAME").unwrap_or("macpp"))
        .version(option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"))
        .author(option_env!("CARGO_PKG_AUTHORS").unwrap_or(""))
        .about(option_env!("CARGO_PKG_DESCRIPTION").unwrap_or(""))
        .arg(Arg::with_name("INPUT")
            .help("Sets the input file to use")
            .required(true)
            .multiple(false)
            .index(1))
        .arg(Arg::with_name("verbose")
            .short("v")
            .multiple(true)
            .takes_value(false)
            .help("Sets the level of verbosity"))
        .arg(Arg::with_name("output")
            .short("o")
            .takes_value(true)
            .help("write the expanded source to an outfile (default: INPUT with an .exp extension)"))
        .arg(Arg::with_name("print-tables")
            .short("t")
            .alias("show")
            .takes_value(false)
            .help("prints the macro tables and every expansion instance to STDOUT"))
        .arg(Arg::with_name("max-depth")
            .long("max-depth")
            .takes_value(true)
            .value_name("N")
            .help("maximum nesting depth of macro calls (default 25)"))
        .get_matches()
}

fn build_config(args: &ArgMatches) -> Result<Config, String> {
    let mut config = Config::default();
    if let Some(depth) = args.value_of("max-depth") {
        config.max_depth = match depth.parse::<usize>() {
            Ok(0) => return Err("--max-depth must be at least 1".to_owned()),
            Ok(depth) => depth,
            Err(err) => return Err(format!("invalid --max-depth `{}`: {}", depth, err)),
        };
    }
    Ok(config)
}

fn verbosity_filter(verbosity: u64) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

fn initialize_logging(verbosity: u64) {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(verbosity_filter(verbosity))
        .chain(std::io::stderr())
        .apply().ok();
}
