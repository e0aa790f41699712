//! cppdeps — scan a C/C++ source tree and emit Makefile dependency rules.

use anyhow::Result;
use clap::Parser;

use cppdeps::config::{expand_options_files, Config, OutputMode, Verbosity};
use cppdeps::driver::Driver;
use cppdeps::paths;
use cppdeps::Error;

#[derive(Parser, Debug)]
#[command(
    name = "cppdeps",
    version,
    about = "Scan C/C++ sources and print Makefile-compatible dependency rules"
)]
struct Cli {
    /// File or directory to scan (repeatable). A directory is scanned
    /// recursively, joins the include search path, and becomes the prefix
    /// stripped from object names
    #[arg(long = "srcdir", value_name = "DIR")]
    srcdir: Vec<String>,

    /// Directory searched when resolving #include "..." directives
    #[arg(long = "includedir", value_name = "DIR")]
    includedir: Vec<String>,

    /// Short form of --includedir
    #[arg(short = 'I', value_name = "DIR")]
    includedir_short: Vec<String>,

    /// Directory searched when resolving #include <...> under --checksys
    #[arg(long = "sysincludedir", value_name = "DIR")]
    sysincludedir: Vec<String>,

    /// Resolve #include <...> against the system path instead of
    /// recording phantom nodes
    #[arg(long = "checksys")]
    checksys: bool,

    /// Prefix prepended to emitted object-file targets
    #[arg(long = "objdir", value_name = "DIR")]
    objdir: Option<String>,

    /// Object-file suffix for emitted targets (repeatable; default .o)
    #[arg(long = "objext", value_name = ".EXT")]
    objext: Vec<String>,

    /// Extra extension treated as a C/C++ source file
    #[arg(long = "source-ext", value_name = ".EXT")]
    source_ext: Vec<String>,

    /// Extra extension treated as a C/C++ header file
    #[arg(long = "header-ext", value_name = ".EXT")]
    header_ext: Vec<String>,

    /// Record includes ending in .EXT verbatim, without opening them
    #[arg(long = "literal", value_name = ".EXT")]
    literal: Vec<String>,

    /// Print one `file --> includes` line per scanned file
    #[arg(long = "output-direct-cdeps")]
    output_direct_cdeps: bool,

    /// Print Makefile compile rules (the default)
    #[arg(long = "output-compile-deps")]
    output_compile_deps: bool,

    /// Print Makefile link rules driven by the format options
    #[arg(long = "output-link-deps")]
    output_link_deps: bool,

    /// Print each link group with its member count
    #[arg(long = "output-ldep-groups")]
    output_ldep_groups: bool,

    /// Print the link-group level report
    #[arg(long = "output-ldep-levels")]
    output_ldep_levels: bool,

    /// Level report plus every transitive dependency per group
    #[arg(long = "output-ldep-levelsv")]
    output_ldep_levelsv: bool,

    /// Print a MATLAB-loadable group adjacency matrix
    #[arg(long = "output-ldep-adjacency")]
    output_ldep_adjacency: bool,

    /// Print raw `member dependency` pairs, one per line
    #[arg(long = "output-ldep-raw")]
    output_ldep_raw: bool,

    /// Executable format: `(group,)? prefix : pattern...` (repeatable)
    #[arg(long = "exeformat", value_name = "SPEC")]
    exeformat: Vec<String>,

    /// Link-target format for objects in an executable's closure
    #[arg(long = "linkformat", value_name = "SPEC")]
    linkformat: Vec<String>,

    /// Link-target format for phantom (system) dependencies
    #[arg(long = "phantomlinkformat", value_name = "SPEC")]
    phantomlinkformat: Vec<String>,

    /// Directory entry name never descended into (default: RCS CVS .svn)
    #[arg(long = "prune-dir", value_name = "NAME")]
    prune_dir: Vec<String>,

    /// Extension excluded from scanning
    #[arg(long = "prune-ext", value_name = ".EXT")]
    prune_ext: Vec<String>,

    /// -1 errors only, 0 quiet, 1 normal, 2 extra diagnostics, 3 tracing
    #[arg(
        long = "verbosity",
        value_name = "N",
        default_value_t = 1,
        allow_negative_numbers = true
    )]
    verbosity: i32,

    /// Dump the effective option state to stderr before scanning
    #[arg(long = "inspect")]
    inspect: bool,
}

fn main() {
    let args = match expand_options_files(std::env::args().collect()) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("ERROR: {err}");
            std::process::exit(1);
        }
    };
    let cli = Cli::parse_from(args);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(Verbosity::from_level(cli.verbosity).env_filter())
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli) {
        eprintln!("ERROR: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::new();
    let mut roots: Vec<String> = Vec::new();

    for dir in &cli.srcdir {
        let dir = if dir.is_empty() {
            ".".to_string()
        } else {
            paths::trim_trailing_slashes(dir)
        };
        let meta = std::fs::metadata(&dir).map_err(|_| Error::MissingSource(dir.clone()))?;
        if meta.is_dir() {
            config.user_ipath.push(dir.clone());
            // the last directory named wins
            config.strip_prefix = paths::normalize(&dir)?;
        }
        roots.push(dir);
    }
    if roots.is_empty() {
        return Err(Error::NoSourceDirs.into());
    }

    config.user_ipath.extend(cli.includedir);
    config.user_ipath.extend(cli.includedir_short);
    config.sys_ipath.extend(cli.sysincludedir);
    if cli.checksys {
        config.check_sys_deps = true;
        config.phantom_sys_deps = false;
    }
    if let Some(objdir) = &cli.objdir {
        config.obj_prefix = paths::trim_trailing_slashes(objdir);
    }
    config.obj_exts.extend(cli.objext);
    config.source_exts.extend(cli.source_ext);
    config.header_exts.extend(cli.header_ext);
    config.literal_exts.extend(cli.literal);
    for spec in &cli.exeformat {
        config.exe_formats.add(spec)?;
    }
    for spec in &cli.linkformat {
        config.link_formats.add(spec)?;
    }
    for spec in &cli.phantomlinkformat {
        config.phantom_link_formats.add(spec)?;
    }
    config.prune_dirs.extend(cli.prune_dir);
    config.prune_exts.extend(cli.prune_ext);
    config.verbosity = Verbosity::from_level(cli.verbosity);

    if cli.output_direct_cdeps {
        config.output_mode.insert(OutputMode::DIRECT_CDEPS);
    }
    if cli.output_compile_deps {
        config.output_mode.insert(OutputMode::COMPILE_DEPS);
    }
    if cli.output_link_deps {
        config.output_mode.insert(OutputMode::LINK_DEPS);
    }
    if cli.output_ldep_groups {
        config.output_mode.insert(OutputMode::LDEP_GROUPS);
    }
    if cli.output_ldep_levels {
        config.output_mode.insert(OutputMode::LDEP_LEVELS);
    }
    if cli.output_ldep_levelsv {
        config.output_mode.insert(OutputMode::LDEP_LEVELSV);
    }
    if cli.output_ldep_adjacency {
        config.output_mode.insert(OutputMode::LDEP_ADJACENCY);
    }
    if cli.output_ldep_raw {
        config.output_mode.insert(OutputMode::LDEP_RAW);
    }
    config.finalize();

    if cli.inspect {
        config.inspect(&roots);
    }

    let mut driver = Driver::new(config, roots);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    driver.run(&mut out)?;
    Ok(())
}
