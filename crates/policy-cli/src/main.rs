//! `policy-tool`: detect, dump and query policy files from the command line

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use policy_format::{default_registry, read_leaders, FileLoader, LoaderConfig, PafWriter};
use policy_store::Policy;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod json;

fn file_arg() -> Arg {
    Arg::new("file")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Policy file to read")
}

fn lenient_arg() -> Arg {
    Arg::new("lenient")
        .long("lenient")
        .action(ArgAction::SetTrue)
        .help("Skip unrecognized lines instead of failing")
}

fn resolve_arg() -> Arg {
    Arg::new("resolve")
        .long("resolve")
        .action(ArgAction::SetTrue)
        .help("Replace @file references with the policies they name")
}

fn cli() -> Command {
    Command::new("policy-tool")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect hierarchical policy files")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::Count)
                .help("Log more (-v debug, -vv trace); RUST_LOG overrides"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Loader settings as TOML"),
        )
        .arg(
            Arg::new("base-dir")
                .long("base-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory relative @file references resolve against"),
        )
        .subcommand(
            Command::new("detect")
                .about("Print the detected format of a file")
                .arg(file_arg()),
        )
        .subcommand(
            Command::new("dump")
                .about("Parse a file and print it back")
                .arg(file_arg())
                .arg(lenient_arg())
                .arg(resolve_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("get")
                .about("Print the values stored under a dotted name")
                .arg(file_arg())
                .arg(Arg::new("name").required(true).help("Dotted parameter name"))
                .arg(lenient_arg())
                .arg(resolve_arg()),
        )
        .subcommand(
            Command::new("names")
                .about("List top-level names with their types")
                .arg(file_arg())
                .arg(lenient_arg()),
        )
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Global flags are visible on the subcommand's matches
fn loader_config(args: &ArgMatches) -> Result<LoaderConfig> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            LoaderConfig::from_toml_str(&text)?
        }
        None => LoaderConfig::default(),
    };
    if let Some(dir) = args.get_one::<PathBuf>("base-dir") {
        config = config.with_base_dir(dir);
    }
    if args.try_get_one::<bool>("lenient").ok().flatten().copied().unwrap_or(false) {
        config = config.with_strict(false);
    }
    debug!(?config, "loader configuration");
    Ok(config)
}

fn load(path: &Path, config: LoaderConfig, resolve: bool) -> Result<Policy> {
    let loader = FileLoader::new(config);
    let policy = if resolve {
        loader.load_file_expanded(path)?
    } else {
        loader.load_file(path)?
    };
    Ok(policy)
}

fn detect(path: &Path, config: &LoaderConfig) -> Result<String> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let leaders = read_leaders(&mut BufReader::new(file), config.max_leader_bytes)?;
    match default_registry().detect(&leaders) {
        Some(factory) => Ok(factory.format_name().to_string()),
        None => bail!("{}: unrecognized policy format", path.display()),
    }
}

fn run(matches: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    let Some((command, args)) = matches.subcommand() else {
        bail!("no command given");
    };
    let config = loader_config(args)?;
    let Some(path) = args.get_one::<PathBuf>("file") else {
        bail!("missing file argument");
    };
    let resolve = args.try_get_one::<bool>("resolve").ok().flatten().copied().unwrap_or(false);

    match command {
        "detect" => {
            writeln!(out, "{}", detect(path, &config)?)?;
        }
        "dump" => {
            let policy = load(path, config, resolve)?;
            if args.get_flag("json") {
                writeln!(out, "{}", serde_json::to_string_pretty(&json::to_json(&policy))?)?;
            } else {
                PafWriter::new().write(&policy, out)?;
            }
        }
        "get" => {
            let policy = load(path, config, resolve)?;
            let Some(name) = args.get_one::<String>("name") else {
                bail!("missing name argument");
            };
            let values = policy.get_values(name)?;
            let type_name = policy.get_type_name(name)?;
            debug!(name, count = values.len(), type_name, "found values");
            for value in &values {
                writeln!(out, "{}", json::value_to_text(value))?;
            }
        }
        "names" => {
            let policy = load(path, config, false)?;
            for name in policy.names() {
                writeln!(
                    out,
                    "{name}\t{}\t{}",
                    policy.get_type_name(&name)?,
                    policy.value_count(&name)
                )?;
            }
        }
        other => bail!("unknown command: {other}"),
    }
    Ok(())
}

fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_count("verbose"));

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(err) = run(&matches, &mut out) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy_test_utils::DICTIONARY_PAF;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn run_args(args: &[&str]) -> Result<String> {
        let matches = cli().try_get_matches_from(args)?;
        let mut out = Vec::new();
        run(&matches, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    fn fixture(text: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fixture.paf");
        std::fs::write(&path, text).unwrap();
        (dir, path)
    }

    #[test]
    fn cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn detect_and_get() {
        let (_dir, path) = fixture(DICTIONARY_PAF);
        let path = path.to_str().unwrap();

        assert_eq!(run_args(&["policy-tool", "detect", path]).unwrap(), "PAF\n");
        assert_eq!(
            run_args(&["policy-tool", "get", path, "Dictionary.definition.standalone.score"]).unwrap(),
            "3.4\n1.355\n"
        );
        assert!(run_args(&["policy-tool", "get", path, "missing"]).is_err());
    }

    #[test]
    fn names_and_dump() {
        let (_dir, path) = fixture("b = 1\nb = 2\na: { c = x }\n");
        let path = path.to_str().unwrap();

        assert_eq!(
            run_args(&["policy-tool", "names", path]).unwrap(),
            "b\tint\t2\na\tPolicy\t1\n"
        );

        let dumped = run_args(&["policy-tool", "dump", path]).unwrap();
        assert!(dumped.contains("b: 1 2\n"));
        assert!(dumped.contains("a: {\n    c: \"x\"\n}\n"));

        let json = run_args(&["policy-tool", "dump", "--json", path]).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["a"]["c"], serde_json::json!("x"));
    }

    #[test]
    fn lenient_flag() {
        let (_dir, path) = fixture("ok = 1\n= bad\n");
        let path = path.to_str().unwrap();

        assert!(run_args(&["policy-tool", "names", path]).is_err());
        assert_eq!(run_args(&["policy-tool", "names", "--lenient", path]).unwrap(), "ok\tint\t1\n");
    }
}
