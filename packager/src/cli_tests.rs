//! Tests for packager CLI parsing.

use super::*;
use rstest::rstest;

#[test]
fn cli_parses_defaults() {
    let cli = Cli::parse_from(["distpack", "fetch"]);
    assert_eq!(cli.command, Command::Fetch);
    assert_eq!(cli.config, Utf8PathBuf::from("distpack.toml"));
    assert!(cli.cache_dir.is_none());
    assert_eq!(cli.verbosity, 0);
    assert!(!cli.quiet);
}

#[test]
fn cli_parses_assemble_with_modules() {
    let cli = Cli::parse_from(["distpack", "assemble", "core", "commands"]);
    assert_eq!(
        cli.command,
        Command::Assemble {
            modules: vec!["core".to_owned(), "commands".to_owned()],
        }
    );
}

#[test]
fn cli_parses_global_flags_after_subcommand() {
    let cli = Cli::parse_from([
        "distpack",
        "resolve",
        "core",
        "--config",
        "other/distpack.toml",
        "--cache-dir",
        "/tmp/cache",
        "-vv",
    ]);
    assert_eq!(cli.config, Utf8PathBuf::from("other/distpack.toml"));
    assert_eq!(cli.cache_dir, Some(Utf8PathBuf::from("/tmp/cache")));
    assert_eq!(cli.verbosity, 2);
}

#[test]
fn cli_parses_run_without_launch() {
    let cli = Cli::parse_from(["distpack", "run", "core", "--no-launch"]);
    assert_eq!(
        cli.command,
        Command::Run {
            module: "core".to_owned(),
            no_launch: true,
        }
    );
}

#[test]
fn cli_parses_bundles_output() {
    let cli = Cli::parse_from(["distpack", "bundles", "-o", "assets/bundles"]);
    assert_eq!(
        cli.command,
        Command::Bundles {
            output: Some(Utf8PathBuf::from("assets/bundles")),
        }
    );
}

#[test]
fn cli_rejects_quiet_with_verbose() {
    assert!(Cli::try_parse_from(["distpack", "fetch", "-q", "-v"]).is_err());
}

#[test]
fn cli_requires_a_subcommand() {
    assert!(Cli::try_parse_from(["distpack"]).is_err());
}

#[rstest]
#[case::default(&["distpack", "fetch"], log::LevelFilter::Warn)]
#[case::verbose(&["distpack", "fetch", "-v"], log::LevelFilter::Info)]
#[case::debug(&["distpack", "fetch", "-vv"], log::LevelFilter::Debug)]
#[case::trace(&["distpack", "fetch", "-vvv"], log::LevelFilter::Trace)]
#[case::quiet(&["distpack", "fetch", "-q"], log::LevelFilter::Error)]
fn log_level_follows_flags(#[case] args: &[&str], #[case] expected: log::LevelFilter) {
    assert_eq!(Cli::parse_from(args).log_level(), expected);
}
