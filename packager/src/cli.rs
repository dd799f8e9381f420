//! CLI argument definitions for the distpack packager.
//!
//! This module defines the command-line interface using clap. It is kept
//! apart from the binary so that parsing can be tested directly.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use distpack::CONFIG_FILE_NAME;

/// Package multi-module host plugins into distributable archives.
#[derive(Parser, Debug)]
#[command(name = "distpack")]
#[command(version, about)]
#[command(long_about = concat!(
    "Package multi-module host plugins into distributable archives.\n\n",
    "distpack reads distpack.toml, resolves each module's dependency closure, ",
    "and assembles one archive per module with its manifest, bundled libraries ",
    "and relocated packages. It can also fetch pinned runtime assets, prepare ",
    "localization bundles and stage a local host instance.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Show the resolved closure of a module:\n",
    "    $ distpack resolve distributor-core\n\n",
    "  Assemble every module:\n",
    "    $ distpack assemble\n\n",
    "  Stage and launch a local server with one module:\n",
    "    $ distpack run distributor-core",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Project configuration file.
    #[arg(short, long, global = true, value_name = "FILE", default_value = CONFIG_FILE_NAME)]
    pub config: Utf8PathBuf,

    /// Fetch cache directory [default: platform-specific].
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<Utf8PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        global = true,
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the resolved dependency closure of a module.
    Resolve {
        /// Module identifier.
        module: String,
    },

    /// Print the manifest synthesized for a module.
    Manifest {
        /// Module identifier.
        module: String,
    },

    /// Assemble artifacts for the named modules, or all of them.
    Assemble {
        /// Module identifiers; every module when empty.
        modules: Vec<String>,
    },

    /// Fetch every pinned asset into the cache.
    Fetch,

    /// Download and rewrite the host's localization bundles.
    Bundles {
        /// Output directory [default: from configuration].
        #[arg(short, long, value_name = "DIR")]
        output: Option<Utf8PathBuf>,
    },

    /// Assemble a module and its closure, stage them and launch the host.
    Run {
        /// Module identifier.
        module: String,

        /// Stage the instance without launching the host.
        #[arg(long)]
        no_launch: bool,
    },
}

impl Cli {
    /// Log level filter implied by the verbosity flags.
    #[must_use]
    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Error;
        }
        match self.verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
