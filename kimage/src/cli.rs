mod common;
mod list;
mod run;
mod show_tags;

use clap::{Parser, Subcommand};
use log::debug;

use crate::{pipeline::Mode, time_ext, Result};

#[derive(Debug, Parser)]
#[command(version = crate::version::VERSION, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build every selected image that is not in the registry yet
    Build(common::RunArgs),

    /// Build, tag and push every selected image and update the multi-arch manifest lists
    Push(common::RunArgs),

    /// Print the tags the selected images resolve to without building anything
    ShowTags(common::TargetArgs),

    /// List the selected images
    List(list::ListArgs),
}

impl Cli {
    pub fn run(self) -> Result<()> {
        // Must happen while the process is still single threaded.
        if let Err(error) = time_ext::local_offset() {
            debug!("unable to determine the local time offset, showing times in UTC: {error}");
        }

        match self.command {
            Commands::Build(args) => run::run(args, Mode::Build),
            Commands::Push(args) => run::run(args, Mode::Push),
            Commands::ShowTags(args) => show_tags::show_tags(args),
            Commands::List(args) => list::list(args),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;
    use crate::{kernel::Arch, registry::LookupMode};

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn push_flags() {
        let cli = Cli::try_parse_from([
            "kimage", "push", "--kernel", "6.6.13", "--kernel", "5.15.27", "--arch", "amd64",
            "--arch", "aarch64", "--tool", "perf", "--debug", "--extra", "rt", "--force", "-j",
            "2", "--lookup", "http", "--dir", "kernel",
        ])
        .unwrap();
        let Commands::Push(args) = cli.command else {
            panic!("expected the push command");
        };
        let overrides = args.into_overrides();
        assert_eq!(overrides.kernels, vec!["6.6.13", "5.15.27"]);
        assert_eq!(overrides.architectures, vec![Arch::X86_64, Arch::Aarch64]);
        assert_eq!(overrides.tools, vec!["perf"]);
        assert!(overrides.debug && overrides.force);
        assert_eq!(overrides.extra.as_deref(), Some("rt"));
        assert_eq!(overrides.jobs.map(|jobs| jobs.get()), Some(2));
        assert_eq!(overrides.lookup, Some(LookupMode::Http));
        assert_eq!(overrides.build_dir, std::path::PathBuf::from("kernel"));
    }

    #[test]
    fn tools_and_no_tools_conflict() {
        assert!(Cli::try_parse_from(["kimage", "build", "--tool", "perf", "--no-tools"]).is_err());
    }

    #[test]
    fn zero_jobs_is_rejected() {
        assert!(Cli::try_parse_from(["kimage", "build", "--jobs", "0"]).is_err());
    }

    #[test]
    fn list_status() {
        let cli = Cli::try_parse_from(["kimage", "list", "--status"]).unwrap();
        assert!(matches!(cli.command, Commands::List(list::ListArgs { status: true, .. })));
    }
}
