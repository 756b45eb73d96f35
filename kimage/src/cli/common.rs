use std::{
    num::NonZeroUsize,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use clap::Args;
use constcat::concat;
use log::{info, warn};

use crate::{
    builder::Provenance,
    config::{Config, ConfigFile, Overrides, CONFIG_FILE_NAME, DEFAULT_IMAGE, DEFAULT_ORG},
    content_hash::{compute_content_hash, ContentHash, Vcs, CHECKOUT_TIP},
    git::Git,
    kernel::Arch,
    plan::Plan,
    registry::LookupMode,
    version, Result,
};

/// Selects the images an invocation operates on.
#[derive(Debug, Args)]
pub struct TargetArgs {
    /// The build directory containing the Dockerfiles and kernel configurations.
    #[arg(long = "dir", default_value = ".")]
    pub dir: PathBuf,

    #[arg(long = "config", help = concat!("The configuration file. Defaults to \"", CONFIG_FILE_NAME, "\" in the build directory."))]
    pub config: Option<PathBuf>,

    /// Kernel version to build, for example 6.6.13. Can be repeated. Defaults to every kernel in the
    /// configuration file.
    #[arg(long = "kernel")]
    pub kernels: Vec<String>,

    /// Architecture to build for. Can be repeated. Defaults to the configuration file, then to the
    /// host architecture.
    #[arg(long = "arch", value_enum)]
    pub architectures: Vec<Arch>,

    /// Tool image to build on top of each kernel. Can be repeated. Replaces the tools listed in the
    /// configuration file.
    #[arg(long = "tool", conflicts_with = "no_tools")]
    pub tools: Vec<String>,

    /// Build kernel images only.
    #[arg(long = "no-tools")]
    pub no_tools: bool,

    #[arg(long = "org", help = concat!("The organization, optionally prefixed with a registry host. Defaults to \"", DEFAULT_ORG, "\"."))]
    pub org: Option<String>,

    #[arg(long = "image", help = concat!("The kernel image name. Defaults to \"", DEFAULT_IMAGE, "\"."))]
    pub image: Option<String>,

    /// Build kernels with the debug configuration.
    #[arg(long = "debug")]
    pub debug: bool,

    /// Suffix that distinguishes a kernel variant, for example rt.
    #[arg(long = "extra")]
    pub extra: Option<String>,

    #[arg(long = "ref", help = concat!("The git ref to compute the content hash at. Defaults to ", CHECKOUT_TIP, ". The hash is marked dirty whenever the working tree differs from that commit, since builds always read the working tree."))]
    pub git_ref: Option<String>,

    /// Image containing the toolchain kernels are compiled with.
    #[arg(long = "builder-image")]
    pub builder_image: Option<String>,

    /// How to check whether an image exists in the registry.
    #[arg(long = "lookup", value_enum)]
    pub lookup: Option<LookupMode>,

    /// Maximum number of images processed at the same time. Defaults to the number of CPUs, at
    /// most 4.
    #[arg(long = "jobs", short = 'j')]
    pub jobs: Option<NonZeroUsize>,
}

impl TargetArgs {
    pub fn into_overrides(self) -> Overrides {
        let TargetArgs {
            dir,
            config: _,
            kernels,
            architectures,
            tools,
            no_tools,
            org,
            image,
            debug,
            extra,
            git_ref,
            builder_image,
            lookup,
            jobs,
        } = self;
        Overrides {
            org,
            image,
            builder_image,
            architectures,
            kernels,
            tools,
            no_tools,
            debug,
            extra,
            force: false,
            jobs,
            lookup,
            build_dir: dir,
            git_ref,
        }
    }
}

/// Arguments of the commands that build.
#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    /// Build even if the registry already has an image for the current content hash.
    #[arg(long = "force")]
    pub force: bool,
}

impl RunArgs {
    pub fn into_overrides(self) -> Overrides {
        Overrides {
            force: self.force,
            ..self.targets.into_overrides()
        }
    }
}

/// What every command computes before doing anything: the configuration, the content hash of the
/// build directory and the task graph.
pub struct Session {
    pub config: Config,
    pub commit: String,
    pub hash: ContentHash,
    pub plan: Plan,
}

impl Session {
    pub fn new(config_path: Option<PathBuf>, overrides: Overrides) -> Result<Self> {
        let config_path = config_path.unwrap_or_else(|| overrides.build_dir.join(CONFIG_FILE_NAME));
        let config = Config::resolve(ConfigFile::load(&config_path)?, overrides)?;

        let git_ref = config.git_ref.as_deref();
        let hash = compute_content_hash(&Git, &config.build_dir, git_ref)?;
        let commit = Git.commit(&config.build_dir, git_ref.unwrap_or(CHECKOUT_TIP))?;
        info!(
            "content hash of {dir:?} is {hash}",
            dir = config.build_dir
        );

        let plan = Plan::new(&config, config.targets(), &hash)?;
        Ok(Self {
            config,
            commit,
            hash,
            plan,
        })
    }

    pub fn provenance(&self) -> Result<Provenance> {
        Ok(Provenance {
            commit: self.commit.clone(),
            content_hash: self.hash.to_string(),
            built_by: built_by(),
            created: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)?,
            tool_version: version::VERSION,
        })
    }
}

/// `user@host`, or just the user when the hostname can not be determined.
pub fn built_by() -> String {
    let user = whoami::username();
    match whoami::fallible::hostname() {
        Ok(host) => format!("{user}@{host}"),
        Err(error) => {
            warn!("Unable to determine hostname: {error}");
            user
        }
    }
}

/// Returns a flag that is set on the first Ctrl-C. A second Ctrl-C terminates the process.
pub fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        warn!("interrupted, finishing the images in progress; press Ctrl-C again to abort");
    })?;
    Ok(cancel)
}
