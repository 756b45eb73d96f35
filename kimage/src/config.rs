use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{
    image::Namespace,
    kernel::{Arch, KernelVersion},
    registry::LookupMode,
    target::{BuildTarget, Extra, Flavor, ToolName},
    Result,
};

pub const CONFIG_FILE_NAME: &str = "kernels.yaml";
pub const DEFAULT_ORG: &str = "linuxkit";
pub const DEFAULT_IMAGE: &str = "kernel";
const MAX_DEFAULT_JOBS: usize = 4;

/// Contents of `kernels.yaml`. Every field is optional, command line flags take precedence.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub org: Option<String>,
    pub image: Option<String>,
    pub builder_image: Option<String>,
    #[serde(default)]
    pub architectures: Vec<Arch>,
    pub lookup: Option<LookupMode>,
    #[serde(default)]
    pub kernels: Vec<KernelEntry>,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KernelEntry {
    pub version: String,
    #[serde(default)]
    pub tools: Vec<String>,
}

impl ConfigFile {
    pub fn parse(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads the configuration file at `path`, or returns an empty configuration if there is none.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(yaml) => {
                debug!("loading configuration from {path:?}");
                Self::parse(&yaml).map_err(|error| format!("failed to parse {path:?}: {error}").into())
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!("no configuration file at {path:?}");
                Ok(Self::default())
            }
            Err(error) => Err(format!("failed to read {path:?}: {error}").into()),
        }
    }
}

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub org: Option<String>,
    pub image: Option<String>,
    pub builder_image: Option<String>,
    pub architectures: Vec<Arch>,
    pub kernels: Vec<String>,
    pub tools: Vec<String>,
    pub no_tools: bool,
    pub debug: bool,
    pub extra: Option<String>,
    pub force: bool,
    pub jobs: Option<NonZeroUsize>,
    pub lookup: Option<LookupMode>,
    pub build_dir: PathBuf,
    pub git_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSpec {
    pub version: KernelVersion,
    pub tools: Vec<ToolName>,
}

/// Everything an invocation needs to know, decided once up front and never changed afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub namespace: Namespace,
    pub architectures: Vec<Arch>,
    pub kernels: Vec<KernelSpec>,
    pub flavor: Flavor,
    pub builder_image: Option<String>,
    pub force: bool,
    pub jobs: NonZeroUsize,
    pub lookup: LookupMode,
    pub build_dir: PathBuf,
    pub git_ref: Option<String>,
}

fn default_jobs() -> NonZeroUsize {
    let parallelism = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
    NonZeroUsize::new(parallelism.min(MAX_DEFAULT_JOBS)).unwrap_or(NonZeroUsize::MIN)
}

fn dedup<T: PartialEq>(values: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

impl Config {
    pub fn resolve(file: ConfigFile, overrides: Overrides) -> Result<Self> {
        let ConfigFile {
            org,
            image,
            builder_image,
            architectures,
            lookup,
            kernels,
        } = file;

        let architectures = if !overrides.architectures.is_empty() {
            overrides.architectures
        } else if !architectures.is_empty() {
            architectures
        } else {
            vec![Arch::host().ok_or_else(|| {
                format!(
                    "can not build for host architecture `{}`, pass `--arch`",
                    std::env::consts::ARCH
                )
            })?]
        };

        let entries: Vec<KernelEntry> = if overrides.kernels.is_empty() {
            kernels
        } else {
            overrides
                .kernels
                .iter()
                .map(|version| {
                    kernels
                        .iter()
                        .find(|entry| &entry.version == version)
                        .cloned()
                        .unwrap_or_else(|| KernelEntry {
                            version: version.clone(),
                            tools: Vec::new(),
                        })
                })
                .collect()
        };
        if entries.is_empty() {
            return Err(format!(
                "no kernels configured, list them in {CONFIG_FILE_NAME} or pass `--kernel`"
            )
            .into());
        }

        let kernels = entries
            .into_iter()
            .map(|entry| -> Result<KernelSpec> {
                let tools = if overrides.no_tools {
                    Vec::new()
                } else if !overrides.tools.is_empty() {
                    overrides.tools.clone()
                } else {
                    entry.tools
                };
                Ok(KernelSpec {
                    version: KernelVersion::parse(&entry.version)?,
                    tools: dedup(
                        tools
                            .iter()
                            .map(|tool| ToolName::new(tool))
                            .collect::<Result<_, _>>()?,
                    ),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let extra = overrides.extra.as_deref().map(Extra::new).transpose()?;

        let namespace = Namespace::new(
            overrides
                .org
                .or(org)
                .as_deref()
                .unwrap_or(DEFAULT_ORG),
            overrides
                .image
                .or(image)
                .as_deref()
                .unwrap_or(DEFAULT_IMAGE),
        )?;

        Ok(Config {
            namespace,
            architectures: dedup(architectures),
            kernels,
            flavor: Flavor {
                debug: overrides.debug,
                extra,
            },
            builder_image: overrides.builder_image.or(builder_image),
            force: overrides.force,
            jobs: overrides.jobs.unwrap_or_else(default_jobs),
            lookup: overrides.lookup.or(lookup).unwrap_or_default(),
            build_dir: overrides.build_dir,
            git_ref: overrides.git_ref,
        })
    }

    /// Every (kernel, tool) pair for every architecture, kernels before the tools built on them.
    pub fn targets(&self) -> Vec<BuildTarget> {
        let mut targets = Vec::new();
        for kernel in &self.kernels {
            for &arch in &self.architectures {
                targets.push(BuildTarget::plain(
                    kernel.version.clone(),
                    arch,
                    self.flavor.clone(),
                ));
                for tool in &kernel.tools {
                    targets.push(BuildTarget::tooled(
                        kernel.version.clone(),
                        tool.clone(),
                        arch,
                        self.flavor.clone(),
                    ));
                }
            }
        }
        targets
    }
}
