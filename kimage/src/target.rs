use std::{fmt, sync::LazyLock};

use regex::Regex;

use crate::{
    error::InputError,
    kernel::{Arch, KernelSeries, KernelVersion},
};

/// Matches a single path component of an image name, see the grammar in
/// https://github.com/distribution/distribution/blob/v2.7.1/reference/reference.go.
static PATH_COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|[-]+)[a-z0-9]+)*$").unwrap());

/// Name of a tool image built on top of a kernel, e.g. `perf`. Becomes part of the image name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToolName(String);

impl ToolName {
    pub fn new(value: &str) -> Result<Self, InputError> {
        if !PATH_COMPONENT.is_match(value) {
            return Err(InputError::Tool(value.to_owned()));
        }
        Ok(Self(value.to_owned()))
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Label appended to the version tag, e.g. `rt`. Becomes part of the tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Extra(String);

impl Extra {
    pub fn new(value: &str) -> Result<Self, InputError> {
        let value = value.strip_prefix('-').unwrap_or(value);
        if !PATH_COMPONENT.is_match(value) {
            return Err(InputError::Extra(value.to_owned()));
        }
        Ok(Self(value.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Variant of a kernel build that changes its tag but not its identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Flavor {
    pub debug: bool,
    pub extra: Option<Extra>,
}

impl Flavor {
    pub const DEBUG_SUFFIX: &'static str = "dbg";
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetKind {
    Plain(KernelVersion),
    Tooled(KernelVersion, ToolName),
}

impl TargetKind {
    pub fn kernel(&self) -> &KernelVersion {
        match self {
            TargetKind::Plain(kernel) | TargetKind::Tooled(kernel, _) => kernel,
        }
    }
}

/// One image to build: a kernel (optionally a tool built against it) for one architecture.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildTarget {
    pub kind: TargetKind,
    pub arch: Arch,
    pub flavor: Flavor,
}

impl BuildTarget {
    pub fn plain(kernel: KernelVersion, arch: Arch, flavor: Flavor) -> Self {
        Self {
            kind: TargetKind::Plain(kernel),
            arch,
            flavor,
        }
    }

    pub fn tooled(kernel: KernelVersion, tool: ToolName, arch: Arch, flavor: Flavor) -> Self {
        Self {
            kind: TargetKind::Tooled(kernel, tool),
            arch,
            flavor,
        }
    }

    pub fn kernel(&self) -> &KernelVersion {
        self.kind.kernel()
    }

    pub fn series(&self) -> KernelSeries {
        self.kernel().series()
    }

    /// The plain kernel target a tooled target is built from.
    pub fn base(&self) -> Option<BuildTarget> {
        match &self.kind {
            TargetKind::Plain(_) => None,
            TargetKind::Tooled(kernel, _) => Some(BuildTarget::plain(
                kernel.clone(),
                self.arch,
                self.flavor.clone(),
            )),
        }
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TargetKind::Plain(kernel) => write!(f, "kernel {kernel}")?,
            TargetKind::Tooled(kernel, tool) => write!(f, "{tool} for kernel {kernel}")?,
        }
        if let Some(extra) = &self.flavor.extra {
            write!(f, " ({})", extra.as_str())?;
        }
        if self.flavor.debug {
            f.write_str(" (debug)")?;
        }
        write!(f, " on {}", self.arch)
    }
}
