use std::{fmt, str::FromStr};

use crate::error::InputError;

/// A kernel release such as `6.6.13` or `6.1.55-rt15`.
///
/// The text is kept exactly as given so that tags reproduce what the user typed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KernelVersion {
    major: u64,
    minor: u64,
    text: String,
}

impl KernelVersion {
    pub fn parse(value: &str) -> Result<Self, InputError> {
        let invalid = || InputError::KernelVersion(value.to_owned());
        let version = semver::Version::parse(value).map_err(|_| invalid())?;
        if !version.build.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            major: version.major,
            minor: version.minor,
            text: value.to_owned(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn series(&self) -> KernelSeries {
        KernelSeries {
            major: self.major,
            minor: self.minor,
        }
    }
}

impl FromStr for KernelVersion {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// The `major.minor` line of kernels that share a configuration and patch set, rendered as `6.6.x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KernelSeries {
    major: u64,
    minor: u64,
}

impl fmt::Display for KernelSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.x", self.major, self.minor)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize, clap::ValueEnum,
)]
pub enum Arch {
    #[serde(rename = "x86_64")]
    #[value(name = "x86_64", alias = "amd64")]
    X86_64,

    #[serde(rename = "aarch64")]
    #[value(name = "aarch64", alias = "arm64")]
    Aarch64,
}

impl Arch {
    /// The architecture this binary was compiled for, if it is one we build kernels for.
    pub fn host() -> Option<Self> {
        std::env::consts::ARCH.parse().ok()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
        }
    }

    /// Architecture name as used by container registries and image tags.
    pub const fn image_suffix(self) -> &'static str {
        match self {
            Arch::X86_64 => "amd64",
            Arch::Aarch64 => "arm64",
        }
    }

    pub const fn platform(self) -> &'static str {
        match self {
            Arch::X86_64 => "linux/amd64",
            Arch::Aarch64 => "linux/arm64",
        }
    }
}

impl FromStr for Arch {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x86_64" | "amd64" => Ok(Arch::X86_64),
            "aarch64" | "arm64" => Ok(Arch::Aarch64),
            other => Err(InputError::Arch(other.to_owned())),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kernel_versions() {
        let version = KernelVersion::parse("6.6.13").unwrap();
        assert_eq!(version.as_str(), "6.6.13");
        assert_eq!(version.series().to_string(), "6.6.x");

        let version = KernelVersion::parse("6.1.55-rt15").unwrap();
        assert_eq!(version.as_str(), "6.1.55-rt15");
        assert_eq!(version.series().to_string(), "6.1.x");
    }

    #[test]
    fn rejects_malformed_kernel_versions() {
        for value in ["", "6.6", "v6.6.13", "6.6.13+build", "6.6.x", "6..13"] {
            assert_eq!(
                KernelVersion::parse(value),
                Err(InputError::KernelVersion(value.to_owned())),
                "{value:?} should be rejected"
            );
        }
    }

    #[test]
    fn many_versions_share_a_series() {
        let a = KernelVersion::parse("5.15.27").unwrap();
        let b = KernelVersion::parse("5.15.148").unwrap();
        assert_eq!(a.series(), b.series());
        assert_ne!(a.series(), KernelVersion::parse("5.10.1").unwrap().series());
    }

    #[test]
    fn arch_names() {
        assert_eq!("amd64".parse::<Arch>().unwrap(), Arch::X86_64);
        assert_eq!("aarch64".parse::<Arch>().unwrap(), Arch::Aarch64);
        assert_eq!(Arch::Aarch64.image_suffix(), "arm64");
        assert_eq!(Arch::X86_64.platform(), "linux/amd64");
        assert_eq!(
            "riscv64".parse::<Arch>(),
            Err(InputError::Arch("riscv64".to_owned()))
        );
    }
}
