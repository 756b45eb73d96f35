use std::{error::Error as StdError, fmt, path::PathBuf};

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The user asked for something we can not build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    KernelVersion(String),
    Arch(String),
    Tool(String),
    Extra(String),
    Tag(String),
    Repository(String),
    MissingInput(PathBuf),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::KernelVersion(value) => write!(
                f,
                "invalid kernel version {value:?}, expected `major.minor.patch` with an optional `-suffix`"
            ),
            InputError::Arch(value) => write!(
                f,
                "unknown architecture {value:?}, expected one of `x86_64` or `aarch64`"
            ),
            InputError::Tool(value) => write!(
                f,
                "invalid tool name {value:?}, expected lowercase alphanumerics optionally separated by `.`, `_` or `-`"
            ),
            InputError::Extra(value) => write!(
                f,
                "invalid extra label {value:?}, expected lowercase alphanumerics optionally separated by `.`, `_` or `-`"
            ),
            InputError::Tag(value) => write!(
                f,
                "resulting tag {value:?} is not a valid container image tag"
            ),
            InputError::Repository(value) => write!(
                f,
                "invalid repository {value:?}, expected an optional registry host followed by lowercase path components"
            ),
            InputError::MissingInput(path) => write!(f, "required build input {path:?} does not exist"),
        }
    }
}

impl StdError for InputError {}

/// The registry could not tell whether an image exists.
#[derive(Debug)]
pub struct RegistryLookupError {
    pub image: String,
    pub cause: BoxError,
}

impl fmt::Display for RegistryLookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to look up {} in the registry: {}", self.image, self.cause)
    }
}

impl StdError for RegistryLookupError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Why a single (target, tool) pair, or the run as a whole, did not succeed. Registry lookup
/// failures are not among them, the rebuild gate treats those as a missing image.
#[derive(Debug)]
pub enum Error {
    Input(InputError),
    /// The working tree differs from the commit being tagged. Aborts every push.
    DirtyTree { hash: String },
    BuildBackend(BoxError),
    PushBackend(BoxError),
    /// A pair this one is built from failed, so it was never attempted.
    DependencyFailed { dependency: String },
    Cancelled,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Input(error) => error.fmt(f),
            Error::DirtyTree { hash } => write!(
                f,
                "refusing to push content hash {hash:?}: the build directory has uncommitted changes, commit them so the published images can be reproduced"
            ),
            Error::BuildBackend(error) => write!(f, "build failed: {error}"),
            Error::PushBackend(error) => write!(f, "push failed: {error}"),
            Error::DependencyFailed { dependency } => {
                write!(f, "not attempted because {dependency} failed")
            }
            Error::Cancelled => f.write_str("cancelled before it started"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Input(error) => Some(error),
            Error::BuildBackend(error) | Error::PushBackend(error) => Some(error.as_ref()),
            Error::DirtyTree { .. } | Error::DependencyFailed { .. } | Error::Cancelled => None,
        }
    }
}

impl From<InputError> for Error {
    fn from(error: InputError) -> Self {
        Error::Input(error)
    }
}
