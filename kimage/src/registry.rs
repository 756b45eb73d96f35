mod docker;
mod http;

pub use docker::*;
pub use http::*;

use crate::{error::RegistryLookupError, image::ImageIdentifier, Result};

/// How to find out whether an image already exists in the registry.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, serde::Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LookupMode {
    /// Ask `docker manifest inspect`, which uses the credentials docker is logged in with.
    #[default]
    Docker,
    /// Send an anonymous `HEAD` request to the registry HTTP API.
    Http,
}

/// The operations we perform against a container registry. Implementations must be usable from
/// several worker threads at once.
pub trait Registry: Send + Sync {
    fn exists(&self, image: &ImageIdentifier) -> Result<bool, RegistryLookupError>;

    fn pull(&self, image: &ImageIdentifier) -> Result<()>;

    fn push(&self, image: &ImageIdentifier) -> Result<()>;

    /// Tags the local image `source` as `destination`.
    fn tag(&self, source: &ImageIdentifier, destination: &ImageIdentifier) -> Result<()>;

    /// Points the manifest list `name` at `constituents`, one image per architecture.
    fn update_manifest_list(
        &self,
        name: &ImageIdentifier,
        constituents: &[ImageIdentifier],
    ) -> Result<()>;
}
