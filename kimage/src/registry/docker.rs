use std::ffi::OsStr;

use log::debug;

use super::{HttpLookup, LookupMode, Registry, LOOKUP_TIMEOUT};
use crate::{error::RegistryLookupError, image::ImageIdentifier, process, Result};

/// What `docker manifest inspect` prints when the registry answered that there is no such image,
/// as opposed to failing to answer at all.
const NOT_FOUND_MESSAGES: &[&str] = &["no such manifest", "manifest unknown"];

fn is_not_found(stderr: &str) -> bool {
    let lowercase = stderr.to_lowercase();
    NOT_FOUND_MESSAGES
        .iter()
        .any(|message| lowercase.contains(message))
}

enum Lookup {
    Cli,
    Http(HttpLookup),
}

/// [`Registry`] backed by the docker command line.
pub struct DockerRegistry {
    lookup: Lookup,
}

impl DockerRegistry {
    pub fn new(mode: LookupMode) -> Result<Self> {
        let lookup = match mode {
            LookupMode::Docker => Lookup::Cli,
            LookupMode::Http => Lookup::Http(HttpLookup::new(
                reqwest::blocking::Client::builder().build()?,
                LOOKUP_TIMEOUT,
            )),
        };
        Ok(Self { lookup })
    }

    fn inspect_manifest(image: &ImageIdentifier) -> Result<bool> {
        let output =
            process::command!("docker", "manifest", "inspect", image.to_string()).try_output()?;
        if output.status.success() {
            return Ok(true);
        }
        let stderr = output.stderr_lossy();
        if is_not_found(&stderr) {
            return Ok(false);
        }
        Err(format!(
            "`docker manifest inspect {image}` failed: {}",
            stderr.trim()
        )
        .into())
    }
}

impl Registry for DockerRegistry {
    fn exists(&self, image: &ImageIdentifier) -> Result<bool, RegistryLookupError> {
        let result = match &self.lookup {
            Lookup::Cli => Self::inspect_manifest(image),
            Lookup::Http(http) => http
                .query_image_digest(image)
                .map(|digest| digest.is_some()),
        };
        result.map_err(|cause| RegistryLookupError {
            image: image.to_string(),
            cause,
        })
    }

    fn pull(&self, image: &ImageIdentifier) -> Result<()> {
        process::command!("docker", "image", "pull", image.to_string()).status()?;
        Ok(())
    }

    fn push(&self, image: &ImageIdentifier) -> Result<()> {
        process::command!("docker", "image", "push", image.to_string()).status()?;
        Ok(())
    }

    fn tag(&self, source: &ImageIdentifier, destination: &ImageIdentifier) -> Result<()> {
        process::command!(
            "docker",
            "image",
            "tag",
            source.to_string(),
            destination.to_string()
        )
        .status()?;
        Ok(())
    }

    fn update_manifest_list(
        &self,
        name: &ImageIdentifier,
        constituents: &[ImageIdentifier],
    ) -> Result<()> {
        if constituents.is_empty() {
            return Err(format!("manifest list {name} needs at least one image").into());
        }
        let constituents: Vec<String> = constituents.iter().map(ToString::to_string).collect();
        debug!("updating manifest list {name} with {constituents:?}");
        // `imagetools create` merges the per-architecture manifests remotely, nothing is pulled.
        process::command!(
            "docker",
            "buildx",
            "imagetools",
            "create",
            "--tag",
            name.to_string()
        )
        .args(constituents.iter().map(OsStr::new))
        .status()?;
        Ok(())
    }
}
