mod docker;

pub use docker::*;

use std::path::Path;

use crate::{image::ImageIdentifier, target::BuildTarget, Result};

/// Where an image came from, recorded as labels on the image.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub commit: String,
    pub content_hash: String,
    pub built_by: String,
    /// RFC 3339 timestamp.
    pub created: String,
    pub tool_version: &'static str,
}

impl Provenance {
    pub fn labels(&self, image: &ImageIdentifier) -> Vec<(&'static str, String)> {
        // https://github.com/opencontainers/image-spec/blob/main/annotations.md
        vec![
            ("org.opencontainers.image.revision", self.commit.clone()),
            ("org.opencontainers.image.version", image.version_tag.clone()),
            ("org.opencontainers.image.created", self.created.clone()),
            ("io.kimage.content-hash", self.content_hash.clone()),
            ("io.kimage.built-by", self.built_by.clone()),
            ("io.kimage.tool-version", self.tool_version.to_owned()),
        ]
    }
}

pub struct BuildArgs<'a> {
    /// The hash-qualified name the built image should carry.
    pub image: &'a ImageIdentifier,
    pub target: &'a BuildTarget,
    pub context: &'a Path,
    pub dockerfile: &'a Path,
    /// Image containing the toolchain the kernel is compiled with.
    pub builder_image: Option<&'a str>,
    /// The kernel image a tool image is built from.
    pub base_image: Option<&'a ImageIdentifier>,
    pub provenance: &'a Provenance,
}

impl BuildArgs<'_> {
    /// The `--build-arg` values passed to the Dockerfile.
    pub fn build_args(&self) -> Vec<(&'static str, String)> {
        let target = self.target;
        let mut args = vec![
            ("KERNEL_VERSION", target.kernel().to_string()),
            ("KERNEL_SERIES", target.series().to_string()),
            (
                "EXTRA",
                target
                    .flavor
                    .extra
                    .as_ref()
                    .map(|extra| format!("-{}", extra.as_str()))
                    .unwrap_or_default(),
            ),
            (
                "DEBUG",
                if target.flavor.debug { "1" } else { "" }.to_owned(),
            ),
        ];
        if let Some(builder_image) = self.builder_image {
            args.push(("BUILD_IMAGE", builder_image.to_owned()));
        }
        if let Some(base_image) = self.base_image {
            args.push(("IMAGE", base_image.to_string()));
        }
        args
    }
}

pub struct BuildOutput {
    pub digest: Option<String>,
}

/// Produces a local image named [`BuildArgs::image`].
pub trait Builder: Send + Sync {
    fn build(&self, args: BuildArgs) -> Result<BuildOutput>;
}
