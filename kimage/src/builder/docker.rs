use std::ffi::OsStr;

use super::{BuildArgs, BuildOutput, Builder};
use crate::{process, temp_path::TempFile, Result};

/// Partial implementation of the JSON emitted by the `--metadata-file` option of `docker build`.
/// See https://docs.docker.com/reference/cli/docker/buildx/build/#metadata-file.
#[derive(serde::Deserialize)]
struct MetadataFile {
    #[serde(rename = "containerimage.digest")]
    containerimage_digest: Option<String>,
}

/// Builds images with `docker buildx build` and loads them into the local image store.
pub struct DockerBuilder;

impl DockerBuilder {
    fn command(args: &BuildArgs, metadata_file: &std::path::Path) -> process::Command {
        let image = args.image.to_string();
        let mut flags: Vec<String> = Vec::new();
        for (key, value) in args.build_args() {
            flags.push("--build-arg".to_owned());
            flags.push(format!("{key}={value}"));
        }
        for (key, value) in args.provenance.labels(args.image) {
            flags.push("--label".to_owned());
            flags.push(format!("{key}={value}"));
        }

        process::command!(
            "docker",
            "buildx",
            "build",
            args.context,
            "--file",
            args.dockerfile,
            "--platform",
            args.target.arch.platform(),
            "--tag",
            image,
            "--metadata-file",
            metadata_file,
            "--load",
        )
        .args(flags.iter().map(OsStr::new))
    }
}

impl Builder for DockerBuilder {
    fn build(&self, args: BuildArgs) -> Result<BuildOutput> {
        // Removed on every return, a failed build may still have written it.
        let metadata_file = TempFile::new("json");

        Self::command(&args, metadata_file.path()).status()?;

        let metadata_string = std::fs::read_to_string(metadata_file.path())?;
        let metadata: MetadataFile = serde_json::from_str(&metadata_string)?;

        Ok(BuildOutput {
            digest: metadata.containerimage_digest,
        })
    }
}
