//! The task graph. Each node is one image to produce. Edges point from tool images to the kernel
//! image they are built from, and every node lists the files in the build directory it is made from.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::{
    config::Config,
    content_hash::ContentHash,
    error::InputError,
    image::{resolve_tags, ImageIdentifier, ResolvedTags},
    target::{BuildTarget, TargetKind},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub path: PathBuf,
    pub required: bool,
}

impl Input {
    fn required(path: PathBuf) -> Self {
        Self {
            path,
            required: true,
        }
    }

    fn optional(path: PathBuf) -> Self {
        Self {
            path,
            required: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub target: BuildTarget,
    pub tags: ResolvedTags,
    pub dockerfile: PathBuf,
    pub inputs: Vec<Input>,
    /// Hash-qualified kernel image a tool image is built from.
    pub base_image: Option<ImageIdentifier>,
    /// Indices of the nodes that must succeed before this one can start.
    pub dependencies: Vec<usize>,
}

impl Node {
    /// Required inputs that do not exist on disk.
    pub fn missing_inputs(&self) -> Vec<&Path> {
        self.inputs
            .iter()
            .filter(|input| input.required && !input.path.exists())
            .map(|input| input.path.as_path())
            .collect()
    }

    pub fn check_inputs(&self) -> Result<(), InputError> {
        match self.missing_inputs().first() {
            Some(path) => Err(InputError::MissingInput(path.to_path_buf())),
            None => Ok(()),
        }
    }
}

fn inputs(build_dir: &Path, target: &BuildTarget) -> (PathBuf, Vec<Input>) {
    let series = target.series();
    match &target.kind {
        TargetKind::Plain(_) => {
            let dockerfile = build_dir.join("Dockerfile");
            let mut inputs = vec![
                Input::required(dockerfile.clone()),
                Input::required(build_dir.join(format!("config-{series}-{}", target.arch))),
            ];
            if target.flavor.debug {
                inputs.push(Input::required(build_dir.join("config-dbg")));
            }
            inputs.push(Input::optional(build_dir.join(format!("patches-{series}"))));
            (dockerfile, inputs)
        }
        TargetKind::Tooled(_, tool) => {
            let dockerfile = build_dir.join(format!("Dockerfile.{tool}"));
            (dockerfile.clone(), vec![Input::required(dockerfile)])
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub nodes: Vec<Node>,
}

impl Plan {
    /// Builds the graph for `targets`. Duplicate targets are planned once.
    pub fn new(
        config: &Config,
        targets: Vec<BuildTarget>,
        hash: &ContentHash,
    ) -> Result<Self, InputError> {
        let mut index: HashMap<BuildTarget, usize> = HashMap::with_capacity(targets.len());
        let mut nodes: Vec<Node> = Vec::with_capacity(targets.len());

        for target in targets {
            if index.contains_key(&target) {
                continue;
            }
            let tags = resolve_tags(&config.namespace, &target, hash)?;
            let base_image = target
                .base()
                .map(|base| resolve_tags(&config.namespace, &base, hash))
                .transpose()?
                .map(|tags| tags.hash_qualified);
            let (dockerfile, inputs) = inputs(&config.build_dir, &target);
            index.insert(target.clone(), nodes.len());
            nodes.push(Node {
                target,
                tags,
                dockerfile,
                inputs,
                base_image,
                dependencies: Vec::new(),
            });
        }

        for node in &mut nodes {
            if let Some(&dependency) = node.target.base().and_then(|base| index.get(&base)) {
                node.dependencies.push(dependency);
            }
        }

        Ok(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, num::NonZeroUsize};

    use super::*;
    use crate::{
        image::Namespace,
        kernel::{Arch, KernelVersion},
        registry::LookupMode,
        target::{Flavor, ToolName},
    };

    fn config(build_dir: &Path, debug: bool) -> Config {
        Config {
            namespace: Namespace {
                organization: "org".to_owned(),
                image: "kernel".to_owned(),
            },
            architectures: vec![Arch::X86_64],
            kernels: Vec::new(),
            flavor: Flavor { debug, extra: None },
            builder_image: None,
            force: false,
            jobs: NonZeroUsize::MIN,
            lookup: LookupMode::Docker,
            build_dir: build_dir.to_owned(),
            git_ref: None,
        }
    }

    fn plain(version: &str, debug: bool) -> BuildTarget {
        BuildTarget::plain(
            KernelVersion::parse(version).unwrap(),
            Arch::X86_64,
            Flavor { debug, extra: None },
        )
    }

    fn perf(version: &str) -> BuildTarget {
        BuildTarget::tooled(
            KernelVersion::parse(version).unwrap(),
            ToolName::new("perf").unwrap(),
            Arch::X86_64,
            Flavor::default(),
        )
    }

    #[test]
    fn tools_depend_on_their_kernel() {
        let config = config(Path::new("kernel"), false);
        let hash = "abc123".parse().unwrap();
        let plan = Plan::new(
            &config,
            vec![perf("6.6.13"), plain("6.6.13", false), plain("5.15.27", false)],
            &hash,
        )
        .unwrap();

        assert_eq!(plan.len(), 3);
        assert_eq!(plan.nodes[0].dependencies, vec![1]);
        assert!(plan.nodes[1].dependencies.is_empty());
        assert_eq!(
            plan.nodes[0].base_image.as_ref().unwrap().to_string(),
            "org/kernel:6.6.13-abc123-amd64"
        );
    }

    #[test]
    fn tool_without_planned_kernel_has_no_dependency() {
        let config = config(Path::new("kernel"), false);
        let hash = "abc123".parse().unwrap();
        let plan = Plan::new(&config, vec![perf("6.6.13")], &hash).unwrap();
        assert!(plan.nodes[0].dependencies.is_empty());
        assert!(plan.nodes[0].base_image.is_some());
    }

    #[test]
    fn duplicates_are_planned_once() {
        let config = config(Path::new("kernel"), false);
        let hash = "abc123".parse().unwrap();
        let plan = Plan::new(
            &config,
            vec![plain("6.6.13", false), plain("6.6.13", false)],
            &hash,
        )
        .unwrap();
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn inputs_follow_series_arch_and_flavor() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), true);
        let hash = "abc123".parse().unwrap();
        let plan = Plan::new(&config, vec![plain("6.6.13", true), perf("6.6.13")], &hash).unwrap();

        let kernel = &plan.nodes[0];
        assert_eq!(
            kernel.missing_inputs(),
            vec![
                dir.path().join("Dockerfile").as_path(),
                dir.path().join("config-6.6.x-x86_64").as_path(),
                dir.path().join("config-dbg").as_path(),
            ]
        );
        assert!(matches!(
            kernel.check_inputs(),
            Err(InputError::MissingInput(_))
        ));

        fs::write(dir.path().join("Dockerfile"), "").unwrap();
        fs::write(dir.path().join("config-6.6.x-x86_64"), "").unwrap();
        fs::write(dir.path().join("config-dbg"), "").unwrap();
        assert!(kernel.check_inputs().is_ok());

        let tool = &plan.nodes[1];
        assert_eq!(tool.dockerfile, dir.path().join("Dockerfile.perf"));
        assert!(tool.check_inputs().is_err());
    }
}
