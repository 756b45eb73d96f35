use std::sync::atomic::AtomicBool;

use log::{debug, info, warn};

use crate::{
    builder::{BuildArgs, Builder, Provenance},
    config::Config,
    content_hash::ContentHash,
    error::Error,
    gate::should_build,
    image::ImageIdentifier,
    kernel::Arch,
    plan::{Node, Plan},
    registry::Registry,
    scheduler::{self, Finished},
    summary::{Entry, Summary},
};

/// Progress of one pair. Stages are passed strictly in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Pending,
    Built,
    Tagged,
    Pushed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Stop once the hash-qualified image exists.
    Build,
    /// Also publish the floating tag and update the manifest lists.
    Push,
}

/// What happened to a pair that succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completed {
    pub stage: Stage,
    /// False when the rebuild gate found the image already in the registry.
    pub built: bool,
    pub finished: time::OffsetDateTime,
}

pub struct Orchestrator<'a> {
    pub config: &'a Config,
    pub registry: &'a dyn Registry,
    pub builder: &'a dyn Builder,
    pub provenance: &'a Provenance,
    pub hash: &'a ContentHash,
    pub cancel: &'a AtomicBool,
}

impl Orchestrator<'_> {
    /// Runs every pair of `plan` up to the stage `mode` asks for. Failures of individual pairs are
    /// reported in the summary; only a dirty tree when pushing aborts the whole run. When pushing,
    /// manifest lists are updated once all pairs have finished.
    pub fn run(&self, plan: &Plan, mode: Mode) -> Result<Summary, Error> {
        if mode == Mode::Push && self.hash.is_dirty() {
            return Err(Error::DirtyTree {
                hash: self.hash.to_string(),
            });
        }

        let dependencies: Vec<Vec<usize>> = plan
            .nodes
            .iter()
            .map(|node| node.dependencies.clone())
            .collect();

        let results = scheduler::run(&dependencies, self.config.jobs, self.cancel, |index| {
            let node = &plan.nodes[index];
            let result = self.run_pair(node, mode);
            match &result {
                Ok(_) => debug!("finished {}", node.target),
                Err(error) => warn!("{} failed: {error}", node.target),
            }
            result
        });

        let mut entries: Vec<Entry> = plan
            .nodes
            .iter()
            .zip(results)
            .map(|(node, finished)| Entry {
                target: node.target.clone(),
                image: node.tags.hash_qualified.to_string(),
                outcome: match finished {
                    Finished::Ran(result) => result,
                    Finished::DependencyFailed(dependency) => Err(Error::DependencyFailed {
                        dependency: plan.nodes[dependency].target.to_string(),
                    }),
                    Finished::Cancelled => Err(Error::Cancelled),
                },
            })
            .collect();

        if mode == Mode::Push {
            self.publish_manifest_lists(plan, &mut entries);
        }

        Ok(Summary { mode, entries })
    }

    fn run_pair(&self, node: &Node, mode: Mode) -> Result<Completed, Error> {
        let mut stage = Stage::Pending;
        let built = self.build(node)?;
        advance(&mut stage, Stage::Built);

        if mode == Mode::Push {
            self.tag(node, built)?;
            advance(&mut stage, Stage::Tagged);

            self.push(node, built)?;
            advance(&mut stage, Stage::Pushed);
        }

        Ok(Completed {
            stage,
            built,
            finished: time::OffsetDateTime::now_utc(),
        })
    }

    /// `Pending -> Built`. Returns whether a build actually ran.
    fn build(&self, node: &Node) -> Result<bool, Error> {
        node.check_inputs()?;

        let image = &node.tags.hash_qualified;
        if !should_build(self.registry, image, self.config.force) {
            return Ok(false);
        }

        info!("building {image}");
        let output = self
            .builder
            .build(BuildArgs {
                image,
                target: &node.target,
                context: &self.config.build_dir,
                dockerfile: &node.dockerfile,
                builder_image: self.config.builder_image.as_deref(),
                base_image: node.base_image.as_ref(),
                provenance: self.provenance,
            })
            .map_err(Error::BuildBackend)?;
        match output.digest {
            Some(digest) => info!("built {image} ({digest})"),
            None => info!("built {image}"),
        }
        Ok(true)
    }

    /// `Built -> Tagged`. An image we did not build has to be fetched before it can be tagged.
    fn tag(&self, node: &Node, built: bool) -> Result<(), Error> {
        let tags = &node.tags;
        if !built {
            self.registry
                .pull(&tags.hash_qualified)
                .map_err(Error::PushBackend)?;
        }
        self.registry
            .tag(&tags.hash_qualified, &tags.floating)
            .map_err(Error::PushBackend)
    }

    /// `Tagged -> Pushed`. The hash-qualified image goes first so the floating tag never points at
    /// something that is not published. Manifest lists are left to [`Self::publish_manifest_lists`].
    fn push(&self, node: &Node, built: bool) -> Result<(), Error> {
        let tags = &node.tags;
        if built {
            info!("pushing {}", tags.hash_qualified);
            self.registry
                .push(&tags.hash_qualified)
                .map_err(Error::PushBackend)?;
        }
        info!("pushing {}", tags.floating);
        self.registry
            .push(&tags.floating)
            .map_err(Error::PushBackend)
    }

    /// Updates the manifest lists of every group of pushed pairs that differ only in architecture.
    /// A group whose lists could not be updated has all of its pairs reported as failed.
    fn publish_manifest_lists(&self, plan: &Plan, entries: &mut [Entry]) {
        let mut groups: Vec<(ImageIdentifier, Vec<usize>)> = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            if !matches!(
                entry.outcome,
                Ok(Completed {
                    stage: Stage::Pushed,
                    ..
                })
            ) {
                continue;
            }
            let name = plan.nodes[index].tags.hash_qualified.multi_arch();
            match groups.iter_mut().find(|(group, _)| *group == name) {
                Some((_, members)) => members.push(index),
                None => groups.push((name, vec![index])),
            }
        }

        for (name, members) in groups {
            let pushed: Vec<Arch> = members
                .iter()
                .map(|&index| plan.nodes[index].target.arch)
                .collect();
            let tags = &plan.nodes[members[0]].tags;
            let result = self
                .update_manifest_list(&tags.hash_qualified, &pushed)
                .and_then(|()| self.update_manifest_list(&tags.floating, &pushed));
            if let Err(error) = result {
                warn!("manifest lists of {name} were not updated: {error}");
                for index in members {
                    entries[index].outcome = Err(Error::PushBackend(
                        format!("manifest list {name} not updated: {error}").into(),
                    ));
                }
            }
        }
    }

    /// Points the multi-arch name of `image` at the `pushed` architectures and at every other
    /// configured architecture the registry already has. Refuses to write the list when the
    /// registry can not say, so a published architecture is never dropped from it.
    fn update_manifest_list(&self, image: &ImageIdentifier, pushed: &[Arch]) -> Result<(), Error> {
        let mut constituents = Vec::new();
        for &arch in &self.config.architectures {
            let candidate = image.with_arch(arch);
            let published = pushed.contains(&arch)
                || self
                    .registry
                    .exists(&candidate)
                    .map_err(|error| Error::PushBackend(error.into()))?;
            if published {
                constituents.push(candidate);
            }
        }

        let name = image.multi_arch();
        info!(
            "updating manifest list {name} ({} architectures)",
            constituents.len()
        );
        self.registry
            .update_manifest_list(&name, &constituents)
            .map_err(Error::PushBackend)
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug_assert!(*stage < next, "stage {stage:?} can not advance to {next:?}");
    *stage = next;
}
