use log::info;

use super::common::{interrupt_flag, RunArgs, Session};
use crate::{
    builder::DockerBuilder,
    pipeline::{Mode, Orchestrator},
    registry::DockerRegistry,
    Result,
};

/// Runs `build` or `push` for every selected image, then prints what happened to each of them.
pub fn run(args: RunArgs, mode: Mode) -> Result<()> {
    let config_path = args.targets.config.clone();
    let session = Session::new(config_path, args.into_overrides())?;
    if session.plan.is_empty() {
        info!("nothing to do");
        return Ok(());
    }

    let registry = DockerRegistry::new(session.config.lookup)?;
    let provenance = session.provenance()?;
    let cancel = interrupt_flag()?;

    info!(
        "processing {count} images on {jobs} workers",
        count = session.plan.len(),
        jobs = session.config.jobs
    );
    let summary = Orchestrator {
        config: &session.config,
        registry: &registry,
        builder: &DockerBuilder,
        provenance: &provenance,
        hash: &session.hash,
        cancel: &cancel,
    }
    .run(&session.plan, mode)?;

    println!("{}", summary.table()?);
    summary.into_result()
}
