use std::{convert::Infallible, num::NonZeroUsize, sync::atomic::AtomicBool};

use clap::Args;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};

use super::common::{Session, TargetArgs};
use crate::{
    gate::{presence_of, Presence},
    plan::Node,
    registry::{DockerRegistry, Registry},
    scheduler::{self, Finished},
    Result,
};

#[derive(Debug, Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    /// Also ask the registry whether each image exists for the current content hash.
    #[arg(long = "status")]
    pub status: bool,
}

fn format_presence(presence: &Presence) -> String {
    match presence {
        Presence::Present => "up to date".to_owned(),
        Presence::Absent => "not built".to_owned(),
        Presence::Unknown(error) => format!("unknown: {error}"),
    }
}

fn format_missing_inputs(node: &Node) -> String {
    node.missing_inputs()
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Asks the registry about the hash-qualified image of every node, up to `jobs` at a time. A node
/// that was not looked up, because of cancellation, has no presence.
fn presence(
    registry: &dyn Registry,
    nodes: &[Node],
    jobs: NonZeroUsize,
    cancel: &AtomicBool,
) -> Vec<Option<Presence>> {
    let independent = vec![Vec::new(); nodes.len()];
    scheduler::run(&independent, jobs, cancel, |index| {
        Ok::<_, Infallible>(presence_of(registry, &nodes[index].tags.hash_qualified))
    })
    .into_iter()
    .map(|finished| match finished {
        Finished::Ran(Ok(presence)) => Some(presence),
        _ => None,
    })
    .collect()
}

fn table(nodes: &[Node], presence: Option<&[Option<Presence>]>) -> Table {
    let mut header = vec!["target", "image", "floating tag", "missing inputs"];
    if presence.is_some() {
        header.push("status");
    }

    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            header
                .into_iter()
                .map(|name| Cell::new(name).add_attribute(Attribute::Bold)),
        );

    for (index, node) in nodes.iter().enumerate() {
        let mut row = vec![
            node.target.to_string(),
            node.tags.hash_qualified.to_string(),
            node.tags.floating.to_string(),
            format_missing_inputs(node),
        ];
        if let Some(presence) = presence {
            row.push(
                presence[index]
                    .as_ref()
                    .map(format_presence)
                    .unwrap_or_default(),
            );
        }
        table.add_row(row);
    }
    table
}

pub fn list(args: ListArgs) -> Result<()> {
    let ListArgs { targets, status } = args;
    let config_path = targets.config.clone();
    let session = Session::new(config_path, targets.into_overrides())?;
    let nodes = &session.plan.nodes;

    let presence = if status {
        let registry = DockerRegistry::new(session.config.lookup)?;
        let cancel = AtomicBool::new(false);
        Some(presence(&registry, nodes, session.config.jobs, &cancel))
    } else {
        None
    };

    println!("{}", table(nodes, presence.as_deref()));

    Ok(())
}
