use super::common::{Session, TargetArgs};
use crate::{plan::Node, Result};

/// The hash-qualified and floating tag of every node, in plan order.
fn tag_lines(nodes: &[Node]) -> Vec<String> {
    nodes
        .iter()
        .flat_map(|node| [node.tags.hash_qualified.to_string(), node.tags.floating.to_string()])
        .collect()
}

pub fn show_tags(args: TargetArgs) -> Result<()> {
    let config_path = args.config.clone();
    let session = Session::new(config_path, args.into_overrides())?;

    for line in tag_lines(&session.plan.nodes) {
        println!("{line}");
    }

    Ok(())
}
