use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::{
    error::Error,
    pipeline::{Completed, Mode, Stage},
    target::BuildTarget,
    time_ext, Result,
};

/// The outcome of one pair.
#[derive(Debug)]
pub struct Entry {
    pub target: BuildTarget,
    /// Hash-qualified image name.
    pub image: String,
    pub outcome: Result<Completed, Error>,
}

impl Entry {
    pub fn status(&self) -> &'static str {
        match &self.outcome {
            Ok(Completed {
                built: true,
                stage: Stage::Pushed,
                ..
            }) => "built and pushed",
            Ok(Completed {
                built: false,
                stage: Stage::Pushed,
                ..
            }) => "up to date, pushed",
            Ok(Completed { built: true, .. }) => "built",
            Ok(Completed { built: false, .. }) => "up to date",
            Err(Error::DependencyFailed { .. }) | Err(Error::Cancelled) => "skipped",
            Err(_) => "failed",
        }
    }
}

#[derive(Debug)]
pub struct Summary {
    pub mode: Mode,
    pub entries: Vec<Entry>,
}

impl Summary {
    pub fn built(&self) -> impl Iterator<Item = &Entry> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, Ok(Completed { built: true, .. })))
    }

    /// Pairs whose build was skipped because the registry already had them.
    pub fn up_to_date(&self) -> impl Iterator<Item = &Entry> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, Ok(Completed { built: false, .. })))
    }

    pub fn failed(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|entry| entry.outcome.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn table(&self) -> Result<Table> {
        let offset = time_ext::display_offset();

        let mut table = Table::new();
        table
            .load_preset(comfy_table::presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(
                [
                    "image".to_owned(),
                    "target".to_owned(),
                    "status".to_owned(),
                    format!("finished ({})", time_ext::format_offset(offset)?),
                    "reason".to_owned(),
                ]
                .into_iter()
                .map(|name| Cell::new(name).add_attribute(Attribute::Bold)),
            );

        for entry in &self.entries {
            let status = Cell::new(entry.status());
            let (status, finished, reason) = match &entry.outcome {
                Ok(completed) => (
                    status.fg(Color::Green),
                    time_ext::format_time(completed.finished, offset)?,
                    String::new(),
                ),
                Err(error) => (status.fg(Color::Red), String::new(), error.to_string()),
            };
            table.add_row(vec![
                Cell::new(&entry.image),
                Cell::new(&entry.target),
                status,
                Cell::new(finished),
                Cell::new(reason),
            ]);
        }

        Ok(table)
    }

    /// Succeeds only if every pair did.
    pub fn into_result(self) -> Result<()> {
        let failed = self.failed().count();
        if failed == 0 {
            return Ok(());
        }
        let verb = match self.mode {
            Mode::Build => "built",
            Mode::Push => "pushed",
        };
        Err(format!(
            "{failed} of {total} images could not be {verb}",
            total = self.entries.len()
        )
        .into())
    }
}
