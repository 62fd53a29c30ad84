//! Handler for the `stabcheck enumerate` subcommand.

use std::process::ExitCode;

use crate::engine::{enumerate, EndReason, LatticeItem, SearchConfig};
use crate::lattice::TypeRegistry;
use crate::types::parse_signature;

use super::{CliError, EnumerateArgs};

impl EnumerateArgs {
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            concrete_only: !self.all_levels,
            skip_unbound_existentials: self.skip_unbound,
            expand_with_abstract_args: self.abstract_args,
            max_lattice_steps: self.max_steps,
            ..SearchConfig::default()
        }
    }
}

fn end_text(reason: EndReason) -> &'static str {
    match reason {
        EndReason::Exhausted => "exhausted",
        EndReason::StepLimit => "step limit reached",
        EndReason::Cancelled => "cancelled",
    }
}

/// One line of plain-text output
pub(super) fn render_item(item: &LatticeItem) -> String {
    match item {
        LatticeItem::Instance(sig) => sig.to_string(),
        LatticeItem::Skipped(skipped) => format!(
            "skipped: {}",
            skipped
                .0
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        ),
        LatticeItem::End(reason) => format!("end: {}", end_text(*reason)),
    }
}

/// One line of JSON output
pub(super) fn render_item_json(item: &LatticeItem) -> serde_json::Value {
    match item {
        LatticeItem::Instance(sig) => serde_json::json!({ "instance": sig.to_string() }),
        LatticeItem::Skipped(skipped) => serde_json::json!({
            "skipped": skipped.0.iter().map(ToString::to_string).collect::<Vec<_>>()
        }),
        LatticeItem::End(reason) => serde_json::json!({ "end": end_text(*reason) }),
    }
}

pub(super) fn run_enumerate(args: &EnumerateArgs, json: bool) -> Result<ExitCode, CliError> {
    let registry = TypeRegistry::load(&args.lattice)?;
    let sig = parse_signature(args.types.as_slice())?;
    for item in enumerate(&registry, sig, &args.search_config()) {
        if json {
            println!("{}", render_item_json(&item));
        } else {
            println!("{}", render_item(&item));
        }
    }
    Ok(ExitCode::SUCCESS)
}
