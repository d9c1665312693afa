//! End-of-run reporting: the summary log and the affected-components file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::info;

use crate::error::Result;
use crate::updater::{UpdateOutcome, UpdateState};

/// Number of outcomes per state, in state order.
pub fn count_states(outcomes: &[UpdateOutcome]) -> BTreeMap<UpdateState, usize> {
    let mut counts = BTreeMap::new();
    for outcome in outcomes {
        *counts.entry(outcome.state).or_insert(0) += 1;
    }
    counts
}

/// Names of the components that were updated, in processing order.
pub fn affected_components(outcomes: &[UpdateOutcome]) -> Vec<String> {
    outcomes
        .iter()
        .filter(|outcome| outcome.state == UpdateState::Updated)
        .map(|outcome| outcome.component.name().to_string())
        .collect()
}

/// Writes the updated component names to `path` as a JSON array.
pub fn write_affected_components(path: &Path, outcomes: &[UpdateOutcome]) -> Result<()> {
    let names = affected_components(outcomes);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string(&names)?)?;
    info!(
        "Wrote {} affected components to {}",
        names.len(),
        path.display()
    );
    Ok(())
}

pub fn log_summary(outcomes: &[UpdateOutcome]) {
    info!("Processed {} components", outcomes.len());
    for (state, count) in count_states(outcomes) {
        info!("  {}: {}", state, count);
    }

    for outcome in outcomes {
        let Some(pr) = outcome
            .publication
            .as_ref()
            .and_then(|publication| publication.pull_request.as_ref())
        else {
            continue;
        };
        info!("  {} -> {}", outcome.component.name(), pr.url);
    }
}
