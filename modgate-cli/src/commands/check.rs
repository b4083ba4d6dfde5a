//! Check access from one package to another

use super::Operand;
use anyhow::{bail, Result};
use colored::*;
use modgate_core::{Access, ModuleLayer};
use tracing::info;

/// Options for a single access check
#[derive(Debug, Clone, Default)]
pub struct CheckConfig {
    /// Packages to export to every unnamed module before checking
    pub widen: Vec<Operand>,

    /// Packages to open to every unnamed module before checking
    pub widen_opens: Vec<Operand>,

    /// Check deep reflective access instead of linkage
    pub reflect: bool,
}

/// Check whether `from` may access `to`, printing the decision.
///
/// Returns whether access was allowed.
pub fn check(layer: &ModuleLayer, from: &Operand, to: &Operand, config: &CheckConfig) -> Result<bool> {
    let checker = layer.checker();

    for operand in &config.widen {
        let changed = checker.widen_to_all_unnamed(widened_module(operand)?, &operand.package)?;
        info!("Exported {} to all unnamed modules (changed: {})", operand, changed);
    }
    for operand in &config.widen_opens {
        let changed =
            checker.widen_opens_to_all_unnamed(widened_module(operand)?, &operand.package)?;
        info!("Opened {} to all unnamed modules (changed: {})", operand, changed);
    }

    let access = if config.reflect {
        checker.can_reflect(&from.identity, &to.identity, &to.package)
    } else {
        checker.can_access(&from.identity, &from.package, &to.identity, &to.package)
    };

    let verb = if config.reflect { "reflect into" } else { "access" };
    match &access {
        Access::Allowed => {
            println!("{} {} may {} {}", "✓".green().bold(), from, verb, to);
        }
        Access::Denied(denial) => {
            println!("{} {} may not {} {}", "✗".red().bold(), from, verb, to);
            println!("  {} {}", "↳".red(), denial);
        }
    }

    Ok(access.is_allowed())
}

fn widened_module(operand: &Operand) -> Result<&str> {
    match operand.identity.name() {
        Some(module) => Ok(module),
        None => bail!("Cannot widen {}: only named modules can be widened", operand),
    }
}
