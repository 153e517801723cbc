//! Command implementations for the harpoon CLI
//!
//! Each command collects the configuration the same way and delegates to
//! harpoon-core for the actual work.

pub mod context;
pub mod order;
pub mod show;

use anyhow::{Context, Result};
use harpoon_config::{Collector, ConfigValue};
use harpoon_core::NormalizeReport;
use indexmap::IndexMap;
use std::path::PathBuf;

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub config: PathBuf,
    /// `KEY=VALUE` pairs for the `harpoon` section
    pub overrides: Vec<String>,
    pub bash: Option<String>,
    pub command: Option<String>,
    /// Arguments after `--`
    pub extra: Vec<String>,
}

impl GlobalArgs {
    /// The `cli_args` value handed to the collector.
    pub fn cli_args(&self) -> Result<ConfigValue> {
        let mut harpoon = ConfigValue::empty_map();
        for pair in &self.overrides {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("Expected KEY=VALUE, got '{}'", pair))?;
            let path: Vec<&str> = key.split('.').collect();
            if path.iter().any(|segment| segment.is_empty()) {
                anyhow::bail!("Invalid harpoon option name '{}'", key);
            }
            insert_dotted(&mut harpoon, &path, ConfigValue::string(value));
        }
        if !self.extra.is_empty() {
            insert_dotted(
                &mut harpoon,
                &["extra"],
                ConfigValue::string(self.extra.join(" ")),
            );
        }

        let mut cli_args: IndexMap<String, ConfigValue> = IndexMap::new();
        cli_args.insert("harpoon".to_string(), harpoon);
        if let Some(bash) = &self.bash {
            cli_args.insert("bash".to_string(), ConfigValue::string(bash));
        }
        if let Some(command) = &self.command {
            cli_args.insert("command".to_string(), ConfigValue::string(command));
        }
        Ok(ConfigValue::map_of(cli_args))
    }

    /// Collect the configuration rooted at `config`.
    pub fn collect(&self) -> Result<Collector> {
        let cli_args = self.cli_args()?;
        Collector::new()
            .prepare(&self.config, &cli_args)
            .with_context(|| format!("Failed to collect {}", self.config.display()))
    }
}

/// Write `value` at `path` inside a mapping, creating intermediate mappings.
fn insert_dotted(target: &mut ConfigValue, path: &[&str], value: ConfigValue) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = target;
    for segment in parents {
        let Some(map) = current.as_map_mut() else {
            return;
        };
        let child = map
            .entry((*segment).to_string())
            .or_insert_with(ConfigValue::empty_map);
        if !child.is_map() {
            *child = ConfigValue::empty_map();
        }
        current = child;
    }
    if let Some(map) = current.as_map_mut() {
        map.insert((*last).to_string(), value);
    }
}

/// Print every per-image failure and fail if there were any.
pub fn report_failures(report: &NormalizeReport) -> Result<()> {
    for failure in &report.failures {
        eprintln!("error: {}", failure);
    }
    if !report.is_success() {
        anyhow::bail!("{} image(s) could not be normalized", report.failures.len());
    }
    Ok(())
}
