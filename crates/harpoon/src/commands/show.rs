//! Show command implementation

use super::GlobalArgs;
use anyhow::Result;
use harpoon_core::{ImageSpec, SpecValidationError, normalize_all};
use serde::Serialize;

#[derive(Debug)]
pub struct ShowArgs {
    /// Print JSON instead of text
    pub json: bool,
}

#[derive(Serialize)]
struct ShowReport<'a> {
    images: &'a [ImageSpec],
    order: Vec<String>,
    failures: &'a [SpecValidationError],
}

pub fn execute(global: &GlobalArgs, args: ShowArgs) -> Result<()> {
    let collector = global.collect()?;
    let report = normalize_all(collector.configuration());
    let order = report.build_order()?;

    if args.json {
        let show = ShowReport {
            images: &report.specs,
            order,
            failures: &report.failures,
        };
        println!("{}", serde_json::to_string_pretty(&show)?);
    } else {
        let width = report.specs.iter().map(|s| s.name.len()).max().unwrap_or(0);
        for spec in &report.specs {
            match &spec.description {
                Some(description) => println!(
                    "{:width$}  {}  {}",
                    spec.name,
                    spec.image_reference,
                    description,
                    width = width
                ),
                None => println!("{:width$}  {}", spec.name, spec.image_reference, width = width),
            }
        }
        println!();
        println!("Build order: {}", order.join(", "));
    }

    super::report_failures(&report)
}
