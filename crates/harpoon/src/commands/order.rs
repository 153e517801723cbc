//! Order command implementation

use super::GlobalArgs;
use anyhow::Result;
use harpoon_core::normalize_all;

pub fn execute(global: &GlobalArgs) -> Result<()> {
    let collector = global.collect()?;
    let report = normalize_all(collector.configuration());
    for name in report.build_order()? {
        println!("{}", name);
    }
    super::report_failures(&report)
}
