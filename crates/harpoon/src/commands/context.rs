//! Context command implementation
//!
//! Writes the build context of one image as a tar stream, either to a file
//! or to stdout so it can be piped into `docker build -`.

use super::GlobalArgs;
use anyhow::{Context, Result};
use harpoon_config::ConfigValue;
use harpoon_core::{BuildOptions, ContextBuilder, HarpoonError, build_chain, normalize_all};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug)]
pub struct ContextArgs {
    pub image: String,
    /// `None` writes to stdout
    pub output: Option<PathBuf>,
    pub mtime: Option<i64>,
}

pub fn execute(global: &GlobalArgs, args: ContextArgs) -> Result<()> {
    let collector = global.collect()?.clone_with(ConfigValue::map_of([(
        "chosen_image",
        ConfigValue::string(&args.image),
    )]));
    let report = normalize_all(collector.configuration());

    if let Some(failure) = report.failure(&args.image) {
        return Err(failure.clone().into());
    }
    let spec = report
        .spec(&args.image)
        .ok_or_else(|| HarpoonError::UnknownImage {
            name: args.image.clone(),
        })?;

    let chain = build_chain(&report.specs, &args.image)?;
    if chain.len() > 1 {
        info!(image = %args.image, "Build order: {}", chain.join(", "));
    }

    let builder = ContextBuilder::new(BuildOptions {
        mtime: args.mtime,
        docker_file: None,
    });
    let archive = match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            let archive = builder.build(spec, &[], &mut writer)?;
            writer.flush()?;
            archive
        }
        None => {
            let mut stdout = io::stdout().lock();
            let archive = builder.build(spec, &[], &mut stdout)?;
            stdout.flush()?;
            archive
        }
    };

    info!(
        image = %spec.name,
        reference = %spec.image_reference,
        entries = archive.len(),
        "Wrote build context"
    );
    Ok(())
}
