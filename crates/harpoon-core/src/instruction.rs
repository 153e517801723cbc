//! Build instructions and the Dockerfile they render to.

use serde::Serialize;
use std::fmt;

/// One line of an image's build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    /// A line written out verbatim.
    Literal(String),

    /// A line whose argument is another declared image.
    ///
    /// `reference` is the full name the other image is built as, so the line
    /// renders without looking the image up again.
    ImageReference {
        instruction: String,
        image: String,
        reference: String,
    },

    /// Inline content shipped in the build context under `name`.
    AddContent { name: String, dest: String },
}

impl Instruction {
    pub fn literal(line: impl Into<String>) -> Self {
        Instruction::Literal(line.into())
    }

    /// The Dockerfile line for this instruction.
    pub fn line(&self) -> String {
        match self {
            Instruction::Literal(line) => line.clone(),
            Instruction::ImageReference {
                instruction,
                reference,
                ..
            } => format!("{} {}", instruction, reference),
            Instruction::AddContent { name, dest } => format!("ADD {} {}", name, dest),
        }
    }

    /// The image this instruction depends on, if any.
    pub fn dependency(&self) -> Option<&str> {
        match self {
            Instruction::ImageReference { image, .. } => Some(image),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line())
    }
}

/// The instruction file placed at the root of a build context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DockerFile {
    pub lines: Vec<String>,
    /// Modification time written to the archive; `None` defers to the image
    pub mtime: Option<i64>,
}

impl DockerFile {
    pub fn new(lines: Vec<String>, mtime: Option<i64>) -> Self {
        Self { lines, mtime }
    }

    pub fn from_instructions(instructions: &[Instruction], mtime: Option<i64>) -> Self {
        Self::new(instructions.iter().map(Instruction::line).collect(), mtime)
    }

    /// File content: the lines joined by newlines, with no trailing newline.
    pub fn contents(&self) -> String {
        self.lines.join("\n")
    }
}
