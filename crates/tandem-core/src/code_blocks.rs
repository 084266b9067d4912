//! Extraction of path-tagged code fences from model text.
//!
//! A block opens with a line of the form ```` ```file:<path> ```` and closes
//! at the next bare fence line. Text outside blocks is ignored.

use tracing::{debug, warn};

use crate::editor::{CreateMode, FileEditor};
use crate::error::EditError;

const FENCE: &str = "```";
const FILE_TAG: &str = "```file:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub path: String,
    pub content: String,
}

impl CodeBlock {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Blocks with no path or no content are parsed but never written.
    pub fn is_writable(&self) -> bool {
        !self.path.trim().is_empty() && !self.content.is_empty()
    }
}

/// Parse every fenced block in `text`, in order of appearance.
///
/// Never fails. An unterminated block at the end of the input is returned
/// with whatever lines were collected. Content lines are kept byte for byte,
/// including any `\r`; only fence detection looks at trimmed lines.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.split('\n') {
        let trimmed = line.trim();

        if let Some(tag) = trimmed.strip_prefix(FILE_TAG) {
            if let Some((path, lines)) = current.take() {
                blocks.push(CodeBlock::new(path, lines.join("\n")));
            }
            let path = tag.replace(FENCE, "").trim().to_string();
            current = Some((path, Vec::new()));
            continue;
        }

        if trimmed.starts_with(FENCE) {
            if let Some((path, lines)) = current.take() {
                blocks.push(CodeBlock::new(path, lines.join("\n")));
            }
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }

    if let Some((path, lines)) = current {
        debug!("Unterminated code block for '{}'", path);
        blocks.push(CodeBlock::new(path, lines.join("\n")));
    }

    blocks
}

/// Render blocks back into fence-delimited text.
pub fn render_code_blocks(blocks: &[CodeBlock]) -> String {
    blocks
        .iter()
        .map(|block| format!("{}{}\n{}\n{}\n", FILE_TAG, block.path, block.content, FENCE))
        .collect()
}

/// Outcome of writing one extracted block.
#[derive(Debug)]
pub struct BlockWrite {
    pub path: String,
    pub result: Result<(), EditError>,
}

/// Write every writable block, overwriting existing files. Later blocks for
/// the same path win. A failed write does not stop the remaining blocks.
pub fn apply_code_blocks(editor: &mut FileEditor, blocks: &[CodeBlock]) -> Vec<BlockWrite> {
    blocks
        .iter()
        .filter(|block| {
            let writable = block.is_writable();
            if !writable {
                debug!("Skipping code block with empty path or content");
            }
            writable
        })
        .map(|block| {
            let path = block.path.trim().to_string();
            let result = editor.create(&path, &block.content, CreateMode::Overwrite);
            if let Err(e) = &result {
                warn!("Failed to write code block to {}: {}", path, e);
            }
            BlockWrite { path, result }
        })
        .collect()
}
