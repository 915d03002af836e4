//! Text rendering of a namespace tree

use crate::tree::index::DirectoryIndex;
use crate::tree::node::DirectoryNode;
use crate::tree::path::AbsolutePath;
use crate::types::DirectoryId;
use owo_colors::OwoColorize;
use std::collections::HashMap;

const COUNTS_NOTE: &str =
    "NOTE: file counts shown as '(..)' are per directory, not cumulative over subdirectories.";

/// Rendering options
#[derive(Debug, Clone)]
pub struct RenderOptions<'a> {
    /// Live file counts keyed by directory; `None` hides counts
    pub file_counts: Option<&'a HashMap<DirectoryId, usize>>,
    /// Deepest level to print below the root; `None` prints everything
    pub max_depth: Option<usize>,
    /// Directory printed highlighted (the caller's working directory)
    pub highlight: Option<&'a AbsolutePath>,
    /// Indentation added per level
    pub indent: usize,
    pub color: bool,
    /// Append a note explaining the counts
    pub counts_note: bool,
}

impl Default for RenderOptions<'_> {
    fn default() -> Self {
        Self {
            file_counts: None,
            max_depth: None,
            highlight: None,
            indent: 2,
            color: false,
            counts_note: false,
        }
    }
}

pub fn render_tree(index: &DirectoryIndex, opts: &RenderOptions<'_>) -> String {
    let mut out = String::new();
    render_node(index.root(), &AbsolutePath::root(), 0, opts, &mut out);
    if opts.counts_note && opts.file_counts.is_some() {
        out.push('\n');
        if opts.color {
            out.push_str(&COUNTS_NOTE.bright_black().to_string());
        } else {
            out.push_str(COUNTS_NOTE);
        }
    }
    out
}

fn render_node(
    node: &DirectoryNode,
    path: &AbsolutePath,
    depth: usize,
    opts: &RenderOptions<'_>,
    out: &mut String,
) {
    let label = if path.is_root() {
        "/".to_string()
    } else {
        format!("{}/", node.segment)
    };
    let label = if opts.color && opts.highlight == Some(path) {
        label.bold().cyan().to_string()
    } else {
        label
    };

    out.push_str(&" ".repeat(opts.indent * (depth + 1)));
    out.push_str("— ");
    out.push_str(&label);
    if let Some(counts) = opts.file_counts {
        let count = counts.get(&node.id).copied().unwrap_or(0);
        let count = format!("({})", count);
        out.push(' ');
        if opts.color {
            out.push_str(&count.bright_black().to_string());
        } else {
            out.push_str(&count);
        }
    }
    if !opts.color && opts.highlight == Some(path) {
        out.push_str(" *");
    }
    out.push('\n');

    if opts.max_depth.map_or(false, |max| depth >= max) {
        return;
    }
    for child in &node.children {
        render_node(child, &path.child(&child.segment), depth + 1, opts, out);
    }
}
