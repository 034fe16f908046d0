//! Line diff between a suggestion's current and improved code

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, DiffTag, TextDiff};

/// Unified context lines around each hunk
const CONTEXT_RADIUS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineChange {
    Unchanged,
    Added,
    Deleted,
    /// Old line replaced in place by a new one
    Modified,
}

/// One row of the line-by-line view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    /// 1-based; new-side number for added lines, old-side otherwise
    pub line_num: usize,
    pub change: LineChange,
    pub old_content: String,
    pub new_content: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    /// additions + deletions
    pub changes_count: usize,
    pub additions_count: usize,
    pub deletions_count: usize,
}

/// Diff attached to an accepted suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeDiff {
    /// Empty when both sides are identical
    pub unified_diff: String,
    pub line_by_line: Vec<DiffLine>,
    pub stats: DiffStats,
}

impl CodeDiff {
    pub fn is_empty(&self) -> bool {
        self.stats.changes_count == 0
    }
}

/// Compare `current` against `improved`, labelling the sides with `title`
pub fn diff_code(title: &str, current: &str, improved: &str) -> CodeDiff {
    let diff = TextDiff::from_lines(current, improved);
    let old_header = format!("OLD: {}", title);
    let new_header = format!("NEW: {}", title);

    let unified_diff = diff
        .unified_diff()
        .context_radius(CONTEXT_RADIUS)
        .header(&old_header, &new_header)
        .to_string();

    let old_lines = diff.old_slices();
    let new_lines = diff.new_slices();
    let mut line_by_line = Vec::new();

    for op in diff.ops() {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => {
                for (i, j) in old_range.zip(new_range) {
                    line_by_line.push(row(i + 1, LineChange::Unchanged, old_lines[i], new_lines[j]));
                }
            }
            DiffTag::Delete => {
                for i in old_range {
                    line_by_line.push(row(i + 1, LineChange::Deleted, old_lines[i], ""));
                }
            }
            DiffTag::Insert => {
                for j in new_range {
                    line_by_line.push(row(j + 1, LineChange::Added, "", new_lines[j]));
                }
            }
            DiffTag::Replace => {
                let paired = old_range.len().min(new_range.len());
                for k in 0..paired {
                    let (i, j) = (old_range.start + k, new_range.start + k);
                    line_by_line.push(row(i + 1, LineChange::Modified, old_lines[i], new_lines[j]));
                }
                // Uneven replacements leave plain deletions or additions
                for i in old_range.start + paired..old_range.end {
                    line_by_line.push(row(i + 1, LineChange::Deleted, old_lines[i], ""));
                }
                for j in new_range.start + paired..new_range.end {
                    line_by_line.push(row(j + 1, LineChange::Added, "", new_lines[j]));
                }
            }
        }
    }

    let mut stats = DiffStats::default();
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => stats.additions_count += 1,
            ChangeTag::Delete => stats.deletions_count += 1,
            ChangeTag::Equal => {}
        }
    }
    stats.changes_count = stats.additions_count + stats.deletions_count;

    CodeDiff {
        unified_diff,
        line_by_line,
        stats,
    }
}

fn row(line_num: usize, change: LineChange, old: &str, new: &str) -> DiffLine {
    DiffLine {
        line_num,
        change,
        old_content: old.trim_end().to_string(),
        new_content: new.trim_end().to_string(),
    }
}
