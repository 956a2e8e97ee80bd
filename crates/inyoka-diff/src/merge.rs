//! Three-way merge of line sequences.
//!
//! Both sides are diffed against the common ancestor. Changes whose
//! ancestor ranges overlap form a hunk; a hunk changed on one side only
//! takes that side, a hunk changed identically on both sides takes either,
//! everything else is a conflict.

use super::matcher::{SequenceMatcher, Tag};

pub const DEFAULT_MARKERS: [&str; 3] = [
    "<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<",
    "========================================",
    ">>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>",
];

/// Raised by a strict merge on the first conflict. Line numbers are
/// 1-based.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("conflict on line {left}")]
pub struct MergeConflict {
    pub old: usize,
    pub left: usize,
    pub right: usize,
}

/// Merge options.
#[derive(Debug, Clone)]
pub struct Merger {
    min_match: usize,
    markers: [String; 3],
    strict: bool,
}

impl Default for Merger {
    fn default() -> Self {
        Self {
            min_match: 3,
            markers: DEFAULT_MARKERS.map(str::to_owned),
            strict: false,
        }
    }
}

/// A change of one side against the ancestor.
#[derive(Debug, Clone, Copy)]
struct Change {
    side: Side,
    old_start: usize,
    old_end: usize,
    new_start: usize,
    new_end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Ancestor range `[start, end)` with the changes touching it.
#[derive(Debug)]
struct Hunk {
    start: usize,
    end: usize,
    changes: Vec<Change>,
}

/// Output of one hunk.
enum Resolution<'a, T> {
    Take(&'a [T]),
    Conflict {
        left: &'a [T],
        right: &'a [T],
        left_start: usize,
        right_start: usize,
    },
}

impl Merger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conflicts separated by fewer unchanged lines are joined.
    #[must_use]
    pub fn with_min_match(mut self, min_match: usize) -> Self {
        self.min_match = min_match.max(1);
        self
    }

    #[must_use]
    pub fn with_markers(mut self, markers: [impl Into<String>; 3]) -> Self {
        self.markers = markers.map(Into::into);
        self
    }

    /// Fail with [`MergeConflict`] instead of writing markers.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn markers(&self) -> &[String; 3] {
        &self.markers
    }

    /// Merge two descendants of `old`, calling `emit` for every output line.
    pub fn merge_lines<'a, F>(
        &'a self,
        old: &[&'a str],
        left: &[&'a str],
        right: &[&'a str],
        mut emit: F,
    ) -> Result<(), MergeConflict>
    where
        F: FnMut(&'a str),
    {
        let mut position = 0;
        for hunk in self.hunks(old, left, right) {
            old[position..hunk.start].iter().copied().for_each(&mut emit);
            match resolve(&hunk, old, left, right) {
                Resolution::Take(lines) => lines.iter().copied().for_each(&mut emit),
                Resolution::Conflict {
                    left: left_lines,
                    right: right_lines,
                    left_start,
                    right_start,
                } => {
                    if self.strict {
                        let conflict = MergeConflict {
                            old: hunk.start + 1,
                            left: left_start + 1,
                            right: right_start + 1,
                        };
                        tracing::debug!(line = conflict.left, "Merge conflict in strict mode");
                        return Err(conflict);
                    }
                    let [begin, middle, end] = &self.markers;
                    emit(begin);
                    left_lines.iter().copied().for_each(&mut emit);
                    emit(middle);
                    right_lines.iter().copied().for_each(&mut emit);
                    emit(end);
                }
            }
            position = hunk.end;
        }
        old[position..].iter().copied().for_each(&mut emit);
        Ok(())
    }

    /// Merge three texts line by line. The trailing newline is merged like
    /// a line of its own: a side that changed it wins.
    pub fn merge(&self, old: &str, left: &str, right: &str) -> Result<String, MergeConflict> {
        let old_lines: Vec<&str> = old.lines().collect();
        let left_lines: Vec<&str> = left.lines().collect();
        let right_lines: Vec<&str> = right.lines().collect();
        let mut out = Vec::new();
        self.merge_lines(&old_lines, &left_lines, &right_lines, |line| out.push(line))?;
        let mut merged = out.join("\n");
        let [old_newline, left_newline, right_newline] = [old, left, right].map(|text| text.ends_with('\n'));
        let newline = if left_newline == old_newline {
            right_newline
        } else {
            left_newline
        };
        if newline && !merged.is_empty() {
            merged.push('\n');
        }
        Ok(merged)
    }

    fn hunks(&self, old: &[&str], left: &[&str], right: &[&str]) -> Vec<Hunk> {
        let mut changes = changes_of(Side::Left, old, left);
        changes.extend(changes_of(Side::Right, old, right));
        changes.sort_by_key(|change| (change.old_start, change.old_end, change.side == Side::Right));

        let mut hunks: Vec<Hunk> = Vec::new();
        for change in changes {
            match hunks.last_mut() {
                Some(hunk) if overlaps(hunk, &change) => {
                    hunk.end = hunk.end.max(change.old_end);
                    hunk.changes.push(change);
                }
                _ => hunks.push(Hunk {
                    start: change.old_start,
                    end: change.old_end,
                    changes: vec![change],
                }),
            }
        }

        let mut joined: Vec<Hunk> = Vec::with_capacity(hunks.len());
        for hunk in hunks {
            match joined.last_mut() {
                Some(last)
                    if hunk.start < last.end + self.min_match
                        && matches!(resolve(last, old, left, right), Resolution::Conflict { .. }) =>
                {
                    last.end = last.end.max(hunk.end);
                    last.changes.extend(hunk.changes);
                }
                _ => joined.push(hunk),
            }
        }
        joined
    }
}

fn changes_of(side: Side, old: &[&str], new: &[&str]) -> Vec<Change> {
    SequenceMatcher::new(old, new)
        .opcodes()
        .into_iter()
        .filter(|op| op.tag != Tag::Equal)
        .map(|op| Change {
            side,
            old_start: op.a_start,
            old_end: op.a_end,
            new_start: op.b_start,
            new_end: op.b_end,
        })
        .collect()
}

/// Changes overlap when they share ancestor lines, or when both insert at
/// the same place.
fn overlaps(hunk: &Hunk, change: &Change) -> bool {
    let inserts_at = |c: &Change, at: usize| c.old_start == c.old_end && c.old_start == at;
    change.old_start < hunk.end
        || (inserts_at(change, hunk.end) && hunk.changes.iter().any(|c| inserts_at(c, change.old_start)))
}

/// The lines of one side covering the ancestor range of a hunk.
fn side_range(hunk: &Hunk, side: Side, total: usize) -> Option<(usize, usize)> {
    let mut own = hunk.changes.iter().filter(|change| change.side == side);
    let first = own.next()?;
    let last = own.last().unwrap_or(first);
    let start = first.new_start - (first.old_start - hunk.start);
    let end = (last.new_end + (hunk.end - last.old_end)).min(total);
    Some((start, end))
}

fn resolve<'a, T: PartialEq>(hunk: &Hunk, old: &'a [T], left: &'a [T], right: &'a [T]) -> Resolution<'a, T> {
    let left_range = side_range(hunk, Side::Left, left.len());
    let right_range = side_range(hunk, Side::Right, right.len());
    match (left_range, right_range) {
        (Some((start, end)), None) => Resolution::Take(&left[start..end]),
        (None, Some((start, end))) => Resolution::Take(&right[start..end]),
        (Some((left_start, left_end)), Some((right_start, right_end))) => {
            let left_lines = &left[left_start..left_end];
            let right_lines = &right[right_start..right_end];
            if left_lines == right_lines {
                Resolution::Take(left_lines)
            } else {
                Resolution::Conflict {
                    left: left_lines,
                    right: right_lines,
                    left_start,
                    right_start,
                }
            }
        }
        (None, None) => Resolution::Take(&old[hunk.start..hunk.end]),
    }
}

/// Merge with default options and conflict markers.
///
/// ```
/// let merged = inyoka_diff::merge("a\nb\nc\n", "a\nB\nc\n", "a\nb\nC\n");
/// assert_eq!(merged, "a\nB\nC\n");
/// ```
pub fn merge(old: &str, left: &str, right: &str) -> String {
    Merger::new()
        .merge(old, left, right)
        .unwrap_or_else(|conflict| unreachable!("merge with markers failed: {conflict}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const OLD: &str = "a\nb\nc\n";

    #[test]
    fn test_disjoint_edits_merge() {
        assert_eq!(merge(OLD, "a\nB\nc\n", "a\nb\nC\n"), "a\nB\nC\n");
    }

    #[test]
    fn test_overlapping_edits_conflict() {
        let merged = merge(OLD, "a\nX\nc\n", "a\nY\nc\n");
        let [begin, middle, end] = DEFAULT_MARKERS;
        assert_eq!(merged, format!("a\n{begin}\nX\n{middle}\nY\n{end}\nc\n"));
    }

    #[test]
    fn test_strict_merge_reports_lines() {
        let conflict = Merger::new()
            .with_strict(true)
            .merge(OLD, "a\nX\nc\n", "a\nY\nc\n")
            .unwrap_err();
        assert_eq!(conflict, MergeConflict { old: 2, left: 2, right: 2 });
        assert_eq!(conflict.to_string(), "conflict on line 2");
    }

    #[test]
    fn test_one_sided_and_identical_changes() {
        let left = "a\nB\nc\nd\n";
        assert_eq!(merge(OLD, left, left), left);
        assert_eq!(merge(OLD, OLD, left), left);
        assert_eq!(merge(OLD, left, OLD), left);
    }

    #[test]
    fn test_insertions_at_same_place_conflict() {
        let merged = Merger::new()
            .with_markers(["<", "=", ">"])
            .merge(OLD, "a\nb\nx\nc\n", "a\nb\ny\nc\n")
            .unwrap();
        assert_eq!(merged, "a\nb\n<\nx\n=\ny\n>\nc\n");
    }

    #[test]
    fn test_nearby_conflicts_are_joined() {
        let old = "1\n2\n3\n4\n5\n6\n";
        let left = "1\nL2\n3\nL4\n5\n6\n";
        let right = "1\nR2\n3\nR4\n5\n6\n";
        let merged = Merger::new().with_markers(["<", "=", ">"]).merge(old, left, right).unwrap();
        assert_eq!(merged, "1\n<\nL2\n3\nL4\n=\nR2\n3\nR4\n>\n5\n6\n");
        let merged = Merger::new()
            .with_min_match(1)
            .with_markers(["<", "=", ">"])
            .merge(old, left, right)
            .unwrap();
        assert_eq!(merged, "1\n<\nL2\n=\nR2\n>\n3\n<\nL4\n=\nR4\n>\n5\n6\n");
    }

    #[test]
    fn test_trailing_newline_follows_changed_side() {
        assert_eq!(merge("a\n", "b", "b"), "b");
        assert_eq!(merge("a\n", "a\n", "b"), "b");
        assert_eq!(merge("a\n", "b", "a\n"), "b");
        assert_eq!(merge("a", "a\n", "b"), "b\n");
        assert_eq!(merge("a\n", "a\n", "b\n"), "b\n");
    }

    #[test]
    fn test_appended_lines() {
        assert_eq!(merge(OLD, "a\nb\nc\nd\n", "z\na\nb\nc\n"), "z\na\nb\nc\nd\n");
    }
}
