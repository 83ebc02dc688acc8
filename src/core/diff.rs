//! # Diff Engine
//!
//! Stateless line diff between two artifact versions.
//!
//! ```text
//! old, new ──► lines ──► Myers alignment ──► semantic cleanup ──► DiffLine per line
//! ```
//!
//! The alignment runs on whole lines. The cleanup pass then folds short
//! equal runs that sit between two edits into one delete+insert hunk, so a
//! reworded block reads as "old block out, new block in" instead of
//! alternating fragments. An equal run is folded when its character weight
//! is no larger than the bigger side of the edit on *both* of its flanks.
//!
//! Output is one `DiffLine` per physical line, in document order. Inside a
//! changed hunk all deleted lines come before all inserted ones.
//!
//! An empty `old` is a presentation rule rather than an algorithmic one:
//! there is nothing to compare against, so every line of `new` is `Equal`.

use std::fmt;
use std::ops::Range;

use serde::Serialize;
use similar::{Algorithm, DiffTag, capture_diff_slices};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Equal,
    Insert,
    Delete,
}

/// One line of output, without its line separator.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: DiffKind,
    pub text: String,
}

impl DiffLine {
    fn new(kind: DiffKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
        }
    }
}

impl fmt::Display for DiffLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.kind {
            DiffKind::Equal => ' ',
            DiffKind::Insert => '+',
            DiffKind::Delete => '-',
        };
        write!(f, "{marker} {}", self.text)
    }
}

/// Line counts per kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiffStats {
    pub inserted: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

impl DiffStats {
    pub fn of(lines: &[DiffLine]) -> Self {
        lines.iter().fold(Self::default(), |mut stats, line| {
            match line.kind {
                DiffKind::Equal => stats.unchanged += 1,
                DiffKind::Insert => stats.inserted += 1,
                DiffKind::Delete => stats.deleted += 1,
            }
            stats
        })
    }

    pub fn has_changes(&self) -> bool {
        self.inserted > 0 || self.deleted > 0
    }
}

/// Computes the classified lines turning `old_text` into `new_text`.
pub fn diff(old_text: &str, new_text: &str) -> Vec<DiffLine> {
    if old_text.is_empty() || old_text == new_text {
        return new_text
            .lines()
            .map(|line| DiffLine::new(DiffKind::Equal, line))
            .collect();
    }

    let old: Vec<&str> = old_text.lines().collect();
    let new: Vec<&str> = new_text.lines().collect();

    let mut hunks = align(&old, &new);
    cleanup_semantic(&mut hunks, &old, &new);
    emit(&hunks, &old, &new)
}

// ============================================================================
// Hunks
// ============================================================================

/// A run of lines, addressed by index ranges into the old and new line lists.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Hunk {
    Equal { old: Range<usize>, new: Range<usize> },
    Change { old: Range<usize>, new: Range<usize> },
}

/// Myers alignment, with adjacent delete/insert/replace ops fused into one
/// `Change`. The result alternates between `Equal` and `Change`.
///
/// Ranges are rebuilt from running cursors using only each op's lengths.
/// The empty side of a delete or insert op does not carry a usable index.
fn align(old: &[&str], new: &[&str]) -> Vec<Hunk> {
    let mut hunks: Vec<Hunk> = Vec::new();
    let (mut old_pos, mut new_pos) = (0, 0);

    for op in capture_diff_slices(Algorithm::Myers, old, new) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        let old_len = if tag == DiffTag::Insert { 0 } else { old_range.len() };
        let new_len = if tag == DiffTag::Delete { 0 } else { new_range.len() };
        if old_len == 0 && new_len == 0 {
            continue;
        }

        let old_span = old_pos..old_pos + old_len;
        let new_span = new_pos..new_pos + new_len;
        old_pos = old_span.end;
        new_pos = new_span.end;

        match tag {
            DiffTag::Equal => hunks.push(Hunk::Equal {
                old: old_span,
                new: new_span,
            }),
            DiffTag::Delete | DiffTag::Insert | DiffTag::Replace => {
                if let Some(Hunk::Change { old: open_old, new: open_new }) = hunks.last_mut() {
                    open_old.end = old_span.end;
                    open_new.end = new_span.end;
                } else {
                    hunks.push(Hunk::Change {
                        old: old_span,
                        new: new_span,
                    });
                }
            }
        }
    }

    hunks
}

/// Character weight of a line range, counting one separator per line.
fn weight(lines: &[&str], range: &Range<usize>) -> usize {
    lines[range.clone()].iter().map(|l| l.len() + 1).sum()
}

/// If `hunks[i]` is an equal run flanked by two changes that each outweigh
/// it, returns the single change replacing all three.
fn fold_candidate(hunks: &[Hunk], i: usize, old: &[&str], new: &[&str]) -> Option<Hunk> {
    let (
        Hunk::Change { old: a_old, new: a_new },
        Hunk::Equal { old: e_old, .. },
        Hunk::Change { old: b_old, new: b_new },
    ) = (hunks.get(i - 1)?, hunks.get(i)?, hunks.get(i + 1)?)
    else {
        return None;
    };

    let equal = weight(old, e_old);
    let before = weight(old, a_old).max(weight(new, a_new));
    let after = weight(old, b_old).max(weight(new, b_new));

    (equal <= before && equal <= after).then(|| Hunk::Change {
        old: a_old.start..b_old.end,
        new: a_new.start..b_new.end,
    })
}

/// Folds noisy equal runs into the surrounding changes until none qualify.
fn cleanup_semantic(hunks: &mut Vec<Hunk>, old: &[&str], new: &[&str]) {
    loop {
        let folded = (1..hunks.len().saturating_sub(1))
            .find_map(|i| fold_candidate(hunks, i, old, new).map(|hunk| (i, hunk)));

        match folded {
            Some((i, hunk)) => {
                hunks.splice(i - 1..=i + 1, [hunk]);
            }
            None => break,
        }
    }
}

fn emit(hunks: &[Hunk], old: &[&str], new: &[&str]) -> Vec<DiffLine> {
    let mut lines = Vec::with_capacity(old.len().max(new.len()));
    for hunk in hunks {
        match hunk {
            Hunk::Equal { old: range, .. } => {
                lines.extend(old[range.clone()].iter().map(|l| DiffLine::new(DiffKind::Equal, l)));
            }
            Hunk::Change { old: old_range, new: new_range } => {
                lines.extend(old[old_range.clone()].iter().map(|l| DiffLine::new(DiffKind::Delete, l)));
                lines.extend(new[new_range.clone()].iter().map(|l| DiffLine::new(DiffKind::Insert, l)));
            }
        }
    }
    lines
}
