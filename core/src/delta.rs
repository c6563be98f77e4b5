use serde::Deserialize;
use serde::Serialize;
use similar::DiffOp;
use similar::TextDiff;
use thiserror::Error;

/// Rough JSON cost of one encoded op, used by the economy check.
const OP_OVERHEAD_BYTES: usize = 24;
/// Rough JSON cost of one inserted line beyond its own bytes.
const LINE_OVERHEAD_BYTES: usize = 3;

/// One step of a line-oriented patch. Ops walk the base text from the top;
/// a patch is valid only against the exact text it was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp {
    Retain { lines: usize },
    Delete { lines: usize },
    Insert { lines: Vec<String> },
}

/// Minimal representation of a pane content change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaPayload {
    Snapshot { content: String },
    Patch { ops: Vec<PatchOp> },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("patch op {op_index} walks past the end of the base text")]
    OutOfBounds { op_index: usize },
    #[error("patch left {remaining} base lines unconsumed")]
    UnconsumedBase { remaining: usize },
}

/// Encode the change from `prev` to `next`.
///
/// Returns a snapshot when there is no baseline or when the patch encoding
/// would not be meaningfully smaller than resending the full text. Identical
/// inputs always produce identical output.
pub fn encode(prev: Option<&str>, next: &str) -> DeltaPayload {
    let Some(prev) = prev else {
        return snapshot(next);
    };

    let prev_lines: Vec<&str> = prev.lines().collect();
    let next_lines: Vec<&str> = next.lines().collect();
    let diff = TextDiff::from_slices(&prev_lines, &next_lines);

    let mut ops = Vec::new();
    for op in diff.ops() {
        match *op {
            DiffOp::Equal { len, .. } => ops.push(PatchOp::Retain { lines: len }),
            DiffOp::Delete { old_len, .. } => ops.push(PatchOp::Delete { lines: old_len }),
            DiffOp::Insert {
                new_index, new_len, ..
            } => ops.push(insert_op(&next_lines, new_index, new_len)),
            DiffOp::Replace {
                old_len,
                new_index,
                new_len,
                ..
            } => {
                ops.push(PatchOp::Delete { lines: old_len });
                ops.push(insert_op(&next_lines, new_index, new_len));
            }
        }
    }

    if encoded_weight(&ops) >= next.len() {
        return snapshot(next);
    }
    DeltaPayload::Patch { ops }
}

/// Apply a patch to the exact text it was computed against.
pub fn apply(base: &str, ops: &[PatchOp]) -> Result<String, PatchError> {
    let base_lines: Vec<&str> = base.lines().collect();
    let mut cursor = 0usize;
    let mut out: Vec<&str> = Vec::with_capacity(base_lines.len());

    for (op_index, op) in ops.iter().enumerate() {
        match op {
            PatchOp::Retain { lines } => {
                let end = cursor + lines;
                if end > base_lines.len() {
                    return Err(PatchError::OutOfBounds { op_index });
                }
                out.extend_from_slice(&base_lines[cursor..end]);
                cursor = end;
            }
            PatchOp::Delete { lines } => {
                let end = cursor + lines;
                if end > base_lines.len() {
                    return Err(PatchError::OutOfBounds { op_index });
                }
                cursor = end;
            }
            PatchOp::Insert { lines } => {
                out.extend(lines.iter().map(String::as_str));
            }
        }
    }

    if cursor != base_lines.len() {
        return Err(PatchError::UnconsumedBase {
            remaining: base_lines.len() - cursor,
        });
    }
    Ok(out.join("\n"))
}

fn snapshot(content: &str) -> DeltaPayload {
    DeltaPayload::Snapshot {
        content: content.to_string(),
    }
}

fn insert_op(next_lines: &[&str], new_index: usize, new_len: usize) -> PatchOp {
    PatchOp::Insert {
        lines: next_lines[new_index..new_index + new_len]
            .iter()
            .map(|line| (*line).to_string())
            .collect(),
    }
}

fn encoded_weight(ops: &[PatchOp]) -> usize {
    ops.iter()
        .map(|op| match op {
            PatchOp::Retain { .. } | PatchOp::Delete { .. } => OP_OVERHEAD_BYTES,
            PatchOp::Insert { lines } => {
                OP_OVERHEAD_BYTES
                    + lines
                        .iter()
                        .map(|line| line.len() + LINE_OVERHEAD_BYTES)
                        .sum::<usize>()
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn long_lines(prefix: &str, count: usize) -> String {
        (0..count)
            .map(|i| format!("{prefix} line number {i} with enough text to matter"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn no_baseline_produces_snapshot() {
        let payload = encode(None, "line1\nline2");
        assert_eq!(
            payload,
            DeltaPayload::Snapshot {
                content: "line1\nline2".to_string()
            }
        );
    }

    #[test]
    fn append_produces_retain_then_insert() {
        let prev = long_lines("base", 5);
        let next = format!("{prev}\nfresh tail line");
        let DeltaPayload::Patch { ops } = encode(Some(&prev), &next) else {
            panic!("expected a patch for an append");
        };
        assert_eq!(
            ops,
            vec![
                PatchOp::Retain { lines: 5 },
                PatchOp::Insert {
                    lines: vec!["fresh tail line".to_string()]
                },
            ]
        );
    }

    #[test]
    fn patch_round_trips_to_new_text() {
        let prev = long_lines("alpha", 8);
        let mut next_lines: Vec<String> = prev.lines().map(str::to_string).collect();
        next_lines[3] = "rewritten middle line".to_string();
        next_lines.push("appended line".to_string());
        let next = next_lines.join("\n");

        match encode(Some(&prev), &next) {
            DeltaPayload::Patch { ops } => {
                assert_eq!(apply(&prev, &ops), Ok(next));
            }
            DeltaPayload::Snapshot { content } => assert_eq!(content, next),
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        let prev = long_lines("before", 12);
        let next = format!("{}\nnew output", long_lines("before", 10));
        assert_eq!(encode(Some(&prev), &next), encode(Some(&prev), &next));
    }

    #[test]
    fn uneconomical_patch_falls_back_to_snapshot() {
        // Total rewrite: every line differs, so ops cannot beat the snapshot.
        let prev = "one\ntwo\nthree";
        let next = "four\nfive\nsix";
        assert_eq!(
            encode(Some(prev), next),
            DeltaPayload::Snapshot {
                content: next.to_string()
            }
        );
    }

    #[test]
    fn short_single_line_change_is_a_snapshot() {
        assert_eq!(
            encode(Some("A"), "AB"),
            DeltaPayload::Snapshot {
                content: "AB".to_string()
            }
        );
    }

    #[test]
    fn cleared_screen_is_a_snapshot() {
        let prev = long_lines("busy", 6);
        assert_eq!(
            encode(Some(&prev), ""),
            DeltaPayload::Snapshot {
                content: String::new()
            }
        );
    }

    #[test]
    fn apply_rejects_mismatched_base() {
        let ops = vec![PatchOp::Retain { lines: 4 }];
        assert_eq!(
            apply("only\ntwo", &ops),
            Err(PatchError::OutOfBounds { op_index: 0 })
        );
    }

    #[test]
    fn apply_rejects_unconsumed_base() {
        let ops = vec![PatchOp::Retain { lines: 1 }];
        assert_eq!(
            apply("one\ntwo\nthree", &ops),
            Err(PatchError::UnconsumedBase { remaining: 2 })
        );
    }

    #[test]
    fn deleted_tail_round_trips() {
        let prev = long_lines("scroll", 9);
        let next = prev
            .lines()
            .take(6)
            .collect::<Vec<_>>()
            .join("\n");
        match encode(Some(&prev), &next) {
            DeltaPayload::Patch { ops } => assert_eq!(apply(&prev, &ops), Ok(next)),
            DeltaPayload::Snapshot { content } => assert_eq!(content, next),
        }
    }
}
