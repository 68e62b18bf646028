//! Field resolver / SELECT grammar (spec 4.7): turns an optional selection
//! expression (or its absence) into an output field-name list plus a column
//! map from output position to position in the concatenated joined row.
//!
//! Grounded on `datawelder.join._parse_select`/`_select`, generalized per
//! spec.md's resolution rules: the original always requires `FRAMENUM.NAME`
//! qualification (`words[0].split('.', 1)` — an unqualified name would raise
//! a Python unpacking error), while spec.md adds a convenience unqualified
//! `NAME` form with ambiguity detection across frame schemas. This crate
//! implements the spec's superset grammar; see DESIGN.md for a note on one
//! internal inconsistency in the spec's own worked example (S6) once an
//! unqualified name collides across frames.

use std::collections::HashSet;

use anyhow::Result;

use crate::error::DiskJoinError;

/// The minimal shape the field resolver needs from a frame: its field names
/// in order, and which index is the join key (used only for the default,
/// no-expression selection's "suppress right-side key" rule).
#[derive(Clone, Debug)]
pub struct FrameFields {
    pub field_names: Vec<String>,
    pub key_index: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SelectPlan {
    /// Output field names, in output order.
    pub output_names: Vec<String>,
    /// For each output position, the column index into the concatenated
    /// joined row (`|frame0.fields| + |frame1.fields| + ...`) it reads from.
    pub source_columns: Vec<usize>,
}

fn frame_offsets(frames: &[FrameFields]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(frames.len());
    let mut acc = 0;
    for f in frames {
        offsets.push(acc);
        acc += f.field_names.len();
    }
    offsets
}

/// Default selection when no `--select` expression is given: every field of
/// every frame in frame order, duplicate names disambiguated with a
/// `_FRAMENUM` suffix, and the join-key field suppressed from every frame
/// but the first (spec 4.7: "reference behavior: suppress key from all
/// right frames").
pub fn default_select(frames: &[FrameFields]) -> SelectPlan {
    let offsets = frame_offsets(frames);
    let mut output_names = Vec::new();
    let mut source_columns = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (frame_idx, frame) in frames.iter().enumerate() {
        for (field_idx, name) in frame.field_names.iter().enumerate() {
            if frame_idx > 0 && field_idx == frame.key_index {
                continue;
            }
            let out_name = if seen.contains(name) { format!("{name}_{frame_idx}") } else { name.clone() };
            seen.insert(name.clone());
            output_names.push(out_name);
            source_columns.push(offsets[frame_idx] + field_idx);
        }
    }

    SelectPlan { output_names, source_columns }
}

enum ClauseRef {
    Unqualified(String),
    Qualified(usize, String),
}

fn parse_ref(word: &str) -> ClauseRef {
    if let Some((prefix, suffix)) = word.split_once('.') {
        if let Ok(n) = prefix.parse::<usize>() {
            return ClauseRef::Qualified(n, suffix.to_string());
        }
    }
    ClauseRef::Unqualified(word.to_string())
}

struct ParsedClause {
    frame_idx: usize,
    field_idx: usize,
    name: String,
    explicit_alias: Option<String>,
}

fn resolve_ref(frames: &[FrameFields], r: &ClauseRef) -> Result<(usize, usize, String)> {
    match r {
        ClauseRef::Qualified(frame_idx, name) => {
            if *frame_idx >= frames.len() {
                return Err(DiskJoinError::SelectUnknown { name: format!("{frame_idx}.{name}") }.into());
            }
            let field_idx = frames[*frame_idx]
                .field_names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| DiskJoinError::SelectUnknown { name: format!("{frame_idx}.{name}") })?;
            Ok((*frame_idx, field_idx, name.clone()))
        }
        ClauseRef::Unqualified(name) => {
            // A right frame's join-key column is suppressed from unqualified
            // ambiguity candidates, mirroring `default_select`'s "suppress
            // key from all right frames" rule (spec.md §4.7) — every right
            // frame's key is guaranteed equal to the left frame's key at
            // join time, so it carries no information an unqualified clause
            // would be choosing between. Without this, spec.md §8's S6
            // (`"iso, name, 1.iso as iso_r, currency"` over frames with both
            // a left and a right `iso` column) would spuriously report the
            // first `iso` clause as ambiguous. Still reachable by qualifying
            // it explicitly (`1.iso`).
            let matches: Vec<usize> = frames
                .iter()
                .enumerate()
                .filter(|(frame_idx, f)| {
                    f.field_names
                        .iter()
                        .position(|n| n == name)
                        .is_some_and(|field_idx| *frame_idx == 0 || field_idx != f.key_index)
                })
                .map(|(i, _)| i)
                .collect();
            match matches.len() {
                0 => Err(DiskJoinError::SelectUnknown { name: name.clone() }.into()),
                1 => {
                    let frame_idx = matches[0];
                    let field_idx = frames[frame_idx].field_names.iter().position(|n| n == name).unwrap();
                    Ok((frame_idx, field_idx, name.clone()))
                }
                _ => {
                    let candidates = matches.iter().map(|fi| format!("{fi}.{name}")).collect::<Vec<_>>();
                    Err(DiskJoinError::SelectAmbiguous { name: name.clone(), candidates }.into())
                }
            }
        }
    }
}

/// Parse and resolve a `--select` expression into a `SelectPlan`.
pub fn resolve_select(frames: &[FrameFields], expr: &str) -> Result<SelectPlan> {
    let offsets = frame_offsets(frames);
    let mut parsed = Vec::new();

    for raw_clause in expr.split(',') {
        let clause = raw_clause.trim();
        if clause.is_empty() {
            continue;
        }
        let words: Vec<&str> = clause.split_whitespace().collect();
        let (name_ref, explicit_alias) = match words.as_slice() {
            [single] => (*single, None),
            [lhs, as_kw, alias] if as_kw.eq_ignore_ascii_case("as") => (*lhs, Some(alias.to_string())),
            _ => anyhow::bail!("malformed SELECT clause: '{clause}'"),
        };

        let r = parse_ref(name_ref);
        let (frame_idx, field_idx, name) = resolve_ref(frames, &r)?;
        parsed.push(ParsedClause { frame_idx, field_idx, name, explicit_alias });
    }

    let mut used_aliases: HashSet<String> = HashSet::new();
    let mut output_names = Vec::new();
    let mut source_columns = Vec::new();

    for clause in parsed {
        let alias = match clause.explicit_alias {
            Some(a) => a,
            None => {
                if used_aliases.contains(&clause.name) {
                    format!("{}_{}", clause.name, clause.frame_idx)
                } else {
                    clause.name.clone()
                }
            }
        };
        if !used_aliases.insert(alias.clone()) {
            return Err(DiskJoinError::SelectDuplicateAlias { alias }.into());
        }
        output_names.push(alias);
        source_columns.push(offsets[clause.frame_idx] + clause.field_idx);
    }

    Ok(SelectPlan { output_names, source_columns })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames() -> Vec<FrameFields> {
        vec![
            FrameFields { field_names: vec!["iso".into(), "name".into()], key_index: 0 },
            FrameFields { field_names: vec!["iso".into(), "currency".into()], key_index: 0 },
        ]
    }

    #[test]
    fn default_selection_suppresses_right_side_key_and_suffixes_duplicates() {
        let plan = default_select(&frames());
        assert_eq!(plan.output_names, vec!["iso", "name", "currency"]);
        assert_eq!(plan.source_columns, vec![0, 1, 3]);
    }

    #[test]
    fn default_selection_suffixes_genuinely_duplicate_names() {
        let dup_frames = vec![
            FrameFields { field_names: vec!["iso".into(), "name".into()], key_index: 0 },
            FrameFields { field_names: vec!["name".into(), "currency".into()], key_index: 10 },
        ];
        let plan = default_select(&dup_frames);
        assert_eq!(plan.output_names, vec!["iso", "name", "name_1", "currency"]);
    }

    // Both frames share a join key named "iso"; the unqualified "iso" clause
    // must resolve to the left frame without reporting an ambiguity against
    // the right frame's (suppressed) key column, and the right frame's key
    // is still reachable by qualifying it explicitly.
    #[test]
    fn select_expression_resolves_qualified_and_aliased_clauses() {
        let plan = resolve_select(&frames(), "iso, name, 1.iso as iso_r, currency").unwrap();
        assert_eq!(plan.output_names, vec!["iso", "name", "iso_r", "currency"]);
        assert_eq!(plan.source_columns, vec![0, 1, 2, 3]);
    }

    #[test]
    fn unqualified_ambiguous_name_is_rejected() {
        let dup_frames = vec![
            FrameFields { field_names: vec!["iso".into(), "name".into()], key_index: 0 },
            FrameFields { field_names: vec!["code".into(), "name".into()], key_index: 0 },
        ];
        let err = resolve_select(&dup_frames, "name").unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    // A right frame's join-key column never counts as an ambiguity
    // candidate for an unqualified clause, even when its name collides
    // with the left frame's key.
    #[test]
    fn unqualified_right_side_key_is_not_ambiguous() {
        let plan = resolve_select(&frames(), "iso").unwrap();
        assert_eq!(plan.output_names, vec!["iso"]);
        assert_eq!(plan.source_columns, vec![0]);
    }

    #[test]
    fn unknown_field_name_is_rejected() {
        assert!(resolve_select(&frames(), "population").is_err());
    }

    #[test]
    fn duplicate_explicit_aliases_are_rejected() {
        let err = resolve_select(&frames(), "iso as x, name as x");
        assert!(err.is_err());
    }
}
