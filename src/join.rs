//! Merge-join kernel (spec 4.6) — the core of this crate. An N-way
//! streaming left-outer merge over `[L, R1, R2, ... Rk-1]`, all sorted
//! ascending on their key column and all representing the same shard index
//! (so their key-spaces are identical). One pass, one lookahead ("peek")
//! slot per right side, no buffering beyond that.
//!
//! Grounded on `datawelder.join._join_partitions`, the canonical reference
//! algorithm this spec distills: for every left record, advance each right
//! side's peek while it's behind the left key, then either take the peek
//! (on an exact match) or emit a null row of the right side's width. The
//! right peek is never advanced past an equal match — correct left-outer
//! semantics given the precondition that right-frame keys are unique per
//! shard.

use std::cmp::Ordering;

use anyhow::Result;

use crate::error::DiskJoinError;
use crate::record::{Record, Value};

/// One right-hand input to the merge join: a forward-only record iterator,
/// its key column index, and its field count (used to size null padding).
pub struct RightSide {
    iter: Box<dyn Iterator<Item = Result<Record>>>,
    key_index: usize,
    field_count: usize,
    peek: Option<Record>,
    last_peek_key: Option<Value>,
    shard_label: String,
}

impl RightSide {
    pub fn new(
        iter: Box<dyn Iterator<Item = Result<Record>>>,
        key_index: usize,
        field_count: usize,
        shard_label: impl Into<String>,
    ) -> Result<Self> {
        let mut this = Self {
            iter,
            key_index,
            field_count,
            peek: None,
            last_peek_key: None,
            shard_label: shard_label.into(),
        };
        this.advance()?;
        Ok(this)
    }

    fn peek_key(&self) -> Option<&Value> {
        self.peek.as_ref().map(|r| &r[self.key_index])
    }

    /// Pull the next record from this side, checking the sortedness
    /// invariant against the previous peek key.
    fn advance(&mut self) -> Result<()> {
        match self.iter.next() {
            None => {
                self.peek = None;
            }
            Some(Err(e)) => return Err(e),
            Some(Ok(record)) => {
                let key = record[self.key_index].clone();
                if let Some(prev) = &self.last_peek_key {
                    if key.key_cmp(prev) == Ordering::Less {
                        return Err(DiskJoinError::SortViolation {
                            shard: self.shard_label.clone(),
                            frame: "right".to_string(),
                        }
                        .into());
                    }
                }
                self.last_peek_key = Some(key);
                self.peek = Some(record);
            }
        }
        Ok(())
    }

    fn null_row(&self) -> Record {
        vec![Value::Null; self.field_count]
    }
}

/// Run the merge join: for every record of `left`, emit one concatenated
/// row via `on_row`. `left` and every entry of `rights` must be sorted
/// ascending on their respective key columns — a violation is surfaced as
/// `DiskJoinError::SortViolation`.
pub fn merge_join<L>(
    left: L,
    left_key_index: usize,
    mut rights: Vec<RightSide>,
    shard_label: &str,
    mut on_row: impl FnMut(Record) -> Result<()>,
) -> Result<()>
where
    L: Iterator<Item = Result<Record>>,
{
    let mut last_left_key: Option<Value> = None;

    for left_result in left {
        let left_rec = left_result?;
        let left_key = left_rec[left_key_index].clone();

        if let Some(prev) = &last_left_key {
            if left_key.key_cmp(prev) == Ordering::Less {
                return Err(DiskJoinError::SortViolation {
                    shard: shard_label.to_string(),
                    frame: "left".to_string(),
                }
                .into());
            }
        }
        last_left_key = Some(left_key.clone());

        let mut row = left_rec.clone();
        for right in rights.iter_mut() {
            while let Some(peek_key) = right.peek_key() {
                if peek_key.key_cmp(&left_key) == Ordering::Less {
                    right.advance()?;
                } else {
                    break;
                }
            }

            let matched = match right.peek_key() {
                Some(peek_key) if peek_key.key_cmp(&left_key) == Ordering::Equal => true,
                _ => false,
            };

            if matched {
                row.extend(right.peek.clone().expect("peek present on match"));
            } else {
                row.extend(right.null_row());
            }
        }

        on_row(row)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    fn rows(pairs: &[(&str, &str)]) -> Vec<Result<Record>> {
        pairs
            .iter()
            .map(|(k, v)| Ok(vec![Value::Str(k.to_string()), Value::Str(v.to_string())]))
            .collect()
    }

    fn right_side(pairs: &[(&str, &str)]) -> RightSide {
        let data = rows(pairs);
        RightSide::new(Box::new(data.into_iter()), 0, 2, "test").unwrap()
    }

    fn collect_join(left: &[(&str, &str)], rights: Vec<&[(&str, &str)]>) -> Vec<Record> {
        let left_iter = rows(left).into_iter();
        let right_sides = rights.into_iter().map(right_side).collect();
        let mut out = Vec::new();
        merge_join(left_iter, 0, right_sides, "0", |row| {
            out.push(row);
            Ok(())
        })
        .unwrap();
        out
    }

    // S2: two-way join, complete match.
    #[test]
    fn two_way_join_complete_match() {
        let out = collect_join(&[("AU", "Australia"), ("RU", "Russia")], vec![&[("AU", "Dollar"), ("RU", "Rouble")]]);
        assert_eq!(
            out,
            vec![
                vec![Value::Str("AU".into()), Value::Str("Australia".into()), Value::Str("AU".into()), Value::Str("Dollar".into())],
                vec![Value::Str("RU".into()), Value::Str("Russia".into()), Value::Str("RU".into()), Value::Str("Rouble".into())],
            ]
        );
    }

    // S3: missing right.
    #[test]
    fn missing_right_pads_with_nulls() {
        let out = collect_join(
            &[("AU", "Australia"), ("KP", "Kraplakistan"), ("RU", "Russia")],
            vec![&[("AU", "Dollar"), ("RU", "Rouble")]],
        );
        assert_eq!(
            out,
            vec![
                vec![Value::Str("AU".into()), Value::Str("Australia".into()), Value::Str("AU".into()), Value::Str("Dollar".into())],
                vec![Value::Str("KP".into()), Value::Str("Kraplakistan".into()), Value::Null, Value::Null],
                vec![Value::Str("RU".into()), Value::Str("Russia".into()), Value::Str("RU".into()), Value::Str("Rouble".into())],
            ]
        );
    }

    // S4: right surplus ignored.
    #[test]
    fn right_surplus_is_ignored() {
        let out = collect_join(
            &[("AU", "Australia"), ("RU", "Russia")],
            vec![&[("AU", "Dollar"), ("KPL", "???"), ("RU", "Rouble")]],
        );
        assert_eq!(
            out,
            vec![
                vec![Value::Str("AU".into()), Value::Str("Australia".into()), Value::Str("AU".into()), Value::Str("Dollar".into())],
                vec![Value::Str("RU".into()), Value::Str("Russia".into()), Value::Str("RU".into()), Value::Str("Rouble".into())],
            ]
        );
    }

    // S5: three-way join.
    #[test]
    fn three_way_join() {
        let out = collect_join(
            &[("AU", "Australia"), ("RU", "Russia")],
            vec![&[("AU", "Dollar"), ("RU", "Rouble")], &[("AU", "Canberra"), ("RU", "Moscow")]],
        );
        assert_eq!(
            out,
            vec![
                vec![
                    Value::Str("AU".into()),
                    Value::Str("Australia".into()),
                    Value::Str("AU".into()),
                    Value::Str("Dollar".into()),
                    Value::Str("AU".into()),
                    Value::Str("Canberra".into()),
                ],
                vec![
                    Value::Str("RU".into()),
                    Value::Str("Russia".into()),
                    Value::Str("RU".into()),
                    Value::Str("Rouble".into()),
                    Value::Str("RU".into()),
                    Value::Str("Moscow".into()),
                ],
            ]
        );
    }

    #[test]
    fn empty_right_shard_is_all_nulls() {
        let out = collect_join(&[("AU", "Australia")], vec![&[]]);
        assert_eq!(out, vec![vec![Value::Str("AU".into()), Value::Str("Australia".into()), Value::Null, Value::Null]]);
    }

    #[test]
    fn empty_left_shard_is_empty_output() {
        let out = collect_join(&[], vec![&[("AU", "Dollar")]]);
        assert!(out.is_empty());
    }

    #[test]
    fn unsorted_left_input_is_a_sort_violation() {
        let left_iter = rows(&[("RU", "Russia"), ("AU", "Australia")]).into_iter();
        let right = right_side(&[("AU", "Dollar")]);
        let result = merge_join(left_iter, 0, vec![right], "0", |_| Ok(()));
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_right_keys_take_the_first() {
        let out = collect_join(&[("AU", "Australia")], vec![&[("AU", "Dollar"), ("AU", "AlsoDollar")]]);
        assert_eq!(
            out,
            vec![vec![Value::Str("AU".into()), Value::Str("Australia".into()), Value::Str("AU".into()), Value::Str("Dollar".into())]]
        );
    }
}
