//! Group records by a key field and reduce a value field to mean and standard deviation.
//!
//! Records without the key field never take part. Within a group every record must carry
//! the value field; the per-group sample vectors are stacked into a [`SampleMatrix`] and
//! reduced along the sample axis.

use std::collections::BTreeSet;

use crate::error::ReportError;
use crate::record::{FieldValue, Record};
use crate::ShapePolicy;

/// Sorted distinct values of `key_field` among the records that have it.
pub fn group_keys<R: Record>(records: &[R], key_field: &str) -> Vec<FieldValue> {
    records
        .iter()
        .filter_map(|r| r.get(key_field))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Values of `value_field` from every record whose `key_field` equals `key_value`, in
/// source order.
pub fn group_samples<R: Record>(
    records: &[R],
    key_field: &str,
    key_value: &FieldValue,
    value_field: &str,
) -> Result<Vec<f64>, ReportError> {
    let mut samples = Vec::new();
    for (index, record) in records.iter().enumerate() {
        if record.get(key_field) != Some(key_value) {
            continue;
        }
        let value = record
            .get(value_field)
            .ok_or_else(|| ReportError::MissingField {
                field: value_field.to_string(),
                key_field: key_field.to_string(),
                key_value: key_value.clone(),
                index,
            })?;
        let value = value.as_f64().ok_or_else(|| ReportError::NonNumericValue {
            field: value_field.to_string(),
            value: value.clone(),
            index,
        })?;
        samples.push(value);
    }
    Ok(samples)
}

/// Group-by-sample arrangement of the value field, one row per group key.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMatrix {
    rows: Vec<Vec<f64>>,
}

impl SampleMatrix {
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        Self { rows }
    }

    /// Number of samples per row when every row has the same length.
    pub fn width(&self) -> Option<usize> {
        let first = self.rows.first().map_or(0, Vec::len);
        self.rows
            .iter()
            .all(|row| row.len() == first)
            .then_some(first)
    }

    /// Index of the first row whose length differs from the first row's, with both lengths.
    fn first_ragged_row(&self) -> Option<(usize, usize, usize)> {
        let expected = self.rows.first()?.len();
        self.rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != expected)
            .map(|(i, row)| (i, expected, row.len()))
    }

    /// Mean and population standard deviation of every row.
    pub fn reduce(&self) -> (Vec<f64>, Vec<f64>) {
        self.rows.iter().map(|row| mean_std(row)).unzip()
    }
}

/// Arithmetic mean and population standard deviation (divisor n).
/// An empty slice yields NaN for both.
pub fn mean_std(samples: &[f64]) -> (f64, f64) {
    if samples.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Group keys with the mean and standard deviation of each group, index aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSeries {
    key_field: String,
    value_field: String,
    keys: Vec<FieldValue>,
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl AggregateSeries {
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn value_field(&self) -> &str {
        &self.value_field
    }

    pub fn keys(&self) -> &[FieldValue] {
        &self.keys
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn std(&self) -> &[f64] {
        &self.std
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Group keys as x coordinates. Fails on the first text key.
    pub fn x_values(&self) -> Result<Vec<f64>, ReportError> {
        self.keys
            .iter()
            .map(|k| {
                k.as_f64().ok_or_else(|| ReportError::NonNumericKey {
                    key_field: self.key_field.clone(),
                    key_value: k.clone(),
                })
            })
            .collect()
    }
}

/// Aggregate with the strict shape policy: every group must have the same sample count.
pub fn aggregate<R: Record>(
    records: &[R],
    key_field: &str,
    value_field: &str,
) -> Result<AggregateSeries, ReportError> {
    aggregate_with(records, key_field, value_field, ShapePolicy::Strict)
}

pub fn aggregate_with<R: Record>(
    records: &[R],
    key_field: &str,
    value_field: &str,
    policy: ShapePolicy,
) -> Result<AggregateSeries, ReportError> {
    let keys = group_keys(records, key_field);
    let rows = keys
        .iter()
        .map(|k| group_samples(records, key_field, k, value_field))
        .collect::<Result<Vec<_>, _>>()?;
    let matrix = SampleMatrix::from_rows(rows);

    if policy == ShapePolicy::Strict {
        if let Some((row, expected, found)) = matrix.first_ragged_row() {
            return Err(ReportError::ShapeMismatch {
                key_field: key_field.to_string(),
                value_field: value_field.to_string(),
                key_value: keys[row].clone(),
                expected,
                found,
            });
        }
    }

    let (mean, std) = matrix.reduce();
    tracing::debug!(
        key_field,
        value_field,
        groups = keys.len(),
        samples_per_group = ?matrix.width(),
        "aggregated series"
    );

    Ok(AggregateSeries {
        key_field: key_field.to_string(),
        value_field: value_field.to_string(),
        keys,
        mean,
        std,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FlatRecord;

    fn rec(fields: &[(&str, f64)]) -> FlatRecord {
        fields.iter().map(|&(k, v)| (k, v)).collect()
    }

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn memory_scenario() {
        let records = vec![
            rec(&[("t", 0.0), ("s", 1.0)]),
            rec(&[("t", 0.0), ("s", 3.0)]),
            rec(&[("t", 1.0), ("s", 2.0)]),
            rec(&[("t", 1.0), ("s", 4.0)]),
        ];
        let series = aggregate(&records, "t", "s").unwrap();
        assert_eq!(series.keys(), &[FieldValue::from(0.0), FieldValue::from(1.0)]);
        assert!(close(series.mean(), &[2.0, 3.0]));
        assert!(close(series.std(), &[1.0, 1.0]));
    }

    #[test]
    fn ragged_groups_fail_under_strict_policy() {
        let records = vec![
            rec(&[("nHop", 1.0), ("r", 0.5)]),
            rec(&[("nHop", 1.0), ("r", 0.7)]),
            rec(&[("nHop", 2.0), ("r", 0.9)]),
        ];
        let err = aggregate(&records, "nHop", "r").unwrap_err();
        match err {
            ReportError::ShapeMismatch {
                key_value,
                expected,
                found,
                ..
            } => {
                assert_eq!(key_value, FieldValue::from(2.0));
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ragged_groups_reduce_per_group_when_allowed() {
        let records = vec![
            rec(&[("nHop", 1.0), ("r", 0.5)]),
            rec(&[("nHop", 1.0), ("r", 0.7)]),
            rec(&[("nHop", 2.0), ("r", 0.9)]),
        ];
        let series = aggregate_with(&records, "nHop", "r", ShapePolicy::PerGroup).unwrap();
        assert_eq!(series.keys(), &[FieldValue::from(1.0), FieldValue::from(2.0)]);
        assert!(close(series.mean(), &[0.6, 0.9]));
        assert!(close(series.std(), &[0.1, 0.0]));
    }

    #[test]
    fn records_without_key_are_skipped() {
        let records = vec![rec(&[("r", 5.0)])];
        let series = aggregate(&records, "nHop", "r").unwrap();
        assert!(series.is_empty());
        assert!(series.mean().is_empty());
        assert!(series.std().is_empty());
    }

    #[test]
    fn missing_value_field_is_reported() {
        let records = vec![
            rec(&[("t", 0.0), ("s", 1.0)]),
            rec(&[("t", 0.0)]),
            rec(&[("s", 9.0)]),
        ];
        let err = aggregate(&records, "t", "s").unwrap_err();
        assert!(matches!(
            err,
            ReportError::MissingField { index: 1, ref field, .. } if field == "s"
        ));
    }

    #[test]
    fn text_samples_are_rejected() {
        let records: Vec<FlatRecord> = vec![[
            ("t", FieldValue::from(0.0)),
            ("s", FieldValue::from("high")),
        ]
        .into_iter()
        .collect()];
        let err = group_samples(&records, "t", &FieldValue::from(0.0), "s").unwrap_err();
        assert!(matches!(err, ReportError::NonNumericValue { index: 0, .. }));
    }

    #[test]
    fn single_sample_group_has_zero_std() {
        let records = vec![rec(&[("t", 3.0), ("s", 123.456)])];
        let series = aggregate(&records, "t", "s").unwrap();
        assert_eq!(series.std(), &[0.0]);
        assert_eq!(series.mean(), &[123.456]);
    }

    #[test]
    fn keys_are_sorted_and_distinct() {
        let records = vec![
            rec(&[("k", 3.0)]),
            rec(&[("k", 1.0)]),
            rec(&[("k", 3.0)]),
            rec(&[("x", 2.0)]),
            rec(&[("k", 2.0)]),
        ];
        assert_eq!(
            group_keys(&records, "k"),
            vec![
                FieldValue::from(1.0),
                FieldValue::from(2.0),
                FieldValue::from(3.0)
            ]
        );
    }

    #[test]
    fn aggregate_is_repeatable() {
        let records = vec![
            rec(&[("t", 1.0), ("s", 2.0)]),
            rec(&[("t", 0.0), ("s", 5.0)]),
        ];
        let first = aggregate(&records, "t", "s").unwrap();
        let second = aggregate(&records, "t", "s").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn sample_matrix_width() {
        assert_eq!(SampleMatrix::from_rows(vec![]).width(), Some(0));
        assert_eq!(
            SampleMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).width(),
            Some(2)
        );
        assert_eq!(
            SampleMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).width(),
            None
        );
    }

    #[test]
    fn text_keys_cannot_become_x_values() {
        let records: Vec<FlatRecord> = vec![[
            ("mesh", FieldValue::from("a")),
            ("s", FieldValue::from(1.0)),
        ]
        .into_iter()
        .collect()];
        let series = aggregate(&records, "mesh", "s").unwrap();
        assert!(matches!(
            series.x_values(),
            Err(ReportError::NonNumericKey { .. })
        ));
    }
}
