use crate::{models::FeatureTable, training::TrainingError};

/// Row-major design matrix extracted from a feature table.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub timestamps: Vec<i64>,
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
}

impl Dataset {
    pub fn from_table(table: &FeatureTable) -> Self {
        Self {
            columns: table.column_names(),
            timestamps: table.rows.iter().map(|r| r.timestamp_ms).collect(),
            features: table.rows.iter().map(|r| r.feature_values()).collect(),
            labels: table.targets(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Splits by time: the oldest rows train, the newest `test_fraction` test.
    /// Both halves are guaranteed at least one row.
    pub fn chronological_split(&self, test_fraction: f64) -> Result<(Dataset, Dataset), TrainingError> {
        if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
            return Err(TrainingError::InvalidConfig(format!(
                "test fraction must be in (0, 1), got {}",
                test_fraction
            )));
        }
        if self.len() < 2 {
            return Err(TrainingError::NotEnoughRows {
                needed: 2,
                got: self.len(),
            });
        }

        let test_rows = ((self.len() as f64 * test_fraction).round() as usize).clamp(1, self.len() - 1);
        let cut = self.len() - test_rows;
        Ok((self.slice(0, cut), self.slice(cut, self.len())))
    }

    fn slice(&self, start: usize, end: usize) -> Dataset {
        Dataset {
            columns: self.columns.clone(),
            timestamps: self.timestamps[start..end].to_vec(),
            features: self.features[start..end].to_vec(),
            labels: self.labels[start..end].to_vec(),
        }
    }

    pub fn has_both_classes(&self) -> bool {
        self.labels.contains(&0) && self.labels.contains(&1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(n: usize) -> Dataset {
        Dataset {
            columns: vec!["x".into()],
            timestamps: (0..n as i64).collect(),
            features: (0..n).map(|i| vec![i as f64]).collect(),
            labels: (0..n).map(|i| (i % 2) as u8).collect(),
        }
    }

    #[test]
    fn split_keeps_time_order() {
        let (train, test) = dataset(10).chronological_split(0.2).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);
        assert_eq!(test.timestamps, vec![8, 9]);
        assert!(train.timestamps.iter().all(|t| *t < test.timestamps[0]));
    }

    #[test]
    fn split_always_leaves_one_test_row() {
        let (train, test) = dataset(3).chronological_split(0.01).unwrap();
        assert_eq!((train.len(), test.len()), (2, 1));
    }

    #[test]
    fn split_rejects_bad_fraction() {
        assert!(dataset(10).chronological_split(0.0).is_err());
        assert!(dataset(10).chronological_split(1.0).is_err());
    }

    #[test]
    fn split_needs_two_rows() {
        assert_eq!(
            dataset(1).chronological_split(0.5),
            Err(TrainingError::NotEnoughRows { needed: 2, got: 1 })
        );
    }
}
