//! Summary statistics over a set of readings.

use crate::readings::GlucoseReading;
use crate::SeverityTier;
use serde::Serialize;

/// Period summary shown above the reading history
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReadingStats {
    pub count: usize,
    /// Mean glucose, rounded to a whole mg/dL
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub total_insulin: f64,
    /// Share of readings in the normal tier, rounded to a whole percent
    pub normal_percentage: u32,
}

impl ReadingStats {
    /// `None` when there is nothing to summarize.
    pub fn from_readings<'a, I>(readings: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a GlucoseReading>,
    {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut total_insulin = 0.0;
        let mut normal = 0usize;

        for reading in readings {
            count += 1;
            sum += reading.value;
            min = min.min(reading.value);
            max = max.max(reading.value);
            total_insulin += reading.insulin_units.unwrap_or(0.0);
            if reading.tier == SeverityTier::Normal {
                normal += 1;
            }
        }

        if count == 0 {
            return None;
        }

        Some(Self {
            count,
            average: (sum / count as f64).round(),
            min,
            max,
            total_insulin: crate::formula::round_units(total_insulin),
            normal_percentage: ((normal as f64 / count as f64) * 100.0).round() as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Icon, Recommendation};
    use chrono::Utc;

    fn reading(value: f64, tier: SeverityTier, units: Option<f64>) -> GlucoseReading {
        let rec = Recommendation {
            message: String::new(),
            tier,
            insulin_units: units,
            is_emergency: false,
            icon: Icon::Check,
        };
        GlucoseReading::new(value, &rec, Utc::now())
    }

    #[test]
    fn test_empty_has_no_stats() {
        let readings: Vec<GlucoseReading> = vec![];
        assert!(ReadingStats::from_readings(&readings).is_none());
    }

    #[test]
    fn test_summary() {
        let readings = vec![
            reading(100.0, SeverityTier::Normal, None),
            reading(301.0, SeverityTier::High, Some(2.0)),
            reading(75.0, SeverityTier::Low, None),
            reading(380.0, SeverityTier::VeryHigh, Some(3.3)),
        ];

        let stats = ReadingStats::from_readings(&readings).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.average, 214.0);
        assert_eq!(stats.min, 75.0);
        assert_eq!(stats.max, 380.0);
        assert_eq!(stats.total_insulin, 5.3);
        assert_eq!(stats.normal_percentage, 25);
    }

    #[test]
    fn test_percentage_rounds() {
        let readings = vec![
            reading(100.0, SeverityTier::Normal, None),
            reading(110.0, SeverityTier::Normal, None),
            reading(300.0, SeverityTier::High, None),
        ];
        let stats = ReadingStats::from_readings(&readings).unwrap();
        assert_eq!(stats.normal_percentage, 67);
        assert_eq!(stats.average, 170.0);
    }
}
