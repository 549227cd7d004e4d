//! Statistics over the stored dataset
//!
//! This module extracts and displays summary figures from previously
//! persisted events.

use crate::record::{Record, STORED_TIMESTAMP_FORMAT};
use crate::storage::{PriorOutput, StorageResult};
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// Number of provinces listed by [`print_statistics`]
pub const TOP_PROVINCES: usize = 10;

/// Dataset statistics summary
#[derive(Debug, Clone, Default)]
pub struct DatasetStatistics {
    /// Total number of stored events
    pub total_events: u64,

    /// Events reported as felt
    pub felt_events: u64,

    pub first_event: Option<NaiveDateTime>,
    pub last_event: Option<NaiveDateTime>,

    /// Largest magnitude, with the id of the event
    pub max_magnitude: Option<(f64, i64)>,

    /// Events per province, most frequent first
    pub events_by_province: Vec<(String, u64)>,
}

impl DatasetStatistics {
    pub fn from_records(records: &[Record]) -> Self {
        let mut stats = Self {
            total_events: records.len() as u64,
            ..Self::default()
        };

        let mut provinces: HashMap<&str, u64> = HashMap::new();
        for record in records {
            if record.felt() {
                stats.felt_events += 1;
            }

            let ts = record.timestamp();
            stats.first_event = Some(stats.first_event.map_or(ts, |first| first.min(ts)));
            stats.last_event = Some(stats.last_event.map_or(ts, |last| last.max(ts)));

            if stats
                .max_magnitude
                .map_or(true, |(max, _)| record.magnitude() > max)
            {
                stats.max_magnitude = Some((record.magnitude(), record.id()));
            }

            *provinces.entry(record.province()).or_insert(0) += 1;
        }

        let mut by_province: Vec<(String, u64)> = provinces
            .into_iter()
            .map(|(province, count)| (province.to_string(), count))
            .collect();
        by_province.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        stats.events_by_province = by_province;

        stats
    }
}

/// Loads statistics from previously persisted output
pub fn load_statistics<P>(prior: &P) -> StorageResult<DatasetStatistics>
where
    P: PriorOutput + ?Sized,
{
    Ok(DatasetStatistics::from_records(&prior.load_all()?))
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &DatasetStatistics) {
    println!("=== Dataset Statistics ===\n");

    println!("Overview:");
    println!("  Total events: {}", stats.total_events);
    let felt_share = if stats.total_events > 0 {
        (stats.felt_events as f64 / stats.total_events as f64) * 100.0
    } else {
        0.0
    };
    println!("  Felt events: {} ({:.1}%)", stats.felt_events, felt_share);
    if let (Some(first), Some(last)) = (stats.first_event, stats.last_event) {
        println!(
            "  Period: {} .. {}",
            first.format(STORED_TIMESTAMP_FORMAT),
            last.format(STORED_TIMESTAMP_FORMAT)
        );
    }
    if let Some((magnitude, id)) = stats.max_magnitude {
        println!("  Largest magnitude: {} (event #{})", magnitude, id);
    }
    println!();

    if !stats.events_by_province.is_empty() {
        println!("Events by Province:");
        for (province, count) in stats.events_by_province.iter().take(TOP_PROVINCES) {
            println!("  {}: {}", province, count);
        }
        if stats.events_by_province.len() > TOP_PROVINCES {
            println!(
                "  ... and {} more",
                stats.events_by_province.len() - TOP_PROVINCES
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawRecord;

    fn record(id: i64, timestamp: &str, magnitude: &str, felt: bool, province: &str) -> Record {
        Record::from_raw(RawRecord {
            id: Some(id.to_string()),
            timestamp: Some(timestamp.to_string()),
            latitude: Some("-32.0".to_string()),
            longitude: Some("-68.0".to_string()),
            felt: Some(felt.to_string()),
            depth_km: Some("10".to_string()),
            magnitude: Some(magnitude.to_string()),
            intensity: Some(String::new()),
            province: Some(province.to_string()),
            detail_url: Some(format!("http://contenidos.inpres.gob.ar/ver/{}/detalle", id)),
        })
        .unwrap()
    }

    #[test]
    fn test_empty_dataset() {
        let stats = DatasetStatistics::from_records(&[]);
        assert_eq!(stats.total_events, 0);
        assert!(stats.first_event.is_none());
        assert!(stats.max_magnitude.is_none());
        assert!(stats.events_by_province.is_empty());
    }

    #[test]
    fn test_statistics_from_records() {
        let records = vec![
            record(1, "02/05/2023 10:00:00", "2.5", false, "San Juan"),
            record(2, "01/05/2023 08:00:00", "4.8", true, "Mendoza"),
            record(3, "03/05/2023 12:30:00", "3.1", false, "San Juan"),
        ];
        let stats = DatasetStatistics::from_records(&records);

        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.felt_events, 1);
        assert_eq!(
            stats.first_event.unwrap().format("%d/%m/%Y").to_string(),
            "01/05/2023"
        );
        assert_eq!(
            stats.last_event.unwrap().format("%d/%m/%Y").to_string(),
            "03/05/2023"
        );
        assert_eq!(stats.max_magnitude, Some((4.8, 2)));
        assert_eq!(
            stats.events_by_province,
            vec![("San Juan".to_string(), 2), ("Mendoza".to_string(), 1)]
        );
    }
}
