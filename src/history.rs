//! ==============================================================================
//! history.rs - The Durable Reading Log
//! ==============================================================================
//!
//! purpose:
//!     owns the single CSV blob that stores every accepted reading, and
//!     everything about its layout: the fixed header line, one data line
//!     per reading, booleans as literal true/false. no other module ever
//!     touches the blob key directly.
//!
//! write protocol:
//!     append = download current blob -> decode data lines -> push the new
//!     line -> trim to the retention window -> re-encode -> upsert the
//!     whole blob. the cycle runs under an async mutex, so two in-process
//!     writers cannot overwrite each other's readings. separate hub
//!     processes sharing one blob still race last-write-wins; the store
//!     offers no compare-and-swap.
//!
//! read protocol:
//!     a key that was never written is an empty log, not an error. the
//!     query path additionally masks every storage failure to an empty
//!     result so the dashboard keeps rendering through outages.
//!
//! ==============================================================================

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::Reading;
use crate::storage::{ObjectStore, StorageError};

/// First line of every stored log blob.
pub const CSV_HEADER: &str = "timestamp,waterLevel,rainStatus,valveStatus";

/// Content type stamped on every upload.
const CSV_CONTENT_TYPE: &str = "text/csv";

/// Drop oldest entries (from the front) until at most `max` remain.
pub fn trim_to_window(mut lines: Vec<String>, max: usize) -> Vec<String> {
    if lines.len() > max {
        lines.drain(..lines.len() - max);
    }
    lines
}

fn encode_line(reading: &Reading) -> String {
    format!(
        "{},{},{},{}",
        reading.timestamp, reading.water_level, reading.rain_status, reading.valve_status
    )
}

/// Decode one CSV data line. `None` when the water level field is
/// missing or not a finite number; such rows are skipped, not reported.
fn decode_line(line: &str) -> Option<Reading> {
    let mut fields = line.split(',');
    let timestamp = fields.next().unwrap_or("").to_string();
    let water_level: f64 = fields.next()?.parse().ok()?;
    if !water_level.is_finite() {
        return None;
    }
    let rain_status = fields.next() == Some("true");
    let valve_status = fields.next() == Some("true");
    Some(Reading {
        timestamp,
        water_level,
        rain_status,
        valve_status,
    })
}

/// Raw data lines of a blob, header dropped.
fn data_lines(text: &str) -> Vec<String> {
    text.trim().lines().skip(1).map(str::to_string).collect()
}

/// Rebuild the full blob text: header first, trailing newline on every line.
fn encode_log(lines: &[String]) -> String {
    let mut blob = String::with_capacity(
        CSV_HEADER.len() + 1 + lines.iter().map(|line| line.len() + 1).sum::<usize>(),
    );
    blob.push_str(CSV_HEADER);
    blob.push('\n');
    for line in lines {
        blob.push_str(line);
        blob.push('\n');
    }
    blob
}

/// The durable reading log. Sole owner of read-modify-write access to
/// the blob identified by `object_key`.
pub struct HistoryLog {
    store: Arc<dyn ObjectStore>,
    object_key: String,
    retention: usize,
    /// Serializes the whole download/append/upload cycle.
    append_lock: Mutex<()>,
}

impl HistoryLog {
    pub fn new(store: Arc<dyn ObjectStore>, object_key: impl Into<String>, retention: usize) -> Self {
        Self {
            store,
            object_key: object_key.into(),
            retention,
            append_lock: Mutex::new(()),
        }
    }

    /// Append one reading, then trim so the log never holds more than
    /// the retention window after a successful write.
    ///
    /// A missing blob starts a fresh log; any other download failure
    /// aborts the append rather than silently restarting the log from
    /// scratch. The whole cycle rewrites the blob, so a failed `put`
    /// leaves the previous log intact.
    pub async fn append(&self, reading: &Reading) -> Result<(), StorageError> {
        let _guard = self.append_lock.lock().await;

        let mut lines = match self.store.get(&self.object_key).await? {
            Some(bytes) => data_lines(&String::from_utf8_lossy(&bytes)),
            None => Vec::new(),
        };
        lines.push(encode_line(reading));
        let lines = trim_to_window(lines, self.retention);

        let blob = encode_log(&lines);
        self.store
            .put(&self.object_key, blob.into_bytes(), CSV_CONTENT_TYPE)
            .await?;
        debug!(entries = lines.len(), "reading log rewritten");
        Ok(())
    }

    /// Full decoded log, oldest first. A never-written key is an empty
    /// log, not an error. Malformed rows are skipped silently.
    pub async fn read_all(&self) -> Result<Vec<Reading>, StorageError> {
        match self.store.get(&self.object_key).await? {
            Some(bytes) => Ok(String::from_utf8_lossy(&bytes)
                .trim()
                .lines()
                .skip(1)
                .filter_map(decode_line)
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    /// Read path for the HTTP surface: storage trouble degrades to an
    /// empty result so the read side stays available.
    pub async fn query(&self) -> Vec<Reading> {
        match self.read_all().await {
            Ok(readings) => readings,
            Err(err) => {
                warn!("reading log unavailable, serving empty history: {err}");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;

    fn reading(timestamp: &str, level: f64) -> Reading {
        Reading {
            timestamp: timestamp.to_string(),
            water_level: level,
            rain_status: true,
            valve_status: false,
        }
    }

    fn log_over(store: Arc<MemoryStore>, retention: usize) -> HistoryLog {
        HistoryLog::new(store, "sensor_readings.csv", retention)
    }

    #[test]
    fn trim_is_identity_under_the_window() {
        let lines = vec!["a".to_string(), "b".to_string()];
        assert_eq!(trim_to_window(lines.clone(), 3), lines);
        assert_eq!(trim_to_window(lines.clone(), 2), lines);
    }

    #[test]
    fn trim_drops_oldest_first() {
        let lines: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        assert_eq!(trim_to_window(lines, 3), vec!["2", "3", "4"]);
    }

    #[test]
    fn lines_roundtrip_through_the_codec() {
        let original = reading("2026-08-06T10:00:00.000Z", 55.5);
        let decoded = decode_line(&encode_line(&original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn integral_levels_encode_without_fraction() {
        assert_eq!(
            encode_line(&reading("t", 42.0)),
            "t,42,true,false"
        );
    }

    #[test]
    fn malformed_rows_decode_to_none() {
        assert!(decode_line("2026-08-06T10:00:00.000Z,not-a-number,true,false").is_none());
        assert!(decode_line("").is_none());
        assert!(decode_line("lonely-timestamp").is_none());
    }

    #[test]
    fn flag_fields_require_the_literal_true() {
        let decoded = decode_line("t,10,TRUE,1").unwrap();
        assert!(!decoded.rain_status);
        assert!(!decoded.valve_status);
    }

    #[tokio::test]
    async fn append_starts_a_fresh_log_with_header() {
        let store = Arc::new(MemoryStore::new());
        let log = log_over(store.clone(), 10);

        log.append(&reading("t1", 1.0)).await.unwrap();

        let blob = store.get("sensor_readings.csv").await.unwrap().unwrap();
        let text = String::from_utf8(blob).unwrap();
        assert_eq!(text, format!("{CSV_HEADER}\nt1,1,true,false\n"));
    }

    #[tokio::test]
    async fn append_preserves_arrival_order() {
        let log = log_over(Arc::new(MemoryStore::new()), 10);
        for i in 0..4 {
            log.append(&reading(&format!("t{i}"), f64::from(i))).await.unwrap();
        }

        let levels: Vec<f64> = log
            .read_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.water_level)
            .collect();
        assert_eq!(levels, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn append_evicts_oldest_beyond_the_window() {
        let log = log_over(Arc::new(MemoryStore::new()), 3);
        for i in 0..5 {
            log.append(&reading(&format!("t{i}"), f64::from(i))).await.unwrap();
        }

        let readings = log.read_all().await.unwrap();
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].timestamp, "t2");
        assert_eq!(readings[2].timestamp, "t4");
    }

    #[tokio::test]
    async fn read_all_treats_missing_blob_as_empty_log() {
        let log = log_over(Arc::new(MemoryStore::new()), 10);
        assert!(log.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_all_skips_malformed_rows() {
        let store = Arc::new(MemoryStore::new());
        let blob = format!(
            "{CSV_HEADER}\nt1,10,true,false\nt2,garbage,true,false\nt3,30,false,true\n"
        );
        store
            .put("sensor_readings.csv", blob.into_bytes(), "text/csv")
            .await
            .unwrap();

        let readings = log_over(store, 10).read_all().await.unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].water_level, 10.0);
        assert_eq!(readings[1].water_level, 30.0);
    }

    /// Store that fails every call; exercises the query-path masking.
    struct BrokenStore;

    #[async_trait]
    impl ObjectStore for BrokenStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
            Err(StorageError::Rejected {
                status: 503,
                key: key.to_string(),
                message: "down for maintenance".to_string(),
            })
        }

        async fn put(
            &self,
            key: &str,
            _bytes: Vec<u8>,
            _content_type: &str,
        ) -> Result<(), StorageError> {
            Err(StorageError::Rejected {
                status: 503,
                key: key.to_string(),
                message: "down for maintenance".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn query_masks_read_failures_as_empty() {
        let log = HistoryLog::new(Arc::new(BrokenStore), "sensor_readings.csv", 10);
        assert!(log.query().await.is_empty());
    }

    #[tokio::test]
    async fn append_surfaces_storage_failures() {
        let log = HistoryLog::new(Arc::new(BrokenStore), "sensor_readings.csv", 10);
        assert!(log.append(&reading("t", 1.0)).await.is_err());
    }
}
