//! Dataset Store
//!
//! Loads the accounting CSV once, keeps only the flagged rows, and serves
//! lookups from memory.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use serde_json::Value;

use crate::risk::RiskLevel;
use crate::types::{LedgerError, LedgerResult, Transaction};

const TRANSACTION_ID_COLUMNS: &[&str] = &["transaction_id", "BELNR"];
const AMOUNT_COLUMNS: &[&str] = &["amount", "DMBTR"];
const ACCOUNT_COLUMNS: &[&str] = &["account", "HKONT"];
const SCORE_COLUMNS: &[&str] = &["anomaly_score"];
const RISK_COLUMNS: &[&str] = &["risk_level"];
const DESCRIPTION_COLUMNS: &[&str] = &["description", "SGTXT"];
const LABEL_COLUMNS: &[&str] = &["label"];
const FLAG_COLUMNS: &[&str] = &["is_anomaly"];

/// In-memory store of flagged transactions
#[derive(Debug, Clone, Default)]
pub struct DatasetStore {
    source: Option<PathBuf>,
    total_rows: usize,
    anomalies: Vec<Transaction>,
    index: HashMap<String, usize>,
    duplicate_ids: Vec<String>,
}

impl DatasetStore {
    /// Load the dataset from a CSV file
    ///
    /// A missing or unreadable file is a configuration error: the service
    /// cannot answer anything without its dataset.
    pub fn load(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| LedgerError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let mut store = Self::from_reader(file)?;
        store.source = Some(path.to_path_buf());

        tracing::info!(
            path = %path.display(),
            rows = store.total_rows,
            anomalies = store.anomalies.len(),
            "Dataset loaded"
        );

        Ok(store)
    }

    /// Parse a dataset from any CSV source
    pub fn from_reader<R: io::Read>(reader: R) -> LedgerResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let columns = ColumnMap::new(&headers);

        let mut total_rows = 0;
        let mut anomalies = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            total_rows += 1;
            if columns.is_flagged(&record) {
                anomalies.push(columns.to_transaction(&headers, &record));
            }
        }

        let mut index = HashMap::with_capacity(anomalies.len());
        let mut duplicate_ids = Vec::new();
        for (position, tx) in anomalies.iter().enumerate() {
            if index.contains_key(&tx.transaction_id) {
                duplicate_ids.push(tx.transaction_id.clone());
            } else {
                index.insert(tx.transaction_id.clone(), position);
            }
        }

        if !duplicate_ids.is_empty() {
            tracing::warn!(
                duplicates = duplicate_ids.len(),
                first = %duplicate_ids[0],
                "Dataset contains duplicate transaction ids; first occurrence wins"
            );
        }

        Ok(Self {
            source: None,
            total_rows,
            anomalies,
            index,
            duplicate_ids,
        })
    }

    /// All flagged rows, in file order
    pub fn list_anomalies(&self) -> &[Transaction] {
        &self.anomalies
    }

    /// Look up a flagged row by id (surrounding whitespace is ignored)
    pub fn get_by_id(&self, transaction_id: &str) -> LedgerResult<&Transaction> {
        let id = transaction_id.trim();
        self.index
            .get(id)
            .map(|&position| &self.anomalies[position])
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    /// Number of flagged rows
    pub fn len(&self) -> usize {
        self.anomalies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anomalies.is_empty()
    }

    /// Number of rows read from the source, flagged or not
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    /// Ids that appeared more than once among flagged rows
    pub fn duplicate_ids(&self) -> &[String] {
        &self.duplicate_ids
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

// ============================================================================
// Column mapping
// ============================================================================

/// Positions of the well-known columns within a header row
struct ColumnMap {
    transaction_id: Option<usize>,
    amount: Option<usize>,
    account: Option<usize>,
    anomaly_score: Option<usize>,
    risk_level: Option<usize>,
    description: Option<usize>,
    label: Option<usize>,
    flag: Option<usize>,
}

impl ColumnMap {
    fn new(headers: &StringRecord) -> Self {
        let find = |aliases: &[&str]| {
            aliases.iter().find_map(|alias| {
                headers
                    .iter()
                    .position(|header| header.eq_ignore_ascii_case(alias))
            })
        };

        Self {
            transaction_id: find(TRANSACTION_ID_COLUMNS),
            amount: find(AMOUNT_COLUMNS),
            account: find(ACCOUNT_COLUMNS),
            anomaly_score: find(SCORE_COLUMNS),
            risk_level: find(RISK_COLUMNS),
            description: find(DESCRIPTION_COLUMNS),
            label: find(LABEL_COLUMNS),
            flag: find(FLAG_COLUMNS),
        }
    }

    fn is_core(&self, position: usize) -> bool {
        [
            self.transaction_id,
            self.amount,
            self.account,
            self.anomaly_score,
            self.risk_level,
            self.description,
        ]
        .contains(&Some(position))
    }

    fn cell<'r>(record: &'r StringRecord, position: Option<usize>) -> Option<&'r str> {
        position
            .and_then(|p| record.get(p))
            .filter(|value| !value.is_empty())
    }

    /// A row is an anomaly unless its label says `regular`. Without a label
    /// column an explicit `is_anomaly` flag decides, and without either every
    /// row counts as flagged.
    fn is_flagged(&self, record: &StringRecord) -> bool {
        if let Some(position) = self.label {
            let label = record.get(position).unwrap_or_default();
            return !label.eq_ignore_ascii_case("regular");
        }
        if let Some(position) = self.flag {
            let flag = record.get(position).unwrap_or_default().to_ascii_lowercase();
            return matches!(flag.as_str(), "1" | "true" | "yes" | "y");
        }
        true
    }

    fn to_transaction(&self, headers: &StringRecord, record: &StringRecord) -> Transaction {
        let label = Self::cell(record, self.label).unwrap_or_default();

        let anomaly_score = Self::cell(record, self.anomaly_score)
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or_else(|| RiskLevel::score_for_label(label));

        let risk_level = Self::cell(record, self.risk_level)
            .map(str::to_string)
            .unwrap_or_else(|| RiskLevel::from_label(label).to_string());

        let metadata = headers
            .iter()
            .enumerate()
            .filter(|(position, _)| !self.is_core(*position))
            .map(|(position, header)| {
                let raw = record.get(position).unwrap_or_default();
                (header.to_string(), cell_value(raw))
            })
            .collect::<BTreeMap<_, _>>();

        Transaction {
            transaction_id: Self::cell(record, self.transaction_id)
                .unwrap_or_default()
                .to_string(),
            amount: Self::cell(record, self.amount)
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(0.0),
            account: Self::cell(record, self.account)
                .unwrap_or("unknown")
                .to_string(),
            anomaly_score,
            risk_level,
            description: Self::cell(record, self.description).map(str::to_string),
            metadata,
        }
    }
}

/// Type a raw CSV cell for the metadata map
///
/// Codes with leading zeros stay strings so they survive the round trip.
fn cell_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    let leading_zero = raw.len() > 1 && raw.starts_with('0') && !raw.starts_with("0.");
    if !leading_zero {
        if let Ok(i) = raw.parse::<i64>() {
            return Value::from(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if let Some(n) = serde_json::Number::from_f64(f) {
                return Value::Number(n);
            }
        }
    }
    Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAP_EXPORT: &str = "BELNR,amount,HKONT,label\n\
        1001,1000.0,4000,regular\n\
        1002,2500.0,5000,local\n\
        1003,5000.0,6000,global\n";

    #[test]
    fn test_regular_rows_are_filtered() {
        let store = DatasetStore::from_reader(SAP_EXPORT.as_bytes()).unwrap();

        assert_eq!(store.total_rows(), 3);
        let ids: Vec<_> = store
            .list_anomalies()
            .iter()
            .map(|t| t.transaction_id.as_str())
            .collect();
        assert_eq!(ids, vec!["1002", "1003"]);
    }

    #[test]
    fn test_label_drives_risk_and_score() {
        let store = DatasetStore::from_reader(SAP_EXPORT.as_bytes()).unwrap();

        let local = store.get_by_id("1002").unwrap();
        assert_eq!(local.risk_level, "Medium");
        assert_eq!(local.anomaly_score, 0.75);
        assert_eq!(local.account, "5000");

        let global = store.get_by_id("1003").unwrap();
        assert_eq!(global.risk_level, "High");
        assert_eq!(global.anomaly_score, 0.95);
        assert_eq!(global.metadata["label"], Value::from("global"));
    }

    #[test]
    fn test_lookup_trims_whitespace() {
        let store = DatasetStore::from_reader(SAP_EXPORT.as_bytes()).unwrap();
        assert_eq!(store.get_by_id("  1003  ").unwrap().transaction_id, "1003");
    }

    #[test]
    fn test_lookup_missing_id() {
        let store = DatasetStore::from_reader(SAP_EXPORT.as_bytes()).unwrap();

        assert!(matches!(store.get_by_id("1001"), Err(LedgerError::NotFound(_))));
        assert!(matches!(store.get_by_id("9999"), Err(LedgerError::NotFound(_))));
    }

    #[test]
    fn test_explicit_columns_win_over_label() {
        let csv = "transaction_id,amount,account,anomaly_score,risk_level,label\n\
            A1,1200.0,4100,0.42,Low,local\n";
        let store = DatasetStore::from_reader(csv.as_bytes()).unwrap();

        let tx = store.get_by_id("A1").unwrap();
        assert_eq!(tx.anomaly_score, 0.42);
        assert_eq!(tx.risk_level, "Low");
    }

    #[test]
    fn test_is_anomaly_flag_without_label() {
        let csv = "transaction_id,amount,account,is_anomaly\n\
            X1,10,4000,1\n\
            X2,20,4000,0\n\
            X3,30,4000,true\n";
        let store = DatasetStore::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.get_by_id("X2").is_err());
    }

    #[test]
    fn test_every_row_flagged_without_flag_columns() {
        let csv = "transaction_id,amount,account\nX1,10,4000\nX2,20,4000\n";
        let store = DatasetStore::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_duplicates_keep_first_row() {
        let csv = "transaction_id,amount,account\nD1,10,4000\nD1,20,5000\n";
        let store = DatasetStore::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get_by_id("D1").unwrap().amount, 10.0);
        assert_eq!(store.duplicate_ids(), ["D1".to_string()]);
    }

    #[test]
    fn test_metadata_cells_are_typed() {
        let csv = "transaction_id,amount,account,BUKRS,WRBTR,vendor,note\n\
            M1,1,4000,0010,99.5,ACME,\n";
        let store = DatasetStore::from_reader(csv.as_bytes()).unwrap();

        let meta = &store.get_by_id("M1").unwrap().metadata;
        assert_eq!(meta["BUKRS"], Value::from("0010"));
        assert_eq!(meta["WRBTR"], serde_json::json!(99.5));
        assert_eq!(meta["vendor"], Value::from("ACME"));
        assert_eq!(meta["note"], Value::Null);
        assert!(!meta.contains_key("amount"));
    }

    #[test]
    fn test_missing_core_columns_use_defaults() {
        let csv = "BELNR,label\nZ1,global\n";
        let store = DatasetStore::from_reader(csv.as_bytes()).unwrap();

        let tx = store.get_by_id("Z1").unwrap();
        assert_eq!(tx.amount, 0.0);
        assert_eq!(tx.account, "unknown");
    }
}
