// Client import from CSV
//
// Re-running an import is safe: clients already present (same idempotency
// hash or number) are counted as duplicates and skipped.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

use crate::entities::Client;
use crate::error::{BankError, BankResult};
use crate::service::BankService;
use crate::store::BankStore;

/// One CSV row. Header names follow the client field display order.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientRecord {
    #[serde(rename = "ClientNumber", default)]
    pub client_number: Option<i64>,

    #[serde(rename = "FirstName")]
    pub first_name: String,

    #[serde(rename = "LastName")]
    pub last_name: String,

    #[serde(rename = "Address")]
    pub address: String,

    #[serde(rename = "City")]
    pub city: String,

    #[serde(rename = "Province")]
    pub province: String,

    #[serde(rename = "PostalCode")]
    pub postal_code: String,

    #[serde(rename = "DateCreated", default)]
    pub date_created: Option<NaiveDate>,

    #[serde(rename = "Notes", default)]
    pub notes: Option<String>,
}

impl ClientRecord {
    pub fn into_client(self) -> Client {
        let mut client = Client::new(
            self.first_name.trim(),
            self.last_name.trim(),
            self.address.trim(),
            self.city.trim(),
            self.province.trim(),
            self.postal_code.trim(),
        );
        if let Some(number) = self.client_number {
            client.client_number = number;
        }
        if let Some(date) = self.date_created {
            client.date_created = date;
        }
        client.notes = self.notes.filter(|n| !n.trim().is_empty());
        client
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
    /// (CSV line, reason) for rows that failed validation
    pub rejected: Vec<(usize, String)>,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.duplicates + self.rejected.len()
    }
}

/// One data row of the file. A row that cannot be read as a client keeps
/// its reason, so the rest of the file still imports.
#[derive(Debug, Clone)]
pub struct CsvRow {
    /// Line in the file (the header is line 1)
    pub line: usize,
    pub record: Result<ClientRecord, String>,
}

pub fn load_clients_csv(csv_path: &Path) -> BankResult<Vec<CsvRow>> {
    let rdr = csv::Reader::from_path(csv_path)?;
    read_rows(rdr)
}

pub fn read_clients_csv<R: Read>(reader: R) -> BankResult<Vec<CsvRow>> {
    read_rows(csv::Reader::from_reader(reader))
}

/// Only I/O failures abort; malformed rows are returned as errors in place.
fn read_rows<R: Read>(mut rdr: csv::Reader<R>) -> BankResult<Vec<CsvRow>> {
    let headers = rdr.headers()?.clone();
    let mut rows = Vec::new();

    for (index, result) in rdr.records().enumerate() {
        let fallback_line = index + 2;
        let row = match result {
            Ok(raw) => CsvRow {
                line: raw
                    .position()
                    .map_or(fallback_line, |pos| pos.line() as usize),
                record: raw
                    .deserialize::<ClientRecord>(Some(&headers))
                    .map_err(|e| row_error(&e, &headers)),
            },
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => CsvRow {
                line: e
                    .position()
                    .map_or(fallback_line, |pos| pos.line() as usize),
                record: Err(row_error(&e, &headers)),
            },
        };
        rows.push(row);
    }
    Ok(rows)
}

fn row_error(err: &csv::Error, headers: &csv::StringRecord) -> String {
    if let csv::ErrorKind::Deserialize { err, .. } = err.kind() {
        if let Some(name) = err.field().and_then(|i| headers.get(i as usize)) {
            return format!("{}: {}", name, err.kind());
        }
        return err.kind().to_string();
    }
    err.to_string()
}

/// Register each row, skipping duplicates and collecting rejects.
pub fn import_clients<S: BankStore>(
    service: &BankService<S>,
    rows: Vec<CsvRow>,
) -> BankResult<ImportSummary> {
    let mut summary = ImportSummary::default();

    for CsvRow { line, record } in rows {
        let record = match record {
            Ok(record) => record,
            Err(reason) => {
                tracing::warn!(line, %reason, "unreadable client row");
                summary.rejected.push((line, reason));
                continue;
            }
        };

        match service.register_client(record.into_client()) {
            Ok(_) => summary.inserted += 1,
            Err(BankError::Duplicate { key, .. }) => {
                tracing::debug!(line, %key, "skipping duplicate client");
                summary.duplicates += 1;
            }
            Err(BankError::Validation(errors)) => {
                let reason = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect::<Vec<_>>()
                    .join("; ");
                tracing::warn!(line, %reason, "rejected client row");
                summary.rejected.push((line, reason));
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        rejected = summary.rejected.len(),
        "client import finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    const CSV: &str = "\
FirstName,LastName,Address,City,Province,PostalCode,Notes
Ada,Lovelace,12 Analytical Way,Kitchener,ON,N2G 4M4,
Grace,Hopper,1 Compiler Rd,Waterloo,ON,N2L 3G1,Navy
Bad,Province,3 Nowhere St,Nowhere,Ontario,K1A 0B1,
";

    fn record(row: &CsvRow) -> &ClientRecord {
        row.record.as_ref().unwrap()
    }

    #[test]
    fn test_read_records() {
        let rows = read_clients_csv(CSV.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().map(|r| r.line).collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(record(&rows[1]).notes.as_deref(), Some("Navy"));
        assert!(record(&rows[0]).client_number.is_none());
    }

    #[test]
    fn test_empty_notes_become_none() {
        let rows = read_clients_csv(CSV.as_bytes()).unwrap();
        let client = record(&rows[0]).clone().into_client();
        assert!(client.notes.is_none());
    }

    #[test]
    fn test_malformed_row_is_rejected_and_rest_imported() {
        let csv = "\
ClientNumber,FirstName,LastName,Address,City,Province,PostalCode,DateCreated
,Alan,Turing,2 Bletchley Ln,Ottawa,ON,K1A 0B1,2024-01-15
,Joan,Clarke,4 Hut Eight Rd,Ottawa,ON,K1A 0B2,15/01/2024
abc,Dilly,Knox,6 Cottage Way,Ottawa,ON,K1A 0B3,
,Gordon,Welchman,8 Hut Six Rd,Ottawa,ON,K1A 0B4,
";
        let rows = read_clients_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows[1].record.is_err());
        assert!(rows[2].record.is_err());

        let service = BankService::new(SqliteStore::open_in_memory().unwrap()).unwrap();
        let summary = import_clients(&service, rows).unwrap();

        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.rejected.len(), 2);
        assert_eq!(summary.rejected[0].0, 3);
        assert!(summary.rejected[0].1.contains("invalid characters"));
        assert_eq!(summary.rejected[1].0, 4);
        assert!(summary.rejected[1].1.starts_with("ClientNumber"));

        let names: Vec<String> = service
            .clients()
            .unwrap()
            .iter()
            .map(|c| c.last_name.clone())
            .collect();
        assert_eq!(names, vec!["Turing", "Welchman"]);
    }

    #[test]
    fn test_import_twice_is_idempotent() {
        let service = BankService::new(SqliteStore::open_in_memory().unwrap()).unwrap();

        let first = import_clients(&service, read_clients_csv(CSV.as_bytes()).unwrap()).unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.duplicates, 0);
        assert_eq!(first.rejected.len(), 1);
        assert_eq!(first.rejected[0].0, 4);
        assert!(first.rejected[0].1.contains("Must be 2 uppercase characters."));

        let second = import_clients(&service, read_clients_csv(CSV.as_bytes()).unwrap()).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(second.total(), 3);

        assert_eq!(service.clients().unwrap().len(), 2);
    }

    #[test]
    fn test_explicit_number_and_date() {
        let csv = "\
ClientNumber,FirstName,LastName,Address,City,Province,PostalCode,DateCreated
20000000,Alan,Turing,2 Bletchley Ln,Ottawa,ON,K1A 0B1,2024-01-15
";
        let service = BankService::new(SqliteStore::open_in_memory().unwrap()).unwrap();
        let summary = import_clients(&service, read_clients_csv(csv.as_bytes()).unwrap()).unwrap();
        assert_eq!(summary.inserted, 1);

        let client = service.client_by_number(20_000_000).unwrap();
        assert_eq!(client.date_created, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }
}
