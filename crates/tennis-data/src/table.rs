//! Column-preserving prediction table.
//!
//! Merge and de-vig steps rewrite a handful of columns in a prediction file
//! that may carry any number of model columns. The table keeps every cell as
//! text, in file order, so untouched columns round-trip unchanged.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use eyre::{bail, Result, WrapErr};
use tracing::{info, warn};

use crate::predictions::{parse_number, parse_outcome};
use crate::types::{PlayerId, PredictionRow};

/// Player A column.
pub const COL_A: &str = "A";
/// Player B column.
pub const COL_B: &str = "B";
/// Outcome column: 1 when A won, 0 when B won.
pub const COL_AWIN: &str = "Awin";
/// Decimal odds on A.
pub const COL_ODDS_A: &str = "PSA";
/// Decimal odds on B.
pub const COL_ODDS_B: &str = "PSB";
/// Shin-implied probability for A.
pub const COL_MARKET_PROB: &str = "ps_prob";
/// Suffix marking probability columns.
pub const PROB_SUFFIX: &str = "_prob";

/// Prediction CSV held as text cells.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PredictionTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl PredictionTable {
    /// Builds a table from headers and rows.
    ///
    /// Short rows are padded with blanks. Cells past the last header are
    /// dropped with a warning.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(index, mut row)| {
                if row.len() > width {
                    warn!(
                        row = index,
                        cells = row.len(),
                        columns = width,
                        "prediction row wider than header, extra cells dropped"
                    );
                }
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// Loads a prediction CSV from disk.
    ///
    /// # Errors
    /// Returns error if the file is missing or is not valid CSV.
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .wrap_err_with(|| format!("failed to open predictions {}", path.display()))?;
        let table = Self::read(file)?;
        info!(rows = table.len(), columns = table.headers.len(), "predictions loaded");
        Ok(table)
    }

    /// Reads a prediction CSV from any source.
    ///
    /// # Errors
    /// Returns error if the header or a record cannot be decoded, or a record
    /// has more cells than the header.
    pub fn read<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()
            .wrap_err("failed to read prediction header")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record =
                record.wrap_err_with(|| format!("failed to read prediction line {}", line + 2))?;
            if record.len() > headers.len() {
                bail!(
                    "prediction line {} has {} cells, header has {}",
                    line + 2,
                    record.len(),
                    headers.len()
                );
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self::new(headers, rows))
    }

    /// Writes the table to disk, creating parent directories.
    ///
    /// # Errors
    /// Returns error if the file cannot be created or written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
        }
        let file = File::create(path)
            .wrap_err_with(|| format!("failed to create {}", path.display()))?;
        self.write(file)?;
        info!(path = %path.display(), rows = self.len(), "prediction table written");
        Ok(())
    }

    /// Writes the table as CSV.
    ///
    /// # Errors
    /// Returns error if a record cannot be written.
    pub fn write<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer
            .write_record(&self.headers)
            .wrap_err("failed to write prediction header")?;
        for row in &self.rows {
            csv_writer
                .write_record(row)
                .wrap_err("failed to write prediction row")?;
        }
        csv_writer.flush().wrap_err("failed to flush prediction table")?;
        Ok(())
    }

    /// Column names in order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `name`, if present.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell text at `row`/`name`; `None` when the column does not exist.
    pub fn get(&self, row: usize, name: &str) -> Option<&str> {
        let col = self.column(name)?;
        self.rows.get(row).map(|cells| cells[col].as_str())
    }

    /// Position of `name`, appending an empty column when missing.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(col) = self.column(name) {
            return col;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.headers.len() - 1
    }

    /// Sets a cell, adding the column if needed. Out-of-range rows are ignored.
    pub fn set(&mut self, row: usize, name: &str, value: impl Into<String>) {
        let col = self.ensure_column(name);
        if let Some(cells) = self.rows.get_mut(row) {
            cells[col] = value.into();
        }
    }

    /// Moves the listed columns, when present, to the end in the given order.
    pub fn move_to_end(&mut self, names: &[&str]) {
        let mut order: Vec<usize> = (0..self.headers.len())
            .filter(|&i| !names.contains(&self.headers[i].as_str()))
            .collect();
        order.extend(names.iter().filter_map(|name| self.column(name)));

        self.headers = order.iter().map(|&i| self.headers[i].clone()).collect();
        for row in &mut self.rows {
            *row = order.iter().map(|&i| row[i].clone()).collect();
        }
    }

    /// Typed view of every row.
    pub fn prediction_rows(&self) -> Vec<PredictionRow> {
        let col_a = self.column(COL_A);
        let col_b = self.column(COL_B);
        let col_awin = self.column(COL_AWIN);
        let col_odds_a = self.column(COL_ODDS_A);
        let col_odds_b = self.column(COL_ODDS_B);
        let prob_cols: Vec<(usize, &str)> = self
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.ends_with(PROB_SUFFIX))
            .map(|(i, h)| (i, h.as_str()))
            .collect();

        self.rows
            .iter()
            .enumerate()
            .map(|(index, cells)| {
                let cell = |col: Option<usize>| col.map_or("", |c| cells[c].as_str());
                PredictionRow {
                    index,
                    a_raw: cell(col_a).to_string(),
                    b_raw: cell(col_b).to_string(),
                    a: PlayerId::normalize(cell(col_a)),
                    b: PlayerId::normalize(cell(col_b)),
                    a_won: parse_outcome(cell(col_awin)),
                    odds_a: parse_number(cell(col_odds_a)),
                    odds_b: parse_number(cell(col_odds_b)),
                    probabilities: prob_cols
                        .iter()
                        .filter_map(|&(c, name)| {
                            parse_number(&cells[c]).map(|p| (name.to_string(), p))
                        })
                        .collect(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
A,B,model_prob,welo_prob,Awin,notes
Alcaraz C.,Musetti L.,0.81,0.77,1,final
Ruud C.,Zverev A.,0.45,,0,
Sinner J.,Rune H.,0.62,0.58,1x
";

    #[test]
    fn reads_and_pads_short_rows() {
        let table = PredictionTable::read(SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(2, "notes"), Some(""));
        assert_eq!(table.get(0, "missing"), None);
    }

    #[test]
    fn rejects_rows_wider_than_header() {
        let csv = "A,B,model_prob\nAlice,Bob,0.6\nCarol,Dave,0.4,stray\n";
        let err = PredictionTable::read(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("prediction line 3 has 4 cells"));
    }

    #[test]
    fn new_drops_cells_past_the_header() {
        let headers = vec!["A".to_string(), "B".to_string()];
        let rows = vec![
            vec!["Alice".to_string(), "Bob".to_string(), "stray".to_string()],
            vec!["Carol".to_string()],
        ];
        let table = PredictionTable::new(headers, rows);

        assert_eq!(table.get(0, "B"), Some("Bob"));
        assert_eq!(table.get(1, "B"), Some(""));
        let mut out = Vec::new();
        table.write(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "A,B\nAlice,Bob\nCarol,\n");
    }

    #[test]
    fn typed_rows_pick_up_prob_columns() {
        let table = PredictionTable::read(SAMPLE.as_bytes()).unwrap();
        let rows = table.prediction_rows();

        assert_eq!(rows[0].prob("model_prob"), Some(0.81));
        assert_eq!(rows[0].a_won, Some(true));
        assert_eq!(rows[1].prob("welo_prob"), None);
        assert_eq!(rows[1].a_won, Some(false));
        assert_eq!(rows[2].a_won, Some(true));
        assert!(rows[0].odds_a.is_none());
    }

    #[test]
    fn set_appends_missing_columns() {
        let mut table = PredictionTable::read(SAMPLE.as_bytes()).unwrap();
        table.set(1, "PSA", "2.10");

        assert_eq!(table.headers().last().map(String::as_str), Some("PSA"));
        assert_eq!(table.get(1, "PSA"), Some("2.10"));
        assert_eq!(table.get(0, "PSA"), Some(""));
    }

    #[test]
    fn move_to_end_keeps_other_columns_in_order() {
        let mut table = PredictionTable::read(SAMPLE.as_bytes()).unwrap();
        table.move_to_end(&["PSA", "Awin", "model_prob"]);

        let headers: Vec<&str> = table.headers().iter().map(String::as_str).collect();
        assert_eq!(headers, vec!["A", "B", "welo_prob", "notes", "Awin", "model_prob"]);
        assert_eq!(table.get(0, "model_prob"), Some("0.81"));
        assert_eq!(table.get(0, "notes"), Some("final"));
    }

    #[test]
    fn write_round_trips_cells() {
        let table = PredictionTable::read(SAMPLE.as_bytes()).unwrap();
        let mut out = Vec::new();
        table.write(&mut out).unwrap();

        let again = PredictionTable::read(out.as_slice()).unwrap();
        assert_eq!(again, table);
    }
}
