use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::melt::flatten::{flatten_row, FlattenConfig};
use crate::route::{RoutedRecord, WriteDisposition};
use crate::row::{key_value, Row};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize row: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("malformed row in {path} line {line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("record for merge table '{table}' has no '{primary_key}' value")]
    MissingKey { table: String, primary_key: String },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> LoadError + '_ {
    move |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// The destination side of a run.
///
/// Records of one stream arrive in pagination order. `finish` is called once
/// after the last batch, and also when a run aborts: whatever was loaded
/// until then must be committed by it.
pub trait Loader: Send {
    fn load(&mut self, records: Vec<RoutedRecord>) -> Result<(), LoadError>;

    fn finish(&mut self) -> Result<(), LoadError>;
}

/// Rows of one merge table, unique by primary key, in first-seen order.
#[derive(Default)]
struct MergeBuffer {
    rows: Vec<Row>,
    positions: HashMap<String, usize>,
}

impl MergeBuffer {
    fn upsert(&mut self, key: String, row: Row) {
        match self.positions.get(&key).copied() {
            Some(position) => self.rows[position] = row,
            None => {
                self.positions.insert(key, self.rows.len());
                self.rows.push(row);
            }
        }
    }
}

/// Writes one `<table>.jsonl` file per destination table.
///
/// Append tables are written as records arrive. Merge tables are seeded from
/// the existing file, upserted by primary key in memory and rewritten on
/// [`Loader::finish`].
pub struct TableWriter {
    output_dir: PathBuf,
    flatten: FlattenConfig,
    appenders: HashMap<String, BufWriter<File>>,
    merged: HashMap<String, MergeBuffer>,
}

impl TableWriter {
    /// Create a writer for `output_dir`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(output_dir: P, flatten: FlattenConfig) -> Result<Self, LoadError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir).map_err(io_error(&output_dir))?;

        Ok(TableWriter {
            output_dir,
            flatten,
            appenders: HashMap::new(),
            merged: HashMap::new(),
        })
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.output_dir.join(format!("{}.jsonl", table))
    }

    fn append(&mut self, table: &str, row: &Row) -> Result<(), LoadError> {
        let path = self.table_path(table);
        let writer = match self.appenders.entry(table.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(io_error(&path))?;
                entry.insert(BufWriter::new(file))
            }
        };
        let json = serde_json::to_string(row)?;
        writeln!(writer, "{}", json).map_err(io_error(&path))
    }

    fn merge(
        &mut self,
        table: &str,
        primary_key: &str,
        key: String,
        row: Row,
    ) -> Result<(), LoadError> {
        if !self.merged.contains_key(table) {
            let buffer = self.read_existing(table, primary_key)?;
            self.merged.insert(table.to_string(), buffer);
        }

        self.merged
            .entry(table.to_string())
            .or_default()
            .upsert(key, row);
        Ok(())
    }

    fn read_existing(&self, table: &str, primary_key: &str) -> Result<MergeBuffer, LoadError> {
        let path = self.table_path(table);
        let mut buffer = MergeBuffer::default();
        if !path.exists() {
            return Ok(buffer);
        }

        let reader = BufReader::new(File::open(&path).map_err(io_error(&path))?);
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(io_error(&path))?;
            if line.trim().is_empty() {
                continue;
            }
            let row: Row = serde_json::from_str(&line).map_err(|source| LoadError::Corrupt {
                path: path.clone(),
                line: index + 1,
                source,
            })?;
            if let Some(key) = key_value(&row, primary_key) {
                buffer.upsert(key, row);
            }
        }

        debug!(table, rows = buffer.rows.len(), "seeded merge table from existing file");
        Ok(buffer)
    }
}

impl Loader for TableWriter {
    fn load(&mut self, records: Vec<RoutedRecord>) -> Result<(), LoadError> {
        for record in records {
            let key = record.key();
            let RoutedRecord { route, row } = record;
            let row = flatten_row(row, &self.flatten);

            match route.disposition {
                WriteDisposition::Append => self.append(&route.table, &row)?,
                WriteDisposition::Merge => {
                    let key = key.ok_or_else(|| LoadError::MissingKey {
                        table: route.table.clone(),
                        primary_key: route.primary_key.clone(),
                    })?;
                    self.merge(&route.table, &route.primary_key, key, row)?;
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), LoadError> {
        for (table, buffer) in &self.merged {
            let path = self.table_path(table);
            let mut writer = BufWriter::new(File::create(&path).map_err(io_error(&path))?);
            for row in &buffer.rows {
                let json = serde_json::to_string(row)?;
                writeln!(writer, "{}", json).map_err(io_error(&path))?;
            }
            writer.flush().map_err(io_error(&path))?;
            debug!(table = %table, rows = buffer.rows.len(), "wrote merge table");
        }

        for (table, writer) in self.appenders.iter_mut() {
            let path = self.output_dir.join(format!("{}.jsonl", table));
            writer.flush().map_err(io_error(&path))?;
        }
        Ok(())
    }
}

/// Writes every record to a single stream, tagged with its table.
pub struct StreamWriter<W: Write + Send> {
    writer: W,
    flatten: FlattenConfig,
}

impl<W: Write + Send> StreamWriter<W> {
    pub fn new(writer: W, flatten: FlattenConfig) -> Self {
        StreamWriter { writer, flatten }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Loader for StreamWriter<W> {
    fn load(&mut self, records: Vec<RoutedRecord>) -> Result<(), LoadError> {
        for record in records {
            let mut data = flatten_row(record.row, &self.flatten);
            data.insert("_table".to_string(), Value::String(record.route.table));

            let json = serde_json::to_string(&data)?;
            writeln!(self.writer, "{}", json).map_err(io_error(Path::new("<stream>")))?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), LoadError> {
        self.writer.flush().map_err(io_error(Path::new("<stream>")))
    }
}
