//! Side-car read index for collapsed output.
//!
//! The writer appends one row per read block to `<output>.idx`. Blocks land in
//! the output in whatever order aggregators finish, so the index is the only
//! way to find a read: `byte_offset` and `byte_len` address the block exactly,
//! including its final newline.
//!
//! # Format
//!
//! ```text
//! ref_id  ref_start  ref_end  read_id  dwell_time  kmers  nnnnn_kmers  mismatch_kmers  missing_kmers  byte_offset  byte_len
//! ```
//!
//! Tab-separated, one header line, then one row per block.
//!
//! # Example
//!
//! ```rust,no_run
//! use eventalign_collapse::index::{fetch_block, load_index};
//!
//! let records = load_index("collapsed.tsv.idx")?;
//! if let Some(record) = records.iter().find(|r| r.read_id == "read_42") {
//!     let block = fetch_block("collapsed.tsv", record)?;
//!     print!("{block}");
//! }
//! # Ok::<(), eventalign_collapse::error::CollapseError>(())
//! ```

use std::{
    fs::File,
    io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write},
    path::Path,
    str::FromStr,
};

use crate::{
    aggregate::ReadAggregate,
    error::{CollapseError, Result},
    stats::push_float,
};

/// Header line of the index file, without its newline.
pub const HEADER: &str = "ref_id\tref_start\tref_end\tread_id\tdwell_time\tkmers\tnnnnn_kmers\tmismatch_kmers\tmissing_kmers\tbyte_offset\tbyte_len";

/// Line appended to the output once every block has been written.
pub const COMPLETION_SENTINEL: &str = "#\n";

const N_COLUMNS: usize = 11;

/// Location and summary of one read block in the collapsed output.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub ref_id: String,
    pub ref_start: i64,
    pub ref_end: i64,
    pub read_id: String,
    pub dwell_time: f64,
    pub kmers: u64,
    pub nnnnn_kmers: u64,
    pub mismatch_kmers: u64,
    pub missing_kmers: u64,
    pub byte_offset: u64,
    pub byte_len: u64,
}

impl IndexRecord {
    /// Builds the record for a block written at `byte_offset`.
    pub fn new(read: &ReadAggregate, byte_offset: u64, byte_len: u64) -> Self {
        Self {
            ref_id: read.ref_id.clone(),
            ref_start: read.ref_start,
            ref_end: read.ref_end,
            read_id: read.read_id.clone(),
            dwell_time: read.dwell_time,
            kmers: read.kmers,
            nnnnn_kmers: read.nnnnn_kmers,
            mismatch_kmers: read.mismatch_kmers,
            missing_kmers: read.missing_kmers,
            byte_offset,
            byte_len,
        }
    }

    /// Renders the record as one index row, newline included.
    pub fn to_row(&self) -> String {
        let mut dwell = String::new();
        push_float(&mut dwell, self.dwell_time);
        format!(
            "{}\t{}\t{}\t{}\t{dwell}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            self.ref_id,
            self.ref_start,
            self.ref_end,
            self.read_id,
            self.kmers,
            self.nnnnn_kmers,
            self.mismatch_kmers,
            self.missing_kmers,
            self.byte_offset,
            self.byte_len
        )
    }

    /// Writes the record as one index row.
    pub fn write_row<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.to_row().as_bytes())
    }

    fn parse_row(line: &str, line_no: u64, path: &Path) -> Result<Self> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != N_COLUMNS {
            return Err(invalid(
                path,
                format!("line {line_no}: expected {N_COLUMNS} fields, found {}", fields.len()),
            ));
        }
        let num = |i: usize| -> Result<u64> { parse(fields[i], line_no, path) };

        Ok(Self {
            ref_id: fields[0].to_string(),
            ref_start: parse(fields[1], line_no, path)?,
            ref_end: parse(fields[2], line_no, path)?,
            read_id: fields[3].to_string(),
            dwell_time: parse(fields[4], line_no, path)?,
            kmers: num(5)?,
            nnnnn_kmers: num(6)?,
            mismatch_kmers: num(7)?,
            missing_kmers: num(8)?,
            byte_offset: num(9)?,
            byte_len: num(10)?,
        })
    }
}

fn parse<T: FromStr>(value: &str, line_no: u64, path: &Path) -> Result<T> {
    value
        .parse()
        .map_err(|_| invalid(path, format!("line {line_no}: invalid value '{value}'")))
}

fn invalid(path: &Path, details: String) -> CollapseError {
    CollapseError::InvalidIndex {
        details,
        path: path.to_path_buf(),
    }
}

fn index_read_error(path: &Path) -> impl FnOnce(io::Error) -> CollapseError + '_ {
    move |source| CollapseError::IndexRead {
        source,
        path: path.to_path_buf(),
    }
}

/// Loads every record of an index file.
///
/// # Errors
///
/// Returns [`CollapseError::IndexRead`] if the file cannot be read, or
/// [`CollapseError::InvalidIndex`] if the header or a row is malformed.
pub fn load_index<P: AsRef<Path>>(path: P) -> Result<Vec<IndexRecord>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path).map_err(index_read_error(path))?);
    let mut lines = reader.lines();

    match lines.next() {
        Some(header) => {
            if header.map_err(index_read_error(path))? != HEADER {
                return Err(invalid(path, "unexpected header line".into()));
            }
        }
        None => return Err(invalid(path, "file is empty".into())),
    }

    let mut records = Vec::new();
    for (line, line_no) in lines.zip(2u64..) {
        let line = line.map_err(index_read_error(path))?;
        if line.is_empty() {
            continue;
        }
        records.push(IndexRecord::parse_row(&line, line_no, path)?);
    }
    Ok(records)
}

/// Reads the block a record points at from the collapsed output.
///
/// # Errors
///
/// Returns [`CollapseError::IndexRead`] if the output cannot be read at the
/// recorded range, or [`CollapseError::InvalidIndex`] if the bytes there are
/// not the block of the record's read.
pub fn fetch_block<P: AsRef<Path>>(output: P, record: &IndexRecord) -> Result<String> {
    let path = output.as_ref();
    let mut file = File::open(path).map_err(index_read_error(path))?;
    file.seek(SeekFrom::Start(record.byte_offset))
        .map_err(index_read_error(path))?;

    let len = usize::try_from(record.byte_len)
        .map_err(|_| invalid(path, format!("block length {} too large", record.byte_len)))?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).map_err(index_read_error(path))?;

    let block = String::from_utf8(buf)
        .map_err(|_| invalid(path, format!("block at offset {} is not UTF-8", record.byte_offset)))?;
    let marker = format!("#{}\t{}\n", record.read_id, record.ref_id);
    if !block.starts_with(&marker) {
        return Err(invalid(
            path,
            format!(
                "block at offset {} does not belong to read '{}'",
                record.byte_offset, record.read_id
            ),
        ));
    }
    Ok(block)
}

/// Returns `true` if the output ends with the completion sentinel.
///
/// # Errors
///
/// Returns [`CollapseError::IndexRead`] if the output cannot be read.
pub fn is_complete<P: AsRef<Path>>(output: P) -> Result<bool> {
    let path = output.as_ref();
    let mut file = File::open(path).map_err(index_read_error(path))?;
    let len = file.metadata().map_err(index_read_error(path))?.len();
    let sentinel = COMPLETION_SENTINEL.len() as u64;
    if len < sentinel {
        return Ok(false);
    }

    // Include the byte before the sentinel so "...\t#\n" is not mistaken for it.
    let start = len.saturating_sub(sentinel + 1);
    file.seek(SeekFrom::Start(start)).map_err(index_read_error(path))?;
    let mut tail = Vec::new();
    file.read_to_end(&mut tail).map_err(index_read_error(path))?;

    Ok(matches!(tail.as_slice(), [b'#', b'\n'] | [b'\n', b'#', b'\n']))
}
