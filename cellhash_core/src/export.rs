//! Retrieval artifacts and code tables as comma-separated files.
//!
//! Every file carries a leading unnamed row-index column and integer column
//! headers, so they load back as plain data frames.

use std::fmt::Display;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::inference::CodeBuffer;

pub const RANKED_LABELS_FILE: &str = "labels_database_ranked.csv";
pub const QUERY_LABELS_FILE: &str = "labels_query.csv";
pub const DATABASE_CODES_FILE: &str = "binaries_database.csv";
pub const DATABASE_LABELS_FILE: &str = "labels_database.csv";
pub const QUERY_CODES_FILE: &str = "binaries_test.csv";
pub const TEST_LABELS_FILE: &str = "labels_test.csv";

fn write_table<W, R, T>(
    writer: &mut W,
    columns: usize,
    rows: impl IntoIterator<Item = R>,
) -> io::Result<()>
where
    W: Write,
    R: IntoIterator<Item = T>,
    T: Display,
{
    for column in 0..columns {
        write!(writer, ",{}", column)?;
    }
    writeln!(writer)?;

    for (index, row) in rows.into_iter().enumerate() {
        write!(writer, "{}", index)?;
        for value in row {
            write!(writer, ",{}", value)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

fn write_file<R, T>(path: &Path, columns: usize, rows: impl IntoIterator<Item = R>) -> io::Result<()>
where
    R: IntoIterator<Item = T>,
    T: Display,
{
    let mut writer = BufWriter::new(File::create(path)?);
    write_table(&mut writer, columns, rows)?;
    writer.flush()
}

/// Writes the ranked database labels (one row per query) and the raw query
/// labels into `dir`.
///
/// The ranked table takes its column count from the longest row.
pub fn write_retrieval_results(
    dir: &Path,
    ranked_labels: &[Vec<usize>],
    query_labels: &[usize],
) -> io::Result<()> {
    if ranked_labels.len() != query_labels.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "{} ranked rows for {} query labels",
                ranked_labels.len(),
                query_labels.len()
            ),
        ));
    }
    fs::create_dir_all(dir)?;

    let columns = ranked_labels.iter().map(Vec::len).max().unwrap_or(0);
    write_file(&dir.join(RANKED_LABELS_FILE), columns, ranked_labels)?;
    write_file(
        &dir.join(QUERY_LABELS_FILE),
        1,
        query_labels.iter().map(std::slice::from_ref),
    )?;

    tracing::info!(
        dir = %dir.display(),
        queries = query_labels.len(),
        top_k = columns,
        "wrote retrieval artifacts"
    );
    Ok(())
}

/// Writes the squashed codes and labels of the database and the query
/// cells into `dir`, one row per cell.
///
/// Label files are aligned row for row with their code files.
pub fn write_code_tables(dir: &Path, database: &CodeBuffer, query: &CodeBuffer) -> io::Result<()> {
    if !database.is_empty() && !query.is_empty() && database.bit() != query.bit() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "database codes have {} bits but query codes have {}",
                database.bit(),
                query.bit()
            ),
        ));
    }
    fs::create_dir_all(dir)?;

    for (buffer, codes_file, labels_file) in [
        (database, DATABASE_CODES_FILE, DATABASE_LABELS_FILE),
        (query, QUERY_CODES_FILE, TEST_LABELS_FILE),
    ] {
        write_file(&dir.join(codes_file), buffer.bit(), buffer.codes.rows())?;
        write_file(
            &dir.join(labels_file),
            1,
            buffer.labels.iter().map(std::slice::from_ref),
        )?;
    }

    tracing::info!(
        dir = %dir.display(),
        database = database.len(),
        queries = query.len(),
        "wrote code tables"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array2};
    use uuid::Uuid;

    #[test]
    fn test_table_layout() {
        let dir = std::env::temp_dir().join(format!("cellhash-export-{}", Uuid::new_v4()));
        write_retrieval_results(&dir, &[vec![2, 0, 1], vec![1, 1, 2]], &[2, 1]).unwrap();

        let ranked = fs::read_to_string(dir.join(RANKED_LABELS_FILE)).unwrap();
        let query = fs::read_to_string(dir.join(QUERY_LABELS_FILE)).unwrap();
        fs::remove_dir_all(&dir).ok();

        assert_eq!(ranked, ",0,1,2\n0,2,0,1\n1,1,1,2\n");
        assert_eq!(query, ",0\n0,2\n1,1\n");
    }

    #[test]
    fn test_code_tables_align_codes_and_labels() {
        let dir = std::env::temp_dir().join(format!("cellhash-export-{}", Uuid::new_v4()));
        let database =
            CodeBuffer::new(arr2(&[[0.5, -1.0], [1.0, 0.25], [-0.75, 0.0]]), vec![1, 0, 2]).unwrap();
        let query = CodeBuffer::new(arr2(&[[1.0, -0.5]]), vec![2]).unwrap();
        write_code_tables(&dir, &database, &query).unwrap();

        let read = |name: &str| fs::read_to_string(dir.join(name)).unwrap();
        let database_codes = read(DATABASE_CODES_FILE);
        let database_labels = read(DATABASE_LABELS_FILE);
        let query_codes = read(QUERY_CODES_FILE);
        let query_labels = read(TEST_LABELS_FILE);
        fs::remove_dir_all(&dir).ok();

        assert_eq!(database_codes, ",0,1\n0,0.5,-1\n1,1,0.25\n2,-0.75,0\n");
        assert_eq!(database_labels, ",0\n0,1\n1,0\n2,2\n");
        assert_eq!(query_codes, ",0,1\n0,1,-0.5\n");
        assert_eq!(query_labels, ",0\n0,2\n");
    }

    #[test]
    fn test_code_tables_reject_mixed_bits() {
        let dir = std::env::temp_dir().join(format!("cellhash-export-{}", Uuid::new_v4()));
        let database = CodeBuffer::new(Array2::zeros((2, 4)), vec![0, 1]).unwrap();
        let query = CodeBuffer::new(Array2::zeros((1, 8)), vec![0]).unwrap();
        let err = write_code_tables(&dir, &database, &query).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(!dir.exists());
    }

    #[test]
    fn test_row_count_mismatch() {
        let dir = std::env::temp_dir().join(format!("cellhash-export-{}", Uuid::new_v4()));
        let err = write_retrieval_results(&dir, &[vec![0]], &[0, 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(!dir.exists());
    }
}
