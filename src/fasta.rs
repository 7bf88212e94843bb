//! Minimal multi-FASTA reader, grounded on `fasta.h`'s `FASTA::File`
//! interface: a `>name` header line followed by sequence lines, concatenated
//! until the next header or end of file. Just enough to feed
//! [`crate::naive_index::NaiveIndex`] and the BGRT builder end to end —
//! not a general-purpose FASTA toolkit.

use std::io::BufRead;

#[derive(Debug, thiserror::Error)]
pub enum FastaError {
    #[error("sequence data before the first '>' header")]
    DataBeforeHeader,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One FASTA record: header name (text after `>`, up to the first
/// whitespace) and concatenated, whitespace-stripped sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub sequence: String,
}

/// Parse every record out of `reader`.
pub fn read_all(reader: impl BufRead) -> Result<Vec<Record>, FastaError> {
    let mut records = Vec::new();
    let mut current: Option<Record> = None;

    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end();
        if let Some(header) = line.strip_prefix('>') {
            if let Some(record) = current.take() {
                records.push(record);
            }
            let name = header.split_whitespace().next().unwrap_or("").to_owned();
            current = Some(Record { name, sequence: String::new() });
        } else if !line.trim().is_empty() {
            match current.as_mut() {
                Some(record) => record.sequence.push_str(line.trim()),
                None => return Err(FastaError::DataBeforeHeader),
            }
        }
    }
    if let Some(record) = current.take() {
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_records_with_wrapped_sequence() {
        let input = ">seq1 some comment\nAAAA\nCCCC\n>seq2\nGGGGTTTT\n";
        let records = read_all(input.as_bytes()).unwrap();
        assert_eq!(records, vec![
            Record { name: "seq1".to_owned(), sequence: "AAAACCCC".to_owned() },
            Record { name: "seq2".to_owned(), sequence: "GGGGTTTT".to_owned() },
        ]);
    }

    #[test]
    fn rejects_data_before_any_header() {
        assert!(read_all("AAAA\n".as_bytes()).is_err());
    }

    #[test]
    fn empty_input_yields_no_records() {
        assert!(read_all("".as_bytes()).unwrap().is_empty());
    }
}
