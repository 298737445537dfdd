//! CSV ingestion with encoding and delimiter auto-detection.
//!
//! Turns raw upload bytes into row objects (`header -> string cell`) plus the
//! header list, which is exactly what the validation engine consumes.

use serde_json::{Map, Value};
use std::path::Path;

use crate::error::{CsvError, CsvResult};

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed records as JSON objects
    pub records: Vec<Value>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string. Unknown encodings fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text with an explicit delimiter.
///
/// Quoted fields may contain the delimiter. Missing trailing cells become
/// empty strings; extra cells are ignored; blank lines are skipped.
///
/// # Example
/// ```ignore
/// let result = parse_str("name;age\nAlice;30", ';', "utf-8")?;
/// assert_eq!(result.records[0]["age"], "30");
/// ```
pub fn parse_str(content: &str, delimiter: char, encoding: &str) -> CsvResult<ParseResult> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let delimiter_byte = u8::try_from(delimiter).map_err(|_| CsvError::ParseError {
        line: 1,
        message: format!("delimiter '{}' is not a single byte", delimiter),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_byte)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| to_parse_error(&e))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::NoHeaders);
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| to_parse_error(&e))?;
        if row.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        let mut obj = Map::new();
        for (i, header) in headers.iter().enumerate() {
            let cell = row.get(i).unwrap_or("");
            obj.insert(header.clone(), Value::String(cell.to_string()));
        }
        records.push(Value::Object(obj));
    }

    Ok(ParseResult {
        records,
        encoding: encoding.to_string(),
        delimiter,
        headers,
    })
}

fn to_parse_error(e: &csv::Error) -> CsvError {
    let line = e
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or_default();
    CsvError::ParseError {
        line,
        message: e.to_string(),
    }
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    parse_str(&content, delimiter, &encoding)
}

/// Parse CSV bytes with a caller-chosen delimiter and detected encoding.
pub fn parse_bytes_with_delimiter(bytes: &[u8], delimiter: char) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    parse_str(&content, delimiter, &encoding)
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_simple_csv() {
        let result = parse_str("name;age\nAlice;30\nBob;25", ';', "utf-8").unwrap();

        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0]["name"], "Alice");
        assert_eq!(result.records[0]["age"], "30");
        assert_eq!(result.records[1]["name"], "Bob");
        assert_eq!(result.headers, vec!["name", "age"]);
    }

    #[test]
    fn test_quoted_values_with_delimiter() {
        let csv = "name,city\n\"Doe, John\",\"Paris\"";
        let result = parse_str(csv, ',', "utf-8").unwrap();

        assert_eq!(result.records[0]["name"], "Doe, John");
        assert_eq!(result.records[0]["city"], "Paris");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let result = parse_str("a;b\n1;2\n\n3;4\n", ';', "utf-8").unwrap();
        assert_eq!(result.records.len(), 2);
    }

    #[test]
    fn test_missing_values() {
        let result = parse_str("a;b;c\n1;;3\n4", ';', "utf-8").unwrap();

        assert_eq!(result.records[0]["b"], "");
        assert_eq!(result.records[1]["a"], "4");
        assert_eq!(result.records[1]["c"], "");
    }

    #[test]
    fn test_extra_columns_ignored() {
        let result = parse_str("a;b\n1;2;3;4", ';', "utf-8").unwrap();

        assert_eq!(result.records[0]["b"], "2");
        assert_eq!(result.records[0].as_object().map(|o| o.len()), Some(2));
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(parse_str("", ';', "utf-8"), Err(CsvError::EmptyFile)));
        assert!(matches!(parse_str(" \n", ';', "utf-8"), Err(CsvError::EmptyFile)));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_bytes_auto(b"name;email\nAlice;a@x.com\nBob;b@x.com").unwrap();

        assert_eq!(result.delimiter, ';');
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.encoding, "utf-8");
    }

    #[test]
    fn test_bom_stripped() {
        let result = parse_bytes_auto(b"\xEF\xBB\xBFid,name\n1,Ann").unwrap();
        assert_eq!(result.headers[0], "id");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_parse_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "userId,email\n1,a@x.com\n").unwrap();

        let result = parse_file_auto(file.path()).unwrap();
        assert_eq!(result.headers, vec!["userId", "email"]);
        assert_eq!(result.records[0]["userId"], "1");
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            parse_file_auto("/definitely/not/here.csv"),
            Err(CsvError::IoError(_))
        ));
    }
}
