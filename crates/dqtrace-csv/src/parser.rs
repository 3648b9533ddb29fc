use winnow::ascii::line_ending;
use winnow::combinator::{alt, opt};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::token::take_while;
use winnow::{ModalResult, Parser};

use dqtrace_types::{CellValue, Dataset, LoadError};

use crate::CsvOptions;

fn make_cut_error(desc: &'static str) -> ErrMode<ContextError<StrContext>> {
    let mut e = ContextError::new();
    e.push(StrContext::Expected(StrContextValue::Description(desc)));
    ErrMode::Cut(e)
}

/// Parse a double-quoted field. `""` inside the quotes is an escaped quote.
fn quoted_field(input: &mut &str) -> ModalResult<String> {
    let _ = '"'.parse_next(input)?;
    let mut s = String::new();
    loop {
        let chunk = take_while(0.., |c: char| c != '"').parse_next(input)?;
        s.push_str(chunk);
        if input.is_empty() {
            return Err(make_cut_error("closing quote"));
        }
        let _ = '"'.parse_next(input)?;
        if input.starts_with('"') {
            let _ = '"'.parse_next(input)?;
            s.push('"');
        } else {
            break;
        }
    }
    Ok(s)
}

/// Parse a single field up to the next delimiter or line ending.
fn field(input: &mut &str, delimiter: char) -> ModalResult<String> {
    if input.starts_with('"') {
        return quoted_field.parse_next(input);
    }
    let raw = take_while(0.., |c: char| c != delimiter && c != '\n' && c != '\r')
        .parse_next(input)?;
    Ok(raw.to_string())
}

/// Parse one record: field ( delimiter field )* followed by `\n`, `\r\n`, `\r` or EOF.
fn record(input: &mut &str, delimiter: char) -> ModalResult<Vec<String>> {
    let mut fields = vec![field(input, delimiter)?];
    while opt(delimiter).parse_next(input)?.is_some() {
        fields.push(field(input, delimiter)?);
    }
    if !input.is_empty() && opt(alt((line_ending, "\r"))).parse_next(input)?.is_none() {
        return Err(make_cut_error("delimiter or end of line after field"));
    }
    Ok(fields)
}

fn is_blank(fields: &[String]) -> bool {
    fields.len() == 1 && fields[0].trim().is_empty()
}

/// Line number (1-based) of the byte at `consumed` in `text`.
fn line_of(text: &str, consumed: usize) -> usize {
    let prefix = &text[..consumed.min(text.len())];
    let bare_cr = prefix
        .match_indices('\r')
        .filter(|(i, _)| !text[i + 1..].starts_with('\n'))
        .count();
    prefix.matches('\n').count() + bare_cr + 1
}

/// Parse delimited text into a [`Dataset`].
///
/// The first non-blank record is the header. Short records are padded with
/// nulls; records with more fields than the header are a format error.
pub fn parse_csv_with(
    text: &str,
    tag: &str,
    options: &CsvOptions,
) -> std::result::Result<Dataset, LoadError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let total = text.len();
    let mut remaining = text;

    let mut header: Option<Vec<String>> = None;
    let mut records: Vec<Vec<CellValue>> = Vec::new();

    while !remaining.is_empty() {
        let line = line_of(text, total - remaining.len());
        let fields = record(&mut remaining, options.delimiter).map_err(|e| LoadError::Format {
            line: line_of(text, total - remaining.len()),
            message: e.to_string(),
        })?;
        if is_blank(&fields) {
            continue;
        }

        let Some(width) = header.as_ref().map(Vec::len) else {
            header = Some(check_header(fields, line)?);
            continue;
        };

        if fields.len() > width {
            return Err(LoadError::Format {
                line,
                message: format!("expected {} fields, found {}", width, fields.len()),
            });
        }
        let mut cells: Vec<CellValue> = fields.iter().map(|f| CellValue::infer(f)).collect();
        cells.resize(width, CellValue::Null);
        records.push(cells);
    }

    let header = header.ok_or_else(|| LoadError::Format {
        line: 1,
        message: "no header row".into(),
    })?;
    Dataset::from_rows(tag, header, records).map_err(|e| LoadError::Format {
        line: 1,
        message: e.to_string(),
    })
}

fn check_header(fields: Vec<String>, line: usize) -> std::result::Result<Vec<String>, LoadError> {
    let names: Vec<String> = fields.into_iter().map(|f| f.trim().to_string()).collect();
    for (i, name) in names.iter().enumerate() {
        if name.is_empty() {
            return Err(LoadError::Format {
                line,
                message: format!("header field {} is empty", i + 1),
            });
        }
        if names[..i].contains(name) {
            return Err(LoadError::Format {
                line,
                message: format!("duplicate column '{name}' in header"),
            });
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> std::result::Result<Dataset, LoadError> {
        parse_csv_with(text, "test", &CsvOptions::default())
    }

    #[test]
    fn quoted_field_with_escaped_quote() {
        let mut input = r#""say ""hi"", ok",rest"#;
        let s = quoted_field(&mut input).unwrap();
        assert_eq!(s, r#"say "hi", ok"#);
        assert_eq!(input, ",rest");
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let err = parse("name\n\"open\n").unwrap_err();
        assert!(matches!(err, LoadError::Format { .. }), "got {err:?}");
    }

    #[test]
    fn quoted_field_may_span_lines() {
        let ds = parse("note,age\n\"two\nlines\",3\nplain,4\n").unwrap();
        assert_eq!(ds.row_count(), 2);
        assert_eq!(
            ds.cell("note", 0).unwrap(),
            &CellValue::Text("two\nlines".into())
        );
    }

    #[test]
    fn garbage_after_quoted_field() {
        let err = parse("a,b\n\"x\"y,1\n").unwrap_err();
        match err {
            LoadError::Format { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn reports_line_of_long_record() {
        let err = parse("a,b\n1,2\n3,4,5\n").unwrap_err();
        assert_eq!(
            err,
            LoadError::Format {
                line: 3,
                message: "expected 2 fields, found 3".into()
            }
        );
    }

    #[test]
    fn bare_carriage_return_ends_a_record() {
        let ds = parse("a,b\r1,2\r3,4").unwrap();
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.cell("b", 1).unwrap(), &CellValue::Integer(4));

        let err = parse("a,b\r1,2\r3,4,5\r").unwrap_err();
        assert!(matches!(err, LoadError::Format { line: 3, .. }), "got {err:?}");
    }

    #[test]
    fn mixed_line_endings_count_lines_once() {
        let err = parse("a,b\r\n1,2\r3,4\n5,6,7\n").unwrap_err();
        assert!(matches!(err, LoadError::Format { line: 4, .. }), "got {err:?}");
    }

    #[test]
    fn header_checks() {
        assert!(matches!(parse("a,,c\n1,2,3\n"), Err(LoadError::Format { line: 1, .. })));
        assert!(matches!(parse("a,a\n1,2\n"), Err(LoadError::Format { line: 1, .. })));
        assert!(matches!(parse(""), Err(LoadError::Format { .. })));
    }
}
