//! Line-oriented parser for CLSF sources
//! Converts significant source lines into typed records

use crate::ast::*;
use crate::lexer::{self, Token};
use cgmath::{Point3, Vector3};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("malformed {keyword} record at line {line}: {message}")]
    MalformedRecord {
        line: usize,
        keyword: String,
        message: String,
    },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::MalformedRecord { line, .. } => *line,
        }
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

fn malformed(line: usize, keyword: &str, message: impl Into<String>) -> ParseError {
    ParseError::MalformedRecord {
        line,
        keyword: keyword.to_string(),
        message: message.into(),
    }
}

/// A significant source line, with its 1-based physical line number
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceLine<'a> {
    pub line: usize,
    pub text: &'a str,
}

/// Drop decorative lines and trailing `$` annotations.
///
/// Lines mentioning `PAINT` are display directives for the CAM system and are
/// removed entirely; lines that are empty after stripping are not significant.
pub fn preprocess(source: &str) -> Vec<SourceLine<'_>> {
    source
        .lines()
        .enumerate()
        .filter(|(_, raw)| !raw.contains("PAINT"))
        .filter_map(|(index, raw)| {
            let text = raw.split('$').next().unwrap_or("").trim();
            (!text.is_empty()).then_some(SourceLine {
                line: index + 1,
                text,
            })
        })
        .collect()
}

/// Split `KEYWORD/operands` into its keyword and operand text.
fn split_keyword(text: &str) -> (&str, &str) {
    match text.split_once('/') {
        Some((keyword, operands)) => (keyword.trim(), operands),
        None => (text.trim(), ""),
    }
}

pub struct Parser<'a> {
    lines: Vec<SourceLine<'a>>,
    position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lines: preprocess(source),
            position: 0,
        }
    }

    /// Parse every significant line into records
    pub fn parse(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(self.lines.len());

        while let Some(current) = self.lines.get(self.position).copied() {
            let (keyword, body) = split_keyword(current.text);

            let (record, consumed) = match keyword {
                "TOOL PATH" => self.parse_tool_path(current, body)?,
                "GOTO" => (parse_goto(current.line, body)?, 1),
                "CIRCLE" => (parse_circle(current.line, body)?, 1),
                "FEDRAT" => (parse_fedrat(current.line, body)?, 1),
                "LOAD" => (parse_load(current.line, body)?, 1),
                "RAPID" => (untyped(current.line, RecordKind::Rapid), 1),
                "END-OF-PATH" => (untyped(current.line, RecordKind::EndOfPath), 1),
                "TLDATA" => (untyped(current.line, RecordKind::ToolData), 1),
                other => {
                    let kind = RecordKind::Other {
                        keyword: other.to_string(),
                        text: body.trim().to_string(),
                    };
                    (untyped(current.line, kind), 1)
                }
            };

            records.push(record);
            self.position += consumed;
        }

        Ok(records)
    }

    /// `TOOL PATH` carries its tool data inline, or on a following `TLDATA`
    /// line. Returns the record and the number of lines it consumed.
    fn parse_tool_path(&self, first: SourceLine<'a>, body: &str) -> Result<(Record, usize)> {
        const KEYWORD: &str = "TOOL PATH";

        // Operation and tool names are free text; only inline tool data is lexed
        let mut fields = body.splitn(4, ',').map(str::trim);
        let operation = required_field(fields.next(), first.line, KEYWORD, "operation name")?;
        let marker = fields.next().unwrap_or_default();
        let name = required_field(fields.next(), first.line, KEYWORD, "tool name")?;

        let mut operands = vec![
            Operand::Word(operation.clone()),
            Operand::Word(marker.to_string()),
            Operand::Word(name.clone()),
        ];
        if let Some(data) = fields.next() {
            operands.extend(parse_operands(first.line, KEYWORD, data)?);
        }

        let continuation = self
            .lines
            .get(self.position + 1)
            .copied()
            .filter(|next| split_keyword(next.text).0 == "TLDATA");

        let (tool, span) = match continuation {
            Some(next) => {
                let data = parse_operands(next.line, "TLDATA", split_keyword(next.text).1)?;
                (tool_spec(name, &data, 0, next.line, "TLDATA")?, 2)
            }
            None => (tool_spec(name, &operands, 3, first.line, KEYWORD)?, 1),
        };

        let record = Record {
            line: first.line,
            kind: RecordKind::ToolPath(ToolPath {
                operation,
                tool,
                span,
            }),
            operands,
        };
        Ok((record, span))
    }
}

/// Parse a whole CLSF source into records
pub fn parse(source: &str) -> Result<Vec<Record>> {
    Parser::new(source).parse()
}

fn parse_goto(line: usize, body: &str) -> Result<Record> {
    let operands = parse_operands(line, "GOTO", body)?;
    let values = numeric_operands(&operands, line, "GOTO")?;

    let coordinate = match values.as_slice() {
        [x, y, z] => Coordinate::new(Point3::new(*x, *y, *z), None),
        [x, y, z, i, j, k, ..] => {
            Coordinate::new(Point3::new(*x, *y, *z), Some(Vector3::new(*i, *j, *k)))
        }
        _ => {
            return Err(malformed(
                line,
                "GOTO",
                format!("expected 3 or 6 coordinates, found {}", values.len()),
            ))
        }
    };

    Ok(Record {
        line,
        kind: RecordKind::GoTo(coordinate),
        operands,
    })
}

fn parse_circle(line: usize, body: &str) -> Result<Record> {
    let operands = parse_operands(line, "CIRCLE", body)?;
    let values = numeric_operands(&operands, line, "CIRCLE")?;

    let circle = match values.as_slice() {
        [x, y, z, _, _, _, radius, ..] => Circle {
            center: Point3::new(*x, *y, *z),
            radius: *radius,
        },
        _ => {
            return Err(malformed(
                line,
                "CIRCLE",
                format!("expected at least 7 values, found {}", values.len()),
            ))
        }
    };

    if !(circle.radius.is_finite() && circle.radius > 0.0) {
        return Err(malformed(
            line,
            "CIRCLE",
            format!("radius must be positive, got {}", circle.radius),
        ));
    }

    Ok(Record {
        line,
        kind: RecordKind::Circle(circle),
        operands,
    })
}

fn parse_fedrat(line: usize, body: &str) -> Result<Record> {
    let operands = parse_operands(line, "FEDRAT", body)?;
    let feed = operands
        .iter()
        .find_map(Operand::as_number)
        .ok_or_else(|| malformed(line, "FEDRAT", "missing feed value"))?;

    Ok(Record {
        line,
        kind: RecordKind::FedRat { feed },
        operands,
    })
}

fn parse_load(line: usize, body: &str) -> Result<Record> {
    let operands = parse_operands(line, "LOAD", body)?;
    let kind = match operands.first().and_then(Operand::as_word) {
        Some("TOOL") => RecordKind::LoadTool,
        _ => RecordKind::Other {
            keyword: "LOAD".to_string(),
            text: body.trim().to_string(),
        },
    };

    Ok(Record {
        line,
        kind,
        operands,
    })
}

/// Records the emitter only passes over. Their operands are never lexed.
fn untyped(line: usize, kind: RecordKind) -> Record {
    Record {
        line,
        kind,
        operands: Vec::new(),
    }
}

/// Operand list grammar: `operand (',' operand)*`, where an operand is a
/// single number or a run of words.
fn parse_operands(line: usize, keyword: &str, body: &str) -> Result<Vec<Operand>> {
    let tokens = lexer::lex(body).map_err(|span| {
        malformed(
            line,
            keyword,
            format!("unexpected {:?} in operand list", &body[span]),
        )
    })?;

    let mut operands = Vec::new();
    let mut current: Option<Operand> = None;

    for (token, _) in tokens {
        match token {
            Token::Comma => {
                let operand = current
                    .take()
                    .ok_or_else(|| malformed(line, keyword, "empty operand"))?;
                operands.push(operand);
            }
            Token::Number(None) => return Err(malformed(line, keyword, "invalid number")),
            Token::Number(Some(n)) => {
                if current.is_some() {
                    return Err(malformed(line, keyword, format!("missing ',' before {}", n)));
                }
                current = Some(Operand::Number(n));
            }
            Token::Word(word) => match current.as_mut() {
                None => current = Some(Operand::Word(word)),
                Some(Operand::Word(existing)) => {
                    existing.push(' ');
                    existing.push_str(&word);
                }
                Some(Operand::Number(_)) => {
                    return Err(malformed(line, keyword, format!("missing ',' before {}", word)))
                }
            },
        }
    }

    match current {
        Some(operand) => operands.push(operand),
        None if !operands.is_empty() => {
            return Err(malformed(line, keyword, "trailing ',' in operand list"))
        }
        None => {}
    }

    Ok(operands)
}

fn numeric_operands(operands: &[Operand], line: usize, keyword: &str) -> Result<Vec<f64>> {
    operands
        .iter()
        .enumerate()
        .map(|(index, operand)| {
            operand.as_number().ok_or_else(|| {
                malformed(
                    line,
                    keyword,
                    format!("operand {} ({}) is not a number", index + 1, operand),
                )
            })
        })
        .collect()
}

fn required_field(field: Option<&str>, line: usize, keyword: &str, what: &str) -> Result<String> {
    match field {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(malformed(line, keyword, format!("missing {}", what))),
    }
}

fn required_text(
    operands: &[Operand],
    index: usize,
    line: usize,
    keyword: &str,
    what: &str,
) -> Result<String> {
    operands
        .get(index)
        .map(|operand| operand.to_string())
        .ok_or_else(|| malformed(line, keyword, format!("missing {} (operand {})", what, index + 1)))
}

fn required_number(
    operands: &[Operand],
    index: usize,
    line: usize,
    keyword: &str,
    what: &str,
) -> Result<f64> {
    match operands.get(index) {
        Some(Operand::Number(n)) => Ok(*n),
        Some(other) => Err(malformed(
            line,
            keyword,
            format!("{} (operand {}) is not a number: {}", what, index + 1, other),
        )),
        None => Err(malformed(
            line,
            keyword,
            format!("missing {} (operand {})", what, index + 1),
        )),
    }
}

/// Tool data starting at `offset`: kind, diameter, lower radius, taper, tip.
fn tool_spec(
    name: String,
    operands: &[Operand],
    offset: usize,
    line: usize,
    keyword: &str,
) -> Result<ToolSpec> {
    Ok(ToolSpec {
        name,
        kind: required_text(operands, offset, line, keyword, "tool type")?,
        diameter: required_number(operands, offset + 1, line, keyword, "diameter")?,
        lower_radius: required_number(operands, offset + 2, line, keyword, "lower radius")?,
        taper_angle: required_number(operands, offset + 3, line, keyword, "taper angle")?,
        tip_angle: required_number(operands, offset + 4, line, keyword, "tip angle")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_drops_paint_and_annotations() {
        let source = "$$ header comment\nPAINT/COLOR,186\nGOTO/1.0,2.0,3.0 $ trailing\n\n  RAPID  \n";
        let lines = preprocess(source);

        assert_eq!(
            lines,
            vec![
                SourceLine { line: 3, text: "GOTO/1.0,2.0,3.0" },
                SourceLine { line: 5, text: "RAPID" },
            ]
        );
    }

    #[test]
    fn test_two_line_tool_path() {
        let source = "TOOL PATH/CAVITY_MILL,TOOL,MILL\nTLDATA/MILL,0.5000,0.0300,0.0000,0.0000,2.0000\nLOAD/TOOL,1\n";
        let records = parse(source).expect("parse failed");

        assert_eq!(records.len(), 2);
        match &records[0].kind {
            RecordKind::ToolPath(path) => {
                assert_eq!(path.operation, "CAVITY_MILL");
                assert_eq!(path.span, 2);
                assert_eq!(path.tool.name, "MILL");
                assert_eq!(path.tool.kind, "MILL");
                assert_eq!(path.tool.diameter, 0.5);
                assert_eq!(path.tool.lower_radius, 0.03);
            }
            other => panic!("expected tool path, got {:?}", other),
        }
        assert_eq!(records[1].kind, RecordKind::LoadTool);
        assert_eq!(records[1].line, 3);
    }

    #[test]
    fn test_one_line_tool_path() {
        let source = "TOOL PATH/FACE,TOOL,BALL_MILL,MILL,0.2500,0.1250,0.0000,0.0000\nGOTO/0,0,1\n";
        let records = parse(source).expect("parse failed");

        match &records[0].kind {
            RecordKind::ToolPath(path) => {
                assert_eq!(path.span, 1);
                assert_eq!(path.tool.name, "BALL_MILL");
                assert_eq!(path.tool.diameter, 0.25);
                assert_eq!(path.tool.lower_radius, 0.125);
            }
            other => panic!("expected tool path, got {:?}", other),
        }
        assert!(matches!(records[1].kind, RecordKind::GoTo(_)));
    }

    #[test]
    fn test_goto_with_and_without_direction() {
        let records = parse("GOTO/1.0,2.0,3.0\nGOTO/1.0,2.0,3.0,0.0,0.7071068,0.7071068\n")
            .expect("parse failed");

        match (&records[0].kind, &records[1].kind) {
            (RecordKind::GoTo(a), RecordKind::GoTo(b)) => {
                assert_eq!(a.direction, None);
                assert_eq!(b.position, Point3::new(1.0, 2.0, 3.0));
                assert_eq!(b.direction, Some(Vector3::new(0.0, 0.7071068, 0.7071068)));
            }
            other => panic!("expected two gotos, got {:?}", other),
        }
    }

    #[test]
    fn test_fedrat_and_circle() {
        let records = parse("FEDRAT/IPM,12.5\nCIRCLE/1.0,1.0,0.0,0.0,0.0,1.0,0.5,0.001,0.25\n")
            .expect("parse failed");

        assert_eq!(records[0].kind, RecordKind::FedRat { feed: 12.5 });
        assert_eq!(
            records[1].kind,
            RecordKind::Circle(Circle {
                center: Point3::new(1.0, 1.0, 0.0),
                radius: 0.5,
            })
        );
    }

    #[test]
    fn test_orphan_tldata_and_other() {
        let records = parse("TLDATA/MILL,0.5\nMSYS/0,0,0,1,0,0,0,1,0\nEND-OF-PATH\n").expect("parse failed");

        assert_eq!(records[0].kind, RecordKind::ToolData);
        assert_eq!(
            records[1].kind,
            RecordKind::Other {
                keyword: "MSYS".to_string(),
                text: "0,0,0,1,0,0,0,1,0".to_string(),
            }
        );
        assert_eq!(records[2].kind, RecordKind::EndOfPath);
    }

    #[test]
    fn test_other_records_are_not_lexed() {
        let records = parse("SELECT/#3,,12AB\nGOTO/0,0,1\n").expect("parse failed");

        assert_eq!(
            records[0].kind,
            RecordKind::Other {
                keyword: "SELECT".to_string(),
                text: "#3,,12AB".to_string(),
            }
        );
        assert!(records[0].operands.is_empty());
        assert!(matches!(records[1].kind, RecordKind::GoTo(_)));
    }

    #[test]
    fn test_tool_path_names_are_free_text() {
        let source = "TOOL PATH/5AXIS_FINISH,TOOL,12MM_BALL\nTLDATA/MILL,0.5,0,0,0\n\
                      TOOL PATH/SLOT #2,TOOL,EM#2,MILL,0.25,0,0,0\n";
        let records = parse(source).expect("parse failed");

        match (&records[0].kind, &records[1].kind) {
            (RecordKind::ToolPath(first), RecordKind::ToolPath(second)) => {
                assert_eq!(first.operation, "5AXIS_FINISH");
                assert_eq!(first.tool.name, "12MM_BALL");
                assert_eq!(second.operation, "SLOT #2");
                assert_eq!(second.tool.name, "EM#2");
                assert_eq!(second.tool.diameter, 0.25);
            }
            other => panic!("expected two tool paths, got {:?}", other),
        }
    }

    #[test]
    fn test_tool_path_without_tool_name() {
        let err = parse("TOOL PATH/ROUGH,TOOL\n").unwrap_err();
        assert_eq!(err.line(), 1);
        assert!(err.to_string().contains("tool name"));
    }

    #[test]
    fn test_malformed_number_reports_line() {
        let err = parse("RAPID\nGOTO/1.0,2.0.5,3.0\n").unwrap_err();
        assert_eq!(err.line(), 2);
        assert!(err.to_string().contains("GOTO"));
    }

    #[test]
    fn test_wrong_coordinate_count() {
        let err = parse("GOTO/1.0,2.0,3.0,0.0\n").unwrap_err();
        assert!(err.to_string().contains("expected 3 or 6 coordinates"));
    }

    #[test]
    fn test_word_in_numeric_record() {
        let err = parse("\nCIRCLE/1.0,X,0.0,0.0,0.0,1.0,0.5\n").unwrap_err();
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn test_zero_radius_rejected() {
        let err = parse("CIRCLE/1.0,1.0,0.0,0.0,0.0,1.0,0.0\n").unwrap_err();
        assert!(err.to_string().contains("radius"));
    }

    #[test]
    fn test_truncated_tool_data() {
        let err = parse("TOOL PATH/OP,TOOL,MILL\nTLDATA/MILL,0.5\n").unwrap_err();
        assert_eq!(err.line(), 2);
        assert!(err.to_string().contains("lower radius"));
    }
}
