//! Write statements with named or positional placeholders.
//!
//! Jobs write with statements such as
//! `INSERT INTO addresses (id, city) VALUES (:id, :city)`. Placeholders are
//! rewritten once to the target's native positional syntax, and every record
//! is then bound by looking its columns up by name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::record::Record;
use crate::core::value::{Param, ValueType};
use crate::error::{EtlError, Result};
use crate::schema::NameCase;

/// Native placeholder syntax of a target database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1, $2, ...` (PostgreSQL).
    Dollar,
    /// `@P1, @P2, ...` (SQL Server).
    AtP,
}

impl PlaceholderStyle {
    fn render(&self, position: usize) -> String {
        match self {
            PlaceholderStyle::Dollar => format!("${}", position),
            PlaceholderStyle::AtP => format!("@P{}", position),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Binding {
    /// Distinct normalized names in placeholder order.
    Named(Vec<String>),
    /// Number of `?` placeholders, bound from record columns in order.
    Positional(usize),
}

/// Piece of a statement between and at placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    /// 1-based parameter position.
    Param(usize),
    /// A `?` whose meaning is settled once the whole statement is read.
    Question,
}

/// A parsed write statement.
#[derive(Debug, Clone)]
pub struct WriteStatement {
    style: PlaceholderStyle,
    segments: Vec<Segment>,
    sql: String,
    binding: Binding,
}

impl WriteStatement {
    /// Parse `sql` and rewrite its placeholders to `style`.
    ///
    /// Named placeholders are folded with `case`, the same folding applied to
    /// discovered column names. A statement may use named or positional
    /// placeholders, not both. For PostgreSQL, `?` in a statement with named
    /// placeholders is left alone so the jsonb operators `?`, `?|` and `?&`
    /// keep working; `[...]` is only an identifier quote for SQL Server.
    pub fn parse(sql: &str, style: PlaceholderStyle, case: NameCase) -> Result<Self> {
        let chars: Vec<char> = sql.chars().collect();
        let mut segments: Vec<Segment> = Vec::new();
        let mut text = String::with_capacity(sql.len());
        let mut names: Vec<String> = Vec::new();
        let mut questions = 0usize;
        let mut i = 0;

        let mut placeholder = |text: &mut String, segment: Segment| {
            if !text.is_empty() {
                segments.push(Segment::Text(std::mem::take(text)));
            }
            segments.push(segment);
        };

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();
            match c {
                '\'' | '"' => {
                    let end = find_closing(&chars, i + 1, c).ok_or_else(|| {
                        EtlError::Statement(format!("unterminated {} at offset {}", quote_kind(c), i))
                    })?;
                    text.extend(&chars[i..=end]);
                    i = end + 1;
                }
                '[' if style == PlaceholderStyle::AtP => {
                    let end = find_closing(&chars, i + 1, ']').unwrap_or(chars.len() - 1);
                    text.extend(&chars[i..=end]);
                    i = end + 1;
                }
                '-' if next == Some('-') => {
                    let end = chars[i..]
                        .iter()
                        .position(|&ch| ch == '\n')
                        .map_or(chars.len(), |p| i + p);
                    text.extend(&chars[i..end]);
                    i = end;
                }
                '/' if next == Some('*') => {
                    let end = find_block_comment_end(&chars, i + 2).ok_or_else(|| {
                        EtlError::Statement(format!("unterminated comment at offset {}", i))
                    })?;
                    text.extend(&chars[i..end]);
                    i = end;
                }
                ':' if next == Some(':') => {
                    text.push_str("::");
                    i += 2;
                }
                ':' if next.is_some_and(is_ident_start) => {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len() && is_ident_char(chars[end]) {
                        end += 1;
                    }
                    let raw: String = chars[start..end].iter().collect();
                    let name = case.apply(&raw);
                    let position = match names.iter().position(|n| *n == name) {
                        Some(p) => p + 1,
                        None => {
                            names.push(name);
                            names.len()
                        }
                    };
                    placeholder(&mut text, Segment::Param(position));
                    i = end;
                }
                '?' => {
                    questions += 1;
                    placeholder(&mut text, Segment::Question);
                    i += 1;
                }
                _ => {
                    text.push(c);
                    i += 1;
                }
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        let binding = match (names.is_empty(), questions, style) {
            (true, n, _) => Binding::Positional(n),
            (false, 0, _) | (false, _, PlaceholderStyle::Dollar) => Binding::Named(names),
            (false, _, PlaceholderStyle::AtP) => {
                return Err(EtlError::Statement(
                    "cannot mix named (:name) and positional (?) placeholders".into(),
                ))
            }
        };

        let mut position = 0;
        for segment in &mut segments {
            if *segment == Segment::Question {
                *segment = match binding {
                    Binding::Positional(_) => {
                        position += 1;
                        Segment::Param(position)
                    }
                    Binding::Named(_) => Segment::Text("?".to_string()),
                };
            }
        }

        let mut statement = Self {
            style,
            segments,
            sql: String::new(),
            binding,
        };
        statement.sql = statement.render(0);
        Ok(statement)
    }

    /// Statement text with native placeholders.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Statement text with every placeholder position moved up by `offset`.
    ///
    /// Used to stack several rows' statements into one call.
    pub fn render(&self, offset: usize) -> String {
        let mut out = String::with_capacity(self.sql.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Param(position) => out.push_str(&self.style.render(position + offset)),
                Segment::Question => out.push('?'),
            }
        }
        out
    }

    /// Normalized parameter names, empty for positional statements.
    pub fn parameters(&self) -> &[String] {
        match &self.binding {
            Binding::Named(names) => names,
            Binding::Positional(_) => &[],
        }
    }

    /// Number of distinct parameters bound per row.
    pub fn parameter_count(&self) -> usize {
        match &self.binding {
            Binding::Named(names) => names.len(),
            Binding::Positional(n) => *n,
        }
    }

    /// Bind a chunk of records.
    ///
    /// Every value is bound with the type `types` holds for its column, not the
    /// value's own runtime type, so NULLs are bound as typed NULLs. Columns the
    /// statement does not reference are ignored.
    pub fn bind(
        &self,
        records: &[Record],
        types: &HashMap<String, ValueType>,
    ) -> Result<Vec<Vec<Param>>> {
        let mut header: Option<&Arc<[String]>> = None;
        let mut slots = Vec::new();
        let mut rows = Vec::with_capacity(records.len());

        for record in records {
            if !header.is_some_and(|h| Arc::ptr_eq(h, record.columns())) {
                slots = self.plan(record.columns(), types)?;
                header = Some(record.columns());
            }

            let values = record.values();
            let row = slots
                .iter()
                .map(|slot| {
                    let value = values[slot.index].clone();
                    let actual = value.value_type();
                    value
                        .coerce_to(slot.ty)
                        .map(|value| Param { ty: slot.ty, value })
                        .ok_or_else(|| EtlError::TypeMismatch {
                            column: slot.column.clone(),
                            expected: slot.ty.to_string(),
                            actual: actual.map_or("null", |t| t.name()).to_string(),
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            rows.push(row);
        }

        Ok(rows)
    }

    /// Resolve each parameter to a record position and declared type.
    fn plan(&self, columns: &[String], types: &HashMap<String, ValueType>) -> Result<Vec<Slot>> {
        let lookup = |column: &str, index: usize| -> Result<Slot> {
            let ty = types
                .get(column)
                .copied()
                .ok_or_else(|| EtlError::TypeResolution {
                    column: column.to_string(),
                    native_type: "unregistered".to_string(),
                })?;
            Ok(Slot {
                index,
                ty,
                column: column.to_string(),
            })
        };

        match &self.binding {
            Binding::Named(names) => names
                .iter()
                .map(|name| {
                    let index = columns
                        .iter()
                        .position(|c| c == name)
                        .ok_or_else(|| EtlError::UnboundParameter {
                            name: format!(":{}", name),
                        })?;
                    lookup(name, index)
                })
                .collect(),
            Binding::Positional(count) => (0..*count)
                .map(|index| {
                    let column = columns.get(index).ok_or_else(|| EtlError::UnboundParameter {
                        name: format!("?{}", index + 1),
                    })?;
                    lookup(column, index)
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    index: usize,
    ty: ValueType,
    column: String,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn quote_kind(c: char) -> &'static str {
    if c == '\'' {
        "string literal"
    } else {
        "quoted identifier"
    }
}

/// Index of the next `close` at or after `from`.
fn find_closing(chars: &[char], from: usize, close: char) -> Option<usize> {
    chars[from..].iter().position(|&c| c == close).map(|p| from + p)
}

/// Index just past the `*/` ending a block comment whose body starts at `from`.
fn find_block_comment_end(chars: &[char], from: usize) -> Option<usize> {
    (from..chars.len().saturating_sub(1))
        .find(|&i| chars[i] == '*' && chars[i + 1] == '/')
        .map(|i| i + 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::SqlValue;

    fn parse(sql: &str, style: PlaceholderStyle) -> WriteStatement {
        WriteStatement::parse(sql, style, NameCase::Upper).unwrap()
    }

    fn types(entries: &[(&str, ValueType)]) -> HashMap<String, ValueType> {
        entries.iter().map(|(n, t)| (n.to_string(), *t)).collect()
    }

    fn record(names: &[&str], values: Vec<SqlValue>) -> Record {
        let header: Arc<[String]> = names.iter().map(|n| n.to_string()).collect();
        Record::new(header, values)
    }

    #[test]
    fn test_named_placeholders_postgres() {
        let stmt = parse(
            "INSERT INTO t (id, name) VALUES (:id, :name)",
            PlaceholderStyle::Dollar,
        );
        assert_eq!(stmt.sql(), "INSERT INTO t (id, name) VALUES ($1, $2)");
        assert_eq!(stmt.parameters(), &["ID".to_string(), "NAME".to_string()]);
    }

    #[test]
    fn test_named_placeholders_mssql() {
        let stmt = parse("UPDATE t SET a = :a WHERE id = :id", PlaceholderStyle::AtP);
        assert_eq!(stmt.sql(), "UPDATE t SET a = @P1 WHERE id = @P2");
    }

    #[test]
    fn test_repeated_name_reuses_position() {
        let stmt = parse(
            "INSERT INTO t VALUES (:id, :name) ON CONFLICT DO UPDATE SET id = :id",
            PlaceholderStyle::Dollar,
        );
        assert_eq!(
            stmt.sql(),
            "INSERT INTO t VALUES ($1, $2) ON CONFLICT DO UPDATE SET id = $1"
        );
        assert_eq!(stmt.parameter_count(), 2);
    }

    #[test]
    fn test_literals_casts_and_comments_are_skipped() {
        let stmt = parse(
            "INSERT INTO t VALUES (:ts, ':not', \"a:b\", [c:d]) -- :gone\n/* :also */",
            PlaceholderStyle::AtP,
        );
        assert_eq!(
            stmt.sql(),
            "INSERT INTO t VALUES (@P1, ':not', \"a:b\", [c:d]) -- :gone\n/* :also */"
        );
        assert_eq!(stmt.parameters(), &["TS".to_string()]);
    }

    #[test]
    fn test_positional_placeholders() {
        let stmt = parse("INSERT INTO t VALUES (?, ?)", PlaceholderStyle::AtP);
        assert_eq!(stmt.sql(), "INSERT INTO t VALUES (@P1, @P2)");
        assert!(stmt.parameters().is_empty());
        assert_eq!(stmt.parameter_count(), 2);
    }

    #[test]
    fn test_postgres_cast_is_not_a_placeholder() {
        let stmt = parse("INSERT INTO t VALUES (:ts::timestamp)", PlaceholderStyle::Dollar);
        assert_eq!(stmt.sql(), "INSERT INTO t VALUES ($1::timestamp)");
    }

    #[test]
    fn test_postgres_array_brackets_hold_placeholders() {
        let stmt = parse(
            "INSERT INTO t (id, tags) VALUES (:id, ARRAY[:a, :b])",
            PlaceholderStyle::Dollar,
        );
        assert_eq!(stmt.sql(), "INSERT INTO t (id, tags) VALUES ($1, ARRAY[$2, $3])");
        assert_eq!(
            stmt.parameters(),
            &["ID".to_string(), "A".to_string(), "B".to_string()]
        );

        let stmt = parse("UPDATE t SET tags[1] = :tag WHERE id = :id", PlaceholderStyle::Dollar);
        assert_eq!(stmt.sql(), "UPDATE t SET tags[1] = $1 WHERE id = $2");
    }

    #[test]
    fn test_jsonb_operators_kept_next_to_named_placeholders() {
        let stmt = parse(
            "INSERT INTO t SELECT :id, :doc WHERE :doc::jsonb ? 'k' AND :doc::jsonb ?| array['a'] AND :doc::jsonb ?& array['b']",
            PlaceholderStyle::Dollar,
        );
        assert_eq!(
            stmt.sql(),
            "INSERT INTO t SELECT $1, $2 WHERE $2::jsonb ? 'k' AND $2::jsonb ?| array['a'] AND $2::jsonb ?& array['b']"
        );
        assert_eq!(stmt.parameter_count(), 2);
    }

    #[test]
    fn test_mixed_placeholders_rejected_for_sql_server() {
        let err = WriteStatement::parse(
            "INSERT INTO t VALUES (:a, ?)",
            PlaceholderStyle::AtP,
            NameCase::Upper,
        )
        .unwrap_err();
        assert!(matches!(err, EtlError::Statement(_)));
    }

    #[test]
    fn test_render_shifts_positions() {
        let stmt = parse("INSERT INTO t VALUES (:a, :b, :a)", PlaceholderStyle::AtP);
        assert_eq!(stmt.render(0), stmt.sql());
        assert_eq!(stmt.render(2), "INSERT INTO t VALUES (@P3, @P4, @P3)");

        let stmt = parse("INSERT INTO t VALUES (?, ?)", PlaceholderStyle::Dollar);
        assert_eq!(stmt.render(4), "INSERT INTO t VALUES ($5, $6)");
    }

    #[test]
    fn test_unterminated_literal_rejected() {
        let err = WriteStatement::parse(
            "INSERT INTO t VALUES ('oops, :a)",
            PlaceholderStyle::Dollar,
            NameCase::Upper,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unterminated string literal"));
    }

    #[test]
    fn test_lowercase_names() {
        let stmt = WriteStatement::parse(
            "INSERT INTO t VALUES (:Id)",
            PlaceholderStyle::Dollar,
            NameCase::Lower,
        )
        .unwrap();
        assert_eq!(stmt.parameters(), &["id".to_string()]);
    }

    #[test]
    fn test_bind_ignores_unused_columns() {
        let stmt = parse("INSERT INTO t VALUES (:name)", PlaceholderStyle::Dollar);
        let types = types(&[("ID", ValueType::I32), ("NAME", ValueType::Text)]);
        let rows = stmt
            .bind(
                &[record(&["ID", "NAME"], vec![SqlValue::I32(1), SqlValue::from("a")])],
                &types,
            )
            .unwrap();
        assert_eq!(
            rows,
            vec![vec![Param {
                ty: ValueType::Text,
                value: SqlValue::from("a")
            }]]
        );
    }

    #[test]
    fn test_bind_null_uses_registry_type() {
        let stmt = parse("INSERT INTO t VALUES (:created)", PlaceholderStyle::Dollar);
        let types = types(&[("CREATED", ValueType::Timestamp)]);
        let rows = stmt
            .bind(&[record(&["CREATED"], vec![SqlValue::Null])], &types)
            .unwrap();
        assert_eq!(rows[0][0], Param::null(ValueType::Timestamp));
    }

    #[test]
    fn test_bind_missing_column_is_unbound() {
        let stmt = parse("INSERT INTO t VALUES (:id, :zip)", PlaceholderStyle::Dollar);
        let types = types(&[("ID", ValueType::I32)]);
        let err = stmt
            .bind(&[record(&["ID"], vec![SqlValue::I32(1)])], &types)
            .unwrap_err();
        assert!(matches!(err, EtlError::UnboundParameter { ref name } if name == ":ZIP"));
    }

    #[test]
    fn test_bind_unregistered_column_fails() {
        let stmt = parse("INSERT INTO t VALUES (:id)", PlaceholderStyle::Dollar);
        let err = stmt
            .bind(&[record(&["ID"], vec![SqlValue::I32(1)])], &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, EtlError::TypeResolution { .. }));
    }

    #[test]
    fn test_bind_value_type_mismatch() {
        let stmt = parse("INSERT INTO t VALUES (:id)", PlaceholderStyle::Dollar);
        let types = types(&[("ID", ValueType::I32)]);
        let err = stmt
            .bind(&[record(&["ID"], vec![SqlValue::from("one")])], &types)
            .unwrap_err();
        assert!(matches!(err, EtlError::TypeMismatch { .. }));
    }

    #[test]
    fn test_bind_positional_in_column_order() {
        let stmt = parse("INSERT INTO t VALUES (?, ?)", PlaceholderStyle::Dollar);
        let types = types(&[("A", ValueType::I64), ("B", ValueType::Bool)]);
        let header: Arc<[String]> = Arc::from(vec!["A".to_string(), "B".to_string()]);
        let records = vec![
            Record::new(header.clone(), vec![SqlValue::I64(1), SqlValue::Bool(true)]),
            Record::new(header, vec![SqlValue::I64(2), SqlValue::Null]),
        ];
        let rows = stmt.bind(&records, &types).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0].value, SqlValue::I64(2));
        assert_eq!(rows[1][1], Param::null(ValueType::Bool));
    }

    #[test]
    fn test_bind_positional_too_few_columns() {
        let stmt = parse("INSERT INTO t VALUES (?, ?)", PlaceholderStyle::Dollar);
        let types = types(&[("A", ValueType::I64)]);
        let err = stmt
            .bind(&[record(&["A"], vec![SqlValue::I64(1)])], &types)
            .unwrap_err();
        assert!(matches!(err, EtlError::UnboundParameter { ref name } if name == "?2"));
    }
}
