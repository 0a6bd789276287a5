// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of SeqVault.
//
// SeqVault is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// SeqVault is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with SeqVault. If not, see <https://www.gnu.org/licenses/>.

//! Parser for the statement subset understood by the in-memory cluster.
//!
//! ```text
//! SELECT (* | col, ...) FROM ks.table
//!     [WHERE cond (AND cond)*] [ALLOW FILTERING] [;]
//! cond   := col op operand | TOKEN(col, ...) op operand
//! op     := = | > | >= | < | <=
//! INSERT INTO ks.table (col, ...) VALUES (operand, ...) [;]
//! operand := ? | integer | 'text' | true | false | null
//! ```
//!
//! Identifiers are case-insensitive. `?` placeholders are numbered in order
//! of appearance.

use crate::{DriverError, DriverResult, Value};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(i64),
    Text(String),
    Symbol(char),
    Op(CmpOp),
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CmpOp {
    pub(crate) fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
        }
    }
}

/// Right-hand side of a condition or an inserted value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Param(usize),
    Literal(Value),
}

impl Operand {
    /// Resolve against bound parameters.
    pub(crate) fn resolve(&self, params: &[Option<Value>]) -> DriverResult<Value> {
        match self {
            Operand::Literal(v) => Ok(v.clone()),
            Operand::Param(i) => params
                .get(*i)
                .cloned()
                .flatten()
                .ok_or_else(|| DriverError::Bind(format!("parameter {i} is not bound"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Condition {
    Column {
        column: String,
        op: CmpOp,
        operand: Operand,
    },
    Token {
        columns: Vec<String>,
        op: CmpOp,
        operand: Operand,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Projection {
    All,
    Columns(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Select {
    pub keyspace: String,
    pub table: String,
    pub projection: Projection,
    pub conditions: Vec<Condition>,
    pub allow_filtering: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Insert {
    pub keyspace: String,
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Statement {
    Select(Select),
    Insert(Insert),
}

impl Statement {
    pub(crate) fn target(&self) -> (&str, &str) {
        match self {
            Statement::Select(s) => (&s.keyspace, &s.table),
            Statement::Insert(i) => (&i.keyspace, &i.table),
        }
    }
}

fn invalid(message: impl Into<String>) -> DriverError {
    DriverError::InvalidQuery(message.into())
}

fn tokenize(sql: &str) -> DriverResult<Vec<Token>> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' | ')' | ',' | '.' | '*' | '?' | ';' => {
                tokens.push(Token::Symbol(c));
                i += 1;
            }
            '=' => {
                tokens.push(Token::Op(CmpOp::Eq));
                i += 1;
            }
            '<' | '>' => {
                let eq = chars.get(i + 1) == Some(&'=');
                let op = match (c, eq) {
                    ('<', true) => CmpOp::Le,
                    ('<', false) => CmpOp::Lt,
                    (_, true) => CmpOp::Ge,
                    (_, false) => CmpOp::Gt,
                };
                tokens.push(Token::Op(op));
                i += if eq { 2 } else { 1 };
            }
            '\'' => {
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(invalid("unterminated string literal")),
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            text.push('\'');
                            i += 2;
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            text.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Text(text));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let n = literal
                    .parse::<i64>()
                    .map_err(|_| invalid(format!("bad integer literal {literal:?}")))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                tokens.push(Token::Ident(ident.to_ascii_lowercase()));
            }
            other => return Err(invalid(format!("unexpected character {other:?}"))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    next_param: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w == keyword)
    }

    fn keyword(&mut self, keyword: &str) -> DriverResult<()> {
        if self.is_keyword(keyword) {
            self.pos += 1;
            Ok(())
        } else {
            Err(invalid(format!("expected {}", keyword.to_ascii_uppercase())))
        }
    }

    fn symbol(&mut self, symbol: char) -> DriverResult<()> {
        match self.next() {
            Some(Token::Symbol(s)) if s == symbol => Ok(()),
            _ => Err(invalid(format!("expected '{symbol}'"))),
        }
    }

    fn eat_symbol(&mut self, symbol: char) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> DriverResult<String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            _ => Err(invalid("expected identifier")),
        }
    }

    fn qualified_table(&mut self) -> DriverResult<(String, String)> {
        let keyspace = self.ident()?;
        if !self.eat_symbol('.') {
            return Err(invalid(format!("table {keyspace} must be keyspace-qualified")));
        }
        let table = self.ident()?;
        Ok((keyspace, table))
    }

    fn ident_list(&mut self) -> DriverResult<Vec<String>> {
        let mut names = vec![self.ident()?];
        while self.eat_symbol(',') {
            names.push(self.ident()?);
        }
        Ok(names)
    }

    fn operand(&mut self) -> DriverResult<Operand> {
        match self.next() {
            Some(Token::Symbol('?')) => {
                let index = self.next_param;
                self.next_param += 1;
                Ok(Operand::Param(index))
            }
            Some(Token::Number(n)) => Ok(Operand::Literal(Value::Int64(n))),
            Some(Token::Text(s)) => Ok(Operand::Literal(Value::Text(s))),
            Some(Token::Ident(w)) if w == "true" => Ok(Operand::Literal(Value::Boolean(true))),
            Some(Token::Ident(w)) if w == "false" => Ok(Operand::Literal(Value::Boolean(false))),
            Some(Token::Ident(w)) if w == "null" => Ok(Operand::Literal(Value::Null)),
            _ => Err(invalid("expected '?' or a literal")),
        }
    }

    fn op(&mut self) -> DriverResult<CmpOp> {
        match self.next() {
            Some(Token::Op(op)) => Ok(op),
            _ => Err(invalid("expected comparison operator")),
        }
    }

    fn condition(&mut self) -> DriverResult<Condition> {
        let name = self.ident()?;
        if name == "token" && self.eat_symbol('(') {
            let columns = self.ident_list()?;
            self.symbol(')')?;
            let op = self.op()?;
            let operand = self.operand()?;
            return Ok(Condition::Token {
                columns,
                op,
                operand,
            });
        }
        let op = self.op()?;
        let operand = self.operand()?;
        Ok(Condition::Column {
            column: name,
            op,
            operand,
        })
    }

    fn finish(&mut self) -> DriverResult<()> {
        self.eat_symbol(';');
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(invalid(format!("unexpected trailing input {token:?}"))),
        }
    }

    fn select(&mut self) -> DriverResult<Select> {
        let projection = if self.eat_symbol('*') {
            Projection::All
        } else {
            Projection::Columns(self.ident_list()?)
        };
        self.keyword("from")?;
        let (keyspace, table) = self.qualified_table()?;

        let mut conditions = Vec::new();
        if self.is_keyword("where") {
            self.pos += 1;
            conditions.push(self.condition()?);
            while self.is_keyword("and") {
                self.pos += 1;
                conditions.push(self.condition()?);
            }
        }
        let allow_filtering = if self.is_keyword("allow") {
            self.pos += 1;
            self.keyword("filtering")?;
            true
        } else {
            false
        };
        self.finish()?;
        Ok(Select {
            keyspace,
            table,
            projection,
            conditions,
            allow_filtering,
        })
    }

    fn insert(&mut self) -> DriverResult<Insert> {
        self.keyword("into")?;
        let (keyspace, table) = self.qualified_table()?;
        self.symbol('(')?;
        let columns = self.ident_list()?;
        self.symbol(')')?;
        self.keyword("values")?;
        self.symbol('(')?;
        let mut values = vec![self.operand()?];
        while self.eat_symbol(',') {
            values.push(self.operand()?);
        }
        self.symbol(')')?;
        self.finish()?;
        if values.len() != columns.len() {
            return Err(invalid(format!(
                "{} columns but {} values",
                columns.len(),
                values.len()
            )));
        }
        Ok(Insert {
            keyspace,
            table,
            columns,
            values,
        })
    }
}

/// Parse one statement.
pub(crate) fn parse(sql: &str) -> DriverResult<Statement> {
    let mut parser = Parser {
        tokens: tokenize(sql)?,
        pos: 0,
        next_param: 0,
    };
    match parser.next() {
        Some(Token::Ident(w)) if w == "select" => parser.select().map(Statement::Select),
        Some(Token::Ident(w)) if w == "insert" => parser.insert().map(Statement::Insert),
        _ => Err(invalid(format!("unsupported statement: {sql}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select_with_token_bounds() {
        let stmt = parse(
            "SELECT * FROM ks.t WHERE TOKEN(a, b) > ? AND token(a,b) <= ? \
             AND c = 'x' ALLOW FILTERING",
        )
        .unwrap();
        let Statement::Select(select) = stmt else {
            panic!("expected select");
        };
        assert_eq!(select.keyspace, "ks");
        assert_eq!(select.table, "t");
        assert_eq!(select.projection, Projection::All);
        assert!(select.allow_filtering);
        assert_eq!(
            select.conditions[0],
            Condition::Token {
                columns: vec!["a".into(), "b".into()],
                op: CmpOp::Gt,
                operand: Operand::Param(0),
            }
        );
        assert_eq!(
            select.conditions[1],
            Condition::Token {
                columns: vec!["a".into(), "b".into()],
                op: CmpOp::Le,
                operand: Operand::Param(1),
            }
        );
        assert_eq!(
            select.conditions[2],
            Condition::Column {
                column: "c".into(),
                op: CmpOp::Eq,
                operand: Operand::Literal(Value::Text("x".into())),
            }
        );
    }

    #[test]
    fn test_parse_insert() {
        let stmt = parse("insert into KS.Blob_Prop (sat_key, flags) values (?, -3);").unwrap();
        let Statement::Insert(insert) = stmt else {
            panic!("expected insert");
        };
        assert_eq!(insert.table, "blob_prop");
        assert_eq!(insert.columns, vec!["sat_key", "flags"]);
        assert_eq!(
            insert.values,
            vec![Operand::Param(0), Operand::Literal(Value::Int64(-3))]
        );
    }

    #[test]
    fn test_string_escape() {
        let stmt = parse("SELECT a FROM ks.t WHERE a = 'it''s'").unwrap();
        let Statement::Select(select) = stmt else {
            panic!("expected select");
        };
        assert!(matches!(
            &select.conditions[0],
            Condition::Column { operand: Operand::Literal(Value::Text(s)), .. } if s == "it's"
        ));
    }

    #[test]
    fn test_rejects_unsupported() {
        assert!(matches!(
            parse("DELETE FROM ks.t WHERE a = 1"),
            Err(DriverError::InvalidQuery(_))
        ));
        assert!(parse("SELECT * FROM t").is_err());
        assert!(parse("SELECT * FROM ks.t WHERE").is_err());
        assert!(parse("INSERT INTO ks.t (a, b) VALUES (?)").is_err());
        assert!(parse("SELECT * FROM ks.t LIMIT 1").is_err());
    }

    #[test]
    fn test_unbound_parameter() {
        let operand = Operand::Param(1);
        let params = vec![Some(Value::Int32(1)), None];
        assert!(matches!(operand.resolve(&params), Err(DriverError::Bind(_))));
    }
}
