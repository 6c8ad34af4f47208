use std::sync::Arc;

use crate::ast::*;
use crate::data_type::DataType;
use crate::error::{DbError, Result};
use crate::schema::{ColumnDef, ForeignKey};
use crate::tokenizer::{Spanned, Token};
use crate::value::Value;

/// A recursive descent parser that transforms a sequence of [Token]s
/// into an Abstract Syntax Tree (AST) represented by a [Statement].
///
/// The grammar is strict: `WHERE` is a flat conjunction of
/// `column OP literal` predicates joined by `AND`, with no nesting.
pub struct Parser {
    /// The stream of tokens produced by the Tokenizer.
    tokens: Vec<Spanned>,
    /// The current index in the token stream.
    position: usize,
}

impl Parser {
    /// Creates a new parser from a list of spanned tokens.
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parses the tokens into a single [Statement].
    ///
    /// This is the main entry point of the parser. It identifies the
    /// statement type and ensures the entire input is consumed.
    ///
    /// # Errors
    /// Returns [DbError::Syntax] if the token stream does not match a
    /// statement or if trailing tokens remain after a valid one.
    pub fn parse(&mut self) -> Result<Statement> {
        let statement = match self.current_token() {
            Token::Create => self.parse_create(),
            Token::Insert => self.parse_insert(),
            Token::Select => self.parse_select(),
            Token::Update => self.parse_update(),
            Token::Delete => self.parse_delete(),
            Token::Begin => {
                self.advance();
                Ok(Statement::Begin)
            }
            Token::Commit => {
                self.advance();
                Ok(Statement::Commit)
            }
            Token::Rollback => {
                self.advance();
                Ok(Statement::Rollback)
            }
            other => Err(self.error(&format!("unexpected token {other:?}"))),
        }?;

        // Semicolons are optional at the end of a statement
        if matches!(self.current_token(), Token::Semicolon) {
            self.advance();
        }

        // Check we are at the end of the statement to avoid ignored trailing syntax
        if !self.is_at_end() {
            return Err(self.error(&format!(
                "unexpected token after statement: {:?}",
                self.current_token()
            )));
        }

        Ok(statement)
    }

    // --- Navigation Helpers ---

    /// Returns a reference to the token at the current position.
    fn current_token(&self) -> &Token {
        &self.tokens[self.position].token
    }

    /// Byte offset of the token at the current position.
    fn current_offset(&self) -> usize {
        self.tokens[self.position].at
    }

    fn error(&self, detail: &str) -> DbError {
        DbError::Syntax {
            at: self.current_offset(),
            detail: detail.to_string(),
        }
    }

    /// Advances the cursor to the next token.
    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    /// Checks if the cursor has reached the end of the token stream.
    fn is_at_end(&self) -> bool {
        matches!(self.current_token(), Token::Eof)
    }

    fn matches(&mut self, expected: &Token) -> bool {
        if self.current_token() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Validates that the current token matches the expected one and advances.
    /// Returns an error if the token doesn't match.
    fn consume(&mut self, expected: Token) -> Result<()> {
        if *self.current_token() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!(
                "expected {expected:?}, found {:?}",
                self.current_token()
            )))
        }
    }

    /// Specifically consumes a [Token::Ident] and returns its inner string.
    fn consume_ident(&mut self) -> Result<String> {
        match self.current_token() {
            Token::Ident(string) => {
                let string = string.clone();
                self.advance();
                Ok(string)
            }
            other => Err(self.error(&format!("expected identifier, found {other:?}"))),
        }
    }

    /// Consumes a literal token and converts it to a [Value].
    fn consume_value(&mut self) -> Result<Value> {
        let value = match self.current_token() {
            Token::Number(nb) => Value::Int(*nb),
            Token::FloatNumber(nb) => Value::Real(*nb),
            Token::True => Value::Bool(true),
            Token::False => Value::Bool(false),
            Token::Null => Value::Null,
            Token::Str(string) => Value::Text(Arc::from(string.as_str())),
            other => return Err(self.error(&format!("expected a literal, found {other:?}"))),
        };
        self.advance();
        Ok(value)
    }

    /// Maps a type keyword token to a logical [DataType].
    fn consume_data_type(&mut self) -> Result<DataType> {
        let data_type = match self.current_token() {
            Token::Integer => DataType::Integer,
            Token::Real => DataType::Real,
            Token::Text => DataType::Text,
            Token::Boolean => DataType::Boolean,
            Token::Date => DataType::Date,
            other => {
                return Err(self.error(&format!("{other:?} is not a supported data type")));
            }
        };
        self.advance();
        Ok(data_type)
    }

    /// Parses `col` or `table.col`.
    fn consume_column_ref(&mut self) -> Result<ColumnRef> {
        let first = self.consume_ident()?;
        if self.matches(&Token::Dot) {
            let column = self.consume_ident()?;
            Ok(ColumnRef::qualified(first, column))
        } else {
            Ok(ColumnRef::bare(first))
        }
    }

    // --- Production Rules ---

    /// Routes `CREATE TABLE` and `CREATE INDEX`.
    fn parse_create(&mut self) -> Result<Statement> {
        self.consume(Token::Create)?;
        match self.current_token() {
            Token::Table => self.parse_create_table(),
            Token::Index => self.parse_create_index(),
            other => Err(self.error(&format!(
                "expected TABLE or INDEX after CREATE, found {other:?}"
            ))),
        }
    }

    /// Parses a column definition in a `CREATE TABLE` statement
    /// (e.g., `id INTEGER PRIMARY KEY NOT NULL`).
    fn parse_column_def(&mut self) -> Result<ColumnDef> {
        let name = self.consume_ident()?;
        let data_type = self.consume_data_type()?;
        let mut def = ColumnDef::new(name, data_type);
        loop {
            match self.current_token() {
                Token::Primary => {
                    self.advance();
                    self.consume(Token::Key)?;
                    def.primary_key = true;
                }
                Token::Not => {
                    self.advance();
                    self.consume(Token::Null)?;
                    def.not_null = true;
                }
                Token::Unique => {
                    self.advance();
                    def.unique = true;
                }
                _ => break,
            }
        }
        Ok(def)
    }

    /// Parses `FOREIGN KEY (col) REFERENCES table(col)`.
    fn parse_foreign_key(&mut self) -> Result<ForeignKeyDef> {
        self.consume(Token::Foreign)?;
        self.consume(Token::Key)?;
        self.consume(Token::LeftParen)?;
        let column = self.consume_ident()?;
        self.consume(Token::RightParen)?;
        self.consume(Token::References)?;
        let table = self.consume_ident()?;
        self.consume(Token::LeftParen)?;
        let ref_column = self.consume_ident()?;
        self.consume(Token::RightParen)?;
        Ok(ForeignKeyDef {
            column,
            references: ForeignKey {
                table,
                column: ref_column,
            },
        })
    }

    /// Parses a full `CREATE TABLE` statement.
    fn parse_create_table(&mut self) -> Result<Statement> {
        self.consume(Token::Table)?;
        let name = self.consume_ident()?;
        self.consume(Token::LeftParen)?;

        let mut columns = vec![];
        let mut foreign_keys = vec![];
        loop {
            if matches!(self.current_token(), Token::Foreign) {
                foreign_keys.push(self.parse_foreign_key()?);
            } else {
                columns.push(self.parse_column_def()?);
            }
            match self.current_token() {
                Token::RightParen => {
                    self.advance();
                    break;
                }
                Token::Comma => {
                    self.advance();
                    continue;
                }
                _ => return Err(self.error("expected ',' or ')'")),
            }
        }
        Ok(Statement::CreateTable(CreateTable {
            name,
            columns,
            foreign_keys,
        }))
    }

    /// Parses `CREATE INDEX name ON table (col)`.
    fn parse_create_index(&mut self) -> Result<Statement> {
        self.consume(Token::Index)?;
        let name = self.consume_ident()?;
        self.consume(Token::On)?;
        let table = self.consume_ident()?;
        self.consume(Token::LeftParen)?;
        let column = self.consume_ident()?;
        self.consume(Token::RightParen)?;
        Ok(Statement::CreateIndex(CreateIndex {
            name,
            table,
            column,
        }))
    }

    /// Parses an `INSERT INTO` statement, handling optional column lists.
    fn parse_insert(&mut self) -> Result<Statement> {
        self.consume(Token::Insert)?;
        self.consume(Token::Into)?;
        let name = self.consume_ident()?;

        // Columns are optional: INSERT INTO table (col1, col2) ... OR INSERT INTO table ...
        let columns = if self.matches(&Token::LeftParen) {
            let mut cols = vec![];
            loop {
                cols.push(self.consume_ident()?);
                match self.current_token() {
                    Token::Comma => self.advance(),
                    Token::RightParen => {
                        self.advance();
                        break;
                    }
                    _ => return Err(self.error("expected ',' or ')'")),
                }
            }
            Some(cols)
        } else {
            None
        };

        self.consume(Token::Values)?;
        self.consume(Token::LeftParen)?;

        let mut values = vec![];
        loop {
            values.push(self.consume_value()?);
            match self.current_token() {
                Token::Comma => self.advance(),
                Token::RightParen => {
                    self.advance();
                    break;
                }
                _ => return Err(self.error("expected ',' or ')'")),
            };
        }

        Ok(Statement::Insert(Insert {
            table: name,
            columns,
            values,
        }))
    }

    /// Parses the projection list of a `SELECT` statement: `*`, column
    /// references, and aggregate applications.
    fn parse_projection(&mut self) -> Result<Vec<ProjItem>> {
        let mut items = Vec::new();
        loop {
            let item = match self.current_token() {
                Token::Star => {
                    self.advance();
                    ProjItem::Star
                }
                Token::Count | Token::Sum | Token::Avg | Token::Min | Token::Max => {
                    ProjItem::Aggregate(self.parse_aggregate()?)
                }
                Token::Ident(_) => ProjItem::Column(self.consume_column_ref()?),
                other => {
                    return Err(self.error(&format!(
                        "expected '*', a column, or an aggregate, found {other:?}"
                    )));
                }
            };
            items.push(item);
            if !self.matches(&Token::Comma) {
                break;
            }
        }
        Ok(items)
    }

    /// Parses `FUNC(*)` or `FUNC(col)`.
    fn parse_aggregate(&mut self) -> Result<Aggregate> {
        let func = match self.current_token() {
            Token::Count => AggFunc::Count,
            Token::Sum => AggFunc::Sum,
            Token::Avg => AggFunc::Avg,
            Token::Min => AggFunc::Min,
            Token::Max => AggFunc::Max,
            other => return Err(self.error(&format!("{other:?} is not an aggregate function"))),
        };
        self.advance();
        self.consume(Token::LeftParen)?;
        let arg = if self.matches(&Token::Star) {
            AggArg::Star
        } else {
            AggArg::Column(self.consume_column_ref()?)
        };
        self.consume(Token::RightParen)?;
        Ok(Aggregate { func, arg })
    }

    /// Parses a `SELECT` statement with its optional JOIN, WHERE,
    /// GROUP BY, ORDER BY, and LIMIT clauses.
    fn parse_select(&mut self) -> Result<Statement> {
        self.consume(Token::Select)?;
        let projection = self.parse_projection()?;
        self.consume(Token::From)?;
        let table = self.consume_ident()?;

        let join = if self.matches(&Token::Join) {
            let join_table = self.consume_ident()?;
            self.consume(Token::On)?;
            let left = self.consume_column_ref()?;
            self.consume(Token::Equal)?;
            let right = self.consume_column_ref()?;
            if left.table.is_none() || right.table.is_none() {
                return Err(self.error("JOIN condition requires table-qualified columns"));
            }
            Some(Join {
                table: join_table,
                left,
                right,
            })
        } else {
            None
        };

        let predicates = if self.matches(&Token::Where) {
            self.parse_predicates()?
        } else {
            vec![]
        };

        let group_by = if self.matches(&Token::Group) {
            self.consume(Token::By)?;
            let mut cols = vec![self.consume_ident()?];
            while self.matches(&Token::Comma) {
                cols.push(self.consume_ident()?);
            }
            cols
        } else {
            vec![]
        };

        let order_by = if self.matches(&Token::Order) {
            self.consume(Token::By)?;
            self.parse_order_by()?
        } else {
            vec![]
        };

        let limit = if self.matches(&Token::Limit) {
            match self.current_token() {
                Token::Number(n) if *n >= 0 => {
                    let limit = *n as usize;
                    self.advance();
                    Some(limit)
                }
                _ => return Err(self.error("LIMIT requires a non-negative number")),
            }
        } else {
            None
        };

        Ok(Statement::Select(Select {
            projection,
            table,
            join,
            predicates,
            group_by,
            order_by,
            limit,
        }))
    }

    /// Parses the conjunction `pred {AND pred}*`.
    fn parse_predicates(&mut self) -> Result<Vec<Predicate>> {
        let mut predicates = vec![self.parse_predicate()?];
        while self.matches(&Token::And) {
            predicates.push(self.parse_predicate()?);
        }
        Ok(predicates)
    }

    /// Parses a single comparison: `column OP literal`.
    ///
    /// # Supported Operators
    /// `=`, `!=`, `<`, `<=`, `>`, `>=`, and `LIKE`.
    fn parse_predicate(&mut self) -> Result<Predicate> {
        let column = self.consume_column_ref()?;
        let op = match self.current_token() {
            Token::Equal => CompareOp::Eq,
            Token::NotEqual => CompareOp::Ne,
            Token::Lower => CompareOp::Lt,
            Token::LowerEqual => CompareOp::Le,
            Token::Greater => CompareOp::Gt,
            Token::GreaterEqual => CompareOp::Ge,
            Token::Like => CompareOp::Like,
            other => {
                return Err(self.error(&format!("{other:?} is not a valid comparison operator")));
            }
        };
        self.advance();
        let value = self.consume_value()?;
        Ok(Predicate { column, op, value })
    }

    /// Parses an `ORDER BY` clause.
    ///
    /// If no direction (`ASC` or `DESC`) is specified, defaults to `ASC`
    /// per SQL standard.
    fn parse_order_by(&mut self) -> Result<Vec<OrderByClause>> {
        let mut clauses = vec![];

        loop {
            let column = self.consume_column_ref()?;

            let direction = match self.current_token() {
                Token::Asc => {
                    self.advance();
                    SortDirection::Asc
                }
                Token::Desc => {
                    self.advance();
                    SortDirection::Desc
                }
                _ => SortDirection::Asc, // ASC by default
            };

            clauses.push(OrderByClause { column, direction });

            if !self.matches(&Token::Comma) {
                break;
            }
        }

        Ok(clauses)
    }

    /// Parses an `UPDATE` statement.
    fn parse_update(&mut self) -> Result<Statement> {
        self.consume(Token::Update)?;
        let table = self.consume_ident()?;
        self.consume(Token::Set)?;

        let mut assignments = vec![];
        loop {
            let column = self.consume_ident()?;
            self.consume(Token::Equal)?;
            let value = self.consume_value()?;
            assignments.push((column, value));
            if !self.matches(&Token::Comma) {
                break;
            }
        }

        let predicates = if self.matches(&Token::Where) {
            self.parse_predicates()?
        } else {
            vec![]
        };

        Ok(Statement::Update(Update {
            table,
            assignments,
            predicates,
        }))
    }

    /// Parses a `DELETE FROM` statement.
    fn parse_delete(&mut self) -> Result<Statement> {
        self.consume(Token::Delete)?;
        self.consume(Token::From)?;
        let table = self.consume_ident()?;

        let predicates = if self.matches(&Token::Where) {
            self.parse_predicates()?
        } else {
            vec![]
        };

        Ok(Statement::Delete(Delete { table, predicates }))
    }
}

/// Tokenizes and parses one SQL statement.
pub fn parse_sql(sql: &str) -> Result<Statement> {
    let tokens = crate::tokenizer::Tokenizer::new(sql).tokenize()?;
    Parser::new(tokens).parse()
}
