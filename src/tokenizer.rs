use crate::error::{DbError, Result};

/// Represents the smallest meaningful units (atoms) of the SQL language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // --- SQL Keywords ---
    Create,
    Table,
    Index,
    On,
    Insert,
    Into,
    Values,
    Select,
    From,
    Where,
    And,
    Join,
    Group,
    Order,
    By,
    Asc,
    Desc,
    Limit,
    Update,
    Set,
    Delete,
    Begin,
    Commit,
    Rollback,
    Primary,
    Key,
    Not,
    Unique,
    Foreign,
    References,
    Like,

    // --- Aggregate functions ---
    Count,
    Sum,
    Avg,
    Min,
    Max,

    // --- Data Types ---
    Integer,
    Real,
    Text,
    Boolean,
    Date,

    // --- Identifiers & Literals ---
    /// A name representing a table or a column (e.g., `users`, `id`).
    Ident(String),
    /// A 64-bit integer literal (e.g., `42`).
    Number(i64),
    /// A 64-bit floating-point literal (e.g., `3.14`).
    FloatNumber(f64),
    /// A string literal, defined between single quotes (e.g., `'Alice'`).
    Str(String),
    /// The boolean literal `TRUE`.
    True,
    /// The boolean literal `FALSE`.
    False,
    /// The `NULL` literal.
    Null,

    // --- Symbols ---
    /// Left parenthesis `(`
    LeftParen,
    /// Right parenthesis `)`
    RightParen,
    /// Comma `,`
    Comma,
    /// Semicolon `;`
    Semicolon,
    /// Wildcard symbol `*`
    Star,
    /// Dot `.` for qualified column names
    Dot,
    /// Equal to
    Equal,
    /// Not equal to (`!=`)
    NotEqual,
    /// Lower than
    Lower,
    /// Lower than or equal
    LowerEqual,
    /// Greater than
    Greater,
    /// Greater than or equal
    GreaterEqual,

    // --- Special ---
    /// Represents the End Of File/Input.
    Eof,
}

/// A token together with the byte offset where it starts, so syntax
/// errors can point at the offending position.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub at: usize,
}

/// A lexical scanner (lexer) that converts a raw SQL string into a
/// sequence of [Token]s. Keywords are matched case-insensitively.
pub struct Tokenizer {
    /// The input string stored as a vector of characters for easy iteration.
    input: Vec<char>,
    /// The current position in the character vector.
    position: usize,
}

impl Tokenizer {
    /// Creates a new Tokenizer for the given input string.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Processes the entire input and returns a vector of spanned tokens.
    ///
    /// # Errors
    /// Returns [DbError::Syntax] if an invalid character is encountered or
    /// if a literal (like a string) is malformed.
    ///
    /// # Example
    /// ```
    /// # use memql::tokenizer::{Token, Tokenizer};
    /// let tokens = Tokenizer::new("SELECT *").tokenize().unwrap();
    /// assert_eq!(tokens[0].token, Token::Select);
    /// assert_eq!(tokens[1].token, Token::Star);
    /// ```
    pub fn tokenize(mut self) -> Result<Vec<Spanned>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            if self.is_at_end() {
                break;
            }
            let at = self.position;
            let token = self.next_token()?;
            tokens.push(Spanned { token, at });
        }

        tokens.push(Spanned {
            token: Token::Eof,
            at: self.position,
        });
        Ok(tokens)
    }

    /// Identifies the next token based on the character at the current position.
    fn next_token(&mut self) -> Result<Token> {
        let ch = self.current_char();

        match ch {
            '(' => {
                self.advance();
                Ok(Token::LeftParen)
            }
            ')' => {
                self.advance();
                Ok(Token::RightParen)
            }
            ',' => {
                self.advance();
                Ok(Token::Comma)
            }
            ';' => {
                self.advance();
                Ok(Token::Semicolon)
            }
            '*' => {
                self.advance();
                Ok(Token::Star)
            }
            '.' => {
                self.advance();
                Ok(Token::Dot)
            }
            '=' => {
                self.advance();
                Ok(Token::Equal)
            }
            '!' => {
                self.advance();
                if !self.is_at_end() && self.current_char() == '=' {
                    self.advance();
                    Ok(Token::NotEqual)
                } else {
                    Err(self.error("expected '=' after '!'"))
                }
            }
            '<' => {
                self.advance();
                if !self.is_at_end() && self.current_char() == '=' {
                    self.advance();
                    Ok(Token::LowerEqual)
                } else {
                    Ok(Token::Lower)
                }
            }
            '>' => {
                self.advance();
                if !self.is_at_end() && self.current_char() == '=' {
                    self.advance();
                    Ok(Token::GreaterEqual)
                } else {
                    Ok(Token::Greater)
                }
            }
            '-' => {
                self.advance();
                if !self.is_at_end() && self.current_char().is_ascii_digit() {
                    self.read_number(true)
                } else {
                    Err(self.error("expected a digit after '-'"))
                }
            }
            c if c.is_alphabetic() || c == '_' => Ok(self.read_identifier()),
            c if c.is_ascii_digit() => self.read_number(false),
            '\'' => self.read_string(),
            _ => Err(self.error(&format!("character {ch:?} is not supported"))),
        }
    }

    fn error(&self, detail: &str) -> DbError {
        DbError::Syntax {
            at: self.position,
            detail: detail.to_string(),
        }
    }

    // --- Navigation Helpers ---

    /// Returns the character at the current position.
    fn current_char(&self) -> char {
        self.input[self.position]
    }

    /// Moves the cursor forward by one character.
    fn advance(&mut self) {
        self.position += 1;
    }

    /// Checks if the cursor has reached the end of the input.
    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Consumes any whitespace characters (spaces, tabs, newlines).
    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    // --- Extraction Logic ---

    /// Reads a sequence of alphanumeric characters and determines if it's
    /// a reserved SQL keyword or a user-defined identifier.
    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while !self.is_at_end()
            && (self.current_char().is_alphanumeric() || self.current_char() == '_')
        {
            ident.push(self.current_char());
            self.advance();
        }

        match ident.to_uppercase().as_str() {
            "CREATE" => Token::Create,
            "TABLE" => Token::Table,
            "INDEX" => Token::Index,
            "ON" => Token::On,
            "INSERT" => Token::Insert,
            "INTO" => Token::Into,
            "VALUES" => Token::Values,
            "SELECT" => Token::Select,
            "FROM" => Token::From,
            "WHERE" => Token::Where,
            "AND" => Token::And,
            "JOIN" => Token::Join,
            "GROUP" => Token::Group,
            "ORDER" => Token::Order,
            "BY" => Token::By,
            "ASC" => Token::Asc,
            "DESC" => Token::Desc,
            "LIMIT" => Token::Limit,
            "UPDATE" => Token::Update,
            "SET" => Token::Set,
            "DELETE" => Token::Delete,
            "BEGIN" => Token::Begin,
            "COMMIT" => Token::Commit,
            "ROLLBACK" => Token::Rollback,
            "PRIMARY" => Token::Primary,
            "KEY" => Token::Key,
            "NOT" => Token::Not,
            "UNIQUE" => Token::Unique,
            "FOREIGN" => Token::Foreign,
            "REFERENCES" => Token::References,
            "LIKE" => Token::Like,
            "COUNT" => Token::Count,
            "SUM" => Token::Sum,
            "AVG" => Token::Avg,
            "MIN" => Token::Min,
            "MAX" => Token::Max,
            "INTEGER" => Token::Integer,
            "REAL" => Token::Real,
            "TEXT" => Token::Text,
            "BOOLEAN" => Token::Boolean,
            "DATE" => Token::Date,
            "TRUE" => Token::True,
            "FALSE" => Token::False,
            "NULL" => Token::Null,
            _ => Token::Ident(ident),
        }
    }

    /// Reads a numeric literal. If a dot `.` is encountered, it returns a
    /// [Token::FloatNumber], otherwise a [Token::Number].
    fn read_number(&mut self, negative: bool) -> Result<Token> {
        let mut number = String::new();
        if negative {
            number.push('-');
        }
        let mut has_dot = false;

        while !self.is_at_end()
            && (self.current_char().is_ascii_digit() || (self.current_char() == '.' && !has_dot))
        {
            if self.current_char() == '.' {
                // A dot not followed by a digit belongs to the next token
                // (e.g. a qualified name after a number is still an error,
                // but `1.` alone is not a float).
                let next = self.input.get(self.position + 1);
                if !next.is_some_and(char::is_ascii_digit) {
                    break;
                }
                has_dot = true;
            }
            number.push(self.current_char());
            self.advance();
        }

        if has_dot {
            return number
                .parse::<f64>()
                .map(Token::FloatNumber)
                .map_err(|e| self.error(&e.to_string()));
        }

        number
            .parse::<i64>()
            .map(Token::Number)
            .map_err(|e| self.error(&e.to_string()))
    }

    /// Reads a string literal enclosed in single quotes.
    fn read_string(&mut self) -> Result<Token> {
        self.advance(); // Skip the opening quote

        let mut string = String::new();
        while !self.is_at_end() && self.current_char() != '\'' {
            string.push(self.current_char());
            self.advance();
        }

        if self.is_at_end() {
            return Err(self.error("unterminated string literal"));
        }

        // Skip the closing quote
        self.advance();

        Ok(Token::Str(string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Tokenizer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_tokenize_simple() {
        assert_eq!(
            tokens("CREATE TABLE users"),
            vec![
                Token::Create,
                Token::Table,
                Token::Ident("users".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(
            tokens("select From wHeRe"),
            vec![Token::Select, Token::From, Token::Where, Token::Eof]
        );
    }

    #[test]
    fn test_tokenize_create_table_with_constraints() {
        assert_eq!(
            tokens("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT UNIQUE)"),
            vec![
                Token::Create,
                Token::Table,
                Token::Ident("users".into()),
                Token::LeftParen,
                Token::Ident("id".into()),
                Token::Integer,
                Token::Primary,
                Token::Key,
                Token::Comma,
                Token::Ident("name".into()),
                Token::Text,
                Token::Unique,
                Token::RightParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(
            tokens("42, -7, 3.14"),
            vec![
                Token::Number(42),
                Token::Comma,
                Token::Number(-7),
                Token::Comma,
                Token::FloatNumber(3.14),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_strings_and_null() {
        assert_eq!(
            tokens("'Alice', '', NULL"),
            vec![
                Token::Str("Alice".into()),
                Token::Comma,
                Token::Str(String::new()),
                Token::Comma,
                Token::Null,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_comparison_operators() {
        assert_eq!(
            tokens("a = 1 AND b != 2 AND c <= 3 AND d >= 4 AND e < 5 AND f > 6"),
            vec![
                Token::Ident("a".into()),
                Token::Equal,
                Token::Number(1),
                Token::And,
                Token::Ident("b".into()),
                Token::NotEqual,
                Token::Number(2),
                Token::And,
                Token::Ident("c".into()),
                Token::LowerEqual,
                Token::Number(3),
                Token::And,
                Token::Ident("d".into()),
                Token::GreaterEqual,
                Token::Number(4),
                Token::And,
                Token::Ident("e".into()),
                Token::Lower,
                Token::Number(5),
                Token::And,
                Token::Ident("f".into()),
                Token::Greater,
                Token::Number(6),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_qualified_name() {
        assert_eq!(
            tokens("users.id = orders.uid"),
            vec![
                Token::Ident("users".into()),
                Token::Dot,
                Token::Ident("id".into()),
                Token::Equal,
                Token::Ident("orders".into()),
                Token::Dot,
                Token::Ident("uid".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let result = Tokenizer::new("'hello").tokenize();
        assert!(matches!(result, Err(DbError::Syntax { .. })));
    }

    #[test]
    fn test_bare_bang_is_an_error() {
        let result = Tokenizer::new("a ! b").tokenize();
        assert!(matches!(result, Err(DbError::Syntax { at: 3, .. })));
    }

    #[test]
    fn test_spans_point_at_token_starts() {
        let spanned = Tokenizer::new("SELECT id").tokenize().unwrap();
        assert_eq!(spanned[0].at, 0);
        assert_eq!(spanned[1].at, 7);
    }
}
