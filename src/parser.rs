use crate::error::{Result, ShellError};
use crate::redirect;

/// A lexical token of a command line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Word(String),
    /// An unquoted `&`: run in the background, ignore the rest of the line.
    Background,
}

/// A command line ready for dispatch.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct ParsedCommand {
    pub(crate) args: Vec<String>,
    pub(crate) background: bool,
    pub(crate) input: Option<String>,
    pub(crate) output: Option<String>,
}

impl ParsedCommand {
    pub(crate) fn program(&self) -> &str {
        &self.args[0]
    }
}

/// States for the tokenizer state machine.
enum State {
    /// Between tokens: whitespace is skipped
    Normal,
    /// Building an unquoted word: whitespace ends it
    InWord,
    /// Inside double quotes: whitespace is preserved
    InDoubleQuote,
    /// Inside single quotes: everything is literal
    InSingleQuote,
}

/// Split a line into words, honoring quotes and backslash escapes.
pub(crate) fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut state = State::Normal;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match (&state, ch) {
            (State::Normal, ' ' | '\t' | '\n') => {}
            (State::InWord, ' ' | '\t' | '\n') => {
                tokens.push(Token::Word(std::mem::take(&mut current)));
                state = State::Normal;
            }
            (State::Normal | State::InWord, '&') => {
                if matches!(state, State::InWord) {
                    tokens.push(Token::Word(std::mem::take(&mut current)));
                }
                tokens.push(Token::Background);
                state = State::Normal;
            }
            (State::Normal | State::InWord, '"') => state = State::InDoubleQuote,
            (State::Normal | State::InWord, '\'') => state = State::InSingleQuote,
            (State::Normal | State::InWord, '\\') => {
                current.push(chars.next().unwrap_or('\\'));
                state = State::InWord;
            }
            (State::Normal | State::InWord, c) => {
                current.push(c);
                state = State::InWord;
            }

            (State::InDoubleQuote, '"') => state = State::InWord,
            (State::InDoubleQuote, '\\') => match chars.peek() {
                Some(&c) if c == '"' || c == '\\' => {
                    current.push(c);
                    chars.next();
                }
                _ => current.push('\\'),
            },
            (State::InDoubleQuote, c) => current.push(c),

            (State::InSingleQuote, '\'') => state = State::InWord,
            (State::InSingleQuote, c) => current.push(c),
        }
    }

    // An unterminated quote still yields the word collected so far.
    if !matches!(state, State::Normal) {
        tokens.push(Token::Word(current));
    }

    tokens
}

/// Parse a line into a command. `Ok(None)` for a blank line.
pub(crate) fn parse(input: &str) -> Result<Option<ParsedCommand>> {
    let mut words = Vec::new();
    let mut background = false;
    for token in tokenize(input) {
        match token {
            Token::Word(word) => words.push(word),
            Token::Background => {
                background = true;
                break;
            }
        }
    }

    let redirect::Redirections {
        args,
        input,
        output,
    } = redirect::extract_redirections(words)?;

    if args.is_empty() {
        if input.is_some() || output.is_some() {
            return Err(ShellError::Syntax("missing command before redirection".into()));
        }
        return Ok(None);
    }

    Ok(Some(ParsedCommand {
        args,
        background,
        input,
        output,
    }))
}
