use crate::error::{Result, ShellError};

/// Arguments with the `<` / `>` operators and their filenames removed.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Redirections {
    pub(crate) args: Vec<String>,
    pub(crate) input: Option<String>,
    pub(crate) output: Option<String>,
}

/// Separate `< file` and `> file` from the regular arguments. The last
/// occurrence of each operator wins.
pub(crate) fn extract_redirections(tokens: Vec<String>) -> Result<Redirections> {
    let mut result = Redirections::default();
    let mut tokens = tokens.into_iter();

    while let Some(token) = tokens.next() {
        match token.as_str() {
            "<" => result.input = Some(expect_filename(tokens.next(), "<")?),
            ">" => result.output = Some(expect_filename(tokens.next(), ">")?),
            _ => result.args.push(token),
        }
    }

    Ok(result)
}

fn expect_filename(token: Option<String>, operator: &str) -> Result<String> {
    match token {
        Some(path) if path != "<" && path != ">" => Ok(path),
        _ => Err(ShellError::Syntax(format!(
            "expected filename after '{operator}'"
        ))),
    }
}
