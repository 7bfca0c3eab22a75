use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum ShellError {
    #[error("process group {0} is already tracked")]
    DuplicateGroup(libc::pid_t),

    #[error("No such job at position {0}")]
    NoSuchJob(String),

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ShellError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ShellError::Io {
            context: context.into(),
            source,
        }
    }
}

pub(crate) type Result<T> = std::result::Result<T, ShellError>;
