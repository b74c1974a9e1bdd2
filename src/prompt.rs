// src/prompt.rs

//! Interactive credential prompts.

use std::fmt;
use std::io::{self, BufRead, Write};

/// Where prompted credentials are read from.
pub enum PromptInput {
    /// The process's standard input. Passwords are read from the controlling
    /// terminal without echo.
    Terminal,
    /// Any buffered reader, one answer per line. Used for piped input and in
    /// tests.
    Reader(Box<dyn BufRead>),
}

impl PromptInput {
    /// Reads answers line by line from `reader`.
    pub fn reader<R: BufRead + 'static>(reader: R) -> Self {
        PromptInput::Reader(Box::new(reader))
    }

    /// Writes `label` and reads one line, without its line ending.
    pub(crate) fn prompt_string(&mut self, output: &mut dyn Write, label: &str) -> io::Result<String> {
        write!(output, "{label}")?;
        output.flush()?;

        let mut line = String::new();
        match self {
            PromptInput::Terminal => io::stdin().lock().read_line(&mut line)?,
            PromptInput::Reader(reader) => reader.read_line(&mut line)?,
        };
        Ok(trim_line_ending(line))
    }

    /// Writes `label` and reads one line without echoing it when reading from
    /// a terminal.
    pub(crate) fn prompt_password(
        &mut self,
        output: &mut dyn Write,
        label: &str,
    ) -> io::Result<String> {
        write!(output, "{label}")?;
        output.flush()?;

        match self {
            PromptInput::Terminal => {
                let password = rpassword::read_password()?;
                // the user's newline was swallowed with the echo
                writeln!(output)?;
                Ok(password)
            }
            PromptInput::Reader(reader) => rpassword::read_password_from_bufread(reader),
        }
    }
}

impl fmt::Debug for PromptInput {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PromptInput::Terminal => f.write_str("Terminal"),
            PromptInput::Reader(_) => f.write_str("Reader"),
        }
    }
}

fn trim_line_ending(mut line: String) -> String {
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    line
}
