use std::{borrow::Cow, fmt::Display, path::Path};

use anyhow::Context;
use colored::Colorize;

/// A fully resolved external invocation: program plus ordered arguments.
///
/// The argument list is handed to [`std::process::Command`] as-is, so no
/// shell ever re-parses it. [`MergeCommand::display_string`] exists only for
/// printing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCommand {
    program: String,
    args: Vec<String>,
}

impl MergeCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Program followed by its arguments, with arguments containing a space
    /// wrapped in double quotes.
    pub fn display_string(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn print_cmd(&self) {
        println!("{}", self.display_string().purple().bold());
    }

    /// Runs the command to completion in `workdir` and returns its exit
    /// status. A process terminated by a signal reports `1`.
    pub fn exec(&self, workdir: &Path) -> anyhow::Result<i32> {
        self.print_cmd();

        let status = std::process::Command::new(&self.program)
            .args(&self.args)
            .current_dir(workdir)
            .status()
            .with_context(|| format!("failed to launch `{}`", self.program))?;

        Ok(match status.code() {
            Some(code) => code,
            None => {
                warn!("`{}` was terminated by a signal", self.program);
                1
            }
        })
    }
}

impl Display for MergeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_string())
    }
}

fn quote(arg: &str) -> Cow<'_, str> {
    if arg.contains(' ') {
        Cow::Owned(format!("\"{arg}\""))
    } else {
        Cow::Borrowed(arg)
    }
}
