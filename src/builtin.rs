//! Built-in commands, recognized as the first word of a line and executed
//! in-process. Arguments are parsed with [`argh`] (`FromArgs`), so arity
//! mistakes produce a usage message instead of a launched process.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};

use crate::env::Environment;
use crate::interpreter::Shell;

/// Conventional process exit code: 0 for success, non-zero for failure.
pub type ExitCode = i32;

pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd".
    fn name() -> &'static str;

    /// Executes the command against the session that recognized it.
    fn execute(self, stdout: &mut dyn Write, shell: &mut Shell) -> Result<ExitCode>;
}

/// Object-safe wrapper so recognized builtins and usage errors run
/// uniformly.
pub(crate) trait RunnableBuiltin {
    fn run(self: Box<Self>, stdout: &mut dyn Write, shell: &mut Shell) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> RunnableBuiltin for T {
    fn run(self: Box<Self>, stdout: &mut dyn Write, shell: &mut Shell) -> Result<ExitCode> {
        match T::execute(*self, stdout, shell) {
            Ok(code) => Ok(code),
            Err(e) => {
                writeln!(stdout, "{e:#}")?;
                Ok(1)
            }
        }
    }
}

/// Argument-parsing failure (or `--help`): replays argh's output and exits
/// with the matching code, touching nothing else.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl RunnableBuiltin for InvalidArgs {
    fn run(self: Box<Self>, stdout: &mut dyn Write, _shell: &mut Shell) -> Result<ExitCode> {
        stdout.write_all(self.output.as_bytes())?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

/// Match the first word of a tokenized line against the builtin set.
pub(crate) fn recognize(words: &[String]) -> Option<Box<dyn RunnableBuiltin>> {
    let (name, rest) = words.split_first()?;
    let args: Vec<&str> = rest.iter().map(String::as_str).collect();
    try_create::<Cd>(name, &args)
        .or_else(|| try_create::<Jobs>(name, &args))
        .or_else(|| try_create::<History>(name, &args))
        .or_else(|| try_create::<Exit>(name, &args))
}

fn try_create<T: BuiltinCommand + 'static>(
    name: &str,
    args: &[&str],
) -> Option<Box<dyn RunnableBuiltin>> {
    if name != T::name() {
        return None;
    }
    Some(match T::from_args(&[name], args) {
        Ok(cmd) => Box::new(cmd),
        Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
            output,
            is_error: status.is_err(),
        }),
    })
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; `~` means the HOME directory.
    pub target: String,
}

impl Cd {
    /// Resolve the target word without touching process state.
    fn target_path(&self, env: &Environment) -> Result<PathBuf> {
        if self.target == "~" {
            return env
                .home_dir()
                .map(PathBuf::from)
                .ok_or_else(|| anyhow::anyhow!("cd: HOME not set"));
        }
        let target = PathBuf::from(&self.target);
        Ok(if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        })
    }
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, shell: &mut Shell) -> Result<ExitCode> {
        let new_dir = self.target_path(&shell.env)?;
        let canonical = std::fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: can't canonicalize {}", new_dir.display()))?;
        std::env::set_current_dir(&canonical)
            .with_context(|| format!("cd: can't chdir to {}", canonical.display()))?;
        shell.env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List background jobs that have not completed yet.
pub struct Jobs {}

impl BuiltinCommand for Jobs {
    fn name() -> &'static str {
        "myjobs"
    }

    fn execute(self, stdout: &mut dyn Write, shell: &mut Shell) -> Result<ExitCode> {
        shell.jobs.list(stdout);
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the stored command history, numbered from the first entry.
pub struct History {}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "myhistory"
    }

    fn execute(self, stdout: &mut dyn Write, shell: &mut Shell) -> Result<ExitCode> {
        shell.history.replay(stdout)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Terminate the shell immediately with success status. Outstanding
/// background jobs are left running.
pub struct Exit {}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, _shell: &mut Shell) -> Result<ExitCode> {
        std::process::exit(0)
    }
}
