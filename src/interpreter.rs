//! The interactive session: reads lines, routes builtins and hands
//! pipelines to the launcher, in the foreground or as background jobs.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::builtin;
use crate::env::Environment;
use crate::external;
use crate::history::HistoryLog;
use crate::jobs::JobTable;
use crate::lexer;
use crate::parser;

/// File locations a session reads and writes.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Append-only command history.
    pub history_file: PathBuf,
    /// `key=value` variables loaded once at startup.
    pub vars_file: PathBuf,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            history_file: PathBuf::from("history.txt"),
            vars_file: PathBuf::from("vars.txt"),
        }
    }
}

/// One interactive shell session.
///
/// The environment, job table and history log are owned per session rather
/// than held globally, so independent sessions can coexist.
pub struct Shell {
    pub(crate) env: Environment,
    pub(crate) jobs: JobTable,
    pub(crate) history: HistoryLog,
}

impl Shell {
    pub fn new(config: ShellConfig) -> Self {
        Self {
            env: Environment::new(&config.vars_file),
            jobs: JobTable::default(),
            history: HistoryLog::new(config.history_file),
        }
    }

    /// Read-eval loop over standard input. Returns when the input stream
    /// ends; the `exit` builtin terminates the process directly.
    pub fn repl(&mut self) -> Result<()> {
        let mut rl = DefaultEditor::new()?;
        let mut stdout = io::stdout();
        loop {
            match rl.readline(&self.prompt()) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line.as_str())?;
                    self.process_line(&line, &mut stdout)?;
                    stdout.flush()?;
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn prompt(&self) -> String {
        format!("{} $ ", self.env.current_dir.display())
    }

    /// Process one submitted line: record it, strip a trailing `&`, expand
    /// variables, poll the job table once, then run a builtin or launch a
    /// pipeline. Blank lines are ignored entirely.
    pub fn process_line(&mut self, line: &str, out: &mut dyn Write) -> Result<()> {
        if line.trim().is_empty() {
            return Ok(());
        }
        if let Err(e) = self.history.append(line) {
            eprintln!("minishell: {e:#}");
        }

        let (line, background) = strip_background_marker(line);
        let line = self.env.resolve_variables(line);
        let words = lexer::split_words(&line);

        self.jobs.poll_once(out);

        if words.is_empty() {
            return Ok(());
        }

        if let Some(cmd) = builtin::recognize(&words) {
            cmd.run(out, self)?;
            return Ok(());
        }

        self.run_pipeline(&words.join(" "), background);
        Ok(())
    }

    fn run_pipeline(&mut self, command_line: &str, background: bool) {
        let pipeline = match parser::build_pipeline(command_line) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                eprintln!("minishell: {e}");
                return;
            }
        };

        let mut launched = Vec::new();
        if let Err(e) = external::spawn_pipeline(&pipeline, &mut launched) {
            eprintln!("minishell: {e}");
        }
        if launched.is_empty() {
            return;
        }
        // Even a partially spawned pipeline is tracked: waited on in the
        // foreground, registered in the background.
        if background {
            self.jobs.register(launched, command_line);
        } else {
            external::wait_foreground(&launched);
        }
    }
}

/// Detect and remove a trailing `&`. Whitespace around the marker goes with
/// it.
fn strip_background_marker(line: &str) -> (&str, bool) {
    let trimmed = line.trim_end();
    match trimmed.strip_suffix('&') {
        Some(rest) => (rest, true),
        None => (trimmed, false),
    }
}
