//! Session environment: the variable file loaded at startup, lookups into
//! the live process environment, and `$NAME` / `${NAME}` expansion.

use regex::Regex;
use std::collections::HashMap;
use std::env as stdenv;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Per-session view of the environment.
///
/// Two variable sources coexist: the map loaded from the variable file at
/// construction, and the live process environment. Expansion reads only the
/// latter; the file map is held as session configuration and never consulted
/// by [`Environment::resolve_variables`].
#[derive(Debug, Clone)]
pub struct Environment {
    file_vars: HashMap<String, String>,
    /// The working directory shown in the prompt and used to resolve
    /// relative `cd` targets.
    pub current_dir: PathBuf,
}

impl Environment {
    /// Capture the process state and load the variable file. A missing file
    /// is tolerated and yields an empty map.
    pub fn new(vars_file: &Path) -> Self {
        let file_vars = load_vars_file(vars_file);
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            file_vars,
            current_dir,
        }
    }

    /// Value of a live process-environment variable.
    pub fn get_var(&self, key: &str) -> Option<String> {
        stdenv::var(key).ok()
    }

    /// The user's home directory, from `HOME`.
    pub fn home_dir(&self) -> Option<String> {
        self.get_var("HOME")
    }

    /// Variables loaded from the startup file.
    ///
    /// Expansion does not read these; they are kept as startup configuration
    /// alongside the live environment.
    pub fn file_vars(&self) -> &HashMap<String, String> {
        &self.file_vars
    }

    /// Expand every `$NAME` and `${NAME}` occurrence against the process
    /// environment. Unset names are replaced with the empty string.
    pub fn resolve_variables(&self, line: &str) -> String {
        expand_with(line, |name| self.get_var(name))
    }
}

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{?([A-Za-z0-9_]+)\}?").expect("variable pattern"))
}

/// Leftmost-match substitution loop. The scan position advances past each
/// inserted value, so a value that itself contains `$` cannot re-trigger a
/// match and the loop always terminates.
fn expand_with(line: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = line.to_owned();
    let mut scan = 0;
    while scan < result.len() {
        let Some(caps) = variable_pattern().captures(&result[scan..]) else {
            break;
        };
        let matched = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        let value = caps
            .get(1)
            .and_then(|name| lookup(name.as_str()))
            .unwrap_or_default();
        let start = scan + matched.0;
        let end = scan + matched.1;
        result.replace_range(start..end, &value);
        scan = start + value.len();
    }
    result
}

/// Load `key=value` lines from `path`. The first `=` splits key from value;
/// lines without one are skipped. There is no comment or escape syntax.
fn load_vars_file(path: &Path) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    let Ok(contents) = fs::read_to_string(path) else {
        return vars;
    };
    for line in contents.lines() {
        if let Some((key, value)) = line.split_once('=') {
            vars.insert(key.to_owned(), value.to_owned());
        }
    }
    vars
}
