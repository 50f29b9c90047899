use anyhow::Result;
use minishell::{Shell, ShellConfig};

fn main() -> Result<()> {
    Shell::new(ShellConfig::default()).repl()
}
