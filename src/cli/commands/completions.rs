//! `authvault completions <shell>`: print a completion script.
//!
//! ```text
//! authvault completions bash > ~/.local/share/bash-completion/completions/authvault
//! authvault completions zsh > "${fpath[1]}/_authvault"
//! ```

use std::io::{self, Write};

use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::cli::Cli;
use crate::errors::Result;

pub fn execute(shell: Shell) -> Result<()> {
    write_script(shell, &mut io::stdout().lock())
}

/// Generate the script for `shell` into `out`.
pub fn write_script(shell: Shell, out: &mut dyn Write) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, out);
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn script(shell: Shell) -> String {
        let mut out = Vec::new();
        write_script(shell, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn scripts_cover_vault_commands() {
        for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
            let text = script(shell);
            for command in ["code", "commit", "export", "passwd"] {
                assert!(text.contains(command), "{shell:?} script lacks `{command}`");
            }
        }
    }

    #[test]
    fn shell_names_are_parsed_by_clap() {
        let cli = Cli::try_parse_from(["authvault", "completions", "FISH"]).unwrap();
        assert!(matches!(
            cli.command,
            crate::cli::Commands::Completions { shell: Shell::Fish }
        ));
        assert!(Cli::try_parse_from(["authvault", "completions", "csh"]).is_err());
    }
}
