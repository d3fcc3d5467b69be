//! Shell completion generation for dbdump
//!
//! Generates completion scripts for bash, zsh and fish, with table names
//! completed from the `tables` file of the current directory when present.

use clap::CommandFactory;
use clap_complete::{Shell, generate};

use crate::cli::CliArgs;
use crate::error::{ConfigError, Result};

/// Generate a completion script for `shell_name` on stdout
pub fn generate_completion(shell_name: &str) -> Result<()> {
    let shell = parse_shell(shell_name)?;
    print!("{}", completion_script(shell));
    Ok(())
}

fn completion_script(shell: Shell) -> String {
    let mut cmd = CliArgs::command();
    let mut buffer = Vec::new();
    generate(shell, &mut cmd, "dbdump", &mut buffer);
    let basic = String::from_utf8_lossy(&buffer);

    match shell {
        Shell::Bash => format!(
            r#"{}

# Complete --tables from ./tables, one name per line
_dbdump_enhanced() {{
    local cur prev words cword
    _init_completion || return

    if [[ "$prev" == "-t" || "$prev" == "--tables" ]] && [ -f ./tables ]; then
        COMPREPLY=($(compgen -W "$(cat ./tables)" -- "$cur"))
        return 0
    fi

    _dbdump "$@"
}}

complete -F _dbdump_enhanced dbdump
"#,
            basic
        ),
        Shell::Fish => format!(
            r#"{}

# Complete --tables from ./tables, one name per line
complete -c dbdump -n "__fish_seen_subcommand_from export" -s t -l tables -f -a "(test -f ./tables; and cat ./tables)" -d "Table name"
"#,
            basic
        ),
        _ => basic.into_owned(),
    }
}

/// Parse shell name string to Shell enum
fn parse_shell(shell_name: &str) -> Result<Shell> {
    match shell_name.to_lowercase().as_str() {
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        "fish" => Ok(Shell::Fish),
        _ => Err(ConfigError::Generic(format!(
            "Unsupported shell: {}. Supported shells: bash, zsh, fish",
            shell_name
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shell() {
        assert!(matches!(parse_shell("bash"), Ok(Shell::Bash)));
        assert!(matches!(parse_shell("zsh"), Ok(Shell::Zsh)));
        assert!(matches!(parse_shell("fish"), Ok(Shell::Fish)));
        assert!(parse_shell("invalid").is_err());
    }

    #[test]
    fn test_parse_shell_case_insensitive() {
        assert!(matches!(parse_shell("BASH"), Ok(Shell::Bash)));
        assert!(matches!(parse_shell("FiSh"), Ok(Shell::Fish)));
    }

    #[test]
    fn test_scripts_mention_subcommands() {
        let bash = completion_script(Shell::Bash);
        assert!(bash.contains("export"));
        assert!(bash.contains("_dbdump_enhanced"));

        let zsh = completion_script(Shell::Zsh);
        assert!(zsh.contains("#compdef dbdump"));
    }
}
