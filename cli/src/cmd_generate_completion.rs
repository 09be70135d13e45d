// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, fs::File, io, path::Path, path::PathBuf};

use clap::{ArgMatches, Command, ValueEnum, ValueHint, arg, value_parser};
use clap_complete::{Generator, generate};

use crate::Cli;

/// Writes a completion script for calsync.
#[derive(Debug, Clone)]
pub struct CmdGenerateCompletion {
    /// Target shell; taken from `$SHELL` when absent.
    pub shell: Option<Shell>,

    /// Script destination; stdout when absent.
    pub output: Option<PathBuf>,
}

impl CmdGenerateCompletion {
    pub const NAME: &str = "generate-completion";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Generate shell completion for calsync")
            .hide(true)
            .arg(
                arg!(shell: [SHELL] "Shell to generate for, detected from $SHELL by default")
                    .value_parser(value_parser!(Shell)),
            )
            .arg(
                arg!(-o --output <FILE> "Write the script to a file instead of stdout")
                    .value_parser(value_parser!(PathBuf))
                    .value_hint(ValueHint::FilePath),
            )
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            shell: matches.get_one::<Shell>("shell").copied(),
            output: matches.get_one::<PathBuf>("output").cloned(),
        }
    }

    pub fn run(self) -> Result<(), Box<dyn Error>> {
        let shell = match self.shell {
            Some(shell) => shell,
            None => std::env::var_os("SHELL")
                .and_then(|path| Shell::from_path(Path::new(&path)))
                .ok_or("cannot tell the shell from $SHELL, name it explicitly")?,
        };
        tracing::debug!(?shell, output = ?self.output, "generating shell completion");

        match &self.output {
            Some(path) => shell.write(&mut File::create(path)?),
            None => shell.write(&mut io::stdout()),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Elvish,
    Fish,
    Nushell,
    #[clap(name = "powershell")]
    #[allow(clippy::enum_variant_names)]
    PowerShell,
    Zsh,
}

impl Shell {
    /// Recognizes a shell from its executable, e.g. `/usr/bin/zsh`.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.file_stem()?.to_str()? {
            "bash" => Some(Self::Bash),
            "elvish" => Some(Self::Elvish),
            "fish" => Some(Self::Fish),
            "nu" => Some(Self::Nushell),
            "pwsh" | "powershell" => Some(Self::PowerShell),
            "zsh" => Some(Self::Zsh),
            _ => None,
        }
    }

    /// Writes the completion script for the whole command tree.
    pub fn write(self, buf: &mut impl io::Write) {
        use clap_complete::Shell as ClapShell;

        match self {
            Self::Bash => emit(ClapShell::Bash, buf),
            Self::Elvish => emit(ClapShell::Elvish, buf),
            Self::Fish => emit(ClapShell::Fish, buf),
            Self::PowerShell => emit(ClapShell::PowerShell, buf),
            Self::Zsh => emit(ClapShell::Zsh, buf),
            Self::Nushell => emit(clap_complete_nushell::Nushell {}, buf),
        }
    }
}

fn emit(generator: impl Generator, buf: &mut impl io::Write) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(generator, &mut cmd, name, buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CmdGenerateCompletion {
        let matches = Cli::command().try_get_matches_from(args).unwrap();
        let sub_matches = matches.subcommand_matches(CmdGenerateCompletion::NAME).unwrap();
        CmdGenerateCompletion::from(sub_matches)
    }

    #[test]
    fn test_parse_shell_and_output() {
        let cmd = parse(&["calsync", "generate-completion", "fish", "-o", "/tmp/calsync.fish"]);
        assert_eq!(cmd.shell, Some(Shell::Fish));
        assert_eq!(cmd.output, Some(PathBuf::from("/tmp/calsync.fish")));

        let cmd = parse(&["calsync", "generate-completion"]);
        assert_eq!(cmd.shell, None);
        assert_eq!(cmd.output, None);
    }

    #[test]
    fn test_shell_from_path() {
        assert_eq!(Shell::from_path(Path::new("/bin/bash")), Some(Shell::Bash));
        assert_eq!(Shell::from_path(Path::new("/usr/local/bin/zsh")), Some(Shell::Zsh));
        assert_eq!(Shell::from_path(Path::new("/usr/bin/nu")), Some(Shell::Nushell));
        assert_eq!(Shell::from_path(Path::new("/usr/bin/pwsh")), Some(Shell::PowerShell));
        assert_eq!(Shell::from_path(Path::new("/bin/tcsh")), None);
    }

    #[test]
    fn test_script_covers_subcommands() {
        let mut output = vec![];
        Shell::Bash.write(&mut output);

        let script = String::from_utf8(output).unwrap();
        assert!(script.contains("calsync"));
        assert!(script.contains("add-source"));
    }

    #[test]
    fn test_writes_script_to_file() {
        let path = std::env::temp_dir().join(format!("calsync-{}.zsh", std::process::id()));
        let cmd = CmdGenerateCompletion {
            shell: Some(Shell::Zsh),
            output: Some(path.clone()),
        };

        cmd.run().unwrap();

        let script = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(script.contains("#compdef calsync"));
    }
}
