//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// LED and obstacle-sensor state API.
#[derive(Debug, Parser)]
#[command(name = "ledsense", version, about)]
pub struct Cli {
    /// Configuration file (TOML or YAML). Defaults to `ledsense.toml` or
    /// `ledsense.yaml` in the working directory when present.
    #[arg(long, short, global = true, env = "LEDSENSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Command to run; `serve` when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP API.
    Serve,

    /// Create a login user with an argon2-hashed password.
    CreateUser {
        /// User name (`usuario.nombre`).
        nombre: String,

        /// Plaintext password. May come from the environment instead so it
        /// stays out of the process list.
        #[arg(env = "LEDSENSE_NEW_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["ledsense"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn parses_create_user() {
        let cli = Cli::try_parse_from([
            "ledsense",
            "--config",
            "prod.toml",
            "create-user",
            "ana",
            "clave",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("prod.toml")));
        match cli.command {
            Some(Command::CreateUser { nombre, password }) => {
                assert_eq!(nombre, "ana");
                assert_eq!(password, "clave");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
