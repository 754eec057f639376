//! Command-line interface definition using clap.

use std::path::PathBuf;

use clap::Parser;

use crate::config::default_config_path;

/// Print the lead board, optionally narrowed by a search.
#[derive(Parser, Debug)]
#[command(name = "leadboard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to the per-user config directory)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Search text; words are joined with single spaces
    #[arg(value_name = "TEXT")]
    pub search: Vec<String>,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }

    /// `None` when no search words were given.
    pub fn search_text(&self) -> Option<String> {
        if self.search.is_empty() {
            None
        } else {
            Some(self.search.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_no_args() {
        let cli = Cli::try_parse_from(["leadboard"]).unwrap();
        assert!(cli.config.is_none());
        assert_eq!(cli.search_text(), None);
        assert_eq!(cli.config_path(), default_config_path());
    }

    #[test]
    fn test_cli_parse_config_and_search_words() {
        let cli = Cli::try_parse_from(["leadboard", "--config", "/tmp/board.json", "ana", "silva"])
            .unwrap();
        assert_eq!(cli.config_path(), PathBuf::from("/tmp/board.json"));
        assert_eq!(cli.search_text().as_deref(), Some("ana silva"));
    }

    #[test]
    fn test_cli_parse_config_equals_and_short_forms() {
        let long = Cli::try_parse_from(["leadboard", "--config=/etc/lb.json"]).unwrap();
        assert_eq!(long.config, Some(PathBuf::from("/etc/lb.json")));

        let short = Cli::try_parse_from(["leadboard", "ana", "-c", "lb.json"]).unwrap();
        assert_eq!(short.config, Some(PathBuf::from("lb.json")));
        assert_eq!(short.search, vec!["ana".to_string()]);
    }

    #[test]
    fn test_cli_config_without_path_is_rejected() {
        assert!(Cli::try_parse_from(["leadboard", "--config"]).is_err());
    }

    #[test]
    fn test_cli_rejects_unknown_flag() {
        assert!(Cli::try_parse_from(["leadboard", "--verbose"]).is_err());
    }

    #[test]
    fn test_cli_double_dash_keeps_flag_like_search_text() {
        let cli = Cli::try_parse_from(["leadboard", "--", "--config"]).unwrap();
        assert!(cli.config.is_none());
        assert_eq!(cli.search_text().as_deref(), Some("--config"));
    }

    #[test]
    fn test_cli_help() {
        Cli::command().debug_assert();
    }
}
