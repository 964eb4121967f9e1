use clap::{Parser, Subcommand};
use rescache_core::ReloadMode;

/// Fetch resources through an in-memory fragment cache.
#[derive(Debug, Parser)]
#[command(version, about = "Fetch resources through an in-memory fragment cache")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load each URL through one registry and print a JSON report per URL
    Fetch {
        /// URLs to load, in order. Repeats are served from the cache when allowed.
        #[arg(required = true)]
        urls: Vec<String>,

        /// Reload mode: increment, always, normal, check-if-modified, force-reload, never
        #[arg(short, long)]
        mode: Option<ReloadMode>,

        /// Run a whole collection pass before printing the final stats
        #[arg(long)]
        clear: bool,
    },

    /// Print the effective configuration as JSON
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::try_parse_from(["rescache", "fetch", "example.com", "example.org/a", "--mode", "force-reload"])
            .unwrap();
        let Command::Fetch { urls, mode, clear } = cli.command else {
            panic!("expected fetch");
        };
        assert_eq!(urls, vec!["example.com", "example.org/a"]);
        assert_eq!(mode, Some(ReloadMode::ForceReload));
        assert!(!clear);
    }

    #[test]
    fn test_fetch_requires_url() {
        assert!(Cli::try_parse_from(["rescache", "fetch"]).is_err());
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(Cli::try_parse_from(["rescache", "fetch", "example.com", "--mode", "sometimes"]).is_err());
    }

    #[test]
    fn test_parse_config() {
        let cli = Cli::try_parse_from(["rescache", "config"]).unwrap();
        assert!(matches!(cli.command, Command::Config));
    }
}
