//! Command-line interface definitions.
//!
//! Most behaviour lives in the YAML config file; the flags here select that
//! file and override the options an operator typically changes per run. Every
//! flag can also be supplied through the environment.

use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for a single crawl run.
///
/// # Examples
///
/// ```sh
/// # Scheduled run with the checked-in config
/// numbered_news_feed -c config.yaml
///
/// # See what would be discovered without touching any state
/// numbered_news_feed -c config.yaml --dry-run --no-delay
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "NEWS_FEED_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Override the cursor file location
    #[arg(long, env = "NEWS_FEED_CURSOR_FILE")]
    pub cursor_file: Option<PathBuf>,

    /// Override the RSS output file location
    #[arg(long, env = "NEWS_FEED_OUTPUT")]
    pub feed_output: Option<PathBuf>,

    /// Override the overall run deadline, in seconds
    #[arg(long, env = "NEWS_FEED_DEADLINE_SECS")]
    pub deadline_secs: Option<u64>,

    /// Scan and report, but never write the cursor or the feed
    #[arg(long, env = "NEWS_FEED_DRY_RUN")]
    pub dry_run: bool,

    /// Disable the randomized delay between requests
    #[arg(long, env = "NEWS_FEED_NO_DELAY")]
    pub no_delay: bool,
}

impl Cli {
    /// Fold command-line overrides into `config`.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(path) = &self.cursor_file {
            config.cursor_path = path.clone();
        }
        if let Some(path) = &self.feed_output {
            config.feed.output_path = path.clone();
        }
        if let Some(secs) = self.deadline_secs {
            config.run_deadline_secs = Some(secs);
        }
        if self.no_delay {
            config.delay_min_ms = 0;
            config.delay_max_ms = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["numbered_news_feed"]);
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert!(!cli.dry_run);
        assert!(!cli.no_delay);
        assert!(cli.cursor_file.is_none());
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "numbered_news_feed",
            "-c",
            "/etc/feed.yaml",
            "--cursor-file",
            "/var/lib/feed/cursor",
            "--feed-output",
            "/srv/www/feed.xml",
            "--deadline-secs",
            "900",
            "--dry-run",
            "--no-delay",
        ]);

        assert_eq!(cli.config, PathBuf::from("/etc/feed.yaml"));
        assert_eq!(cli.cursor_file, Some(PathBuf::from("/var/lib/feed/cursor")));
        assert_eq!(cli.feed_output, Some(PathBuf::from("/srv/www/feed.xml")));
        assert_eq!(cli.deadline_secs, Some(900));
        assert!(cli.dry_run);
        assert!(cli.no_delay);
    }

    #[test]
    fn test_apply_overrides() {
        let cli = Cli::parse_from([
            "numbered_news_feed",
            "--cursor-file",
            "c.txt",
            "--deadline-secs",
            "60",
            "--no-delay",
        ]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.cursor_path, PathBuf::from("c.txt"));
        assert_eq!(config.run_deadline_secs, Some(60));
        assert_eq!((config.delay_min_ms, config.delay_max_ms), (0, 0));
        assert_eq!(config.feed.output_path, PathBuf::from("docs/feed.xml"));
    }
}
