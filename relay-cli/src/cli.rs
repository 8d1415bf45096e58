use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(about = "Fetch images, galleries and videos and normalize them for re-upload")]
#[command(version)]
pub struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the media directory
    #[arg(long, global = true)]
    pub media_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download the media behind a URL into the media directory
    Fetch {
        /// Content URL
        url: String,

        /// Identifier used to name the output files
        #[arg(long)]
        id: String,

        /// Also transcode video results
        #[arg(long)]
        normalize: bool,
    },

    /// Transcode a local video with the configured limits
    Normalize {
        /// Input video file
        path: PathBuf,
    },

    /// Print the fetch strategy a URL maps to
    Classify {
        /// Content URL
        url: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_args() {
        let args = Args::parse_from([
            "relay",
            "fetch",
            "https://v.redd.it/xyz",
            "--id",
            "abc",
            "--normalize",
            "--media-dir",
            "/tmp/media",
        ]);
        assert_eq!(args.media_dir, Some(PathBuf::from("/tmp/media")));
        match args.command {
            Commands::Fetch { url, id, normalize } => {
                assert_eq!(url, "https://v.redd.it/xyz");
                assert_eq!(id, "abc");
                assert!(normalize);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_fetch_requires_id() {
        assert!(Args::try_parse_from(["relay", "fetch", "https://i.redd.it/a.jpg"]).is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
