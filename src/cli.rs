use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "automaster", about = "Automatic audio mastering from the signal's own spectrum")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output WAV file (16-bit PCM), overwritten by every stage
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Target profile; unknown names fall back to "default"
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Stages to run, in order (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub steps: Vec<String>,

    /// Disable automastering: use explicit or default settings only
    #[arg(long)]
    pub no_auto: bool,

    /// Samples per periodogram segment
    #[arg(long)]
    pub segment_size: Option<usize>,

    /// Config file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write a JSON report of the resolved stage settings
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// List available profiles and exit
    #[arg(short, long)]
    pub list: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_flags() {
        let cli = Cli::parse_from([
            "automaster",
            "--input",
            "in.wav",
            "--output",
            "out.wav",
            "--profile",
            "bass-heavy",
            "--steps",
            "normalization,compression",
            "--no-auto",
            "--segment-size",
            "1024",
            "--report",
            "report.json",
        ]);
        assert_eq!(cli.input, Some(PathBuf::from("in.wav")));
        assert_eq!(cli.output, Some(PathBuf::from("out.wav")));
        assert_eq!(cli.profile.as_deref(), Some("bass-heavy"));
        assert_eq!(cli.steps, vec!["normalization", "compression"]);
        assert!(cli.no_auto);
        assert_eq!(cli.segment_size, Some(1024));
        assert!(!cli.list);
    }

    #[test]
    fn list_needs_no_paths() {
        let cli = Cli::parse_from(["automaster", "--list"]);
        assert!(cli.list);
        assert!(cli.input.is_none());
        assert!(cli.output.is_none());
    }
}
