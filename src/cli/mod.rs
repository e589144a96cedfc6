//! Command-line entry points

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::models::RoomType;

pub mod commands;
pub mod quiz;

/// CLI arguments for abode
#[derive(Parser, Debug)]
#[command(name = "abode")]
#[command(author, version, about = "Interior design assistant: style quiz and AI room makeover ideas")]
#[command(long_about = r#"
Abode learns which interior design styles you like from a short swipe quiz
over stock photos, then suggests how to restyle a photo of your own room.

Typical first run:
  abode collect --generate-styles 15   Create the style catalog and download photos
  abode quiz                           Take the quiz in the terminal
  abode serve                          Open the web UI at http://127.0.0.1:3000

OPENAI_API_KEY and PEXELS_API_KEY must be set (a .env file works).
"#)]
pub struct Cli {
    /// Verbosity level (-v = debug, -vv = trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download reference photos for each catalog style
    Collect {
        /// Images to keep per style (defaults to IMAGES_PER_STYLE)
        #[arg(short, long)]
        count: Option<usize>,

        /// Only collect this style
        #[arg(short, long, value_name = "NAME")]
        style: Option<String>,

        /// Ask the model for a new catalog of N styles first
        #[arg(long, value_name = "N")]
        generate_styles: Option<usize>,
    },

    /// Take the style quiz in the terminal
    Quiz {
        /// Number of styles to show (defaults to SAMPLE_SIZE)
        #[arg(short = 'n', long)]
        sample_size: Option<usize>,

        /// Seed for a repeatable sample
        #[arg(long)]
        seed: Option<u64>,

        /// Photo of your room; requests recommendations after the quiz
        #[arg(long, value_name = "PATH")]
        room: Option<PathBuf>,

        /// Kind of room in the photo
        #[arg(long, default_value = "living_room")]
        room_type: RoomType,

        /// Free-form room size, e.g. "4m x 5m"
        #[arg(long)]
        dimensions: Option<String>,
    },

    /// Run the web UI
    Serve {
        /// Bind address (defaults to HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port (defaults to PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Review cached photos with the model and drop poor ones
    Curate {
        /// Delete rejected images instead of only reporting them
        #[arg(long)]
        apply: bool,

        /// Stop after this many images
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quiz() {
        let cli = Cli::parse_from([
            "abode", "-v", "quiz", "--seed", "7", "--room", "room.jpg", "--room-type", "bedroom",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Quiz {
                seed,
                room,
                room_type,
                sample_size,
                ..
            } => {
                assert_eq!(seed, Some(7));
                assert_eq!(room, Some(PathBuf::from("room.jpg")));
                assert_eq!(room_type, RoomType::Bedroom);
                assert_eq!(sample_size, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_curate_defaults_to_dry_run() {
        let cli = Cli::parse_from(["abode", "curate", "--limit", "20"]);
        match cli.command {
            Command::Curate { apply, limit } => {
                assert!(!apply);
                assert_eq!(limit, Some(20));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
