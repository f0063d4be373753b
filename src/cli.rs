use crate::locale::Language;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "daynote", version, about = "Daily notes with todos and search")]
pub struct Cli {
    /// Config file to read instead of the per-user one
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Directory holding the notes
    #[arg(long, global = true)]
    pub notes_dir: Option<PathBuf>,
    /// Language for filenames and headings
    #[arg(long = "lang", value_enum, global = true)]
    pub language: Option<Language>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Launch the interactive editor
    Tui,
    /// Print a note (nothing is written for a missing one)
    Show {
        /// today, yesterday, tomorrow, YYYY-MM-DD or DD-Mon-YYYY
        date: Option<String>,
    },
    /// Replace a note with text read from stdin
    Write { date: Option<String> },
    /// List todos across all notes
    Todos {
        /// Include finished todos
        #[arg(long)]
        all: bool,
    },
    /// Mark the todo on a note line as done
    Done {
        date: String,
        /// 1-based line number of the todo
        line: usize,
    },
    /// Search every note line
    Search {
        query: String,
        /// Maximum number of hits to print
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },
    /// List every note on disk
    List,
    /// Print the file path for a date
    Path { date: Option<String> },
}
