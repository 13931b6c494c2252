//! CLI command definitions for the `studyflow` binary.
//!
//! Uses clap derive macros for argument parsing. Each subcommand maps onto
//! one `SessionService` operation.

pub mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Guided study sessions: plan, quiz, grade and feedback.
#[derive(Parser)]
#[command(name = "studyflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a study session: build a plan and the first quiz.
    Start {
        /// What you want to learn.
        question: String,

        /// Use this session id instead of generating one.
        #[arg(long)]
        id: Option<String>,
    },

    /// Submit answers for the waiting quiz.
    Answer {
        /// Session id.
        id: String,

        /// Answer as `QUESTION_ID=ANSWER` (repeatable).
        #[arg(short, long = "answer", value_name = "QID=ANSWER")]
        answers: Vec<String>,

        /// Read answers from a JSON object file (`{"q1": "A", ...}`).
        #[arg(long, conflicts_with = "answers")]
        file: Option<PathBuf>,
    },

    /// Show the current state of a session.
    Status {
        /// Session id.
        id: String,
    },

    /// Show the checkpoint history of a session.
    History {
        /// Session id.
        id: String,
    },

    /// List stored sessions, most recent first.
    #[command(alias = "ls")]
    Sessions {
        /// Maximum number of sessions to show.
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Re-run the failed step of an errored or interrupted session.
    Recover {
        /// Session id.
        id: String,
    },

    /// Delete a session and all of its checkpoints.
    #[command(alias = "rm")]
    Delete {
        /// Session id.
        id: String,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Start the REST API server.
    Serve {
        /// Port to listen on (defaults to `[server].port`).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to `[server].host`).
        #[arg(long)]
        host: Option<String>,

        /// Export spans to stdout via OpenTelemetry.
        #[arg(long)]
        otel: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
