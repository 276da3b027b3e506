use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "thoughtboard")]
#[command(version, about = "A shared sticky-note board that syncs between clients")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new board in the current directory
    Init,

    /// Manage topics
    Topic(TopicCommand),

    /// Manage the notes inside a topic
    Note(NoteCommand),

    /// Manage notes on the freeform whiteboard
    Board(BoardCommand),

    /// Print the board every time another client changes it
    Watch {
        /// Watch the topic list instead of the whiteboard
        #[arg(long)]
        topics: bool,

        /// How often to check for changes from other processes, in milliseconds
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },
}

#[derive(Args, Debug)]
pub struct TopicCommand {
    #[command(subcommand)]
    pub action: TopicAction,
}

#[derive(Subcommand, Debug)]
pub enum TopicAction {
    /// Add a new topic
    Add {
        /// Topic title
        title: String,

        /// Keep the topic on this device only
        #[arg(long)]
        local: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List topics with their notes
    List {
        /// List device-only topics
        #[arg(long)]
        local: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a topic and all of its notes
    Delete {
        /// Topic ID (full or short)
        id: String,

        /// Device-only topic
        #[arg(long)]
        local: bool,

        /// Skip confirmation
        #[arg(long, short = 'f')]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct NoteCommand {
    #[command(subcommand)]
    pub action: NoteAction,
}

#[derive(Subcommand, Debug)]
pub enum NoteAction {
    /// Add a note to a topic
    Add {
        /// Topic ID (full or short)
        topic: String,

        /// Note text
        content: String,

        /// Device-only topic
        #[arg(long)]
        local: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a note from a topic
    Delete {
        /// Topic ID (full or short)
        topic: String,

        /// Note ID (full or short)
        id: String,

        /// Device-only topic
        #[arg(long)]
        local: bool,
    },
}

#[derive(Args, Debug)]
pub struct BoardCommand {
    #[command(subcommand)]
    pub action: BoardAction,
}

#[derive(Subcommand, Debug)]
pub enum BoardAction {
    /// Pin a new note to the whiteboard
    Add {
        /// What the note says. A single noun may become an icon.
        text: String,

        /// Horizontal position
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        x: f64,

        /// Vertical position
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        y: f64,

        /// Always make a text note, even when AI is configured
        #[arg(long)]
        no_ai: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List notes back to front
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drag a note to a new position
    Move {
        /// Note ID (full or short)
        id: String,

        #[arg(allow_negative_numbers = true)]
        x: f64,

        #[arg(allow_negative_numbers = true)]
        y: f64,
    },

    /// Bring a note to the front
    Front {
        /// Note ID (full or short)
        id: String,
    },

    /// Delete a note
    Delete {
        /// Note ID (full or short)
        id: String,

        /// Skip confirmation
        #[arg(long, short = 'f')]
        force: bool,
    },
}
