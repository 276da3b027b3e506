use clap::Parser;
use thoughtboard::cli::{
    handle_board_add, handle_board_delete, handle_board_front, handle_board_list,
    handle_board_move, handle_init, handle_note_add, handle_note_delete, handle_topic_add,
    handle_topic_delete, handle_topic_list, handle_watch, BoardAction, Cli, Commands, NoteAction,
    TopicAction,
};
use thoughtboard::BoardError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "thoughtboard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => handle_init(),
        Commands::Topic(topic) => match topic.action {
            TopicAction::Add { title, local, json } => handle_topic_add(title, local, json).await,
            TopicAction::List { local, json } => handle_topic_list(local, json).await,
            TopicAction::Delete { id, local, force } => handle_topic_delete(id, local, force).await,
        },
        Commands::Note(note) => match note.action {
            NoteAction::Add {
                topic,
                content,
                local,
                json,
            } => handle_note_add(topic, content, local, json).await,
            NoteAction::Delete { topic, id, local } => handle_note_delete(topic, id, local).await,
        },
        Commands::Board(board) => match board.action {
            BoardAction::Add {
                text,
                x,
                y,
                no_ai,
                json,
            } => handle_board_add(text, x, y, no_ai, json).await,
            BoardAction::List { json } => handle_board_list(json).await,
            BoardAction::Move { id, x, y } => handle_board_move(id, x, y).await,
            BoardAction::Front { id } => handle_board_front(id).await,
            BoardAction::Delete { id, force } => handle_board_delete(id, force).await,
        },
        Commands::Watch {
            topics,
            interval_ms,
        } => handle_watch(topics, interval_ms).await,
    };

    match result {
        Ok(()) => {}
        Err(BoardError::NotInitialized) => {
            eprintln!("Error: {}", BoardError::NotInitialized);
            eprintln!("No board found in this directory or any parent.");
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
