use std::env;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::ai::{GeminiClient, IconGenerator};
use crate::config::BoardConfig;
use crate::enrich::compose_note;
use crate::entity::{Note, NoteKind, Topic};
use crate::error::{BoardError, Result};
use crate::storage::{LocalStore, LoroStore, RemoteStore, StorePath, BOARD_DIR};
use crate::sync::{LocalTopicBoard, Point, TopicBoardSync, WhiteboardSync};

const SHORT_ID_LEN: usize = 8;

/// Find the project root by looking for .thoughtboard/ or .git/
fn find_project_root() -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let mut current = cwd.as_path();
    loop {
        if current.join(BOARD_DIR).exists() || current.join(".git").exists() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return cwd,
        }
    }
}

/// The shared store plus the config that says where things live in it.
struct Board {
    store: Arc<LoroStore>,
    config: BoardConfig,
}

impl Board {
    fn open() -> Result<Self> {
        let root = find_project_root();
        let store = Arc::new(LoroStore::open(&root)?);
        let config = BoardConfig::load(&root.join(BOARD_DIR))?;
        Ok(Self { store, config })
    }

    fn remote(&self) -> Arc<dyn RemoteStore> {
        self.store.clone()
    }

    async fn whiteboard(&self) -> Result<WhiteboardSync> {
        let collection = StorePath::parse(&self.config.board.notes_path)?;
        WhiteboardSync::connect(self.remote(), collection, self.config.layout()).await
    }

    async fn topics(&self) -> Result<TopicBoardSync> {
        let collection = StorePath::parse(&self.config.board.topics_path)?;
        TopicBoardSync::connect(self.remote(), collection, self.config.topics.order).await
    }
}

fn open_local_topics() -> Result<LocalTopicBoard<LocalStore>> {
    let board_dir = find_project_root().join(BOARD_DIR);
    if !board_dir.exists() {
        return Err(BoardError::NotInitialized);
    }
    LocalTopicBoard::load(LocalStore::open(&board_dir)?)
}

/// The tail of a key. Keys start with a timestamp, so the head of two keys
/// made a minute apart looks the same.
pub(crate) fn short_id(id: &str) -> &str {
    match id.char_indices().rev().nth(SHORT_ID_LEN - 1) {
        Some((start, _)) => &id[start..],
        None => id,
    }
}

/// Resolve a full id, or a unique head or tail of one.
pub(crate) fn resolve_id<'a>(ids: impl IntoIterator<Item = &'a str>, query: &str) -> Result<String> {
    let ids: Vec<&str> = ids.into_iter().collect();
    if let Some(id) = ids.iter().find(|id| **id == query) {
        return Ok(id.to_string());
    }
    if query.is_empty() {
        return Err(BoardError::EntityNotFound(query.to_string()));
    }

    let matches: Vec<&str> = ids
        .into_iter()
        .filter(|id| id.starts_with(query) || id.ends_with(query))
        .collect();
    match matches.as_slice() {
        [id] => Ok(id.to_string()),
        [] => Err(BoardError::EntityNotFound(query.to_string())),
        _ => Err(BoardError::Validation(format!(
            "'{}' matches {} entries, use more characters",
            query,
            matches.len()
        ))),
    }
}

/// Ask before destroying something. Non-interactive callers must pass --force.
fn confirm(prompt: &str) -> Result<bool> {
    eprintln!("{} [y/N] ", prompt);

    if atty::is(atty::Stream::Stdin) {
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(false);
        }
        Ok(true)
    } else {
        Err(BoardError::Validation(
            "Use --force to delete in non-interactive mode".to_string(),
        ))
    }
}

fn describe_content(note: &Note) -> String {
    match note.kind {
        NoteKind::Text => note.content.clone(),
        NoteKind::Image => format!("[image, {} bytes]", note.content.len()),
    }
}

fn print_topics(topics: &[Topic], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(topics)?);
        return Ok(());
    }
    if topics.is_empty() {
        println!("No topics yet.");
        return Ok(());
    }

    println!("Topics:\n");
    for topic in topics {
        if topic.created_at.is_empty() {
            println!("  ({}) {}", short_id(&topic.id), topic.title);
        } else {
            println!(
                "  ({}) {}  [{}]",
                short_id(&topic.id),
                topic.title,
                topic.created_at
            );
        }
        for note in &topic.notes {
            println!("      - ({}) {}", short_id(&note.id), note.content);
        }
    }
    Ok(())
}

fn print_notes(notes: &[Note], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(notes)?);
        return Ok(());
    }
    if notes.is_empty() {
        println!("The board is empty.");
        return Ok(());
    }

    println!("Notes (back to front):\n");
    for note in notes {
        println!(
            "  ({}) z{} at ({}, {}) [{}, {}] {}",
            short_id(&note.id),
            note.z_index,
            note.x,
            note.y,
            note.color,
            note.rotation,
            describe_content(note)
        );
    }
    Ok(())
}

fn topic_ids(topics: &[Topic]) -> impl Iterator<Item = &str> {
    topics.iter().map(|t| t.id.as_str())
}

pub fn handle_init() -> Result<()> {
    let root = env::current_dir()?;

    let _store = LoroStore::init(&root)?;
    BoardConfig::write_default(&root.join(BOARD_DIR))?;

    println!("Initialized thoughtboard in {}", root.display());
    Ok(())
}

pub async fn handle_topic_add(title: String, local: bool, json: bool) -> Result<()> {
    let topic = if local {
        open_local_topics()?.add_topic(&title)?
    } else {
        let board = Board::open()?;
        let mut topics = board.topics().await?;
        let topic = topics.add_topic(&title).await?;
        topics.close().await;
        topic
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&topic)?);
    } else {
        println!("Created topic ({}) - {}", short_id(&topic.id), topic.title);
    }
    Ok(())
}

pub async fn handle_topic_list(local: bool, json: bool) -> Result<()> {
    let topics: Vec<Topic> = if local {
        open_local_topics()?.topics().to_vec()
    } else {
        let board = Board::open()?;
        let topics = board.topics().await?;
        let list = topics.topics().into_iter().cloned().collect();
        topics.close().await;
        list
    };

    print_topics(&topics, json)
}

pub async fn handle_topic_delete(id: String, local: bool, force: bool) -> Result<()> {
    if local {
        let mut board = open_local_topics()?;
        let id = resolve_id(topic_ids(board.topics()), &id)?;
        let title = board.topic(&id).map(|t| t.title.clone()).unwrap_or_default();
        if !force && !confirm(&format!("Delete topic ({}) - {} and all its notes?", short_id(&id), title))? {
            return Ok(());
        }
        board.delete_topic(&id)?;
        println!("Deleted topic ({}) - {}", short_id(&id), title);
        return Ok(());
    }

    let board = Board::open()?;
    let mut topics = board.topics().await?;
    let ids: Vec<&str> = topics.topics().into_iter().map(|t| t.id.as_str()).collect();
    let id = resolve_id(ids, &id)?;
    let title = topics.topic(&id).map(|t| t.title.clone()).unwrap_or_default();

    if !force && !confirm(&format!("Delete topic ({}) - {} and all its notes?", short_id(&id), title))? {
        return Ok(());
    }
    topics.delete_topic(&id).await?;
    topics.close().await;

    println!("Deleted topic ({}) - {}", short_id(&id), title);
    Ok(())
}

pub async fn handle_note_add(topic: String, content: String, local: bool, json: bool) -> Result<()> {
    let (topic_id, note) = if local {
        let mut board = open_local_topics()?;
        let topic_id = resolve_id(topic_ids(board.topics()), &topic)?;
        let note = board.add_note(&topic_id, &content)?;
        (topic_id, note)
    } else {
        let board = Board::open()?;
        let mut topics = board.topics().await?;
        let ids: Vec<&str> = topics.topics().into_iter().map(|t| t.id.as_str()).collect();
        let topic_id = resolve_id(ids, &topic)?;
        let note = topics.add_note(&topic_id, &content).await?;
        topics.close().await;
        (topic_id, note)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&note)?);
    } else {
        println!(
            "Added note ({}) to topic ({})",
            short_id(&note.id),
            short_id(&topic_id)
        );
    }
    Ok(())
}

pub async fn handle_note_delete(topic: String, id: String, local: bool) -> Result<()> {
    let note_ids = |t: &Topic| t.notes.iter().map(|n| n.id.clone()).collect::<Vec<_>>();

    let note_id = if local {
        let mut board = open_local_topics()?;
        let topic_id = resolve_id(topic_ids(board.topics()), &topic)?;
        let ids = board.topic(&topic_id).map(note_ids).unwrap_or_default();
        let note_id = resolve_id(ids.iter().map(String::as_str), &id)?;
        board.delete_note(&topic_id, &note_id)?;
        note_id
    } else {
        let board = Board::open()?;
        let mut topics = board.topics().await?;
        let ids: Vec<&str> = topics.topics().into_iter().map(|t| t.id.as_str()).collect();
        let topic_id = resolve_id(ids, &topic)?;
        let ids = topics.topic(&topic_id).map(note_ids).unwrap_or_default();
        let note_id = resolve_id(ids.iter().map(String::as_str), &id)?;
        topics.delete_note(&topic_id, &note_id).await?;
        topics.close().await;
        note_id
    };

    println!("Deleted note ({})", short_id(&note_id));
    Ok(())
}

pub async fn handle_board_add(text: String, x: f64, y: f64, no_ai: bool, json: bool) -> Result<()> {
    let board = Board::open()?;

    let ai = if no_ai {
        None
    } else if board.config.ai.is_configured() {
        GeminiClient::from_config(&board.config.ai)?
    } else {
        debug!(env = %board.config.ai.api_key_env, "no AI key set, making a text note");
        None
    };

    let draft = compose_note(
        ai.as_ref().map(|c| c as &dyn IconGenerator),
        &text,
        Point::new(x, y),
    )
    .await;

    let mut whiteboard = board.whiteboard().await?;
    let note = whiteboard.create_note(draft).await?;
    whiteboard.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&note)?);
    } else {
        println!(
            "Pinned {} note ({}) at ({}, {})",
            note.kind,
            short_id(&note.id),
            note.x,
            note.y
        );
    }
    Ok(())
}

pub async fn handle_board_list(json: bool) -> Result<()> {
    let board = Board::open()?;
    let whiteboard = board.whiteboard().await?;
    let notes: Vec<Note> = whiteboard.stacking_order().into_iter().cloned().collect();
    whiteboard.close().await;

    print_notes(&notes, json)
}

fn resolve_note(whiteboard: &WhiteboardSync, query: &str) -> Result<String> {
    resolve_id(whiteboard.notes().iter().map(|n| n.id.as_str()), query)
}

pub async fn handle_board_move(id: String, x: f64, y: f64) -> Result<()> {
    let board = Board::open()?;
    let mut whiteboard = board.whiteboard().await?;
    let id = resolve_note(&whiteboard, &id)?;

    let position = whiteboard.move_note(&id, Point::new(x, y)).await?;
    whiteboard.close().await;

    println!("Moved ({}) to ({}, {})", short_id(&id), position.x, position.y);
    Ok(())
}

pub async fn handle_board_front(id: String) -> Result<()> {
    let board = Board::open()?;
    let mut whiteboard = board.whiteboard().await?;
    let id = resolve_note(&whiteboard, &id)?;

    whiteboard.bring_to_front(&id).await?;
    let z_index = whiteboard.note(&id).map(|n| n.z_index).unwrap_or_default();
    whiteboard.close().await;

    println!("Brought ({}) to the front (z{})", short_id(&id), z_index);
    Ok(())
}

pub async fn handle_board_delete(id: String, force: bool) -> Result<()> {
    let board = Board::open()?;
    let mut whiteboard = board.whiteboard().await?;
    let id = resolve_note(&whiteboard, &id)?;
    let summary = whiteboard.note(&id).map(describe_content).unwrap_or_default();

    if !force && !confirm(&format!("Delete note ({}) - {}?", short_id(&id), summary))? {
        return Ok(());
    }
    whiteboard.delete_note(&id).await?;
    whiteboard.close().await;

    println!("Deleted note ({}) - {}", short_id(&id), summary);
    Ok(())
}

pub async fn handle_watch(topics: bool, interval_ms: u64) -> Result<()> {
    let board = Board::open()?;
    let mut tick = tokio::time::interval(Duration::from_millis(interval_ms.max(50)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    if topics {
        let mut view = board.topics().await?;
        print_topics(&view.topics().into_iter().cloned().collect::<Vec<_>>(), false)?;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tick.tick() => {
                    if let Err(e) = board.store.refresh().await {
                        warn!(error = %e, "could not read changes from other clients");
                    }
                }
                changed = view.next_change() => {
                    if changed? {
                        println!();
                        print_topics(&view.topics().into_iter().cloned().collect::<Vec<_>>(), false)?;
                    }
                }
            }
        }
        view.close().await;
    } else {
        let mut view = board.whiteboard().await?;
        print_notes(&view.stacking_order().into_iter().cloned().collect::<Vec<_>>(), false)?;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tick.tick() => {
                    if let Err(e) = board.store.refresh().await {
                        warn!(error = %e, "could not read changes from other clients");
                    }
                }
                changed = view.next_change() => {
                    if changed? {
                        println!();
                        print_notes(&view.stacking_order().into_iter().cloned().collect::<Vec<_>>(), false)?;
                    }
                }
            }
        }
        view.close().await;
    }

    Ok(())
}
