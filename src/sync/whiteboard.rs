use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::interaction::{Canvas, Interaction, Point, Size};
use super::SyncHook;
use crate::entity::{display_timestamp, Entity, Note, NoteColor, NoteKind, Rotation};
use crate::error::{BoardError, Result};
use crate::storage::{RemoteStore, StorePath};

/// Canvas bounds and the footprint of each kind of note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardLayout {
    pub canvas: Canvas,
    pub text_note: Size,
    pub image_note: Size,
}

impl BoardLayout {
    pub fn size_of(&self, kind: NoteKind) -> Size {
        match kind {
            NoteKind::Text => self.text_note,
            NoteKind::Image => self.image_note,
        }
    }
}

/// What the user submitted. Everything else is assigned on create.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteDraft {
    pub kind: NoteKind,
    pub content: String,
    pub position: Point,
}

/// Fields to overwrite on an existing note. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub kind: Option<NoteKind>,
    pub content: Option<String>,
    pub position: Option<Point>,
    pub color: Option<NoteColor>,
}

impl NoteUpdate {
    fn into_fields(self) -> Map<String, Value> {
        let mut fields = Map::new();
        if let Some(kind) = self.kind {
            fields.insert("type".to_string(), json!(kind.to_string()));
        }
        if let Some(content) = self.content {
            fields.insert("content".to_string(), json!(content));
        }
        if let Some(position) = self.position {
            fields.insert("x".to_string(), json!(position.x));
            fields.insert("y".to_string(), json!(position.y));
        }
        if let Some(color) = self.color {
            fields.insert("color".to_string(), json!(color.to_string()));
        }
        fields
    }
}

/// Freeform notes on a canvas, kept in sync with one store collection.
pub struct WhiteboardSync {
    hook: SyncHook<Note>,
    layout: BoardLayout,
    rng: StdRng,
}

impl WhiteboardSync {
    pub async fn connect(
        store: Arc<dyn RemoteStore>,
        collection: StorePath,
        layout: BoardLayout,
    ) -> Result<Self> {
        let hook = SyncHook::connect(store, collection).await?;
        Ok(Self {
            hook,
            layout,
            rng: StdRng::from_entropy(),
        })
    }

    /// Use a fixed seed for colors and rotations.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Notes as they should be rendered.
    pub fn notes(&self) -> &[Note] {
        self.hook.state().local()
    }

    /// Notes as last seen in the store.
    pub fn remote_notes(&self) -> &[Note] {
        self.hook.state().remote()
    }

    /// Notes back to front: by z-index, ties by creation order.
    pub fn stacking_order(&self) -> Vec<&Note> {
        let mut notes: Vec<&Note> = self.notes().iter().collect();
        notes.sort_by(|a, b| a.z_index.cmp(&b.z_index).then_with(|| a.id.cmp(&b.id)));
        notes
    }

    pub fn note(&self, id: &str) -> Option<&Note> {
        self.hook.state().local_entity(id)
    }

    pub fn layout(&self) -> &BoardLayout {
        &self.layout
    }

    pub fn active_interaction(&self) -> Option<&Interaction> {
        self.hook.state().interaction()
    }

    pub fn hook(&self) -> &SyncHook<Note> {
        &self.hook
    }

    pub fn sync_pending(&mut self) -> usize {
        self.hook.sync_pending()
    }

    pub async fn next_change(&mut self) -> Result<bool> {
        self.hook.next_change().await
    }

    fn max_z_index(&self) -> i64 {
        self.notes().iter().map(|n| n.z_index).max().unwrap_or(0)
    }

    /// Create a note with fresh cosmetics on top of the stack.
    ///
    /// The z-index is the maximum in this client's view plus one; another
    /// client creating at the same moment can pick the same value.
    pub async fn create_note(&mut self, draft: NoteDraft) -> Result<Note> {
        if draft.content.trim().is_empty() {
            return Err(BoardError::Validation("note is empty".to_string()));
        }

        let id = self.hook.store().allocate_key(self.hook.collection());
        let size = self.layout.size_of(draft.kind);
        let position = self.layout.canvas.clamp(draft.position, size);

        let note = Note {
            id,
            kind: draft.kind,
            content: draft.content,
            x: position.x,
            y: position.y,
            color: NoteColor::random(&mut self.rng),
            rotation: Rotation::random(&mut self.rng),
            z_index: self.max_z_index() + 1,
            timestamp: display_timestamp(),
        };

        self.hook.insert(&note.id, note.encode()).await?;
        info!(id = %note.id, kind = %note.kind, "created note");
        Ok(note)
    }

    pub async fn delete_note(&mut self, id: &str) -> Result<()> {
        self.hook.require_remote(id)?;

        let state = self.hook.state_mut();
        if state.interaction().is_some_and(|i| i.id == id) {
            state.end();
        }

        self.hook.remove(id).await?;
        info!(id, "deleted note");
        Ok(())
    }

    pub async fn update_note(&mut self, id: &str, update: NoteUpdate) -> Result<()> {
        self.hook.require_remote(id)?;

        let fields = update.into_fields();
        if fields.is_empty() {
            return Ok(());
        }
        self.hook.update(id, fields).await
    }

    /// Pointer down on a note: start dragging it and bring it to the front.
    ///
    /// The new z-index is written right away, not on release.
    pub async fn press(&mut self, id: &str, pointer: Point) -> Result<()> {
        let note = self
            .note(id)
            .ok_or_else(|| BoardError::EntityNotFound(id.to_string()))?;

        let interaction = Interaction {
            id: id.to_string(),
            offset: Point::new(pointer.x - note.x, pointer.y - note.y),
            size: self.layout.size_of(note.kind),
        };

        let max = self.max_z_index();
        let holders = self.notes().iter().filter(|n| n.z_index == max).count();
        let on_top = note.z_index == max && holders == 1;

        let state = self.hook.state_mut();
        if let Some(previous) = state.begin(interaction) {
            debug!(previous = %previous.id, "press replaced active interaction");
        }
        if on_top {
            return Ok(());
        }

        let z_index = max + 1;
        if let Some(note) = state.local_entity_mut(id) {
            note.z_index = z_index;
        }

        let mut fields = Map::new();
        fields.insert("zIndex".to_string(), json!(z_index));
        if let Err(e) = self.hook.update(id, fields).await {
            let state = self.hook.state_mut();
            state.end();
            state.resync();
            return Err(e);
        }
        debug!(id, z_index, "brought to front");
        Ok(())
    }

    /// Pointer moved: reposition the dragged note in the local view only.
    /// Returns the clamped position, or `None` when nothing is being dragged.
    pub fn drag_to(&mut self, pointer: Point) -> Option<Point> {
        let canvas = self.layout.canvas;
        let state = self.hook.state_mut();
        let interaction = state.interaction()?.clone();
        let position = canvas.clamp(interaction.target(pointer), interaction.size);

        let note = state.local_entity_mut(&interaction.id)?;
        note.x = position.x;
        note.y = position.y;
        Some(position)
    }

    /// Pointer released (or left the canvas): commit the dragged position
    /// and end the interaction.
    pub async fn release(&mut self) -> Result<Option<Point>> {
        let state = self.hook.state_mut();
        let Some(interaction) = state.end() else {
            return Ok(None);
        };

        let position = state
            .local_entity(&interaction.id)
            .map(|n| Point::new(n.x, n.y));
        let still_exists = state.remote_entity(&interaction.id).is_some();

        let Some(position) = position.filter(|_| still_exists) else {
            // Deleted elsewhere mid-drag; a partial write would leave a stub.
            debug!(id = %interaction.id, "dragged note is gone, dropping move");
            state.resync();
            return Ok(None);
        };

        let update = NoteUpdate {
            position: Some(position),
            ..Default::default()
        };
        if let Err(e) = self.hook.update(&interaction.id, update.into_fields()).await {
            self.hook.state_mut().resync();
            return Err(e);
        }

        debug!(id = %interaction.id, x = position.x, y = position.y, "committed drag");
        Ok(Some(position))
    }

    /// Press, drag and release in one go.
    pub async fn move_note(&mut self, id: &str, to: Point) -> Result<Point> {
        let note = self
            .note(id)
            .ok_or_else(|| BoardError::EntityNotFound(id.to_string()))?;
        let grab = Point::new(note.x, note.y);

        self.press(id, grab).await?;
        self.drag_to(to);
        let committed = self.release().await?;
        committed.ok_or_else(|| BoardError::EntityNotFound(id.to_string()))
    }

    /// Bring a note to the front without moving it.
    pub async fn bring_to_front(&mut self, id: &str) -> Result<()> {
        let note = self
            .note(id)
            .ok_or_else(|| BoardError::EntityNotFound(id.to_string()))?;
        let at = Point::new(note.x, note.y);

        self.press(id, at).await?;
        self.hook.state_mut().end();
        self.hook.state_mut().resync();
        Ok(())
    }

    pub async fn close(self) {
        self.hook.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LoroStore;

    fn layout() -> BoardLayout {
        BoardLayout {
            canvas: Canvas {
                width: 500.0,
                height: 400.0,
                margin: 10.0,
            },
            text_note: Size::new(100.0, 100.0),
            image_note: Size::new(80.0, 80.0),
        }
    }

    fn collection() -> StorePath {
        StorePath::parse("boards/main/notes").unwrap()
    }

    async fn board(store: &Arc<LoroStore>) -> WhiteboardSync {
        let store: Arc<dyn RemoteStore> = store.clone();
        WhiteboardSync::connect(store, collection(), layout())
            .await
            .unwrap()
            .with_rng(StdRng::seed_from_u64(42))
    }

    fn draft(text: &str, x: f64, y: f64) -> NoteDraft {
        NoteDraft {
            kind: NoteKind::Text,
            content: text.to_string(),
            position: Point::new(x, y),
        }
    }

    async fn seed_z(store: &LoroStore, id: &str, z: i64, x: f64) {
        let mut note = Note::text(id, id);
        note.z_index = z;
        note.x = x;
        note.y = 50.0;
        store
            .set(&collection().child(id).unwrap(), note.encode())
            .await
            .unwrap();
    }

    fn z_of(board: &WhiteboardSync, id: &str) -> i64 {
        board.note(id).unwrap().z_index
    }

    #[tokio::test]
    async fn test_create_assigns_defaults_and_stacks_on_top() {
        let store = Arc::new(LoroStore::in_memory());
        let mut board = board(&store).await;

        let first = board.create_note(draft("first", 30.0, 40.0)).await.unwrap();
        let second = board.create_note(draft("second", 60.0, 40.0)).await.unwrap();

        assert_eq!(first.z_index, 1);
        assert_eq!(second.z_index, 2);
        assert!(NoteColor::PALETTE.contains(&first.color));
        assert!(Rotation::PALETTE.contains(&first.rotation));
        assert!(!first.timestamp.is_empty());
        assert_eq!(board.notes(), &[first.clone(), second.clone()]);

        let stored = store.get(&collection().child(&first.id).unwrap()).await.unwrap();
        assert_eq!(Note::decode(&first.id, &stored).unwrap(), first);
    }

    #[tokio::test]
    async fn test_create_clamps_initial_position() {
        let store = Arc::new(LoroStore::in_memory());
        let mut board = board(&store).await;

        let note = board.create_note(draft("edge", 480.0, -20.0)).await.unwrap();
        assert_eq!((note.x, note.y), (390.0, 10.0));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_note() {
        let store = Arc::new(LoroStore::in_memory());
        let mut board = board(&store).await;

        for blank in ["", "  \n\t "] {
            let result = board.create_note(draft(blank, 30.0, 40.0)).await;
            assert!(matches!(result, Err(BoardError::Validation(_))));
        }
        assert!(board.notes().is_empty());
        assert!(store.get(&collection()).await.unwrap().is_null());
    }

    #[tokio::test]
    async fn test_press_brings_lower_note_to_front() {
        let store = Arc::new(LoroStore::in_memory());
        seed_z(&store, "a", 1, 20.0).await;
        seed_z(&store, "b", 3, 40.0).await;
        seed_z(&store, "c", 5, 60.0).await;
        let mut board = board(&store).await;

        board.press("b", Point::new(45.0, 55.0)).await.unwrap();

        assert_eq!(z_of(&board, "a"), 1);
        assert_eq!(z_of(&board, "b"), 6);
        assert_eq!(z_of(&board, "c"), 5);
        let stored = store.get(&collection().join("b/zIndex").unwrap()).await.unwrap();
        assert_eq!(stored, 6);
    }

    #[tokio::test]
    async fn test_press_on_top_note_changes_nothing() {
        let store = Arc::new(LoroStore::in_memory());
        seed_z(&store, "a", 1, 20.0).await;
        seed_z(&store, "b", 3, 40.0).await;
        seed_z(&store, "c", 5, 60.0).await;
        let mut board = board(&store).await;

        board.press("c", Point::new(65.0, 55.0)).await.unwrap();

        assert_eq!(z_of(&board, "a"), 1);
        assert_eq!(z_of(&board, "b"), 3);
        assert_eq!(z_of(&board, "c"), 5);
        assert_eq!(board.active_interaction().unwrap().id, "c");
    }

    #[tokio::test]
    async fn test_press_on_tied_top_note_lifts_it() {
        let store = Arc::new(LoroStore::in_memory());
        seed_z(&store, "a", 5, 20.0).await;
        seed_z(&store, "b", 5, 40.0).await;
        let mut board = board(&store).await;

        board.press("a", Point::new(20.0, 50.0)).await.unwrap();
        assert_eq!(z_of(&board, "a"), 6);
        assert_eq!(z_of(&board, "b"), 5);
    }

    #[tokio::test]
    async fn test_drag_clamps_and_stays_local_until_release() {
        let store = Arc::new(LoroStore::in_memory());
        seed_z(&store, "a", 1, 100.0).await;
        let mut board = board(&store).await;

        // Grab the note 20px in from its left edge.
        board.press("a", Point::new(120.0, 60.0)).await.unwrap();

        let left = board.drag_to(Point::new(-30.0, 60.0)).unwrap();
        assert_eq!(left.x, 10.0);
        let right = board.drag_to(Point::new(470.0, 60.0)).unwrap();
        assert_eq!(right.x, 390.0);

        let stored_x = store.get(&collection().join("a/x").unwrap()).await.unwrap();
        assert_eq!(stored_x, 100.0);

        let committed = board.release().await.unwrap().unwrap();
        assert_eq!(committed.x, 390.0);
        let stored_x = store.get(&collection().join("a/x").unwrap()).await.unwrap();
        assert_eq!(stored_x, 390.0);
        assert!(board.active_interaction().is_none());
        assert_eq!(board.notes(), board.remote_notes());
    }

    #[tokio::test]
    async fn test_remote_snapshot_mid_drag_does_not_move_dragged_note() {
        let store = Arc::new(LoroStore::in_memory());
        seed_z(&store, "a", 1, 100.0).await;
        seed_z(&store, "b", 2, 200.0).await;
        let mut board = board(&store).await;

        board.press("a", Point::new(100.0, 50.0)).await.unwrap();
        board.drag_to(Point::new(150.0, 80.0));

        // Another client moves b and even a while we drag.
        let mut fields = Map::new();
        fields.insert("x".to_string(), json!(300.0));
        store.update(&collection().child("b").unwrap(), fields.clone()).await.unwrap();
        store.update(&collection().child("a").unwrap(), fields).await.unwrap();
        board.sync_pending();

        assert_eq!(board.note("a").unwrap().x, 150.0);
        assert_eq!(board.note("b").unwrap().x, 200.0);
        let remote_b = board.remote_notes().iter().find(|n| n.id == "b").unwrap();
        assert_eq!(remote_b.x, 300.0);

        board.release().await.unwrap();

        assert_eq!(board.note("a").unwrap().x, 150.0);
        assert_eq!(board.note("b").unwrap().x, 300.0);
    }

    #[tokio::test]
    async fn test_release_without_press_is_noop() {
        let store = Arc::new(LoroStore::in_memory());
        let mut board = board(&store).await;
        assert!(board.release().await.unwrap().is_none());
        assert!(board.drag_to(Point::new(1.0, 1.0)).is_none());
    }

    #[tokio::test]
    async fn test_note_deleted_elsewhere_mid_drag_is_not_resurrected() {
        let store = Arc::new(LoroStore::in_memory());
        seed_z(&store, "a", 1, 100.0).await;
        let mut board = board(&store).await;

        board.press("a", Point::new(100.0, 50.0)).await.unwrap();
        board.drag_to(Point::new(160.0, 50.0));
        store.remove(&collection().child("a").unwrap()).await.unwrap();
        board.sync_pending();
        assert!(board.note("a").is_some());

        assert!(board.release().await.unwrap().is_none());
        assert!(board.note("a").is_none());
        assert!(store.get(&collection()).await.unwrap().is_null());
    }

    #[tokio::test]
    async fn test_new_press_replaces_active_interaction() {
        let store = Arc::new(LoroStore::in_memory());
        seed_z(&store, "a", 1, 20.0).await;
        seed_z(&store, "b", 2, 200.0).await;
        let mut board = board(&store).await;

        board.press("a", Point::new(20.0, 50.0)).await.unwrap();
        board.press("b", Point::new(200.0, 50.0)).await.unwrap();
        assert_eq!(board.active_interaction().unwrap().id, "b");
    }

    #[tokio::test]
    async fn test_delete_and_update() {
        let store = Arc::new(LoroStore::in_memory());
        let mut board = board(&store).await;
        let note = board.create_note(draft("typo", 20.0, 20.0)).await.unwrap();

        board
            .update_note(
                &note.id,
                NoteUpdate {
                    content: Some("fixed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(board.note(&note.id).unwrap().content, "fixed");
        assert_eq!(board.note(&note.id).unwrap().z_index, note.z_index);

        board.delete_note(&note.id).await.unwrap();
        assert!(board.notes().is_empty());
        assert!(matches!(
            board.delete_note(&note.id).await,
            Err(BoardError::EntityNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_two_clients_see_each_other() {
        let store = Arc::new(LoroStore::in_memory());
        let mut alice = board(&store).await;
        let mut bob = board(&store).await;

        let note = alice.create_note(draft("hi bob", 20.0, 20.0)).await.unwrap();
        bob.sync_pending();
        assert_eq!(bob.notes(), &[note.clone()]);

        let moved = bob.move_note(&note.id, Point::new(200.0, 100.0)).await.unwrap();
        alice.sync_pending();
        let seen = alice.note(&note.id).unwrap();
        assert_eq!((seen.x, seen.y), (moved.x, moved.y));
    }

    #[tokio::test]
    async fn test_stacking_order_breaks_ties_by_creation() {
        let store = Arc::new(LoroStore::in_memory());
        seed_z(&store, "b", 2, 20.0).await;
        seed_z(&store, "a", 2, 40.0).await;
        seed_z(&store, "c", 1, 60.0).await;
        let board = board(&store).await;

        let order: Vec<&str> = board.stacking_order().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, ["c", "a", "b"]);
    }
}
