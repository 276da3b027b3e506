//! Turns what the user typed into a note draft.

use tracing::{info, warn};

use crate::ai::IconGenerator;
use crate::entity::NoteKind;
use crate::sync::{NoteDraft, Point};

/// Ask the collaborator whether `text` can be drawn and, if so, draw it.
///
/// Any failure along the way yields a plain text note carrying the raw
/// input. The user's words are never lost.
pub async fn compose_note(ai: Option<&dyn IconGenerator>, text: &str, position: Point) -> NoteDraft {
    let text_note = || NoteDraft {
        kind: NoteKind::Text,
        content: text.to_string(),
        position,
    };

    let Some(ai) = ai else {
        return text_note();
    };

    match ai.classify(text).await {
        Ok(true) => {}
        Ok(false) => return text_note(),
        Err(e) => {
            warn!(error = %e, "classification failed, keeping text");
            return text_note();
        }
    }

    match ai.generate_icon(text).await {
        Ok(icon) => {
            info!(text, "generated icon");
            NoteDraft {
                kind: NoteKind::Image,
                content: icon,
                position,
            }
        }
        Err(e) => {
            warn!(error = %e, "icon generation failed, keeping text");
            text_note()
        }
    }
}
