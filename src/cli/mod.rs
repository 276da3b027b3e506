mod commands;
mod handlers;

pub use commands::{
    BoardAction, BoardCommand, Cli, Commands, NoteAction, NoteCommand, TopicAction, TopicCommand,
};
pub use handlers::{
    handle_board_add, handle_board_delete, handle_board_front, handle_board_list,
    handle_board_move, handle_init, handle_note_add, handle_note_delete, handle_topic_add,
    handle_topic_delete, handle_topic_list, handle_watch,
};
