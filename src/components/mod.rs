mod command_palette;
mod note_editor;

pub use command_palette::CommandPalette;
pub use note_editor::NoteEditor;
