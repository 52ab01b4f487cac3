use crate::components::{CommandPalette, NoteEditor};
use crate::config::EditorConfig;
use crate::models::{Note, Subject};
use crate::state::{AppContext, AppState};
use crate::storage::Backend;
use leptos::prelude::*;
use leptos::task::spawn_local;

#[component]
pub fn App() -> impl IntoView {
    let config = EditorConfig::from_window();
    // The backend is picked once per session; nothing switches it afterwards.
    let state = AppState::new(Backend::select(&config), config);
    provide_context(AppContext(state.clone()));

    let subjects = state.subjects.clone();
    spawn_local(async move {
        let _ = subjects.fetch_subjects().await;
    });

    let selection = state.selection;
    let ui = state.ui;
    let active_note = state.notes.active_note;
    let state = StoredValue::new(state);

    // The note list follows the active subject.
    Effect::new(move |_| {
        let subject = selection.active_subject_id.get();
        let notes = state.with_value(|s| s.notes.clone());
        spawn_local(async move {
            let _ = match subject {
                Some(id) => notes.fetch_notes(&id).await,
                None => notes.fetch_all_notes().await,
            };
        });
    });

    let new_note = move |_: web_sys::MouseEvent| {
        let Some(subject_id) = selection.active_subject_id.get_untracked() else {
            return;
        };
        let app = state.get_value();
        spawn_local(async move {
            let _ = app.create_note(&subject_id).await;
        });
    };

    let open_note = move |id: String| {
        let app = state.get_value();
        spawn_local(async move {
            let _ = app.open_note(&id).await;
        });
    };

    // Keyed by id only so saves, which refresh the active note, do not remount the editor.
    let active_id = Memo::new(move |_| state.with_value(|s| s.editor_note_id()));
    let editor = move || {
        active_id.get()?;
        let note = active_note.get_untracked()?;
        Some(view! { <NoteEditor note=note /> })
    };

    let subject_list = state.with_value(|s| s.subjects.subjects);
    let note_list = state.with_value(|s| s.notes.notes);

    view! {
        <div class="app-shell">
            <header class="app-toolbar">
                <button class="app-search" on:click=move |_| ui.toggle_command_palette()>
                    "Search"
                </button>
                <button
                    class="app-new-note"
                    disabled=move || selection.active_subject_id.get().is_none()
                    on:click=new_note
                >
                    "New note"
                </button>
            </header>
            <nav class="app-subjects">
                <For
                    each=move || subject_list.get()
                    key=|subject: &Subject| (subject.id.clone(), subject.updated_at)
                    children=move |subject: Subject| {
                        let id = subject.id.clone();
                        let is_active = {
                            let id = id.clone();
                            move || selection.active_subject_id.get().as_deref() == Some(id.as_str())
                        };
                        view! {
                            <button
                                class="app-subject"
                                class:active=is_active
                                style=format!("border-left: 3px solid {}", subject.color_hex)
                                on:click=move |_| selection.select_subject(Some(id.clone()))
                            >
                                {subject.name.clone()}
                            </button>
                        }
                    }
                />
            </nav>
            <ul class="app-notes">
                <For
                    each=move || note_list.get()
                    key=|note: &Note| (note.id.clone(), note.updated_at)
                    children=move |note: Note| {
                        let id = note.id.clone();
                        view! {
                            <li class="app-note" on:click=move |_| open_note(id.clone())>
                                {note.title.clone()}
                            </li>
                        }
                    }
                />
            </ul>
            <main class="app-editor">{editor}</main>
            <CommandPalette />
        </div>
    }
}
