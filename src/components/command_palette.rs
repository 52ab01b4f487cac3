use crate::models::Note;
use crate::scheduler::WindowScheduler;
use crate::search::CommandSearch;
use crate::state::AppContext;
use leptos::prelude::*;
use leptos::task::spawn_local;

#[component]
pub fn CommandPalette() -> impl IntoView {
    let app = expect_context::<AppContext>().0;
    let open = app.ui.command_palette_open;
    let search = CommandSearch::new(app.notes.clone(), WindowScheduler, &app.config);
    let (results, searching) = (search.results, search.searching);
    let search = StoredValue::new_local(search);
    let app = StoredValue::new(app);

    // Reopening starts from a blank query.
    Effect::new(move |_| {
        if !open.get() {
            search.with_value(CommandSearch::clear);
        }
    });

    let choose = move |note: Note| {
        let app = app.get_value();
        app.ui.set_command_palette_open(false);
        app.selection.active_subject_id.set(Some(note.subject_id.clone()));
        spawn_local(async move {
            // Failures are logged by the store; a vanished note just deselects.
            let _ = app.open_note(&note.id).await;
        });
    };

    view! {
        <Show when=move || open.get() fallback=|| ().into_view()>
            <div class="command-palette" role="dialog">
                <input
                    class="command-palette-input"
                    type="text"
                    placeholder="Search notes..."
                    on:input=move |ev: web_sys::Event| {
                        let value = event_target_value(&ev);
                        search.with_value(|s| s.set_query(&value));
                    }
                />
                <Show when=move || searching.get() fallback=|| ().into_view()>
                    <div class="command-palette-status">"Searching..."</div>
                </Show>
                <ul class="command-palette-results">
                    <For
                        each=move || results.get()
                        key=|note: &Note| note.id.clone()
                        children=move |note: Note| {
                            let title = note.title.clone();
                            let preview: String = note.plain_text.chars().take(80).collect();
                            view! {
                                <li
                                    class="command-palette-hit"
                                    on:click=move |_| choose(note.clone())
                                >
                                    <div class="command-palette-title">{title}</div>
                                    <div class="command-palette-preview">{preview}</div>
                                </li>
                            }
                        }
                    />
                </ul>
            </div>
        </Show>
    }
}
