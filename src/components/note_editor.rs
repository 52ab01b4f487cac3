use crate::document::{BlockType, Document, Mark, Node};
use crate::editor::{BlockMenu, DomBlockLayout, GraceTicket, HandleState, HoverEngine};
use crate::models::{Note, DEFAULT_NOTE_TITLE};
use crate::scheduler::{Debouncer, WindowScheduler};
use crate::state::{AppContext, NoteSession, Reconciled};
use crate::storage::Backend;
use leptos::ev;
use leptos::html;
use leptos::prelude::*;
use leptos_dom::helpers::window_event_listener;
use strum::IntoEnumIterator;
use tracing::warn;
use wasm_bindgen::JsCast;

type Session = NoteSession<Backend, WindowScheduler>;

/// Everything the block handle and its menus touch, as copyable handles.
#[derive(Clone, Copy)]
struct BlockChrome {
    engine: StoredValue<HoverEngine>,
    handle: RwSignal<HandleState>,
    doc: RwSignal<Document>,
    session: StoredValue<Session, LocalStorage>,
    grace: StoredValue<Debouncer<WindowScheduler>, LocalStorage>,
    grace_ms: u32,
}

impl BlockChrome {
    fn sync(&self) {
        self.handle.set(self.engine.with_value(HoverEngine::state));
    }

    fn arm_grace(&self, ticket: GraceTicket) {
        let chrome = *self;
        self.grace.with_value(|timer| {
            timer.reschedule(self.grace_ms, async move {
                let closed = chrome
                    .engine
                    .try_update_value(|e| e.grace_elapsed(ticket))
                    .unwrap_or(false);
                if closed {
                    chrome.sync();
                }
            })
        });
    }

    fn toggle(&self, menu: BlockMenu) {
        self.engine.update_value(|e| e.toggle_menu(menu));
        self.sync();
    }

    /// Run a block command against a copy of the document and publish it if anything changed.
    fn edit(&self, command: impl FnOnce(&mut HoverEngine, &mut Document) -> bool) {
        let mut next = self.doc.get_untracked();
        let changed = self
            .engine
            .try_update_value(|e| command(e, &mut next))
            .unwrap_or(false);
        self.sync();
        if changed {
            self.doc.set(next.clone());
            self.session.with_value(|s| s.on_content_changed(next));
        }
    }
}

#[component]
pub fn NoteEditor(note: Note) -> impl IntoView {
    let app = expect_context::<AppContext>().0;
    let config = app.config.clone();

    let initial = match note.document() {
        Ok(doc) if !doc.is_empty() => doc,
        Ok(_) => Document::blank(),
        Err(e) => {
            warn!(note_id = %note.id, error = %e, "opening note with unreadable content as blank");
            Document::blank()
        }
    };
    let title = RwSignal::new(note.title.clone());
    let session = StoredValue::new_local(NoteSession::open_with(
        app.notes.clone(),
        WindowScheduler,
        &note,
        initial.clone(),
        &config,
    ));
    let doc = RwSignal::new(initial);
    let chrome = BlockChrome {
        engine: StoredValue::new(HoverEngine::new(config.hover_tolerance_px)),
        handle: RwSignal::new(HandleState::Idle),
        doc,
        session,
        grace: StoredValue::new_local(Debouncer::new(WindowScheduler)),
        grace_ms: config.hover_grace_ms,
    };

    // Every reload of this note, including the echo of our own saves, is reconciled.
    let active_note = app.notes.active_note;
    Effect::new(move |_| {
        let Some(loaded) = active_note.get() else {
            return;
        };
        let outcome = session.with_value(|s| s.reconcile_loaded(&loaded, &doc));
        if matches!(outcome, Reconciled::Replaced | Reconciled::Unchanged) {
            title.set(loaded.title);
        }
    });

    let chrome_ref: NodeRef<html::Div> = NodeRef::new();
    let outside = window_event_listener(ev::mousedown, move |ev: web_sys::MouseEvent| {
        if chrome.engine.with_value(|e| e.open_menu().is_none()) {
            return;
        }
        let target = ev.target().and_then(|t| t.dyn_into::<web_sys::Node>().ok());
        let inside = match (chrome_ref.get_untracked(), target) {
            (Some(el), Some(target)) => el.contains(Some(&target)),
            _ => false,
        };
        if !inside {
            chrome.engine.update_value(HoverEngine::outside_click);
            chrome.sync();
        }
    });

    on_cleanup(move || {
        outside.remove();
        chrome.grace.try_with_value(|timer| timer.cancel());
        session.try_with_value(|s| s.close());
    });

    let on_title_input = move |ev: web_sys::Event| {
        let value = ev
            .target()
            .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok())
            .map(|t| t.value())
            .unwrap_or_default();
        title.set(value.clone());
        session.with_value(|s| s.on_title_changed(&value));
    };

    let root_ref: NodeRef<html::Div> = NodeRef::new();
    let on_mouse_move = move |ev: web_sys::MouseEvent| {
        let Some(root) = root_ref.get_untracked() else {
            return;
        };
        let layout = DomBlockLayout::new(root.into());
        let y = f64::from(ev.client_y());
        chrome.engine.update_value(|e| {
            doc.with_untracked(|d| {
                e.pointer_moved(y, &layout, d);
            })
        });
        chrome.sync();
    };
    let on_mouse_leave = move |_: web_sys::MouseEvent| {
        if let Some(ticket) = chrome.engine.try_update_value(HoverEngine::pointer_left) {
            chrome.arm_grace(ticket);
        }
    };

    let handle_view = move || {
        let (block, menu) = match chrome.handle.get() {
            HandleState::Idle => return None,
            HandleState::Hovering(block) => (block, None),
            HandleState::MenuOpen(block, menu) => (block, Some(menu)),
        };
        Some(view! {
            <div
                node_ref=chrome_ref
                class="block-handle"
                style=format!("position: absolute; left: -3rem; top: {}px", block.offset_top)
                on:mouseenter=move |_| chrome.engine.update_value(HoverEngine::chrome_entered)
                on:mouseleave=move |_| {
                    if let Some(ticket) = chrome.engine.try_update_value(HoverEngine::chrome_left) {
                        chrome.arm_grace(ticket);
                    }
                }
            >
                <button
                    class="block-handle-add"
                    title="Turn into"
                    on:click=move |_| chrome.toggle(BlockMenu::TypeMenu)
                >
                    "+"
                </button>
                <button
                    class="block-handle-grip"
                    title="Block actions"
                    on:click=move |_| chrome.toggle(BlockMenu::ContextMenu)
                >
                    "⋮⋮"
                </button>
                {menu.map(|menu| match menu {
                    BlockMenu::TypeMenu => type_menu(chrome).into_any(),
                    BlockMenu::ContextMenu => context_menu(chrome).into_any(),
                })}
            </div>
        })
    };

    view! {
        <div class="note-editor">
            <input
                class="note-title"
                type="text"
                placeholder=DEFAULT_NOTE_TITLE
                prop:value=move || title.get()
                on:input=on_title_input
            />
            <div class="note-body" style="position: relative">
                {handle_view}
                <div
                    class="note-blocks"
                    node_ref=root_ref
                    on:mousemove=on_mouse_move
                    on:mouseleave=on_mouse_leave
                >
                    {move || doc.with(|d| render_blocks(&d.content))}
                </div>
            </div>
        </div>
    }
}

fn type_menu(chrome: BlockChrome) -> impl IntoView {
    view! {
        <div class="block-menu" role="menu">
            <div class="block-menu-label">"Turn into"</div>
            {BlockType::iter()
                .map(|ty| {
                    view! {
                        <button
                            class="block-menu-item"
                            role="menuitem"
                            on:click=move |_| chrome.edit(move |e, d| e.apply_block_type(d, ty))
                        >
                            {ty.to_string()}
                        </button>
                    }
                })
                .collect_view()}
        </div>
    }
}

fn context_menu(chrome: BlockChrome) -> impl IntoView {
    view! {
        <div class="block-menu" role="menu">
            <button
                class="block-menu-item"
                role="menuitem"
                on:click=move |_| chrome.edit(HoverEngine::duplicate_hovered)
            >
                "Duplicate"
            </button>
            <button
                class="block-menu-item block-menu-danger"
                role="menuitem"
                on:click=move |_| chrome.edit(HoverEngine::delete_hovered)
            >
                "Delete"
            </button>
        </div>
    }
}

// One element per node so the layout's children line up with top-level blocks.
fn render_blocks(content: &[Node]) -> Vec<AnyView> {
    content.iter().map(render_node).collect()
}

fn render_node(node: &Node) -> AnyView {
    match node {
        Node::Paragraph { content } => view! { <p>{render_blocks(content)}</p> }.into_any(),
        Node::Heading { attrs, content } => match attrs.level {
            1 => view! { <h1>{render_blocks(content)}</h1> }.into_any(),
            2 => view! { <h2>{render_blocks(content)}</h2> }.into_any(),
            _ => view! { <h3>{render_blocks(content)}</h3> }.into_any(),
        },
        Node::CodeBlock { attrs, content } => view! {
            <pre data-language=attrs.language.clone()>
                <code>{render_blocks(content)}</code>
            </pre>
        }
        .into_any(),
        Node::Blockquote { content } => {
            view! { <blockquote>{render_blocks(content)}</blockquote> }.into_any()
        }
        Node::BulletList { content } => view! { <ul>{render_blocks(content)}</ul> }.into_any(),
        Node::OrderedList { attrs, content } => {
            view! { <ol start=attrs.start.to_string()>{render_blocks(content)}</ol> }.into_any()
        }
        Node::ListItem { content } => view! { <li>{render_blocks(content)}</li> }.into_any(),
        Node::TaskList { content } => {
            view! { <ul data-type="taskList">{render_blocks(content)}</ul> }.into_any()
        }
        Node::TaskItem { attrs, content } => view! {
            <li data-checked=attrs.checked.to_string()>
                <input type="checkbox" disabled=true prop:checked=attrs.checked />
                <div>{render_blocks(content)}</div>
            </li>
        }
        .into_any(),
        Node::HorizontalRule => view! { <hr /> }.into_any(),
        Node::HardBreak => view! { <br /> }.into_any(),
        Node::Text { text, marks } => render_text(text, marks),
    }
}

fn render_text(text: &str, marks: &[Mark]) -> AnyView {
    marks
        .iter()
        .fold(text.to_string().into_any(), |inner, mark| match mark.kind.as_str() {
            "bold" => view! { <strong>{inner}</strong> }.into_any(),
            "italic" => view! { <em>{inner}</em> }.into_any(),
            "code" => view! { <code>{inner}</code> }.into_any(),
            "strike" => view! { <s>{inner}</s> }.into_any(),
            "underline" => view! { <u>{inner}</u> }.into_any(),
            _ => inner,
        })
}
