//! Block handle: which block the pointer is over, and the menus attached to it.
//!
//! The engine is pure state; the view feeds it pointer events and a [`BlockLayout`], and runs
//! the grace timer itself, handing the issued [`GraceTicket`] back when it fires.

mod dom;

pub use dom::DomBlockLayout;

use crate::document::{BlockType, Document};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockBounds {
    pub top: f64,
    pub bottom: f64,
}

/// Rendered geometry of the document's top-level blocks, in document order.
pub trait BlockLayout {
    fn container_top(&self) -> f64;
    fn child_bounds(&self) -> Vec<BlockBounds>;
}

/// First block whose padded vertical range contains `y`. Adjacent blocks share their
/// boundary, so the earlier one wins.
pub fn hit_test(bounds: &[BlockBounds], y: f64, tolerance: f64) -> Option<usize> {
    bounds
        .iter()
        .position(|b| y >= b.top - tolerance && y <= b.bottom + tolerance)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockMenu {
    /// "Turn into" block type list.
    TypeMenu,
    /// Duplicate / Delete.
    ContextMenu,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HoveredBlock {
    pub index: usize,
    /// Position immediately before the block.
    pub pos: usize,
    /// Block top relative to the editor, for placing the handle.
    pub offset_top: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HandleState {
    Idle,
    Hovering(HoveredBlock),
    MenuOpen(HoveredBlock, BlockMenu),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GraceTicket(u64);

#[derive(Debug)]
pub struct HoverEngine {
    state: HandleState,
    tolerance: f64,
    // Advances on every enter/leave; a ticket from an older epoch is void.
    epoch: u64,
    over_chrome: bool,
}

impl HoverEngine {
    pub fn new(tolerance: f64) -> Self {
        Self {
            state: HandleState::Idle,
            tolerance,
            epoch: 0,
            over_chrome: false,
        }
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn hovered(&self) -> Option<HoveredBlock> {
        match self.state {
            HandleState::Idle => None,
            HandleState::Hovering(b) | HandleState::MenuOpen(b, _) => Some(b),
        }
    }

    pub fn open_menu(&self) -> Option<BlockMenu> {
        match self.state {
            HandleState::MenuOpen(_, menu) => Some(menu),
            _ => None,
        }
    }

    fn bump(&mut self) -> GraceTicket {
        self.epoch += 1;
        GraceTicket(self.epoch)
    }

    /// Pointer moved over the document at viewport height `y`.
    ///
    /// While a menu is open it stays attached to its block; the pointer leaving every block
    /// closes it.
    pub fn pointer_moved(
        &mut self,
        y: f64,
        layout: &impl BlockLayout,
        doc: &Document,
    ) -> HandleState {
        self.bump();
        let bounds = layout.child_bounds();
        let hit = hit_test(&bounds, y, self.tolerance).and_then(|index| {
            let pos = doc.child_start(index)?;
            Some(HoveredBlock {
                index,
                pos,
                offset_top: bounds[index].top - layout.container_top(),
            })
        });

        self.state = match (self.state, hit) {
            (_, None) => HandleState::Idle,
            (HandleState::MenuOpen(pinned, menu), Some(_)) => HandleState::MenuOpen(pinned, menu),
            (_, Some(block)) => HandleState::Hovering(block),
        };
        self.state
    }

    pub fn pointer_left(&mut self) -> GraceTicket {
        self.bump()
    }

    /// Pointer entered the handle or one of its menus.
    pub fn chrome_entered(&mut self) {
        self.over_chrome = true;
        self.bump();
    }

    pub fn chrome_left(&mut self) -> GraceTicket {
        self.over_chrome = false;
        self.bump()
    }

    /// The grace delay for `ticket` ran out. Closes everything unless the pointer came back.
    pub fn grace_elapsed(&mut self, ticket: GraceTicket) -> bool {
        if ticket.0 != self.epoch || self.over_chrome {
            return false;
        }
        self.state = HandleState::Idle;
        true
    }

    /// Click outside the handle and menus: close menus, keep hovering.
    pub fn outside_click(&mut self) {
        if let HandleState::MenuOpen(block, _) = self.state {
            self.state = HandleState::Hovering(block);
        }
    }

    /// Open `menu`, close it if it is already open, or switch to it from the other menu.
    pub fn toggle_menu(&mut self, menu: BlockMenu) {
        self.state = match self.state {
            HandleState::Idle => HandleState::Idle,
            HandleState::Hovering(block) => HandleState::MenuOpen(block, menu),
            HandleState::MenuOpen(block, open) if open == menu => HandleState::Hovering(block),
            HandleState::MenuOpen(block, _) => HandleState::MenuOpen(block, menu),
        };
    }

    pub fn apply_block_type(&mut self, doc: &mut Document, ty: BlockType) -> bool {
        let Some(block) = self.hovered() else {
            return false;
        };
        let changed = doc.set_block_type(block.pos, ty);
        debug!(pos = block.pos, block_type = %ty, changed, "turn block into");
        self.state = HandleState::Hovering(block);
        changed
    }

    pub fn duplicate_hovered(&mut self, doc: &mut Document) -> bool {
        let Some(block) = self.hovered() else {
            return false;
        };
        let changed = doc.duplicate_block(block.pos);
        self.state = HandleState::Hovering(block);
        changed
    }

    /// The handle goes idle with the block; the next pointer move re-targets it.
    pub fn delete_hovered(&mut self, doc: &mut Document) -> bool {
        let Some(block) = self.hovered() else {
            return false;
        };
        let changed = doc.delete_block(block.pos);
        self.state = HandleState::Idle;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Node;

    struct FixedLayout(Vec<BlockBounds>);

    impl BlockLayout for FixedLayout {
        fn container_top(&self) -> f64 {
            0.0
        }

        fn child_bounds(&self) -> Vec<BlockBounds> {
            self.0.clone()
        }
    }

    fn stacked() -> FixedLayout {
        FixedLayout(vec![
            BlockBounds { top: 0.0, bottom: 20.0 },
            BlockBounds { top: 20.0, bottom: 50.0 },
            BlockBounds { top: 50.0, bottom: 80.0 },
        ])
    }

    fn doc() -> Document {
        Document::new(vec![
            Node::paragraph("one"),
            Node::heading(2, "two"),
            Node::paragraph("three"),
        ])
    }

    #[test]
    fn test_hit_test_picks_first_match() {
        let b = stacked().0;
        assert_eq!(hit_test(&b, 45.0, 2.0), Some(1));
        assert_eq!(hit_test(&b, 20.0, 2.0), Some(0));
        assert_eq!(hit_test(&b, 21.0, 2.0), Some(0));
        assert_eq!(hit_test(&b, 23.0, 2.0), Some(1));
        assert_eq!(hit_test(&b, 81.5, 2.0), Some(2));
        assert_eq!(hit_test(&b, 83.0, 2.0), None);
        assert_eq!(hit_test(&[], 10.0, 2.0), None);
    }

    #[test]
    fn test_pointer_move_resolves_block_position() {
        let mut engine = HoverEngine::new(2.0);
        let state = engine.pointer_moved(45.0, &stacked(), &doc());
        assert_eq!(
            state,
            HandleState::Hovering(HoveredBlock {
                index: 1,
                pos: 5,
                offset_top: 20.0
            })
        );

        assert_eq!(engine.pointer_moved(200.0, &stacked(), &doc()), HandleState::Idle);
    }

    #[test]
    fn test_extra_rendered_children_are_ignored() {
        let mut engine = HoverEngine::new(2.0);
        let short = Document::new(vec![Node::paragraph("only")]);
        assert_eq!(engine.pointer_moved(60.0, &stacked(), &short), HandleState::Idle);
    }

    #[test]
    fn test_open_menu_stays_pinned_while_pointer_moves() {
        let mut engine = HoverEngine::new(2.0);
        engine.pointer_moved(10.0, &stacked(), &doc());
        engine.toggle_menu(BlockMenu::TypeMenu);
        engine.pointer_moved(60.0, &stacked(), &doc());
        assert_eq!(engine.hovered().map(|b| b.index), Some(0));
        assert_eq!(engine.open_menu(), Some(BlockMenu::TypeMenu));

        // Off every block closes the menu.
        engine.pointer_moved(500.0, &stacked(), &doc());
        assert_eq!(engine.state(), HandleState::Idle);
    }

    #[test]
    fn test_rapid_reentry_keeps_menu_open() {
        let mut engine = HoverEngine::new(2.0);
        engine.pointer_moved(30.0, &stacked(), &doc());
        engine.toggle_menu(BlockMenu::ContextMenu);

        let ticket = engine.pointer_left();
        engine.chrome_entered();
        assert!(!engine.grace_elapsed(ticket));
        assert_eq!(engine.open_menu(), Some(BlockMenu::ContextMenu));

        // Back from the menu into the document before the delay runs out.
        let ticket = engine.chrome_left();
        engine.pointer_moved(30.0, &stacked(), &doc());
        assert!(!engine.grace_elapsed(ticket));
        assert_eq!(engine.open_menu(), Some(BlockMenu::ContextMenu));
    }

    #[test]
    fn test_sustained_exit_closes_menu() {
        let mut engine = HoverEngine::new(2.0);
        engine.pointer_moved(30.0, &stacked(), &doc());
        engine.toggle_menu(BlockMenu::TypeMenu);
        engine.chrome_entered();

        let ticket = engine.chrome_left();
        assert!(engine.grace_elapsed(ticket));
        assert_eq!(engine.state(), HandleState::Idle);
    }

    #[test]
    fn test_outside_click_and_menu_toggling() {
        let mut engine = HoverEngine::new(2.0);
        engine.toggle_menu(BlockMenu::TypeMenu);
        assert_eq!(engine.state(), HandleState::Idle);

        engine.pointer_moved(10.0, &stacked(), &doc());
        engine.toggle_menu(BlockMenu::TypeMenu);
        engine.toggle_menu(BlockMenu::ContextMenu);
        assert_eq!(engine.open_menu(), Some(BlockMenu::ContextMenu));
        engine.toggle_menu(BlockMenu::ContextMenu);
        assert_eq!(engine.open_menu(), None);

        engine.toggle_menu(BlockMenu::TypeMenu);
        engine.outside_click();
        assert_eq!(engine.open_menu(), None);
        assert_eq!(engine.hovered().map(|b| b.index), Some(0));
    }

    #[test]
    fn test_menu_commands_edit_the_pinned_block() {
        let mut engine = HoverEngine::new(2.0);
        let mut d = doc();

        engine.pointer_moved(60.0, &stacked(), &d);
        engine.toggle_menu(BlockMenu::TypeMenu);
        assert!(engine.apply_block_type(&mut d, BlockType::Heading1));
        assert_eq!(d.content[2], Node::heading(1, "three"));
        assert_eq!(engine.open_menu(), None);

        engine.toggle_menu(BlockMenu::ContextMenu);
        assert!(engine.duplicate_hovered(&mut d));
        assert_eq!(d.content.len(), 4);

        engine.toggle_menu(BlockMenu::ContextMenu);
        assert!(engine.delete_hovered(&mut d));
        assert_eq!(d.content.len(), 3);
        assert_eq!(engine.state(), HandleState::Idle);
        assert!(!engine.delete_hovered(&mut d));
    }
}
