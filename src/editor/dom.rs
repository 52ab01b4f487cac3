use super::{BlockBounds, BlockLayout};

/// Geometry read from the rendered editor root; its element children are the top-level blocks.
pub struct DomBlockLayout {
    root: web_sys::Element,
}

impl DomBlockLayout {
    pub fn new(root: web_sys::Element) -> Self {
        Self { root }
    }
}

impl BlockLayout for DomBlockLayout {
    fn container_top(&self) -> f64 {
        self.root.get_bounding_client_rect().top()
    }

    fn child_bounds(&self) -> Vec<BlockBounds> {
        let children = self.root.children();
        (0..children.length())
            .filter_map(|i| children.item(i))
            .map(|child| {
                let rect = child.get_bounding_client_rect();
                BlockBounds {
                    top: rect.top(),
                    bottom: rect.bottom(),
                }
            })
            .collect()
    }
}
