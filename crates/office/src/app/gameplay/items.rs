use engine::{NodeDesc, NodeId, SceneWorld, SpriteDesc};

use crate::app::office_map::{Bounds, ItemKind, MapItem};

/// Map items the player can stand in front of.
pub(crate) trait Interactable {
    fn on_overlap_dialog(&mut self);
    fn clear_dialog(&mut self);
    fn depth(&self) -> f32;
}

#[derive(Debug, Clone)]
pub(crate) struct ItemRuntime {
    pub item: MapItem,
    dialog: Option<&'static str>,
}

impl ItemRuntime {
    pub(crate) fn new(item: MapItem) -> Self {
        Self {
            item,
            dialog: None,
        }
    }

    pub(crate) fn dialog(&self) -> Option<&'static str> {
        self.dialog
    }

    pub(crate) fn bounds(&self) -> &Bounds {
        &self.item.bounds
    }

    pub(crate) fn spawn(&self, world: &mut SceneWorld) -> NodeId {
        world.spawn_node(NodeDesc {
            position: self.item.bounds.center,
            depth: self.item.depth,
            sprite: Some(SpriteDesc::new(self.item.kind.texture_key())),
            debug_name: "map_item",
            ..NodeDesc::default()
        })
    }

    /// One-line result of pressing the use key in front of this item.
    pub(crate) fn use_message(&self) -> Option<String> {
        let number = self.item.index + 1;
        match self.item.kind {
            ItemKind::Chair { .. } => None,
            ItemKind::Computer => Some(format!("Computer {number}: screen sharing is offline")),
            ItemKind::Whiteboard => Some(format!("Whiteboard {number}: nothing written yet")),
            ItemKind::VendingMachine => Some("Vending machine: enjoy your coffee".to_string()),
        }
    }
}

impl Interactable for ItemRuntime {
    fn on_overlap_dialog(&mut self) {
        self.dialog = Some(match self.item.kind {
            ItemKind::Chair { .. } => "Press E to sit",
            ItemKind::Computer => "Press R to use computer",
            ItemKind::Whiteboard => "Press R to use whiteboard",
            ItemKind::VendingMachine => "Press R to buy a coffee",
        });
    }

    fn clear_dialog(&mut self) {
        self.dialog = None;
    }

    fn depth(&self) -> f32 {
        self.item.depth
    }
}

/// Tracks the single item currently highlighted by the player's selector.
#[derive(Debug, Default)]
pub(crate) struct OverlapBridge {
    current: Option<usize>,
}

impl OverlapBridge {
    pub(crate) fn current(&self) -> Option<usize> {
        self.current
    }

    /// A candidate wins only when it is drawn in front of the current item.
    pub(crate) fn on_overlap<I: Interactable>(
        &mut self,
        items: &mut [I],
        candidate: usize,
        player_sitting: bool,
    ) {
        if let Some(current) = self.current {
            if current == candidate || items[current].depth() >= items[candidate].depth() {
                return;
            }
            if !player_sitting {
                items[current].clear_dialog();
            }
        }
        self.current = Some(candidate);
        items[candidate].on_overlap_dialog();
    }

    /// Runs one frame of overlap: drops a current item the selector has left,
    /// then offers every overlapping item as a candidate.
    pub(crate) fn update<I: Interactable>(
        &mut self,
        items: &mut [I],
        overlapping: &[usize],
        player_sitting: bool,
    ) {
        if let Some(current) = self.current {
            if !player_sitting && !overlapping.contains(&current) {
                items[current].clear_dialog();
                self.current = None;
            }
        }
        for &candidate in overlapping {
            self.on_overlap(items, candidate, player_sitting);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FakeItem {
        depth: f32,
        dialog_open: bool,
    }

    impl FakeItem {
        fn at(depth: f32) -> Self {
            Self {
                depth,
                dialog_open: false,
            }
        }
    }

    impl Interactable for FakeItem {
        fn on_overlap_dialog(&mut self) {
            self.dialog_open = true;
        }

        fn clear_dialog(&mut self) {
            self.dialog_open = false;
        }

        fn depth(&self) -> f32 {
            self.depth
        }
    }

    #[test]
    fn deeper_candidate_replaces_current() {
        let mut items = vec![FakeItem::at(100.0), FakeItem::at(150.0)];
        let mut bridge = OverlapBridge::default();

        bridge.on_overlap(&mut items, 0, false);
        bridge.on_overlap(&mut items, 1, false);

        assert_eq!(bridge.current(), Some(1));
        assert!(!items[0].dialog_open);
        assert!(items[1].dialog_open);
    }

    #[test]
    fn equal_or_shallower_candidate_is_ignored() {
        let mut items = vec![FakeItem::at(100.0), FakeItem::at(100.0), FakeItem::at(50.0)];
        let mut bridge = OverlapBridge::default();

        bridge.on_overlap(&mut items, 0, false);
        bridge.on_overlap(&mut items, 1, false);
        bridge.on_overlap(&mut items, 2, false);

        assert_eq!(bridge.current(), Some(0));
        assert!(items[0].dialog_open);
        assert!(!items[1].dialog_open);
        assert!(!items[2].dialog_open);
    }

    #[test]
    fn sitting_keeps_previous_dialog_open() {
        let mut items = vec![FakeItem::at(100.0), FakeItem::at(150.0)];
        let mut bridge = OverlapBridge::default();

        bridge.on_overlap(&mut items, 0, true);
        bridge.on_overlap(&mut items, 1, true);

        assert!(items[0].dialog_open);
        assert_eq!(bridge.current(), Some(1));
    }

    #[test]
    fn leaving_the_item_clears_it_unless_sitting() {
        let mut items = vec![FakeItem::at(100.0)];
        let mut bridge = OverlapBridge::default();
        bridge.update(&mut items, &[0], false);

        bridge.update(&mut items, &[], true);
        assert_eq!(bridge.current(), Some(0));

        bridge.update(&mut items, &[], false);
        assert_eq!(bridge.current(), None);
        assert!(!items[0].dialog_open);
    }
}
