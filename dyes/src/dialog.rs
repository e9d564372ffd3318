//! The dye menu as a talk-script sub-graph. The host's per-NPC dialog logic
//! is a graph of states with entry events (add a list row, show a message)
//! and conditional transitions keyed on the chosen row. This module owns the
//! mod's side of that graph as an arena of plain records: the agent
//! materializes it into host-shaped storage and splices one entry plus one
//! transition into the anchor graph at runtime.
//!
//! The commit states carry no behavior of their own; entering one is the
//! signal that the corresponding row was confirmed.

use crate::catalog::Catalog;
use crate::messages::msg_id;
use crate::store::{self, PlayerInventory};
use crate::target::DyeTarget;

/// Talk-script commands used in entry events.
pub mod talk_command {
    pub const CLOSE_SHOP_MESSAGE: i32 = 9;
    pub const SHOW_SHOP_MESSAGE: i32 = 10;
    pub const CLEAR_TALK_LIST_DATA: i32 = 18;
    pub const ADD_TALK_LIST_DATA: i32 = 19;
    pub const OPEN_REPOSITORY: i32 = 79;
    pub const ADD_TALK_LIST_DATA_IF: i32 = 77;
    pub const ADD_TALK_LIST_DATA_ALT: i32 = 122;
}

/// List-row result values. The row chosen in a list dialog is reported as
/// the integer baked into its add-row event, not its display position.
pub const APPLY_DYES_ROW: i32 = 67;
pub const CANCEL_ROW: i32 = 99;
pub const NONE_ROW: i32 = 999_998;
pub const BACK_ROW: i32 = 999_999;

// --- Expression byte code ---------------------------------------------------
//
// Event arguments and transition conditions are tiny stack-machine programs.
// Only the handful of encodings the menu needs are produced here.

/// A 4-byte integer literal: push opcode, little-endian value, end marker.
pub const fn make_int_expression(value: i32) -> [u8; 6] {
    let b = value.to_le_bytes();
    [0x82, b[0], b[1], b[2], b[3], 0xa1]
}

/// Parse an expression holding a single 1- or 4-byte integer.
pub fn parse_int_expression(bytes: &[u8]) -> Option<i32> {
    match bytes {
        // Single byte form stores -64..=63 biased by 64.
        [value, 0xa1] => Some(*value as i32 - 64),
        [0x82, b0, b1, b2, b3, 0xa1] => Some(i32::from_le_bytes([*b0, *b1, *b2, *b3])),
        _ => None,
    }
}

/// "The chosen list row equals `value`".
pub const fn make_talk_list_result_expression(value: i32) -> [u8; 9] {
    let b = value.to_le_bytes();
    [0x57, 0x84, 0x82, b[0], b[1], b[2], b[3], 0x95, 0xa1]
}

/// Constant true, used for default transitions.
pub const TRUE_EXPRESSION: [u8; 2] = [0x41, 0xa1];

/// Placeholder third argument of every add-row event.
pub const PLACEHOLDER_EXPRESSION: [u8; 6] = make_int_expression(-1);

/// Argument passed to the show-message command for all of the mod's menus.
pub const GENERIC_DIALOG_SHOP_MESSAGE: [u8; 6] = make_int_expression(0);

/// "The generic talk menu has closed": the person-menu check and the generic
/// dialog check both report closed.
pub const TALK_MENU_CLOSED_EXPRESSION: [u8; 39] = [
    0x7b, // CheckSpecificPersonMenuIsOpen
    0x82, 0x01, 0x00, 0x00, 0x00, // 1
    0x82, 0x00, 0x00, 0x00, 0x00, // 0
    0x86, // <call with 2 args>
    0x82, 0x01, 0x00, 0x00, 0x00, // 1
    0x95, // ==
    0x7a, // CheckSpecificPersonGenericDialogIsOpen
    0x82, 0x00, 0x00, 0x00, 0x00, // 0
    0x85, // <call with 1 arg>
    0x82, 0x00, 0x00, 0x00, 0x00, // 0
    0x95, // ==
    0x98, // &&
    0x82, 0x00, 0x00, 0x00, 0x00, // 0
    0x95, // ==
    0xa1, // <end>
];

/// Which event argument carries the row's message id, per add-row command.
pub fn talk_list_message_arg(command: i32) -> Option<usize> {
    match command {
        talk_command::ADD_TALK_LIST_DATA => Some(1),
        talk_command::ADD_TALK_LIST_DATA_IF | talk_command::ADD_TALK_LIST_DATA_ALT => Some(2),
        _ => None,
    }
}

// --- Menu model -------------------------------------------------------------

pub type StateId = usize;

/// What a state in the dye sub-graph means when the host enters it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateRole {
    /// The primary/secondary/tertiary picker screen.
    TargetSelectMenu,
    TargetSelectBranch,
    /// Marks which target the following picker edits.
    CursorSet(DyeTarget),
    ColorMenu,
    ColorBranch,
    /// Confirms color option `0` of the catalog, and so on.
    ColorCommit(usize),
    /// Confirms clearing the color (and with it the paired intensity).
    NoneCommit,
    IntensityMenu,
    IntensityBranch,
    IntensityCommit(usize),
}

#[derive(Clone, Debug)]
pub enum MenuEvent {
    CloseShopMessage,
    ClearTalkList,
    AddTalkListData { row: i32, message_id: i32 },
    ShowShopMessage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    /// The chosen list row equals this value.
    TalkListResult(i32),
    /// The generic talk menu has closed.
    MenuClosed,
    /// Default branch, always taken.
    Always,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exit {
    State(StateId),
    /// Return to wherever the host's own graph continues; resolved to the
    /// anchor graph's initial state when the splice happens.
    HostInitial,
}

#[derive(Clone, Debug)]
pub struct ModelTransition {
    pub condition: Condition,
    pub exit: Exit,
}

#[derive(Clone, Debug)]
pub struct ModelState {
    pub role: StateRole,
    pub events: Vec<MenuEvent>,
    pub transitions: Vec<ModelTransition>,
}

/// The whole dye sub-graph, sized to the catalog.
#[derive(Debug)]
pub struct MenuModel {
    pub states: Vec<ModelState>,
    /// Entered from the spliced "Apply dyes" row.
    pub entry: StateId,
}

/// Build the sub-graph: target selector, color picker (with a "none" row),
/// intensity picker, and one commit state per confirmable row.
pub fn build_menu_model(catalog: &Catalog) -> MenuModel {
    let mut states: Vec<ModelState> = Vec::new();
    let mut reserve = |role: StateRole| -> StateId {
        states.push(ModelState {
            role,
            events: Vec::new(),
            transitions: Vec::new(),
        });
        states.len() - 1
    };

    let target_menu = reserve(StateRole::TargetSelectMenu);
    let target_branch = reserve(StateRole::TargetSelectBranch);
    let cursor_set: Vec<StateId> = DyeTarget::ALL
        .iter()
        .map(|&t| reserve(StateRole::CursorSet(t)))
        .collect();
    let color_menu = reserve(StateRole::ColorMenu);
    let color_branch = reserve(StateRole::ColorBranch);
    let none_commit = reserve(StateRole::NoneCommit);
    let color_commits: Vec<StateId> = (0..catalog.colors().len())
        .map(|i| reserve(StateRole::ColorCommit(i)))
        .collect();
    let intensity_menu = reserve(StateRole::IntensityMenu);
    let intensity_branch = reserve(StateRole::IntensityBranch);
    let intensity_commits: Vec<StateId> = (0..catalog.intensities().len())
        .map(|i| reserve(StateRole::IntensityCommit(i)))
        .collect();

    // Target selector: the six slots plus a cancel row back into the host
    // graph.
    let target_rows: Vec<(i32, i32, Exit)> = DyeTarget::ALL
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            (
                i as i32 + 1,
                msg_id::dye_target_label(t.index()),
                Exit::State(cursor_set[i]),
            )
        })
        .collect();
    fill_list_menu(
        &mut states,
        target_menu,
        target_branch,
        &target_rows,
        (CANCEL_ROW, msg_id::CANCEL, Exit::HostInitial),
    );

    for (i, &t) in DyeTarget::ALL.iter().enumerate() {
        let picker = if t.is_color() { color_menu } else { intensity_menu };
        states[cursor_set[i]].transitions.push(ModelTransition {
            condition: Condition::Always,
            exit: Exit::State(picker),
        });
    }

    // Color picker: "none" first, one row per catalog color, back row last.
    let mut color_rows = vec![(NONE_ROW, msg_id::NONE_DESELECTED, Exit::State(none_commit))];
    for (i, commit) in color_commits.iter().enumerate() {
        color_rows.push((
            i as i32 + 1,
            msg_id::COLOR_DESELECTED_BASE + i as i32,
            Exit::State(*commit),
        ));
    }
    fill_list_menu(
        &mut states,
        color_menu,
        color_branch,
        &color_rows,
        (BACK_ROW, msg_id::BACK, Exit::State(target_menu)),
    );

    states[none_commit].transitions.push(ModelTransition {
        condition: Condition::Always,
        exit: Exit::State(color_menu),
    });
    for commit in &color_commits {
        states[*commit].transitions.push(ModelTransition {
            condition: Condition::Always,
            exit: Exit::State(color_menu),
        });
    }

    // Intensity picker: one row per ladder step, back row last.
    let intensity_rows: Vec<(i32, i32, Exit)> = intensity_commits
        .iter()
        .enumerate()
        .map(|(i, commit)| {
            (
                i as i32 + 1,
                msg_id::INTENSITY_DESELECTED_BASE + i as i32,
                Exit::State(*commit),
            )
        })
        .collect();
    fill_list_menu(
        &mut states,
        intensity_menu,
        intensity_branch,
        &intensity_rows,
        (BACK_ROW, msg_id::BACK, Exit::State(target_menu)),
    );

    for commit in &intensity_commits {
        states[*commit].transitions.push(ModelTransition {
            condition: Condition::Always,
            exit: Exit::State(intensity_menu),
        });
    }

    MenuModel {
        states,
        entry: target_menu,
    }
}

/// Give a menu/branch state pair the standard list-dialog shape: the menu
/// state rebuilds the row list and shows it, then hands off to the branch
/// state once the dialog closes; the branch dispatches on the chosen row,
/// with the final row as the default.
fn fill_list_menu(
    states: &mut [ModelState],
    menu: StateId,
    branch: StateId,
    rows: &[(i32, i32, Exit)],
    default_row: (i32, i32, Exit),
) {
    let mut events = vec![MenuEvent::CloseShopMessage, MenuEvent::ClearTalkList];
    for &(row, message_id, _) in rows {
        events.push(MenuEvent::AddTalkListData { row, message_id });
    }
    events.push(MenuEvent::AddTalkListData {
        row: default_row.0,
        message_id: default_row.1,
    });
    events.push(MenuEvent::ShowShopMessage);
    states[menu].events = events;
    states[menu].transitions = vec![ModelTransition {
        condition: Condition::MenuClosed,
        exit: Exit::State(branch),
    }];

    let mut transitions: Vec<ModelTransition> = rows
        .iter()
        .map(|&(row, _, exit)| ModelTransition {
            condition: Condition::TalkListResult(row),
            exit,
        })
        .collect();
    transitions.push(ModelTransition {
        condition: Condition::Always,
        exit: default_row.2,
    });
    states[branch].transitions = transitions;
}

// --- Entry handling ---------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickerKind {
    Color,
    Intensity,
}

/// Side effects the agent must mirror into host-shaped storage after an
/// entry was handled.
#[derive(Clone, Debug, PartialEq)]
pub enum MenuEffect {
    /// Re-render the six live target labels from the persisted selections.
    RefreshTargetLabels,
    /// Rewrite the first `message_ids.len()` row messages of a picker so the
    /// persisted selection shows the selected styling.
    SetPickerRows {
        kind: PickerKind,
        message_ids: Vec<i32>,
    },
}

/// Tracks which target the open picker edits. The cursor also gates the live
/// preview: while it names a target, the focused row overrides the persisted
/// selection for that target.
#[derive(Debug, Default)]
pub struct DialogController {
    cursor: Option<DyeTarget>,
}

impl DialogController {
    pub fn cursor(&self) -> Option<DyeTarget> {
        self.cursor
    }

    /// React to the host entering a dialog state. `role` is `None` for any
    /// state of the anchor graph that is not part of the dye sub-graph;
    /// entering one means the player left the picker subtree, which drops
    /// the preview cursor.
    pub fn handle_entry(
        &mut self,
        role: Option<StateRole>,
        catalog: &Catalog,
        inventory: &mut impl PlayerInventory,
    ) -> Vec<MenuEffect> {
        let Some(role) = role else {
            self.cursor = None;
            return Vec::new();
        };

        match role {
            StateRole::TargetSelectMenu => {
                self.cursor = None;
                vec![MenuEffect::RefreshTargetLabels]
            }
            StateRole::CursorSet(target) => {
                self.cursor = Some(target);
                Vec::new()
            }
            StateRole::ColorMenu => match self.cursor {
                Some(target) if target.is_color() => {
                    let selected = store::get_selected(inventory, catalog, target);
                    vec![MenuEffect::SetPickerRows {
                        kind: PickerKind::Color,
                        message_ids: color_row_messages(catalog, selected),
                    }]
                }
                _ => Vec::new(),
            },
            StateRole::IntensityMenu => match self.cursor {
                Some(target) if !target.is_color() => {
                    let selected = store::get_selected(inventory, catalog, target);
                    vec![MenuEffect::SetPickerRows {
                        kind: PickerKind::Intensity,
                        message_ids: intensity_row_messages(catalog, selected),
                    }]
                }
                _ => Vec::new(),
            },
            StateRole::ColorCommit(index) => {
                if let Some(target) = self.cursor.filter(|t| t.is_color()) {
                    store::set_selected(inventory, catalog, target, Some(index));
                }
                Vec::new()
            }
            StateRole::NoneCommit => {
                if let Some(target) = self.cursor.filter(|t| t.is_color()) {
                    store::set_selected(inventory, catalog, target, None);
                }
                Vec::new()
            }
            StateRole::IntensityCommit(index) => {
                if let Some(target) = self.cursor.filter(|t| !t.is_color()) {
                    store::set_selected(inventory, catalog, target, Some(index));
                }
                Vec::new()
            }
            StateRole::TargetSelectBranch
            | StateRole::ColorBranch
            | StateRole::IntensityBranch => Vec::new(),
        }
    }
}

/// Row message ids for the color picker: the "none" row, then one per color,
/// with the persisted selection styled as selected.
pub fn color_row_messages(catalog: &Catalog, selected: Option<usize>) -> Vec<i32> {
    let mut ids = Vec::with_capacity(catalog.colors().len() + 1);
    ids.push(match selected {
        None => msg_id::NONE_SELECTED,
        Some(_) => msg_id::NONE_DESELECTED,
    });
    for i in 0..catalog.colors().len() {
        let base = if selected == Some(i) {
            msg_id::COLOR_SELECTED_BASE
        } else {
            msg_id::COLOR_DESELECTED_BASE
        };
        ids.push(base + i as i32);
    }
    ids
}

/// Row message ids for the intensity picker.
pub fn intensity_row_messages(catalog: &Catalog, selected: Option<usize>) -> Vec<i32> {
    (0..catalog.intensities().len())
        .map(|i| {
            let base = if selected == Some(i) {
                msg_id::INTENSITY_SELECTED_BASE
            } else {
                msg_id::INTENSITY_DESELECTED_BASE
            };
            base + i as i32
        })
        .collect()
}

// --- Anchor detection -------------------------------------------------------

/// One entry event of a host state, reduced to what anchor detection needs.
#[derive(Clone, Copy, Debug)]
pub struct EventSnapshot {
    pub command: i32,
    /// The row message id, when the command is an add-row variant.
    pub message_id: Option<i32>,
}

#[derive(Clone, Copy, Debug)]
pub struct TransitionSnapshot {
    /// Whether the transition's target state opens the storage chest.
    pub opens_repository: bool,
}

#[derive(Clone, Debug, Default)]
pub struct StateSnapshot {
    pub events: Vec<EventSnapshot>,
    pub transitions: Vec<TransitionSnapshot>,
}

/// Whether this graph should receive a dye menu at all: it must contain the
/// sort-chest row, and must not be the Convergence training grounds statue,
/// which has its own sort-chest row but no business showing dyes.
pub fn is_dye_menu_graph(states: &[StateSnapshot]) -> bool {
    let mut found_sort_chest = false;
    for state in states {
        for event in &state.events {
            match event.message_id {
                Some(msg_id::CONVERGENCE_TRAINING_GROUNDS) => return false,
                Some(msg_id::SORT_CHEST) => found_sort_chest = true,
                _ => {}
            }
        }
    }
    found_sort_chest
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchPlan {
    /// The graph already carries the "Apply dyes" row; do nothing.
    AlreadyPatched,
    /// No anchor in this graph; expected for hosts without the chest
    /// feature, not an error.
    NoAnchor,
    Splice {
        /// State whose entry events gain the "Apply dyes" row (appended).
        menu_state: usize,
        /// State whose transition list gains the branch into the dye menu.
        transition_state: usize,
        /// Insert position: directly before the sort-chest transition, so
        /// the new row wins the dispatch.
        transition_index: usize,
    },
}

/// Decide where (and whether) to splice the dye menu into an anchor graph.
/// Safe to call every time the graph's initial state is entered; a previous
/// splice is detected by its own row message id.
pub fn plan_patch(states: &[StateSnapshot]) -> PatchPlan {
    let mut menu_state = None;
    let mut transition = None;

    for (state_index, state) in states.iter().enumerate() {
        for event in &state.events {
            match event.message_id {
                Some(msg_id::APPLY_DYES) => return PatchPlan::AlreadyPatched,
                Some(msg_id::SORT_CHEST) if menu_state.is_none() => {
                    menu_state = Some(state_index);
                }
                _ => {}
            }
        }
        for (transition_index, t) in state.transitions.iter().enumerate() {
            if t.opens_repository && transition.is_none() {
                transition = Some((state_index, transition_index));
            }
        }
    }

    match (menu_state, transition) {
        (Some(menu_state), Some((transition_state, transition_index))) => PatchPlan::Splice {
            menu_state,
            transition_state,
            transition_index,
        },
        _ => PatchPlan::NoAnchor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::FakeInventory;

    fn test_catalog() -> Catalog {
        let mut catalog = Catalog::new(false);
        catalog.add_color("Red", "#ff0000", [1.0, 0.0, 0.0]);
        catalog.add_color("Blue", "#0000ff", [0.0, 0.0, 1.0]);
        catalog
    }

    fn role_of(model: &MenuModel, role: StateRole) -> StateId {
        model
            .states
            .iter()
            .position(|s| s.role == role)
            .expect("role not in model")
    }

    #[test]
    fn int_expressions_round_trip() {
        for value in [-1, 0, 67, 999_999, msg_id::APPLY_DYES] {
            let bytes = make_int_expression(value);
            assert_eq!(parse_int_expression(&bytes), Some(value));
        }
        // The compact single-byte form is bias-64.
        assert_eq!(parse_int_expression(&[0x40, 0xa1]), Some(0));
        assert_eq!(parse_int_expression(&[0x43, 0xa1]), Some(3));
        assert_eq!(parse_int_expression(&[0x41]), None);
    }

    #[test]
    fn model_covers_every_row() {
        let catalog = test_catalog();
        let model = build_menu_model(&catalog);

        let color_menu = role_of(&model, StateRole::ColorMenu);
        let add_rows = model.states[color_menu]
            .events
            .iter()
            .filter(|e| matches!(e, MenuEvent::AddTalkListData { .. }))
            .count();
        // none + 2 colors + back
        assert_eq!(add_rows, 4);

        let intensity_menu = role_of(&model, StateRole::IntensityMenu);
        let add_rows = model.states[intensity_menu]
            .events
            .iter()
            .filter(|e| matches!(e, MenuEvent::AddTalkListData { .. }))
            .count();
        // 10 steps + back
        assert_eq!(add_rows, 11);

        // Every commit state returns into its picker, never dead-ends.
        for state in &model.states {
            if matches!(
                state.role,
                StateRole::ColorCommit(_) | StateRole::IntensityCommit(_) | StateRole::NoneCommit
            ) {
                assert_eq!(state.transitions.len(), 1);
                assert!(matches!(state.transitions[0].exit, Exit::State(_)));
            }
        }
    }

    #[test]
    fn cancel_row_leaves_to_the_host_graph() {
        let catalog = test_catalog();
        let model = build_menu_model(&catalog);
        let branch = role_of(&model, StateRole::TargetSelectBranch);
        let default = model.states[branch].transitions.last().unwrap();
        assert_eq!(default.condition, Condition::Always);
        assert_eq!(default.exit, Exit::HostInitial);
    }

    #[test]
    fn commit_flow_writes_the_store_and_keeps_the_cursor() {
        let catalog = test_catalog();
        let mut inventory = FakeInventory::loaded();
        let mut controller = DialogController::default();

        controller.handle_entry(Some(StateRole::TargetSelectMenu), &catalog, &mut inventory);
        assert_eq!(controller.cursor(), None);

        controller.handle_entry(
            Some(StateRole::CursorSet(DyeTarget::PrimaryColor)),
            &catalog,
            &mut inventory,
        );
        assert_eq!(controller.cursor(), Some(DyeTarget::PrimaryColor));

        controller.handle_entry(Some(StateRole::ColorCommit(1)), &catalog, &mut inventory);
        assert_eq!(
            store::get_selected(&inventory, &catalog, DyeTarget::PrimaryColor),
            Some(1)
        );
        // Still editing the same target; the preview stays live.
        assert_eq!(controller.cursor(), Some(DyeTarget::PrimaryColor));

        // Re-entering the picker styles the committed row as selected.
        let effects =
            controller.handle_entry(Some(StateRole::ColorMenu), &catalog, &mut inventory);
        assert_eq!(
            effects,
            vec![MenuEffect::SetPickerRows {
                kind: PickerKind::Color,
                message_ids: vec![
                    msg_id::NONE_DESELECTED,
                    msg_id::COLOR_DESELECTED_BASE,
                    msg_id::COLOR_SELECTED_BASE + 1,
                ],
            }]
        );

        // Leaving the subtree entirely drops the cursor.
        controller.handle_entry(None, &catalog, &mut inventory);
        assert_eq!(controller.cursor(), None);
    }

    #[test]
    fn none_commit_clears_color_and_paired_intensity() {
        let catalog = test_catalog();
        let mut inventory = FakeInventory::loaded();
        let mut controller = DialogController::default();

        controller.handle_entry(
            Some(StateRole::CursorSet(DyeTarget::SecondaryColor)),
            &catalog,
            &mut inventory,
        );
        controller.handle_entry(Some(StateRole::ColorCommit(0)), &catalog, &mut inventory);
        controller.handle_entry(
            Some(StateRole::CursorSet(DyeTarget::SecondaryIntensity)),
            &catalog,
            &mut inventory,
        );
        controller.handle_entry(Some(StateRole::IntensityCommit(9)), &catalog, &mut inventory);

        controller.handle_entry(
            Some(StateRole::CursorSet(DyeTarget::SecondaryColor)),
            &catalog,
            &mut inventory,
        );
        controller.handle_entry(Some(StateRole::NoneCommit), &catalog, &mut inventory);

        assert!(inventory.items.is_empty());
    }

    fn sort_chest_graph() -> Vec<StateSnapshot> {
        vec![
            StateSnapshot::default(),
            StateSnapshot {
                events: vec![
                    EventSnapshot {
                        command: talk_command::ADD_TALK_LIST_DATA,
                        message_id: Some(msg_id::SORT_CHEST),
                    },
                    EventSnapshot {
                        command: talk_command::SHOW_SHOP_MESSAGE,
                        message_id: None,
                    },
                ],
                transitions: vec![],
            },
            StateSnapshot {
                events: vec![],
                transitions: vec![
                    TransitionSnapshot {
                        opens_repository: false,
                    },
                    TransitionSnapshot {
                        opens_repository: true,
                    },
                ],
            },
        ]
    }

    #[test]
    fn plans_a_splice_at_the_anchor() {
        let graph = sort_chest_graph();
        assert!(is_dye_menu_graph(&graph));
        assert_eq!(
            plan_patch(&graph),
            PatchPlan::Splice {
                menu_state: 1,
                transition_state: 2,
                transition_index: 1,
            }
        );
    }

    #[test]
    fn patching_twice_is_detected() {
        let mut graph = sort_chest_graph();
        // Simulate an applied splice: the menu state now carries the row.
        graph[1].events.push(EventSnapshot {
            command: talk_command::ADD_TALK_LIST_DATA,
            message_id: Some(msg_id::APPLY_DYES),
        });
        assert_eq!(plan_patch(&graph), PatchPlan::AlreadyPatched);
    }

    #[test]
    fn graphs_without_an_anchor_are_skipped() {
        let graph = vec![StateSnapshot::default()];
        assert!(!is_dye_menu_graph(&graph));
        assert_eq!(plan_patch(&graph), PatchPlan::NoAnchor);
    }

    #[test]
    fn the_convergence_training_grounds_is_excluded() {
        let mut graph = sort_chest_graph();
        graph[0].events.push(EventSnapshot {
            command: talk_command::ADD_TALK_LIST_DATA,
            message_id: Some(msg_id::CONVERGENCE_TRAINING_GROUNDS),
        });
        assert!(!is_dye_menu_graph(&graph));
    }
}
