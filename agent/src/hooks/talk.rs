//! Talkscript patching. The dye menu is built once as host-shaped states in
//! leaked (pointer-stable) storage; whenever a dialog graph's initial state
//! is entered and the graph carries the storage-chest anchor, one list row
//! and one transition are spliced in to route into it. The splice is
//! re-applied after reloads because the game rebuilds its graphs, and is
//! detected by the row it already added.

use std::collections::HashMap;
use std::ffi::c_void;
use std::mem;
use std::sync::{Mutex, OnceLock};

use retour::static_detour;
use tracing::{debug, info, warn};

use dyes::catalog::Catalog;
use dyes::dialog::{
    self, talk_command, Condition, EventSnapshot, Exit, MenuEffect, MenuEvent, MenuModel,
    PatchPlan, PickerKind, StateRole, StateSnapshot, TransitionSnapshot,
};
use dyes::error::InitError;
use dyes::messages::msg_id;
use dyes::store;
use dyes::target::DyeTarget;

use crate::cs::{
    EzEvent, EzExpression, EzSpan, EzState, EzStateGroup, EzStateMachine, EzTransition,
};
use crate::game::pattern;
use crate::hooks::inventory::LiveInventory;
use crate::Mod;

/// Upper bound on the anchor state's event/transition count after splicing.
const SPLICE_CAPACITY: usize = 100;

static TRUE_EXPR: [u8; 2] = dialog::TRUE_EXPRESSION;
static MENU_CLOSED_EXPR: [u8; 39] = dialog::TALK_MENU_CLOSED_EXPRESSION;
static PLACEHOLDER_EXPR: [u8; 6] = dialog::PLACEHOLDER_EXPRESSION;
static SHOP_MESSAGE_ARG: [u8; 6] = dialog::GENERIC_DIALOG_SHOP_MESSAGE;

/// The dye sub-graph in host-shaped storage, plus the scratch arrays the
/// splice rewrites. Only ever touched from the simulation thread once
/// installed.
struct RawMenu {
    states: &'static mut [EzState],
    /// State address -> meaning, for the enter detour.
    roles: HashMap<usize, StateRole>,
    /// Message-id expression storage per picker row, rewritten in place when
    /// a picker re-renders its selected marker.
    color_rows: Vec<*mut u8>,
    intensity_rows: Vec<*mut u8>,
    /// Transitions whose target is fixed up to the anchor graph's initial
    /// state at splice time.
    host_returns: Vec<*mut EzTransition>,
    apply_dyes_event: EzEvent,
    apply_dyes_transition: *mut EzTransition,
    patched_events: Box<[EzEvent]>,
    patched_transitions: Box<[*mut EzTransition]>,
}

// Raw pointers into leaked storage; everything is confined to the host's
// simulation thread after installation.
unsafe impl Send for RawMenu {}

static MENU: OnceLock<Mutex<RawMenu>> = OnceLock::new();

static_detour! {
    static EnterState: unsafe extern "system" fn(*mut EzState, *mut EzStateMachine, *mut c_void);
}

// 80 7e 18 00          cmp byte ptr [rsi + 0x18], 0
// 74 15                je +0x15
// 4c 8d 44 24 40       lea r8, [rsp + 0x40]
// 48 8b d6             mov rdx, rsi
// 48 8b 4e 20          mov rcx, [rsi + 0x20]
// e8 ?? ?? ?? ??       call EzState::State::Enter
const ENTER_STATE_PATTERN: &str = concat!(
    "10000000 01111110 00011000 00000000",
    "01110100 00010101",
    "01001100 10001101 01000100 00100100 01000000",
    "01001000 10001011 11010110",
    "01001000 10001011 01001110 00100000",
    "11101000 [........ ........ ........ ........]",
);

pub(crate) unsafe fn install(catalog: &Catalog) -> Result<(), InitError> {
    let model = dialog::build_menu_model(catalog);
    let _ = MENU.set(Mutex::new(materialize(&model)));

    let target = pattern::scan_relative_call("ezstate_enter_state", ENTER_STATE_PATTERN)?;
    EnterState
        .initialize(mem::transmute(target), enter_state_detour)
        .map_err(|e| InitError::Hook("ezstate_enter_state", e.to_string()))?;
    EnterState
        .enable()
        .map_err(|e| InitError::Hook("ezstate_enter_state", e.to_string()))?;

    Ok(())
}

fn leak_expression(bytes: &[u8]) -> EzExpression {
    let storage = Box::leak(bytes.to_vec().into_boxed_slice());
    EzSpan::new(storage.as_mut_ptr(), storage.len())
}

fn static_expression(bytes: &'static [u8]) -> EzExpression {
    // The host never writes through expression spans.
    EzSpan::new(bytes.as_ptr() as *mut u8, bytes.len())
}

/// Translate the menu model into linked host states with stable addresses.
fn materialize(model: &MenuModel) -> RawMenu {
    let states: &'static mut [EzState] = {
        let mut storage = Vec::with_capacity(model.states.len());
        storage.resize_with(model.states.len(), EzState::empty);
        Box::leak(storage.into_boxed_slice())
    };
    let base = states.as_mut_ptr();

    let mut roles = HashMap::new();
    let mut color_rows = Vec::new();
    let mut intensity_rows = Vec::new();
    let mut host_returns = Vec::new();

    for (index, model_state) in model.states.iter().enumerate() {
        let mut events: Vec<EzEvent> = Vec::with_capacity(model_state.events.len());
        for event in &model_state.events {
            events.push(match event {
                MenuEvent::CloseShopMessage => {
                    EzEvent::new(talk_command::CLOSE_SHOP_MESSAGE, EzSpan::empty())
                }
                MenuEvent::ClearTalkList => {
                    EzEvent::new(talk_command::CLEAR_TALK_LIST_DATA, EzSpan::empty())
                }
                MenuEvent::ShowShopMessage => {
                    let args = Box::leak(Box::new([static_expression(&SHOP_MESSAGE_ARG)]));
                    EzEvent::new(
                        talk_command::SHOW_SHOP_MESSAGE,
                        EzSpan::new(args.as_mut_ptr(), args.len()),
                    )
                }
                MenuEvent::AddTalkListData { row, message_id } => {
                    let row_expr = leak_expression(&dialog::make_int_expression(*row));
                    let message_expr = leak_expression(&dialog::make_int_expression(*message_id));
                    match model_state.role {
                        StateRole::ColorMenu => color_rows.push(message_expr.elements),
                        StateRole::IntensityMenu => intensity_rows.push(message_expr.elements),
                        _ => {}
                    }
                    let args = Box::leak(Box::new([
                        row_expr,
                        message_expr,
                        static_expression(&PLACEHOLDER_EXPR),
                    ]));
                    EzEvent::new(
                        talk_command::ADD_TALK_LIST_DATA,
                        EzSpan::new(args.as_mut_ptr(), args.len()),
                    )
                }
            });
        }
        let events = Box::leak(events.into_boxed_slice());

        let mut transition_ptrs: Vec<*mut EzTransition> =
            Vec::with_capacity(model_state.transitions.len());
        for transition in &model_state.transitions {
            let evaluator = match transition.condition {
                Condition::TalkListResult(value) => {
                    leak_expression(&dialog::make_talk_list_result_expression(value))
                }
                Condition::MenuClosed => static_expression(&MENU_CLOSED_EXPR),
                Condition::Always => static_expression(&TRUE_EXPR),
            };
            let target_state = match transition.exit {
                Exit::State(id) => unsafe { base.add(id) },
                Exit::HostInitial => std::ptr::null_mut(),
            };
            let raw: *mut EzTransition = Box::leak(Box::new(EzTransition {
                target_state,
                evaluator,
            }));
            if matches!(transition.exit, Exit::HostInitial) {
                host_returns.push(raw);
            }
            transition_ptrs.push(raw);
        }
        let transition_ptrs = Box::leak(transition_ptrs.into_boxed_slice());

        states[index].entry_events = EzSpan::new(events.as_mut_ptr(), events.len());
        states[index].transitions =
            EzSpan::new(transition_ptrs.as_mut_ptr(), transition_ptrs.len());
        roles.insert(unsafe { base.add(index) } as usize, model_state.role);
    }

    // The row spliced into the anchor state and its transition into the
    // sub-graph.
    let row_expr = leak_expression(&dialog::make_int_expression(dialog::APPLY_DYES_ROW));
    let message_expr = leak_expression(&dialog::make_int_expression(msg_id::APPLY_DYES));
    let args = Box::leak(Box::new([
        row_expr,
        message_expr,
        static_expression(&PLACEHOLDER_EXPR),
    ]));
    let apply_dyes_event = EzEvent::new(
        talk_command::ADD_TALK_LIST_DATA,
        EzSpan::new(args.as_mut_ptr(), args.len()),
    );
    let condition =
        leak_expression(&dialog::make_talk_list_result_expression(dialog::APPLY_DYES_ROW));
    let apply_dyes_transition: *mut EzTransition = Box::leak(Box::new(EzTransition {
        target_state: unsafe { base.add(model.entry) },
        evaluator: condition,
    }));

    RawMenu {
        states,
        roles,
        color_rows,
        intensity_rows,
        host_returns,
        apply_dyes_event,
        apply_dyes_transition,
        patched_events: vec![EzEvent::new(0, EzSpan::empty()); SPLICE_CAPACITY]
            .into_boxed_slice(),
        patched_transitions: vec![std::ptr::null_mut(); SPLICE_CAPACITY].into_boxed_slice(),
    }
}

fn enter_state_detour(state: *mut EzState, machine: *mut EzStateMachine, unk: *mut c_void) {
    unsafe {
        if let Some(mod_state) = crate::instance() {
            handle_enter(mod_state, state, machine);
        }
        EnterState.call(state, machine, unk)
    }
}

unsafe fn handle_enter(
    mod_state: &'static Mod,
    state: *mut EzState,
    machine: *mut EzStateMachine,
) {
    let Some(machine) = machine.as_ref() else {
        return;
    };
    let Some(group) = machine.state_group.as_mut() else {
        return;
    };
    let Some(menu) = MENU.get() else {
        return;
    };
    let Ok(mut raw) = menu.lock() else {
        return;
    };

    let snapshots = snapshot_group(group);
    if !dialog::is_dye_menu_graph(&snapshots) {
        return;
    }

    if std::ptr::eq(state, group.initial_state) {
        match dialog::plan_patch(&snapshots) {
            PatchPlan::Splice {
                menu_state,
                transition_state,
                transition_index,
            } => splice(&mut raw, group, menu_state, transition_state, transition_index),
            PatchPlan::AlreadyPatched => {
                debug!(
                    "Not patching state group x{}, already patched",
                    0x7fffffff - group.id
                );
            }
            PatchPlan::NoAnchor => {}
        }
    }

    let role = raw.roles.get(&(state as usize)).copied();
    let mut inventory = LiveInventory::current();
    let effects = match mod_state.controller.lock() {
        Ok(mut controller) => controller.handle_entry(role, &mod_state.catalog, &mut inventory),
        Err(_) => return,
    };

    for effect in effects {
        match effect {
            MenuEffect::RefreshTargetLabels => {
                let mut selected = [None; 6];
                for target in DyeTarget::ALL {
                    selected[target.index()] =
                        store::get_selected(&inventory, &mod_state.catalog, target);
                }
                if let Ok(mut messages) = mod_state.messages.lock() {
                    messages.refresh_target_labels(&mod_state.catalog, &selected);
                }
                mod_state.invalidate_target_labels();
            }
            MenuEffect::SetPickerRows { kind, message_ids } => {
                let rows = match kind {
                    PickerKind::Color => &raw.color_rows,
                    PickerKind::Intensity => &raw.intensity_rows,
                };
                for (expression, message_id) in rows.iter().zip(message_ids) {
                    let encoded = dialog::make_int_expression(message_id);
                    std::ptr::copy_nonoverlapping(encoded.as_ptr(), *expression, encoded.len());
                }
            }
        }
    }
}

/// Reduce a live graph to what anchor detection needs.
unsafe fn snapshot_group(group: &EzStateGroup) -> Vec<StateSnapshot> {
    group
        .states
        .as_slice()
        .iter()
        .map(|state| StateSnapshot {
            events: state
                .entry_events
                .as_slice()
                .iter()
                .map(|event| EventSnapshot {
                    command: event.command,
                    message_id: message_id_of(event),
                })
                .collect(),
            transitions: state
                .transitions
                .as_slice()
                .iter()
                .map(|&transition| TransitionSnapshot {
                    opens_repository: opens_repository(transition),
                })
                .collect(),
        })
        .collect()
}

unsafe fn message_id_of(event: &EzEvent) -> Option<i32> {
    let arg_index = dialog::talk_list_message_arg(event.command)?;
    let args = event.args;
    let arg = args.as_slice().get(arg_index)?;
    dialog::parse_int_expression(arg.as_slice())
}

unsafe fn opens_repository(transition: *mut EzTransition) -> bool {
    let Some(transition) = transition.as_ref() else {
        return false;
    };
    let Some(target) = transition.target_state.as_ref() else {
        return false;
    };
    let events = target.entry_events;
    events
        .as_slice()
        .first()
        .map(|event| event.command == talk_command::OPEN_REPOSITORY)
        .unwrap_or(false)
}

/// Add the "Apply dyes" row to the anchor's event list and its transition
/// ahead of the sort-chest one, then point every host-return transition of
/// the sub-graph at this graph's initial state.
unsafe fn splice(
    raw: &mut RawMenu,
    group: &mut EzStateGroup,
    menu_state: usize,
    transition_state: usize,
    transition_index: usize,
) {
    let initial_state = group.initial_state;
    if group.states.elements.is_null() {
        return;
    }
    let states =
        std::slice::from_raw_parts_mut(group.states.elements, group.states.count);

    let event_span = states[menu_state].entry_events;
    let events = event_span.as_slice();
    let transition_span = states[transition_state].transitions;
    let transitions = transition_span.as_slice();
    if events.len() + 1 > raw.patched_events.len()
        || transitions.len() + 1 > raw.patched_transitions.len()
    {
        warn!(
            "Not patching state group x{}, anchor state too large",
            0x7fffffff - group.id
        );
        return;
    }

    info!("Patching state group x{}", 0x7fffffff - group.id);

    raw.patched_events[..events.len()].copy_from_slice(events);
    raw.patched_events[events.len()] = raw.apply_dyes_event;
    states[menu_state].entry_events =
        EzSpan::new(raw.patched_events.as_mut_ptr(), events.len() + 1);

    raw.patched_transitions[..transition_index].copy_from_slice(&transitions[..transition_index]);
    raw.patched_transitions[transition_index] = raw.apply_dyes_transition;
    raw.patched_transitions[transition_index + 1..transitions.len() + 1]
        .copy_from_slice(&transitions[transition_index..]);
    states[transition_state].transitions =
        EzSpan::new(raw.patched_transitions.as_mut_ptr(), transitions.len() + 1);

    for transition in &raw.host_returns {
        (**transition).target_state = initial_state;
    }
}
