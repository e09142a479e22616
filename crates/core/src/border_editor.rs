//! Land boundary editor state machine.
//!
//! The editor is a reducer: [`BorderEditState::apply`] takes the current
//! state and one [`EditorEvent`] and returns the next state. Nothing is
//! mutated in place, so a transition is never observed half-applied.
//!
//! From [`BorderEditState::Normal`] the user enters one of the
//! [`EditMode`]s, each of which works on scratch copies of the fields it
//! touches. `Submit` folds the scratch state back into the snapshot,
//! `Cancel` throws it away, and `Reset` drops every pending change and
//! goes back to the persisted land.

use serde::{Deserialize, Serialize};

use crate::color::Argb;
use crate::geometry::{center_of, nearest_index};
use crate::model::{Land, Point, Ring};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The editable fields of a land next to the persisted land they started
/// from.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSnapshot {
    /// Last persisted version (or [`Land::empty`] for a new land).
    pub land: Land,
    pub title: String,
    pub color: Argb,
    pub border: Ring,
    pub holes: Vec<Ring>,
    /// Where the map should be centered.
    pub center: Option<Point>,
}

impl EditSnapshot {
    /// Start editing a persisted land.
    pub fn from_land(land: Land) -> Self {
        Self {
            title: land.title.clone(),
            color: land.color,
            border: land.border.clone(),
            holes: land.holes.clone(),
            center: center_of(&land.border),
            land,
        }
    }

    /// Start a new land with an empty border centered at `center`.
    pub fn new_at(center: Point) -> Self {
        Self {
            center: Some(center),
            ..Self::from_land(Land::empty())
        }
    }

    /// `true` if any editable field differs from the persisted land.
    pub fn needs_save(&self) -> bool {
        self.title != self.land.title
            || self.color != self.land.color
            || self.border != self.land.border
            || self.holes != self.land.holes
    }

    /// The land that would be persisted from this snapshot.
    pub fn to_land(&self) -> Land {
        Land::new(
            self.land.id,
            self.title.clone(),
            self.color,
            self.border.clone(),
            self.holes.clone(),
        )
    }

    /// Discard pending changes, keeping the map center.
    fn reset(&self) -> Self {
        Self {
            center: self.center,
            ..Self::from_land(self.land.clone())
        }
    }
}

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

/// Selector for the edit modes reachable from `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditAction {
    AddPoint,
    AddBetweenPoints,
    DeletePoint,
    EditPoint,
    EditTitle,
    EditColor,
}

/// Scratch state of the active edit mode.
#[derive(Debug, Clone, PartialEq)]
pub enum EditMode {
    /// Every tap appends a vertex.
    AddPoint { temp_border: Ring },
    /// Pick two adjacent vertices, then place (and once reposition) new
    /// vertices between them.
    AddBetweenPoints {
        temp_border: Ring,
        start_index: Option<usize>,
        end_index: Option<usize>,
        selected_index: Option<usize>,
        /// The pair is `(0, last)`: insertions go after the last vertex.
        wraps_around: bool,
    },
    /// Every tap removes the nearest vertex.
    DeletePoint { temp_border: Ring },
    /// First tap selects the nearest vertex, second tap moves it.
    EditPoint {
        temp_border: Ring,
        selected_index: Option<usize>,
    },
    EditTitle { temp_title: String },
    EditColor { temp_color: Argb },
}

impl EditMode {
    fn enter(action: EditAction, snapshot: &EditSnapshot) -> Self {
        let temp_border = snapshot.border.clone();
        match action {
            EditAction::AddPoint => Self::AddPoint { temp_border },
            EditAction::AddBetweenPoints => Self::AddBetweenPoints {
                temp_border,
                start_index: None,
                end_index: None,
                selected_index: None,
                wraps_around: false,
            },
            EditAction::DeletePoint => Self::DeletePoint { temp_border },
            EditAction::EditPoint => Self::EditPoint {
                temp_border,
                selected_index: None,
            },
            EditAction::EditTitle => Self::EditTitle {
                temp_title: snapshot.title.clone(),
            },
            EditAction::EditColor => Self::EditColor {
                temp_color: snapshot.color,
            },
        }
    }

    pub fn action(&self) -> EditAction {
        match self {
            Self::AddPoint { .. } => EditAction::AddPoint,
            Self::AddBetweenPoints { .. } => EditAction::AddBetweenPoints,
            Self::DeletePoint { .. } => EditAction::DeletePoint,
            Self::EditPoint { .. } => EditAction::EditPoint,
            Self::EditTitle { .. } => EditAction::EditTitle,
            Self::EditColor { .. } => EditAction::EditColor,
        }
    }

    /// Scratch border, for modes that edit one.
    pub fn temp_border(&self) -> Option<&Ring> {
        match self {
            Self::AddPoint { temp_border }
            | Self::AddBetweenPoints { temp_border, .. }
            | Self::DeletePoint { temp_border }
            | Self::EditPoint { temp_border, .. } => Some(temp_border),
            Self::EditTitle { .. } | Self::EditColor { .. } => None,
        }
    }

    /// Fold the scratch state into `snapshot`.
    fn commit(self, mut snapshot: EditSnapshot) -> EditSnapshot {
        match self {
            Self::AddPoint { temp_border }
            | Self::AddBetweenPoints { temp_border, .. }
            | Self::DeletePoint { temp_border }
            | Self::EditPoint { temp_border, .. } => snapshot.border = temp_border,
            Self::EditTitle { temp_title } => snapshot.title = temp_title,
            Self::EditColor { temp_color } => snapshot.color = temp_color,
        }
        snapshot
    }

    fn tap(self, point: Point) -> Self {
        match self {
            Self::AddPoint { mut temp_border } => {
                temp_border.push(point);
                Self::AddPoint { temp_border }
            }
            Self::AddBetweenPoints {
                temp_border,
                start_index,
                end_index,
                selected_index,
                wraps_around,
            } => tap_between(
                temp_border,
                start_index,
                end_index,
                selected_index,
                wraps_around,
                point,
            ),
            Self::DeletePoint { mut temp_border } => {
                if let Some(i) = nearest_index(&temp_border, &point) {
                    temp_border.remove(i);
                }
                Self::DeletePoint { temp_border }
            }
            Self::EditPoint {
                mut temp_border,
                selected_index,
            } => match selected_index {
                Some(i) => {
                    if let Some(vertex) = temp_border.get_mut(i) {
                        *vertex = point;
                    }
                    Self::EditPoint {
                        temp_border,
                        selected_index: None,
                    }
                }
                None => Self::EditPoint {
                    selected_index: nearest_index(&temp_border, &point),
                    temp_border,
                },
            },
            mode @ (Self::EditTitle { .. } | Self::EditColor { .. }) => mode,
        }
    }
}

/// Order two vertex indices into an adjacent pair, if they are adjacent.
/// Returns the pair and whether it is the `(0, last)` closing edge.
fn adjacent_pair(a: usize, b: usize, len: usize) -> Option<(usize, usize, bool)> {
    if a.abs_diff(b) == 1 {
        return Some((a.min(b), a.max(b), false));
    }
    let last = len.checked_sub(1)?;
    if len > 2 && a.min(b) == 0 && a.max(b) == last {
        return Some((0, last, true));
    }
    None
}

fn tap_between(
    mut temp_border: Ring,
    mut start_index: Option<usize>,
    mut end_index: Option<usize>,
    mut selected_index: Option<usize>,
    mut wraps_around: bool,
    point: Point,
) -> EditMode {
    match (start_index, end_index, selected_index) {
        // Reposition the point that was just inserted.
        (_, _, Some(selected)) => {
            if let Some(vertex) = temp_border.get_mut(selected) {
                *vertex = point;
            }
            selected_index = None;
        }
        (None, _, None) => start_index = nearest_index(&temp_border, &point),
        (Some(start), None, None) => {
            let candidate = nearest_index(&temp_border, &point);
            if let Some((from, to, wraps)) =
                candidate.and_then(|c| adjacent_pair(start, c, temp_border.len()))
            {
                start_index = Some(from);
                end_index = Some(to);
                wraps_around = wraps;
            }
        }
        (Some(_), Some(end), None) => {
            if wraps_around {
                temp_border.push(point);
                selected_index = Some(temp_border.len() - 1);
            } else {
                let at = end.min(temp_border.len());
                temp_border.insert(at, point);
                selected_index = Some(at);
                end_index = Some(at + 1);
            }
        }
    }
    EditMode::AddBetweenPoints {
        temp_border,
        start_index,
        end_index,
        selected_index,
        wraps_around,
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Inputs accepted by the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// The starting point for a new land was resolved.
    LocationResolved(Point),
    /// The persisted record changed (or turned out not to exist).
    RecordLoaded(Option<Land>),
    /// Enter an edit mode, committing the current one first.
    SetAction(EditAction),
    /// A map tap.
    Tap(Point),
    SetTempTitle(String),
    SetTempColor(Argb),
    /// Drop one hole from the pending snapshot.
    RemoveHole(usize),
    Submit,
    Cancel,
    /// Discard every pending change.
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BorderEditState {
    /// New land without a starting point yet.
    NeedLocation,
    Normal(EditSnapshot),
    Editing { base: EditSnapshot, mode: EditMode },
}

impl BorderEditState {
    /// Initial state: `Normal` for a persisted land, `NeedLocation` for a
    /// new one.
    pub fn initial(land: Option<Land>) -> Self {
        match land {
            Some(land) => Self::Normal(EditSnapshot::from_land(land)),
            None => Self::NeedLocation,
        }
    }

    /// Apply one event. Events that make no sense in the current state
    /// leave it unchanged.
    pub fn apply(self, event: EditorEvent) -> Self {
        match (self, event) {
            (_, EditorEvent::RecordLoaded(land)) => Self::initial(land),

            (Self::NeedLocation, EditorEvent::LocationResolved(point)) => {
                Self::Normal(EditSnapshot::new_at(point))
            }

            (Self::Normal(base), EditorEvent::SetAction(action)) => Self::Editing {
                mode: EditMode::enter(action, &base),
                base,
            },
            (Self::Editing { base, mode }, EditorEvent::SetAction(action)) => {
                let base = mode.commit(base);
                Self::Editing {
                    mode: EditMode::enter(action, &base),
                    base,
                }
            }

            (Self::Editing { base, mode }, EditorEvent::Tap(point)) => Self::Editing {
                base,
                mode: mode.tap(point),
            },

            (
                Self::Editing {
                    base,
                    mode: EditMode::EditTitle { .. },
                },
                EditorEvent::SetTempTitle(temp_title),
            ) => Self::Editing {
                base,
                mode: EditMode::EditTitle { temp_title },
            },
            (
                Self::Editing {
                    base,
                    mode: EditMode::EditColor { .. },
                },
                EditorEvent::SetTempColor(temp_color),
            ) => Self::Editing {
                base,
                mode: EditMode::EditColor { temp_color },
            },

            (Self::Normal(mut base), EditorEvent::RemoveHole(index)) => {
                if index < base.holes.len() {
                    base.holes.remove(index);
                }
                Self::Normal(base)
            }

            (Self::Editing { base, mode }, EditorEvent::Submit) => Self::Normal(mode.commit(base)),
            (Self::Editing { base, .. }, EditorEvent::Cancel) => Self::Normal(base),

            (Self::Normal(base) | Self::Editing { base, .. }, EditorEvent::Reset) => {
                Self::Normal(base.reset())
            }

            (state, _) => state,
        }
    }

    /// The committed snapshot, in `Normal` and every edit mode.
    pub fn snapshot(&self) -> Option<&EditSnapshot> {
        match self {
            Self::NeedLocation => None,
            Self::Normal(snapshot) | Self::Editing { base: snapshot, .. } => Some(snapshot),
        }
    }

    pub fn mode(&self) -> Option<&EditMode> {
        match self {
            Self::Editing { mode, .. } => Some(mode),
            _ => None,
        }
    }

    pub fn needs_save(&self) -> bool {
        self.snapshot().is_some_and(EditSnapshot::needs_save)
    }
}

/// Owner of one land's editing session.
#[derive(Debug, Clone)]
pub struct BorderEditor {
    state: BorderEditState,
}

impl BorderEditor {
    /// Session for a new land, waiting for a starting location.
    pub fn new() -> Self {
        Self {
            state: BorderEditState::NeedLocation,
        }
    }

    /// Session for an existing land.
    pub fn for_land(land: Land) -> Self {
        Self {
            state: BorderEditState::initial(Some(land)),
        }
    }

    pub fn state(&self) -> &BorderEditState {
        &self.state
    }

    /// Apply one event and return the new state.
    pub fn apply(&mut self, event: EditorEvent) -> &BorderEditState {
        let state = std::mem::replace(&mut self.state, BorderEditState::NeedLocation);
        self.state = state.apply(event);
        &self.state
    }

    pub fn on_location_resolved(&mut self, point: Point) -> &BorderEditState {
        self.apply(EditorEvent::LocationResolved(point))
    }

    pub fn on_record(&mut self, land: Option<Land>) -> &BorderEditState {
        self.apply(EditorEvent::RecordLoaded(land))
    }

    pub fn set_action(&mut self, action: EditAction) -> &BorderEditState {
        self.apply(EditorEvent::SetAction(action))
    }

    pub fn tap(&mut self, point: Point) -> &BorderEditState {
        self.apply(EditorEvent::Tap(point))
    }

    pub fn set_temp_title(&mut self, title: impl Into<String>) -> &BorderEditState {
        self.apply(EditorEvent::SetTempTitle(title.into()))
    }

    pub fn set_temp_color(&mut self, color: Argb) -> &BorderEditState {
        self.apply(EditorEvent::SetTempColor(color))
    }

    pub fn remove_hole(&mut self, index: usize) -> &BorderEditState {
        self.apply(EditorEvent::RemoveHole(index))
    }

    pub fn submit(&mut self) -> &BorderEditState {
        self.apply(EditorEvent::Submit)
    }

    pub fn cancel(&mut self) -> &BorderEditState {
        self.apply(EditorEvent::Cancel)
    }

    pub fn reset_action(&mut self) -> &BorderEditState {
        self.apply(EditorEvent::Reset)
    }

    pub fn needs_save(&self) -> bool {
        self.state.needs_save()
    }

    /// The land to persist, built from the committed snapshot.
    pub fn land(&self) -> Option<Land> {
        self.state.snapshot().map(EditSnapshot::to_land)
    }
}

impl Default for BorderEditor {
    fn default() -> Self {
        Self::new()
    }
}
