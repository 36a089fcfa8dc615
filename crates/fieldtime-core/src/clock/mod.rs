//! Clock state machine.
//!
//! The current activity of a technician is never stored on its own: it is
//! derived from the single active entry in the local store. `ClockMachine`
//! re-derives it before every action, turns the action into a store mutation
//! and reports the resulting state.

use std::fmt;

use thiserror::Error;

use crate::db::{Database, EntryRepository};
use crate::models::{EntryId, WorkEntry, LUNCH_BREAK_CUSTOMER};
use crate::util::now_millis;

/// What the technician is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockState {
    #[default]
    Idle,
    Driving(EntryId),
    ClockedIn(EntryId),
    OnLunch(EntryId),
}

impl ClockState {
    /// Derive the state an entry puts its owner in.
    pub const fn of(entry: &WorkEntry) -> Self {
        if !entry.is_active() {
            Self::Idle
        } else if entry.is_on_lunch() {
            Self::OnLunch(entry.local_id)
        } else if entry.clock_in.is_some() {
            Self::ClockedIn(entry.local_id)
        } else {
            Self::Driving(entry.local_id)
        }
    }

    /// Store key of the active entry, if any.
    pub const fn entry_id(&self) -> Option<EntryId> {
        match self {
            Self::Idle => None,
            Self::Driving(id) | Self::ClockedIn(id) | Self::OnLunch(id) => Some(*id),
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Driving(_) => "driving",
            Self::ClockedIn(_) => "clocked in",
            Self::OnLunch(_) => "on lunch",
        }
    }
}

impl fmt::Display for ClockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A user action on the clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockAction {
    /// Start work. The customer is ignored when arriving from a drive.
    ClockIn { customer: String },
    StartDriving { customer: String },
    EndDriving,
    StartLunch,
    EndLunch,
    ClockOut,
}

impl ClockAction {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::ClockIn { .. } => "clock in",
            Self::StartDriving { .. } => "start driving",
            Self::EndDriving => "end driving",
            Self::StartLunch => "start lunch",
            Self::EndLunch => "end lunch",
            Self::ClockOut => "clock out",
        }
    }
}

impl fmt::Display for ClockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A refused action. Display text is meant for the technician.
#[derive(Debug, Error)]
pub enum ClockError {
    #[error("Customer name is required to {0}")]
    BlankCustomer(&'static str),

    #[error("Cannot {action} while {state}")]
    NotAllowed {
        action: &'static str,
        state: &'static str,
    },

    #[error("Lunch was already taken during this session")]
    LunchAlreadyTaken,

    #[error("Entry not found: {0}")]
    EntryNotFound(EntryId),

    #[error(transparent)]
    Store(#[from] crate::Error),
}

/// Result of an accepted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ClockState,
    pub to: ClockState,
    /// The created or mutated entry, as stored
    pub entry: WorkEntry,
}

/// Clock state machine for one technician.
#[derive(Debug, Clone)]
pub struct ClockMachine {
    user_id: String,
    technician_name: String,
    state: ClockState,
}

impl ClockMachine {
    /// Rebuild the machine from whatever entry is active for `user_id`.
    pub fn restore(
        db: &Database,
        user_id: impl Into<String>,
        technician_name: impl Into<String>,
    ) -> crate::Result<Self> {
        let mut machine = Self {
            user_id: user_id.into(),
            technician_name: technician_name.into(),
            state: ClockState::Idle,
        };
        machine.refresh(db)?;
        Ok(machine)
    }

    pub const fn state(&self) -> ClockState {
        self.state
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Re-derive the state from the store.
    pub fn refresh(&mut self, db: &Database) -> crate::Result<ClockState> {
        self.state = db
            .entries()
            .active_for(&self.user_id)?
            .as_ref()
            .map_or(ClockState::Idle, ClockState::of);
        Ok(self.state)
    }

    /// Apply a user action.
    ///
    /// Rejected actions leave the store and the state untouched.
    pub fn apply(&mut self, db: &Database, action: ClockAction) -> Result<Transition, ClockError> {
        let from = self.refresh(db)?;
        match self.transition(db, from, &action) {
            Ok(entry) => {
                self.state = ClockState::of(&entry);
                tracing::info!(
                    user_id = %self.user_id,
                    entry_id = %entry.local_id,
                    "{action}: {from} -> {}",
                    self.state
                );
                Ok(Transition {
                    from,
                    to: self.state,
                    entry,
                })
            }
            Err(error) => {
                tracing::debug!(user_id = %self.user_id, "Rejected {action}: {error}");
                Err(error)
            }
        }
    }

    pub fn clock_in(&mut self, db: &Database, customer: &str) -> Result<Transition, ClockError> {
        self.apply(
            db,
            ClockAction::ClockIn {
                customer: customer.to_string(),
            },
        )
    }

    pub fn start_driving(
        &mut self,
        db: &Database,
        customer: &str,
    ) -> Result<Transition, ClockError> {
        self.apply(
            db,
            ClockAction::StartDriving {
                customer: customer.to_string(),
            },
        )
    }

    pub fn end_driving(&mut self, db: &Database) -> Result<Transition, ClockError> {
        self.apply(db, ClockAction::EndDriving)
    }

    pub fn start_lunch(&mut self, db: &Database) -> Result<Transition, ClockError> {
        self.apply(db, ClockAction::StartLunch)
    }

    pub fn end_lunch(&mut self, db: &Database) -> Result<Transition, ClockError> {
        self.apply(db, ClockAction::EndLunch)
    }

    pub fn clock_out(&mut self, db: &Database) -> Result<Transition, ClockError> {
        self.apply(db, ClockAction::ClockOut)
    }

    /// Tombstone an entry. Deleting the active entry returns the machine to `Idle`.
    pub fn delete_entry(&mut self, db: &Database, id: &EntryId) -> Result<WorkEntry, ClockError> {
        let repo = db.entries();
        if repo.get(id)?.is_none() {
            return Err(ClockError::EntryNotFound(*id));
        }

        let entry = repo.mark_deleted(id)?;
        if self.state.entry_id() == Some(*id) {
            self.state = ClockState::Idle;
        }
        tracing::info!(user_id = %self.user_id, entry_id = %id, "Marked entry for deletion");
        Ok(entry)
    }

    fn transition(
        &self,
        db: &Database,
        from: ClockState,
        action: &ClockAction,
    ) -> Result<WorkEntry, ClockError> {
        let repo = db.entries();
        let now = now_millis(db.clock());

        match (from, action) {
            (ClockState::Idle, ClockAction::ClockIn { customer }) => {
                let customer = required_customer(customer, action)?;
                let mut entry = self.new_entry(customer, now);
                entry.clock_in = Some(now);
                repo.append(&entry)?;
                Ok(entry)
            }
            (ClockState::Idle, ClockAction::StartDriving { customer }) => {
                let customer = required_customer(customer, action)?;
                let mut entry = self.new_entry(customer, now);
                entry.drive_start = Some(now);
                repo.append(&entry)?;
                Ok(entry)
            }
            (ClockState::Idle, ClockAction::StartLunch) => {
                let mut entry = self.new_entry(LUNCH_BREAK_CUSTOMER, now);
                entry.lunch_start = Some(now);
                repo.append(&entry)?;
                Ok(entry)
            }
            (ClockState::Driving(id), ClockAction::ClockIn { .. }) => {
                Ok(repo.update(&id, |entry| {
                    entry.clock_in = Some(now);
                    entry.drive_end = Some(now);
                })?)
            }
            (ClockState::Driving(id), ClockAction::EndDriving) => {
                Ok(repo.update(&id, |entry| entry.drive_end = Some(now))?)
            }
            (ClockState::ClockedIn(id), ClockAction::StartLunch) => {
                let current = repo.get(&id)?.ok_or(ClockError::EntryNotFound(id))?;
                if current.lunch_start.is_some() {
                    return Err(ClockError::LunchAlreadyTaken);
                }
                Ok(repo.update(&id, |entry| entry.lunch_start = Some(now))?)
            }
            (ClockState::ClockedIn(id) | ClockState::OnLunch(id), ClockAction::ClockOut) => {
                Ok(repo.update(&id, |entry| entry.clock_out = Some(now))?)
            }
            (ClockState::OnLunch(id), ClockAction::EndLunch) => Ok(repo.update(&id, |entry| {
                entry.lunch_end = Some(now);
                if entry.is_lunch_break() {
                    entry.clock_out = Some(now);
                }
            })?),
            (state, action) => Err(ClockError::NotAllowed {
                action: action.label(),
                state: state.label(),
            }),
        }
    }

    fn new_entry(&self, customer: &str, now: chrono::DateTime<chrono::Utc>) -> WorkEntry {
        WorkEntry::new(&self.user_id, &self.technician_name, customer, now)
    }
}

fn required_customer<'a>(customer: &'a str, action: &ClockAction) -> Result<&'a str, ClockError> {
    let customer = customer.trim();
    if customer.is_empty() {
        Err(ClockError::BlankCustomer(action.label()))
    } else {
        Ok(customer)
    }
}
