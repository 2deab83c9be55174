// src/selection.rs
use crate::error::AppError;
use crate::models::{AccountStatus, DeviceStatus};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::fmt;

/// Ids picked for a bulk operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: BTreeSet<i64>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips membership of `id`; returns whether it is now selected.
    pub fn toggle(&mut self, id: i64) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    pub fn select_all(&mut self, ids: impl IntoIterator<Item = i64>) {
        self.ids.extend(ids);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drops ids no longer present in the visible list.
    pub fn retain_present(&mut self, present: &[i64]) {
        self.ids.retain(|id| present.contains(id));
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.ids.iter().copied().collect()
    }
}

/// Status of an entity that supports bulk transitions.
pub trait EntityStatus:
    Copy + Eq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Singular entity name used in messages.
    const ENTITY: &'static str;

    fn as_str(self) -> &'static str;

    fn can_transition_to(self, target: Self) -> bool;
}

impl EntityStatus for DeviceStatus {
    const ENTITY: &'static str = "device";

    fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Active => "active",
            DeviceStatus::Inactive => "inactive",
            DeviceStatus::Blocked => "blocked",
        }
    }

    // Blocked devices only leave that state through explicit reactivation.
    fn can_transition_to(self, target: Self) -> bool {
        use DeviceStatus::*;
        matches!(
            (self, target),
            (Active, _) | (Inactive, _) | (Blocked, Blocked) | (Blocked, Active)
        )
    }
}

impl EntityStatus for AccountStatus {
    const ENTITY: &'static str = "account";

    fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Suspended => "suspended",
        }
    }

    fn can_transition_to(self, target: Self) -> bool {
        use AccountStatus::*;
        matches!(
            (self, target),
            (Active, _) | (Inactive, _) | (Suspended, Suspended) | (Suspended, Active)
        )
    }
}

/// Checks a whole batch before anything is written: every requested id must
/// exist in `current` and allow the move to `target`.
pub fn check_bulk_transition<S: EntityStatus>(
    current: &[(i64, S)],
    requested: &[i64],
    target: S,
) -> Result<(), AppError> {
    if requested.is_empty() {
        return Err(AppError::validation(
            "ids",
            format!("Select at least one {}", S::ENTITY),
        ));
    }

    for id in requested {
        let Some((_, status)) = current.iter().find(|(row_id, _)| row_id == id) else {
            return Err(AppError::NotFound(format!("{} {}", capitalize(S::ENTITY), id)));
        };
        if !status.can_transition_to(target) {
            return Err(AppError::Transition {
                entity: S::ENTITY,
                id: *id,
                from: status.as_str().to_string(),
                to: target.as_str().to_string(),
            });
        }
    }
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_select_all_and_clear() {
        let mut selection = SelectionSet::new();
        assert!(selection.toggle(3));
        assert!(selection.contains(3));
        assert!(!selection.toggle(3));
        assert!(selection.is_empty());

        selection.select_all([5, 1, 5, 2]);
        assert_eq!(selection.ids(), vec![1, 2, 5]);

        selection.retain_present(&[2, 5, 9]);
        assert_eq!(selection.ids(), vec![2, 5]);

        selection.clear();
        assert_eq!(selection.len(), 0);
    }

    #[test]
    fn device_transitions() {
        use DeviceStatus::*;
        assert!(Active.can_transition_to(Inactive));
        assert!(Inactive.can_transition_to(Active));
        assert!(Active.can_transition_to(Blocked));
        assert!(Inactive.can_transition_to(Blocked));
        assert!(Blocked.can_transition_to(Active));
        assert!(!Blocked.can_transition_to(Inactive));
    }

    #[test]
    fn account_transitions() {
        use AccountStatus::*;
        assert!(Active.can_transition_to(Suspended));
        assert!(Suspended.can_transition_to(Active));
        assert!(!Suspended.can_transition_to(Inactive));
    }

    #[test]
    fn batch_is_rejected_as_a_whole() {
        let current = [(1, DeviceStatus::Active), (2, DeviceStatus::Blocked)];

        assert!(check_bulk_transition(&current, &[1, 2], DeviceStatus::Blocked).is_ok());

        let err = check_bulk_transition(&current, &[1, 2], DeviceStatus::Inactive).unwrap_err();
        assert!(matches!(err, AppError::Transition { id: 2, .. }));
        assert_eq!(err.to_string(), "Cannot change device 2 from blocked to inactive");

        let err = check_bulk_transition(&current, &[1, 7], DeviceStatus::Active).unwrap_err();
        assert_eq!(err.to_string(), "Device 7 not found");

        let err = check_bulk_transition::<DeviceStatus>(&current, &[], DeviceStatus::Active)
            .unwrap_err();
        assert_eq!(err.first_field(), Some("ids"));
    }
}
