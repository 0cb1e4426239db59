//! Authorization decisions for every scheduling operation.
//!
//! Handlers and services never branch on roles themselves; they describe the
//! operation, the caller and who owns the resource, and ask [`authorize`].

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use shared_models::auth::{Caller, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    BookAppointment,
    CheckAvailability,
    ViewAppointment,
    RescheduleAppointment,
    CancelAppointment,
    CompleteAppointment,
    ViewSchedule,
    ListOwnAppointments,
    ManageTimeBlock,
    ViewTimeBlocks,
    RequestAssignment,
    ReviewAssignment,
    AssignDirectly,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::BookAppointment => "book appointments",
            Operation::CheckAvailability => "check availability",
            Operation::ViewAppointment => "view this appointment",
            Operation::RescheduleAppointment => "reschedule this appointment",
            Operation::CancelAppointment => "cancel this appointment",
            Operation::CompleteAppointment => "complete this appointment",
            Operation::ViewSchedule => "view this schedule",
            Operation::ListOwnAppointments => "list patient appointments",
            Operation::ManageTimeBlock => "manage time blocks for this practitioner",
            Operation::ViewTimeBlocks => "view time blocks",
            Operation::RequestAssignment => "request a practitioner assignment",
            Operation::ReviewAssignment => "review assignment requests",
            Operation::AssignDirectly => "assign practitioners",
        };
        write!(f, "{}", name)
    }
}

/// Who a resource belongs to. Fields left `None` do not grant ownership to anyone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ownership {
    pub patient_id: Option<Uuid>,
    pub practitioner_id: Option<Uuid>,
}

impl Ownership {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn appointment(patient_id: Uuid, practitioner_id: Uuid) -> Self {
        Self {
            patient_id: Some(patient_id),
            practitioner_id: Some(practitioner_id),
        }
    }

    pub fn practitioner(practitioner_id: Uuid) -> Self {
        Self {
            patient_id: None,
            practitioner_id: Some(practitioner_id),
        }
    }

    fn owned_by_patient(&self, caller: &Caller) -> bool {
        caller.role == Role::Patient && self.patient_id == Some(caller.id)
    }

    fn owned_by_practitioner(&self, caller: &Caller) -> bool {
        caller.role == Role::Practitioner && self.practitioner_id == Some(caller.id)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyDenial {
    #[error("Role {role} is not allowed to {operation}")]
    WrongRole { role: Role, operation: Operation },

    #[error("Not allowed to {operation}")]
    NotOwner { operation: Operation },
}

pub fn authorize(
    operation: Operation,
    caller: &Caller,
    ownership: &Ownership,
) -> Result<(), PolicyDenial> {
    let wrong_role = || PolicyDenial::WrongRole { role: caller.role, operation };
    let not_owner = || PolicyDenial::NotOwner { operation };

    match operation {
        Operation::CheckAvailability | Operation::ViewTimeBlocks => Ok(()),

        Operation::BookAppointment
        | Operation::RequestAssignment
        | Operation::ListOwnAppointments => match caller.role {
            Role::Patient => Ok(()),
            _ => Err(wrong_role()),
        },

        Operation::ReviewAssignment | Operation::AssignDirectly => match caller.role {
            Role::Admin => Ok(()),
            _ => Err(wrong_role()),
        },

        Operation::ViewAppointment
        | Operation::RescheduleAppointment
        | Operation::CancelAppointment => {
            if caller.is_admin()
                || ownership.owned_by_patient(caller)
                || ownership.owned_by_practitioner(caller)
            {
                Ok(())
            } else {
                Err(not_owner())
            }
        }

        Operation::CompleteAppointment => match caller.role {
            Role::Admin => Ok(()),
            Role::Practitioner if ownership.owned_by_practitioner(caller) => Ok(()),
            Role::Practitioner => Err(not_owner()),
            Role::Patient => Err(wrong_role()),
        },

        Operation::ViewSchedule | Operation::ManageTimeBlock => match caller.role {
            Role::Admin => Ok(()),
            Role::Practitioner if ownership.owned_by_practitioner(caller) => Ok(()),
            Role::Practitioner => Err(not_owner()),
            Role::Patient => Err(wrong_role()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn caller(role: Role) -> Caller {
        Caller::new(Uuid::new_v4(), role)
    }

    #[test]
    fn test_only_patients_book() {
        let none = Ownership::none();
        assert!(authorize(Operation::BookAppointment, &caller(Role::Patient), &none).is_ok());
        assert_matches!(
            authorize(Operation::BookAppointment, &caller(Role::Admin), &none),
            Err(PolicyDenial::WrongRole { role: Role::Admin, .. })
        );
        assert!(authorize(Operation::ListOwnAppointments, &caller(Role::Practitioner), &none).is_err());
    }

    #[test]
    fn test_cancel_requires_ownership_or_admin() {
        let patient = caller(Role::Patient);
        let practitioner = caller(Role::Practitioner);
        let own = Ownership::appointment(patient.id, practitioner.id);
        let foreign = Ownership::appointment(Uuid::new_v4(), Uuid::new_v4());

        assert!(authorize(Operation::CancelAppointment, &patient, &own).is_ok());
        assert!(authorize(Operation::CancelAppointment, &practitioner, &own).is_ok());
        assert!(authorize(Operation::CancelAppointment, &caller(Role::Admin), &foreign).is_ok());
        assert_matches!(
            authorize(Operation::CancelAppointment, &patient, &foreign),
            Err(PolicyDenial::NotOwner { .. })
        );
        assert_matches!(
            authorize(Operation::CancelAppointment, &practitioner, &foreign),
            Err(PolicyDenial::NotOwner { .. })
        );
    }

    #[test]
    fn test_patient_id_does_not_grant_practitioner_rights() {
        // Same uuid in both slots must not let a patient act as the practitioner
        let patient = caller(Role::Patient);
        let ownership = Ownership::appointment(Uuid::new_v4(), patient.id);
        assert!(authorize(Operation::ViewAppointment, &patient, &ownership).is_err());
    }

    #[test]
    fn test_complete_is_practitioner_or_admin() {
        let patient = caller(Role::Patient);
        let practitioner = caller(Role::Practitioner);
        let own = Ownership::appointment(patient.id, practitioner.id);

        assert!(authorize(Operation::CompleteAppointment, &practitioner, &own).is_ok());
        assert!(authorize(Operation::CompleteAppointment, &caller(Role::Admin), &own).is_ok());
        assert_matches!(
            authorize(Operation::CompleteAppointment, &patient, &own),
            Err(PolicyDenial::WrongRole { .. })
        );
        assert_matches!(
            authorize(Operation::CompleteAppointment, &caller(Role::Practitioner), &own),
            Err(PolicyDenial::NotOwner { .. })
        );
    }

    #[test]
    fn test_time_blocks() {
        let practitioner = caller(Role::Practitioner);
        let own = Ownership::practitioner(practitioner.id);
        let other = Ownership::practitioner(Uuid::new_v4());

        assert!(authorize(Operation::ManageTimeBlock, &practitioner, &own).is_ok());
        assert!(authorize(Operation::ManageTimeBlock, &practitioner, &other).is_err());
        assert!(authorize(Operation::ManageTimeBlock, &caller(Role::Admin), &other).is_ok());
        assert!(authorize(Operation::ManageTimeBlock, &caller(Role::Patient), &other).is_err());
        assert!(authorize(Operation::ViewTimeBlocks, &caller(Role::Patient), &other).is_ok());
    }
}
