//! Order lifecycle: the single authoritative transition tables and role guards
//!
//! Every component that needs to know whether an order may move (server
//! services, the browser client through the WASM bindings, background jobs)
//! asks this module instead of keeping its own copy of the tables.

use uuid::Uuid;

use crate::error::DomainError;
use crate::models::{ExportOrderStatus, ImportOrderStatus, OrderKind, User, UserContext, UserRole};

// ============================================================================
// Transition tables
// ============================================================================

impl ImportOrderStatus {
    /// Statuses reachable from `self` without a supervisor bypass
    pub fn allowed_transitions(&self) -> &'static [ImportOrderStatus] {
        use ImportOrderStatus::*;
        match self {
            Draft => &[Approved, Rejected, Cancelled],
            Approved => &[Draft, Delivered, Cancelled],
            Delivered => &[Approved, Checked, Cancelled],
            Checked => &[Delivered, Arranged, Cancelled],
            Arranged => &[Checked, Completed, Cancelled],
            Completed => &[],
            Cancelled => &[],
            Rejected => &[Draft],
        }
    }

    pub fn can_transition_to(&self, next: ImportOrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportOrderStatus::Completed | ImportOrderStatus::Cancelled)
    }

    /// Field edits are refused from `checked` onwards
    pub fn is_edit_locked(&self) -> bool {
        matches!(
            self,
            ImportOrderStatus::Checked | ImportOrderStatus::Arranged | ImportOrderStatus::Completed
        )
    }
}

impl ExportOrderStatus {
    /// Statuses reachable from `self`; only internal export orders move through the guard
    pub fn allowed_transitions(&self, is_internal: bool) -> &'static [ExportOrderStatus] {
        match (self, is_internal) {
            (ExportOrderStatus::Approved, true) => {
                &[ExportOrderStatus::Completed, ExportOrderStatus::Cancelled]
            }
            _ => &[],
        }
    }

    pub fn can_transition_to(&self, next: ExportOrderStatus, is_internal: bool) -> bool {
        self.allowed_transitions(is_internal).contains(&next)
    }

    /// No further movement, not even with a bypass
    pub fn is_frozen(&self) -> bool {
        matches!(self, ExportOrderStatus::Cancelled | ExportOrderStatus::Returned)
    }
}

// ============================================================================
// Role gating
// ============================================================================

/// Whether `role` may edit or move an import order sitting in `status`
pub fn role_may_act_on_import(role: UserRole, status: ImportOrderStatus) -> bool {
    use ImportOrderStatus::*;
    match role {
        UserRole::Representative => matches!(status, Draft | Rejected),
        UserRole::RepresentativeManager => matches!(status, Draft),
        UserRole::WarehouseManager | UserRole::WarehouseStaff => {
            matches!(status, Approved | Delivered | Checked | Arranged)
        }
        UserRole::SuperAdmin | UserRole::Supervisor => !status.is_terminal(),
    }
}

/// Whether `role` may move an export order sitting in `status`
pub fn role_may_act_on_export(role: UserRole, status: ExportOrderStatus) -> bool {
    match role {
        UserRole::SuperAdmin | UserRole::Supervisor => !status.is_frozen(),
        UserRole::WarehouseManager | UserRole::WarehouseStaff => {
            status == ExportOrderStatus::Approved
        }
        UserRole::Representative | UserRole::RepresentativeManager => {
            matches!(status, ExportOrderStatus::Draft | ExportOrderStatus::Rejected)
        }
    }
}

/// Stock handling (batches, packages, locations) is warehouse work
pub fn ensure_stock_handler(ctx: &UserContext, action: &str) -> Result<(), DomainError> {
    if ctx.role.is_warehouse() || ctx.role.is_supervisor() {
        Ok(())
    } else {
        Err(DomainError::Forbidden(format!("Role '{}' cannot {}", ctx.role, action)))
    }
}

// ============================================================================
// Guard decisions
// ============================================================================

/// What happens to `approved_by` alongside a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalChange {
    Keep,
    SetApprover(Uuid),
    Clear,
}

/// An authorized status change, ready to be written with compare-and-swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan<S> {
    pub from: S,
    pub to: S,
    pub approval: ApprovalChange,
    pub bypassed: bool,
}

/// Status and manager assignment for a freshly created order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreationPlan<S> {
    pub status: S,
    pub warehouse_manager_id: Option<Uuid>,
}

fn forbid_bypass(ctx: &UserContext) -> Result<(), DomainError> {
    if ctx.role.is_supervisor() {
        Ok(())
    } else {
        Err(DomainError::Forbidden(format!(
            "Role '{}' cannot bypass the order transition table",
            ctx.role
        )))
    }
}

/// Authorize an import order status change requested by `ctx`
///
/// The table is consulted first, so an illegal pair always reports
/// `InvalidTransition` whatever the caller's role. Role gating is layered on
/// top for legal pairs. `bypass` skips both and is reserved for supervisors.
pub fn authorize_import_transition(
    current: ImportOrderStatus,
    requested: ImportOrderStatus,
    ctx: &UserContext,
    bypass: bool,
) -> Result<TransitionPlan<ImportOrderStatus>, DomainError> {
    if bypass {
        forbid_bypass(ctx)?;
        if current.is_terminal() {
            return Err(DomainError::InvalidState(format!(
                "Import order is '{}' and can no longer change",
                current
            )));
        }
    } else {
        if !current.can_transition_to(requested) {
            return Err(DomainError::InvalidTransition {
                kind: OrderKind::Import,
                current: current.to_string(),
                requested: requested.to_string(),
            });
        }

        if current == ImportOrderStatus::Rejected && ctx.role != UserRole::Representative {
            return Err(DomainError::Forbidden(
                "Only a representative can return a rejected order to draft".to_string(),
            ));
        }

        if !role_may_act_on_import(ctx.role, current) {
            return Err(DomainError::Forbidden(format!(
                "Role '{}' cannot change an import order in status '{}'",
                ctx.role, current
            )));
        }
    }

    let approval = match (current, requested) {
        (ImportOrderStatus::Draft, ImportOrderStatus::Approved) => {
            ApprovalChange::SetApprover(ctx.user_id)
        }
        (ImportOrderStatus::Rejected, ImportOrderStatus::Draft) => ApprovalChange::Clear,
        _ => ApprovalChange::Keep,
    };

    Ok(TransitionPlan {
        from: current,
        to: requested,
        approval,
        bypassed: bypass,
    })
}

/// Authorize an export order status change requested by `ctx`
pub fn authorize_export_transition(
    current: ExportOrderStatus,
    requested: ExportOrderStatus,
    is_internal: bool,
    ctx: &UserContext,
    bypass: bool,
) -> Result<TransitionPlan<ExportOrderStatus>, DomainError> {
    if bypass {
        forbid_bypass(ctx)?;
        if current.is_frozen() {
            return Err(DomainError::InvalidState(format!(
                "Export order is '{}' and can no longer change",
                current
            )));
        }
    } else {
        if !current.can_transition_to(requested, is_internal) {
            return Err(DomainError::InvalidTransition {
                kind: OrderKind::Export,
                current: current.to_string(),
                requested: requested.to_string(),
            });
        }

        if !role_may_act_on_export(ctx.role, current) {
            return Err(DomainError::Forbidden(format!(
                "Role '{}' cannot change an export order in status '{}'",
                ctx.role, current
            )));
        }
    }

    let approval = if requested == ExportOrderStatus::Approved {
        ApprovalChange::SetApprover(ctx.user_id)
    } else {
        ApprovalChange::Keep
    };

    Ok(TransitionPlan {
        from: current,
        to: requested,
        approval,
        bypassed: bypass,
    })
}

/// Authorize a field edit (anything other than a status change) on an import order
pub fn authorize_import_edit(
    status: ImportOrderStatus,
    ctx: &UserContext,
) -> Result<(), DomainError> {
    if status == ImportOrderStatus::Completed {
        return Err(DomainError::InvalidState(
            "Completed import orders cannot be edited".to_string(),
        ));
    }

    if status.is_edit_locked() {
        return Err(DomainError::InvalidState(format!(
            "Import order is locked for editing once checked (current status: '{}')",
            status
        )));
    }

    if status == ImportOrderStatus::Cancelled {
        return Err(DomainError::InvalidState(
            "Cancelled import orders cannot be edited".to_string(),
        ));
    }

    if !role_may_act_on_import(ctx.role, status) {
        return Err(DomainError::Forbidden(format!(
            "Role '{}' cannot edit an import order in status '{}'",
            ctx.role, status
        )));
    }

    Ok(())
}

/// Decide the initial status of a new import order
pub fn plan_import_creation(
    ctx: &UserContext,
    has_contract: bool,
) -> Result<CreationPlan<ImportOrderStatus>, DomainError> {
    if has_contract {
        return Ok(CreationPlan {
            status: ImportOrderStatus::Draft,
            warehouse_manager_id: None,
        });
    }

    match ctx.role {
        UserRole::Representative | UserRole::RepresentativeManager => Err(DomainError::Forbidden(
            "Representatives cannot create internal orders".to_string(),
        )),
        UserRole::WarehouseManager => Ok(CreationPlan {
            status: ImportOrderStatus::Delivered,
            warehouse_manager_id: Some(ctx.user_id),
        }),
        _ => Ok(CreationPlan {
            status: ImportOrderStatus::Draft,
            warehouse_manager_id: None,
        }),
    }
}

/// Decide the initial status of a new export order
pub fn plan_export_creation(
    ctx: &UserContext,
    has_contract: bool,
) -> Result<CreationPlan<ExportOrderStatus>, DomainError> {
    if has_contract {
        return Ok(CreationPlan {
            status: ExportOrderStatus::Draft,
            warehouse_manager_id: None,
        });
    }

    match ctx.role {
        UserRole::Representative | UserRole::RepresentativeManager => Err(DomainError::Forbidden(
            "Representatives cannot create internal orders".to_string(),
        )),
        UserRole::WarehouseManager => Ok(CreationPlan {
            status: ExportOrderStatus::Approved,
            warehouse_manager_id: Some(ctx.user_id),
        }),
        _ => Ok(CreationPlan {
            status: ExportOrderStatus::Draft,
            warehouse_manager_id: None,
        }),
    }
}

/// Orders may only be deleted while still a draft or once cancelled
pub fn ensure_import_deletable(status: ImportOrderStatus) -> Result<(), DomainError> {
    match status {
        ImportOrderStatus::Draft | ImportOrderStatus::Cancelled => Ok(()),
        other => Err(DomainError::InvalidState(format!(
            "Only draft or cancelled orders can be deleted (current status: '{}')",
            other
        ))),
    }
}

/// `picked_units` counts stock already taken off packages for the order;
/// deleting would drop the only record of where it went.
pub fn ensure_export_deletable(
    status: ExportOrderStatus,
    picked_units: i64,
) -> Result<(), DomainError> {
    match status {
        ExportOrderStatus::Draft | ExportOrderStatus::Cancelled if picked_units > 0 => {
            Err(DomainError::InvalidState(format!(
                "Export order has {} picked unit(s) and cannot be deleted",
                picked_units
            )))
        }
        ExportOrderStatus::Draft | ExportOrderStatus::Cancelled => Ok(()),
        other => Err(DomainError::InvalidState(format!(
            "Only draft or cancelled orders can be deleted (current status: '{}')",
            other
        ))),
    }
}

/// Check a one-time warehouse manager assignment
///
/// `candidate` is the looked-up user, `None` when no such user exists.
pub fn check_manager_assignment(
    current_manager: Option<Uuid>,
    candidate_id: Uuid,
    candidate: Option<&User>,
) -> Result<Uuid, DomainError> {
    if current_manager.is_some() {
        return Err(DomainError::AlreadyAssigned);
    }

    let user = candidate.ok_or_else(|| DomainError::NotFound(format!("User {}", candidate_id)))?;

    if user.role != UserRole::WarehouseManager {
        return Err(DomainError::InvalidRole(user.id.to_string()));
    }

    if !user.is_active() {
        return Err(DomainError::InactiveUser(user.id.to_string()));
    }

    Ok(user.id)
}
