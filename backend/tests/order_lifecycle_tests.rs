//! Tests for the import/export order lifecycle guard
//! Covers the transition table, role gating, supervisor bypass and
//! warehouse manager assignment.

use chrono::Utc;
use proptest::prelude::*;
use shared::{
    authorize_export_transition, authorize_import_edit, authorize_import_transition,
    check_manager_assignment, ensure_export_deletable, ensure_import_deletable,
    ensure_stock_handler, plan_export_creation, plan_import_creation, ApprovalChange, DomainError,
    ExportOrderStatus, ImportOrderStatus, User, UserContext, UserRole, UserStatus,
};
use uuid::Uuid;

fn ctx(role: UserRole) -> UserContext {
    UserContext::new(Uuid::new_v4(), role)
}

fn manager(status: UserStatus) -> User {
    User {
        id: Uuid::new_v4(),
        name: "Tran Van B".to_string(),
        email: Some("b@warehouse.test".to_string()),
        role: UserRole::WarehouseManager,
        status,
        created_at: Utc::now(),
    }
}

/// The listed table, written out independently of the implementation
const LEGAL_IMPORT: &[(ImportOrderStatus, ImportOrderStatus)] = {
    use ImportOrderStatus::*;
    &[
        (Draft, Approved),
        (Draft, Rejected),
        (Draft, Cancelled),
        (Approved, Draft),
        (Approved, Delivered),
        (Approved, Cancelled),
        (Delivered, Approved),
        (Delivered, Checked),
        (Delivered, Cancelled),
        (Checked, Delivered),
        (Checked, Arranged),
        (Checked, Cancelled),
        (Arranged, Checked),
        (Arranged, Completed),
        (Arranged, Cancelled),
        (Rejected, Draft),
    ]
};

fn import_status() -> impl Strategy<Value = ImportOrderStatus> {
    prop::sample::select(ImportOrderStatus::ALL.to_vec())
}

// =============================================================================
// Import transition table
// =============================================================================

mod import_table {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Only the listed pairs are legal without a bypass
        #[test]
        fn only_listed_pairs_are_legal(from in import_status(), to in import_status()) {
            let listed = LEGAL_IMPORT.contains(&(from, to));
            prop_assert_eq!(from.can_transition_to(to), listed);
        }

        /// Terminal states never move, even for a supervisor bypass
        #[test]
        fn terminal_states_are_sticky(to in import_status()) {
            let supervisor = ctx(UserRole::Supervisor);
            for from in [ImportOrderStatus::Completed, ImportOrderStatus::Cancelled] {
                prop_assert!(authorize_import_transition(from, to, &supervisor, false).is_err());
                prop_assert!(authorize_import_transition(from, to, &supervisor, true).is_err());
            }
        }

        /// A bypass is refused for every role except the supervising ones
        #[test]
        fn bypass_requires_supervisor(from in import_status(), to in import_status()) {
            for role in [
                UserRole::Representative,
                UserRole::RepresentativeManager,
                UserRole::WarehouseManager,
                UserRole::WarehouseStaff,
            ] {
                let result = authorize_import_transition(from, to, &ctx(role), true);
                prop_assert!(matches!(result, Err(DomainError::Forbidden(_))));
            }
        }
    }

    #[test]
    fn approved_to_checked_must_pass_through_delivered() {
        let staff = ctx(UserRole::WarehouseStaff);
        let err = authorize_import_transition(
            ImportOrderStatus::Approved,
            ImportOrderStatus::Checked,
            &staff,
            false,
        )
        .unwrap_err();

        match err {
            DomainError::InvalidTransition {
                current, requested, ..
            } => {
                assert_eq!(current, "approved");
                assert_eq!(requested, "checked");
            }
            other => panic!("expected InvalidTransition, got {:?}", other),
        }
    }

    #[test]
    fn supervisor_bypass_skips_table_and_is_flagged() {
        let supervisor = ctx(UserRole::Supervisor);
        let plan = authorize_import_transition(
            ImportOrderStatus::Approved,
            ImportOrderStatus::Checked,
            &supervisor,
            true,
        )
        .unwrap();

        assert!(plan.bypassed);
        assert_eq!(plan.to, ImportOrderStatus::Checked);
    }

    #[test]
    fn approval_stamps_approver_and_rejection_clears_it() {
        let rep_manager = ctx(UserRole::RepresentativeManager);
        let plan = authorize_import_transition(
            ImportOrderStatus::Draft,
            ImportOrderStatus::Approved,
            &rep_manager,
            false,
        )
        .unwrap();
        assert_eq!(plan.approval, ApprovalChange::SetApprover(rep_manager.user_id));

        let rep = ctx(UserRole::Representative);
        let plan = authorize_import_transition(
            ImportOrderStatus::Rejected,
            ImportOrderStatus::Draft,
            &rep,
            false,
        )
        .unwrap();
        assert_eq!(plan.approval, ApprovalChange::Clear);
    }

    #[test]
    fn only_representative_reopens_rejected_order() {
        let result = authorize_import_transition(
            ImportOrderStatus::Rejected,
            ImportOrderStatus::Draft,
            &ctx(UserRole::WarehouseManager),
            false,
        );
        assert!(matches!(result, Err(DomainError::Forbidden(_))));
    }

    #[test]
    fn warehouse_roles_cannot_approve_drafts() {
        let result = authorize_import_transition(
            ImportOrderStatus::Draft,
            ImportOrderStatus::Approved,
            &ctx(UserRole::WarehouseStaff),
            false,
        );
        assert!(matches!(result, Err(DomainError::Forbidden(_))));
    }
}

// =============================================================================
// Editing, creation and deletion rules
// =============================================================================

mod editing {
    use super::*;

    #[test]
    fn orders_are_locked_from_checked_onwards() {
        let supervisor = ctx(UserRole::Supervisor);
        for status in [
            ImportOrderStatus::Checked,
            ImportOrderStatus::Arranged,
            ImportOrderStatus::Completed,
            ImportOrderStatus::Cancelled,
        ] {
            assert!(matches!(
                authorize_import_edit(status, &supervisor),
                Err(DomainError::InvalidState(_))
            ));
        }
        assert!(authorize_import_edit(ImportOrderStatus::Delivered, &supervisor).is_ok());
    }

    #[test]
    fn warehouse_manager_internal_order_starts_delivered() {
        let wm = ctx(UserRole::WarehouseManager);
        let plan = plan_import_creation(&wm, false).unwrap();
        assert_eq!(plan.status, ImportOrderStatus::Delivered);
        assert_eq!(plan.warehouse_manager_id, Some(wm.user_id));

        let export = plan_export_creation(&wm, false).unwrap();
        assert_eq!(export.status, ExportOrderStatus::Approved);
    }

    #[test]
    fn contract_orders_start_in_draft() {
        let plan = plan_import_creation(&ctx(UserRole::Representative), true).unwrap();
        assert_eq!(plan.status, ImportOrderStatus::Draft);
        assert_eq!(plan.warehouse_manager_id, None);
    }

    #[test]
    fn representatives_cannot_create_internal_orders() {
        assert!(plan_import_creation(&ctx(UserRole::Representative), false).is_err());
        assert!(plan_export_creation(&ctx(UserRole::RepresentativeManager), false).is_err());
    }

    #[test]
    fn only_draft_or_cancelled_orders_are_deletable() {
        for status in ImportOrderStatus::ALL {
            let deletable = matches!(
                status,
                ImportOrderStatus::Draft | ImportOrderStatus::Cancelled
            );
            assert_eq!(ensure_import_deletable(status).is_ok(), deletable, "{}", status);
        }
    }
}

// =============================================================================
// Export transitions
// =============================================================================

mod export_table {
    use super::*;

    #[test]
    fn export_deletion_needs_deletable_status_and_no_picks() {
        for status in ExportOrderStatus::ALL {
            let deletable = matches!(
                status,
                ExportOrderStatus::Draft | ExportOrderStatus::Cancelled
            );
            assert_eq!(ensure_export_deletable(status, 0).is_ok(), deletable, "{}", status);
            assert!(ensure_export_deletable(status, 1).is_err(), "{}", status);
        }
    }

    #[test]
    fn internal_approved_order_can_complete_or_cancel() {
        let wm = ctx(UserRole::WarehouseManager);
        for to in [ExportOrderStatus::Completed, ExportOrderStatus::Cancelled] {
            assert!(authorize_export_transition(ExportOrderStatus::Approved, to, true, &wm, false).is_ok());
        }
    }

    #[test]
    fn contract_export_orders_have_no_listed_moves() {
        let wm = ctx(UserRole::WarehouseManager);
        for to in ExportOrderStatus::ALL {
            let result = authorize_export_transition(ExportOrderStatus::Approved, to, false, &wm, false);
            assert!(matches!(result, Err(DomainError::InvalidTransition { .. })));
        }
    }

    #[test]
    fn frozen_export_orders_refuse_bypass() {
        let supervisor = ctx(UserRole::SuperAdmin);
        for from in [ExportOrderStatus::Cancelled, ExportOrderStatus::Returned] {
            let result =
                authorize_export_transition(from, ExportOrderStatus::Draft, false, &supervisor, true);
            assert!(matches!(result, Err(DomainError::InvalidState(_))));
        }
    }
}

// =============================================================================
// Warehouse manager assignment
// =============================================================================

mod assignment {
    use super::*;

    #[test]
    fn second_assignment_is_refused() {
        let candidate = manager(UserStatus::Active);
        let assigned = check_manager_assignment(None, candidate.id, Some(&candidate)).unwrap();
        assert_eq!(assigned, candidate.id);

        let other = manager(UserStatus::Active);
        let result = check_manager_assignment(Some(assigned), other.id, Some(&other));
        assert_eq!(result, Err(DomainError::AlreadyAssigned));
    }

    #[test]
    fn candidate_must_be_an_active_warehouse_manager() {
        let inactive = manager(UserStatus::Inactive);
        assert!(matches!(
            check_manager_assignment(None, inactive.id, Some(&inactive)),
            Err(DomainError::InactiveUser(_))
        ));

        let mut staff = manager(UserStatus::Active);
        staff.role = UserRole::WarehouseStaff;
        assert!(matches!(
            check_manager_assignment(None, staff.id, Some(&staff)),
            Err(DomainError::InvalidRole(_))
        ));

        let missing = Uuid::new_v4();
        assert!(matches!(
            check_manager_assignment(None, missing, None),
            Err(DomainError::NotFound(_))
        ));
    }
}

// =============================================================================
// Stock handling
// =============================================================================

mod stock_handling {
    use super::*;

    #[test]
    fn only_warehouse_roles_and_supervisors_declare_batches() {
        for role in [
            UserRole::WarehouseManager,
            UserRole::WarehouseStaff,
            UserRole::Supervisor,
            UserRole::SuperAdmin,
        ] {
            assert!(ensure_stock_handler(&ctx(role), "declare batches").is_ok(), "{}", role);
        }

        for role in [UserRole::Representative, UserRole::RepresentativeManager] {
            let err = ensure_stock_handler(&ctx(role), "declare batches").unwrap_err();
            assert!(matches!(err, DomainError::Forbidden(_)), "{}", role);
            assert!(err.to_string().contains("cannot declare batches"));
        }
    }
}
