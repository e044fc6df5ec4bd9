use tracker_core::{MigrationStatus, TransitionError};

#[test]
fn terminal_states_have_no_exits() {
    for from in [MigrationStatus::Completed, MigrationStatus::Failed] {
        for to in MigrationStatus::ALL {
            assert!(!from.can_transition_to(to), "{from} -> {to}");
        }
    }
}

#[test]
fn table_matches_lifecycle() {
    use MigrationStatus::*;
    assert!(Pending.can_transition_to(InProgress));
    assert!(InProgress.can_transition_to(Paused));
    assert!(InProgress.can_transition_to(Completed));
    assert!(InProgress.can_transition_to(Failed));
    assert!(Paused.can_transition_to(InProgress));

    assert!(!Pending.can_transition_to(Paused));
    assert!(!Paused.can_transition_to(Completed));
    assert!(!InProgress.can_transition_to(Pending));
}

#[test]
fn staying_put_is_not_a_transition() {
    assert_eq!(
        MigrationStatus::Completed.transition_to(MigrationStatus::Completed),
        Ok(MigrationStatus::Completed)
    );
    assert_eq!(
        MigrationStatus::Completed.transition_to(MigrationStatus::Failed),
        Err(TransitionError {
            from: MigrationStatus::Completed,
            to: MigrationStatus::Failed,
        })
    );
}

#[test]
fn only_in_progress_is_active() {
    let active: Vec<_> = MigrationStatus::ALL
        .into_iter()
        .filter(|status| status.is_active())
        .collect();
    assert_eq!(active, vec![MigrationStatus::InProgress]);
}

#[test]
fn running_and_paused_hold_progress() {
    let holding: Vec<_> = MigrationStatus::ALL
        .into_iter()
        .filter(|status| status.holds_progress())
        .collect();
    assert_eq!(
        holding,
        vec![MigrationStatus::InProgress, MigrationStatus::Paused]
    );
}

#[test]
fn parses_wire_names() {
    assert_eq!("in_progress".parse::<MigrationStatus>(), Ok(MigrationStatus::InProgress));
    assert_eq!(" Paused ".parse::<MigrationStatus>(), Ok(MigrationStatus::Paused));
    assert!("cancelled".parse::<MigrationStatus>().is_err());
    assert_eq!(MigrationStatus::InProgress.to_string(), "in_progress");
}
