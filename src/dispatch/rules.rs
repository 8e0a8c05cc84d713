//! Lifecycle action rules: which statuses each command is valid from and
//! the optimistic status it flips the local view to

use std::fmt;

use crate::domain::ServiceStatus;

/// A lifecycle command against a deployed service (code-server or wiki)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerAction {
    Create,
    Start,
    Stop,
    Restart,
    Delete,
    Recreate,
}

impl fmt::Display for ServerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerAction::Create => "create",
            ServerAction::Start => "start",
            ServerAction::Stop => "stop",
            ServerAction::Restart => "restart",
            ServerAction::Delete => "delete",
            ServerAction::Recreate => "recreate",
        };
        write!(f, "{}", name)
    }
}

/// Definition of one action's preconditions and optimistic transition
#[derive(Debug, Clone)]
pub struct ActionRule {
    pub action: ServerAction,
    /// Existing-resource statuses the action may be invoked from
    pub allowed_from: &'static [ServiceStatus],
    /// Whether the action is also valid with no resource present
    pub absent_ok: bool,
    /// Local status applied before the backend acknowledges, if any
    pub optimistic: Option<ServiceStatus>,
}

impl ActionRule {
    /// Check the precondition against the current (possibly absent) status
    pub fn permits(&self, current: Option<ServiceStatus>) -> bool {
        match current {
            None => self.absent_ok,
            Some(status) => self.allowed_from.contains(&status),
        }
    }
}

const ALL_STATUSES: &[ServiceStatus] = &[
    ServiceStatus::Pending,
    ServiceStatus::Creating,
    ServiceStatus::Running,
    ServiceStatus::Stopped,
    ServiceStatus::Error,
    ServiceStatus::Deleting,
];

/// Build the action rules. `create` additionally requires the project to be
/// ready, which is a structural check outside this table.
pub fn build_rules() -> Vec<ActionRule> {
    use ServerAction::*;
    use ServiceStatus::*;

    vec![
        // Only valid when no live resource remains (a deleting one is on
        // its way out and does not block)
        ActionRule {
            action: Create,
            allowed_from: &[Deleting],
            absent_ok: true,
            optimistic: Some(Creating),
        },
        ActionRule {
            action: Start,
            allowed_from: &[Stopped, Error],
            absent_ok: false,
            optimistic: None,
        },
        ActionRule {
            action: Stop,
            allowed_from: &[Running],
            absent_ok: false,
            optimistic: None,
        },
        // Running to running, with a transient bounce in between
        ActionRule {
            action: Restart,
            allowed_from: &[Running],
            absent_ok: false,
            optimistic: None,
        },
        ActionRule {
            action: Delete,
            allowed_from: ALL_STATUSES,
            absent_ok: false,
            optimistic: Some(Deleting),
        },
        // Best-effort delete followed by create; the view goes straight to
        // creating with no visible absent intermediate
        ActionRule {
            action: Recreate,
            allowed_from: ALL_STATUSES,
            absent_ok: true,
            optimistic: Some(Creating),
        },
    ]
}

pub fn rule_for(action: ServerAction) -> ActionRule {
    build_rules()
        .into_iter()
        .find(|r| r.action == action)
        .expect("every action has a rule")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ServiceStatus::*;

    #[test]
    fn test_every_action_has_a_rule() {
        for action in [
            ServerAction::Create,
            ServerAction::Start,
            ServerAction::Stop,
            ServerAction::Restart,
            ServerAction::Delete,
            ServerAction::Recreate,
        ] {
            assert_eq!(rule_for(action).action, action);
        }
    }

    #[test]
    fn test_start_preconditions() {
        let rule = rule_for(ServerAction::Start);
        assert!(rule.permits(Some(Stopped)));
        assert!(rule.permits(Some(Error)));
        assert!(!rule.permits(Some(Running)));
        assert!(!rule.permits(Some(Creating)));
        assert!(!rule.permits(None));
    }

    #[test]
    fn test_stop_only_from_running() {
        let rule = rule_for(ServerAction::Stop);
        assert!(rule.permits(Some(Running)));
        assert!(!rule.permits(Some(Stopped)));
        assert!(!rule.permits(Some(Error)));
        assert!(!rule.permits(None));
    }

    #[test]
    fn test_create_requires_absence() {
        let rule = rule_for(ServerAction::Create);
        assert!(rule.permits(None));
        assert!(rule.permits(Some(Deleting)));
        assert!(!rule.permits(Some(Running)));
        assert!(!rule.permits(Some(Stopped)));
        assert_eq!(rule.optimistic, Some(Creating));
    }

    #[test]
    fn test_delete_from_any_existing_status() {
        let rule = rule_for(ServerAction::Delete);
        for status in [Pending, Creating, Running, Stopped, Error, Deleting] {
            assert!(rule.permits(Some(status)));
        }
        assert!(!rule.permits(None));
        assert_eq!(rule.optimistic, Some(Deleting));
    }
}
