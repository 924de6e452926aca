use super::ir::ActionList;
use super::op::Action;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("action-check error at {position}: {message}")]
pub struct CheckError {
    pub position: usize,
    pub message: String,
}

impl CheckError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Where a taken skip at `ip` lands, or None when it leaves `[0, len]`.
///
/// Landing on `len` is the normal way out of a unit.
pub fn skip_target(ip: usize, count: i32, len: usize) -> Option<usize> {
    let target = ip as i64 + count as i64 + 1;
    if target < 0 || target > len as i64 {
        None
    } else {
        Some(target as usize)
    }
}

/// Validate a finished unit: every skip has a count and lands inside the
/// list (or exactly at its end).
///
/// Linear scan; the targets are static, so no control-flow walk is needed.
pub fn check_actions(actions: &ActionList) -> Result<(), CheckError> {
    let len = actions.len();

    for (ip, action) in actions.iter().enumerate() {
        match action {
            Action::Skip { count } | Action::SkipIf { count, .. } => {
                let Some(count) = count else {
                    return Err(CheckError::new(ip, "skip was never resolved"));
                };
                if skip_target(ip, *count, len).is_none() {
                    return Err(CheckError::new(
                        ip,
                        format!("skip {:+} leaves the unit ({} actions)", count, len),
                    ));
                }
                if *count == -1 && matches!(action, Action::Skip { .. }) {
                    return Err(CheckError::new(ip, "unconditional skip onto itself"));
                }
            }
            Action::SetVariable { .. } | Action::Abort => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::element::Element;

    #[test]
    fn test_empty_list_is_valid() {
        assert!(check_actions(&ActionList::new()).is_ok());
    }

    #[test]
    fn test_unresolved_skip() {
        let mut list = ActionList::new();
        list.push_skip(Some(Element::Bool(true)));
        let err = check_actions(&list).unwrap_err();
        assert_eq!(err.position, 0);
        assert!(err.message.contains("never resolved"));
    }

    #[test]
    fn test_skip_to_end_is_valid() {
        let mut list = ActionList::new();
        let skip = list.push_skip(None);
        list.push(Action::Abort);
        list.resolve_here(skip).unwrap();
        assert!(check_actions(&list).is_ok());
    }

    #[test]
    fn test_skip_past_end() {
        let mut list = ActionList::new();
        let skip = list.push_skip(None);
        list.resolve(skip, 4).unwrap();
        assert!(check_actions(&list).is_err());
    }

    #[test]
    fn test_backward_skip_before_start() {
        let mut list = ActionList::new();
        list.push(Action::Abort);
        let skip = list.push_skip(None);
        list.resolve(skip, -3).unwrap();
        assert!(check_actions(&list).is_err());
    }

    #[test]
    fn test_self_loop_rejected() {
        let mut list = ActionList::new();
        let skip = list.push_skip(None);
        list.resolve(skip, -1).unwrap();
        assert!(check_actions(&list).is_err());
    }
}
