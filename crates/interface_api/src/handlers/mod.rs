//! Request handlers

pub mod billing;
pub mod health;

use core_kernel::{Principal, Role};

use crate::error::ApiError;

/// Gate a handler on the caller's role
pub(crate) fn require_role(principal: &Principal, allowed: &[Role]) -> Result<(), ApiError> {
    if principal.has_any_role(allowed) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "Role {} is not permitted to perform this operation",
            principal.role
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::UserId;

    #[test]
    fn role_gate() {
        let accountant = Principal::new(UserId::new(), Role::Accountant);
        assert!(require_role(&accountant, &[Role::Admin, Role::Accountant]).is_ok());
        assert!(matches!(
            require_role(&accountant, &[Role::Admin]),
            Err(ApiError::Forbidden(_))
        ));
    }
}
