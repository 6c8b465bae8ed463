use crate::{
    api::models::users::{CurrentUser, Role},
    errors::Error,
    types::{Operation, Resource, UserId},
    AppState,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use std::marker::PhantomData;

pub mod resource {
    use crate::types::Resource;

    // Resource types
    #[derive(Default)]
    pub struct Users;

    #[derive(Default)]
    pub struct Generations;

    #[derive(Default)]
    pub struct Credits;

    #[derive(Default)]
    pub struct Payments;

    #[derive(Default)]
    pub struct PaymentMethods;

    #[derive(Default)]
    pub struct AdminLogs;

    #[derive(Default)]
    pub struct Stats;

    #[derive(Default)]
    pub struct Settings;

    // Convert type-level markers to enum values using Into
    impl From<Users> for Resource {
        fn from(_: Users) -> Resource {
            Resource::Users
        }
    }
    impl From<Generations> for Resource {
        fn from(_: Generations) -> Resource {
            Resource::Generations
        }
    }
    impl From<Credits> for Resource {
        fn from(_: Credits) -> Resource {
            Resource::Credits
        }
    }
    impl From<Payments> for Resource {
        fn from(_: Payments) -> Resource {
            Resource::Payments
        }
    }
    impl From<PaymentMethods> for Resource {
        fn from(_: PaymentMethods) -> Resource {
            Resource::PaymentMethods
        }
    }
    impl From<AdminLogs> for Resource {
        fn from(_: AdminLogs) -> Resource {
            Resource::AdminLogs
        }
    }
    impl From<Stats> for Resource {
        fn from(_: Stats) -> Resource {
            Resource::Stats
        }
    }
    impl From<Settings> for Resource {
        fn from(_: Settings) -> Resource {
            Resource::Settings
        }
    }
}

pub mod operation {
    use crate::types::Operation;

    // Operation types
    #[derive(Default)]
    pub struct CreateAll;

    #[derive(Default)]
    pub struct CreateOwn;

    #[derive(Default)]
    pub struct ReadAll;

    #[derive(Default)]
    pub struct ReadOwn;

    #[derive(Default)]
    pub struct UpdateAll;

    #[derive(Default)]
    pub struct UpdateOwn;

    impl From<CreateAll> for Operation {
        fn from(_: CreateAll) -> Operation {
            Operation::CreateAll
        }
    }
    impl From<CreateOwn> for Operation {
        fn from(_: CreateOwn) -> Operation {
            Operation::CreateOwn
        }
    }
    impl From<ReadAll> for Operation {
        fn from(_: ReadAll) -> Operation {
            Operation::ReadAll
        }
    }
    impl From<ReadOwn> for Operation {
        fn from(_: ReadOwn) -> Operation {
            Operation::ReadOwn
        }
    }
    impl From<UpdateAll> for Operation {
        fn from(_: UpdateAll) -> Operation {
            Operation::UpdateAll
        }
    }
    impl From<UpdateOwn> for Operation {
        fn from(_: UpdateOwn) -> Operation {
            Operation::UpdateOwn
        }
    }
}

pub struct RequiresPermission<R, O>
where
    R: Into<Resource> + Default,
    O: Into<Operation> + Default,
{
    pub current_user: CurrentUser,
    _marker: PhantomData<(R, O)>,
}

impl<R, O> FromRequestParts<AppState> for RequiresPermission<R, O>
where
    R: Into<Resource> + Default,
    O: Into<Operation> + Default,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let current_user = CurrentUser::from_request_parts(parts, state).await?;

        // Convert the types to enum values using Default + Into
        let resource = R::default().into();
        let operation = O::default().into();

        if has_permission(&current_user, resource, operation) {
            Ok(RequiresPermission {
                current_user,
                _marker: PhantomData,
            })
        } else {
            Err(Error::InsufficientPermissions {
                required: crate::types::Permission::Allow(resource, operation),
                action: operation,
                resource: format!("{resource:?}"),
            })
        }
    }
}

// Implement Deref so RequiresPermission<R, O> behaves like CurrentUser
impl<R, O> std::ops::Deref for RequiresPermission<R, O>
where
    R: Into<Resource> + Default,
    O: Into<Operation> + Default,
{
    type Target = CurrentUser;

    fn deref(&self) -> &Self::Target {
        &self.current_user
    }
}

/// Check if a user has permission to perform an operation on a resource
pub fn has_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> bool {
    role_has_permission(&user.role, resource, operation)
}

/// Check if a role grants permission for a resource/operation
pub fn role_has_permission(role: &Role, resource: Resource, operation: Operation) -> bool {
    match role {
        Role::Admin => true,
        // Premium differs from User only in billing, not in what it may touch
        Role::User | Role::Premium => matches!(
            (resource, operation),
            (Resource::Users, Operation::ReadOwn)
                | (Resource::Generations, Operation::CreateOwn)
                | (Resource::Generations, Operation::ReadOwn)
                | (Resource::Generations, Operation::UpdateOwn)
                | (Resource::Credits, Operation::ReadOwn)
                | (Resource::Payments, Operation::CreateOwn)
                | (Resource::Payments, Operation::ReadOwn)
                | (Resource::PaymentMethods, Operation::ReadOwn)
        ),
    }
}

/// Generic helper to check if user can perform an operation on their own resources
/// (combines ID matching and Own permission check)
fn can_perform_own_operation(user: &CurrentUser, resource: Resource, operation: Operation, target_user_id: UserId) -> bool {
    user.id == target_user_id && has_permission(user, resource, operation)
}

/// Generic helper to check if user can perform an operation on all resources (admin-level access)
fn can_perform_all_operation(user: &CurrentUser, resource: Resource, operation: Operation) -> bool {
    has_permission(user, resource, operation)
}

// Macro to generate convenience functions for each operation type
macro_rules! generate_permission_helpers {
    ($operation_name:ident, $all_operation:expr, $own_operation:expr) => {
        paste::paste! {
            /// Check if user can [<$operation_name:lower>] their own resources (combines ID matching and [<$operation_name>]Own permission)
            pub fn [<can_ $operation_name:lower _own_resource>](user: &CurrentUser, resource: Resource, target_user_id: UserId) -> bool {
                can_perform_own_operation(user, resource, $own_operation, target_user_id)
            }

            /// Check if user can [<$operation_name:lower>] all resources of a type (admin-level access)
            pub fn [<can_ $operation_name:lower _all_resources>](user: &CurrentUser, resource: Resource) -> bool {
                can_perform_all_operation(user, resource, $all_operation)
            }
        }
    };
}

// i.e can_read_own_resource, can_read_all_resources, etc.
generate_permission_helpers!(read, Operation::ReadAll, Operation::ReadOwn);
generate_permission_helpers!(update, Operation::UpdateAll, Operation::UpdateOwn);

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn create_user_with_role(role: Role) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            display_name: None,
            role,
        }
    }

    #[test]
    fn test_admin_has_everything() {
        let admin = create_user_with_role(Role::Admin);

        assert!(has_permission(&admin, Resource::Payments, Operation::UpdateAll));
        assert!(has_permission(&admin, Resource::Settings, Operation::UpdateAll));
        assert!(has_permission(&admin, Resource::AdminLogs, Operation::ReadAll));
        assert!(has_permission(&admin, Resource::Credits, Operation::CreateAll));
    }

    #[test]
    fn test_user_role() {
        let user = create_user_with_role(Role::User);

        // Should have basic self-service permissions
        assert!(has_permission(&user, Resource::Generations, Operation::CreateOwn));
        assert!(has_permission(&user, Resource::Payments, Operation::CreateOwn));
        assert!(has_permission(&user, Resource::Credits, Operation::ReadOwn));
        assert!(has_permission(&user, Resource::PaymentMethods, Operation::ReadOwn));

        // Should NOT have admin permissions
        assert!(!has_permission(&user, Resource::Payments, Operation::UpdateAll));
        assert!(!has_permission(&user, Resource::Users, Operation::ReadAll));
        assert!(!has_permission(&user, Resource::Settings, Operation::UpdateAll));
        assert!(!has_permission(&user, Resource::Stats, Operation::ReadAll));
        assert!(!has_permission(&user, Resource::Credits, Operation::CreateAll));
    }

    #[test]
    fn test_premium_matches_user_permissions() {
        let resources = [
            Resource::Users,
            Resource::Generations,
            Resource::Credits,
            Resource::Payments,
            Resource::PaymentMethods,
            Resource::AdminLogs,
            Resource::Stats,
            Resource::Settings,
        ];
        let operations = [
            Operation::CreateAll,
            Operation::CreateOwn,
            Operation::ReadAll,
            Operation::ReadOwn,
            Operation::UpdateAll,
            Operation::UpdateOwn,
        ];
        for resource in resources {
            for operation in operations {
                assert_eq!(
                    role_has_permission(&Role::User, resource, operation),
                    role_has_permission(&Role::Premium, resource, operation),
                    "{resource:?} {operation:?}"
                );
            }
        }
    }

    #[test]
    fn test_permission_helpers() {
        let user = create_user_with_role(Role::User);
        let other_id = Uuid::new_v4();

        // Should be able to read own resources
        assert!(can_read_own_resource(&user, Resource::Users, user.id));
        assert!(!can_read_own_resource(&user, Resource::Users, other_id));
        assert!(can_update_own_resource(&user, Resource::Generations, user.id));

        // Should not be able to read all resources
        assert!(!can_read_all_resources(&user, Resource::Users));
        assert!(!can_update_all_resources(&user, Resource::Users));

        // Admin should be able to read all
        let admin = create_user_with_role(Role::Admin);
        assert!(can_read_all_resources(&admin, Resource::Users));
    }

    #[test]
    fn test_requires_permission_deref() {
        let user = create_user_with_role(Role::User);
        let requires_permission = RequiresPermission::<resource::Users, operation::ReadOwn> {
            current_user: user.clone(),
            _marker: PhantomData,
        };

        // Should deref to CurrentUser
        assert_eq!(requires_permission.id, user.id);
        assert_eq!(requires_permission.email, user.email);
        assert_eq!(requires_permission.is_admin(), user.is_admin());
    }
}
