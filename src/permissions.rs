use crate::models::Role;

/// Resources guarded by the admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Project,
    User,
    /// Whole-site content dumps and restores.
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    BulkDelete,
    Reorder,
    Export,
    Import,
}

/// minimum_role
///
/// The permission table. Every (resource, action) pair resolves to the least privileged
/// role allowed to perform it; the match is exhaustive over resources so a new resource
/// cannot compile without an entry.
pub fn minimum_role(resource: Resource, action: Action) -> Role {
    match resource {
        Resource::Project => match action {
            Action::Read => Role::Viewer,
            Action::Create | Action::Update | Action::Reorder => Role::Editor,
            Action::Delete | Action::BulkDelete | Action::Export | Action::Import => {
                Role::Admin
            }
        },
        Resource::User => Role::Admin,
        Resource::Data => Role::Admin,
    }
}

/// The explicit allowed-role set for a (resource, action) pair.
pub fn allowed_roles(resource: Resource, action: Action) -> Vec<Role> {
    Role::at_least(minimum_role(resource, action))
}
