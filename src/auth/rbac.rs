#[derive(Debug, Clone, PartialEq)]
pub enum Permission {
    ManageTaxonomy,
    ManageForms,
    ManageCustomers,
    ManageTemplates,
    ManageUsers,
    ReadAuditLog,
}

pub fn has_permission(role: &str, permission: &Permission) -> bool {
    match role {
        "super_admin" => true,
        "admin" => !matches!(permission, Permission::ManageUsers),
        "staff" => matches!(
            permission,
            Permission::ManageTaxonomy
                | Permission::ManageForms
                | Permission::ManageCustomers
                | Permission::ManageTemplates
        ),
        _ => false,
    }
}
