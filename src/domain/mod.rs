pub mod entities;
pub mod upgrade_policy;
