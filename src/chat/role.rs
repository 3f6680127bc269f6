//! Backend roles and their profiles

use serde::{Deserialize, Serialize};

use crate::ai::budget::BudgetTable;
use crate::config::Config;
use crate::constants::text;

/// The two backend roles a turn can be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Conversational,
    Analytical,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Conversational, Role::Analytical];

    /// Key used for instructions lookup and logging
    pub fn key(&self) -> &'static str {
        match self {
            Role::Conversational => "conversational",
            Role::Analytical => "analytical",
        }
    }

    /// File name of the role's instructions inside the instructions directory
    pub fn instructions_file_name(&self) -> String {
        format!("{}-instructions.md", self.key())
    }

    /// Instructions used when none can be loaded
    pub fn default_instructions(&self) -> &'static str {
        match self {
            Role::Conversational => text::DEFAULT_CONVERSATIONAL_INSTRUCTIONS,
            Role::Analytical => text::DEFAULT_ANALYTICAL_INSTRUCTIONS,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Everything that differs between the two backend roles
#[derive(Debug, Clone)]
pub struct RoleProfile {
    pub role: Role,
    pub instructions_key: &'static str,
    pub temperature: f32,
    pub budget_table: BudgetTable,
    pub tools_enabled: bool,
}

impl RoleProfile {
    pub fn from_config(role: Role, config: &Config) -> Self {
        let (backend, budget_table) = match role {
            Role::Conversational => (
                &config.backends.conversational,
                &config.budget.conversational,
            ),
            Role::Analytical => (&config.backends.analytical, &config.budget.analytical),
        };

        Self {
            role,
            instructions_key: role.key(),
            temperature: backend.temperature,
            budget_table: budget_table.clone(),
            tools_enabled: backend.tools_enabled,
        }
    }
}
