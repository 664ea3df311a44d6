use anyhow::{bail, Result};
use serde::Deserialize;
use std::{collections::BTreeMap, fmt};

use super::error::ResolveError;

/// What a column means, independent of how the export spells its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    City,
    Street,
    HouseNumber,
    Quarter,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::City, Role::Street, Role::HouseNumber, Role::Quarter];

    pub fn name(&self) -> &'static str {
        match self {
            Role::City => "city",
            Role::Street => "street",
            Role::HouseNumber => "house_number",
            Role::Quarter => "quarter",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Candidate header substrings per role. Matching is case-sensitive.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoleKeywords {
    pub city: Vec<String>,
    pub street: Vec<String>,
    pub house_number: Vec<String>,
    pub quarter: Vec<String>,
}

impl Default for RoleKeywords {
    fn default() -> Self {
        fn words(ws: &[&str]) -> Vec<String> {
            ws.iter().map(|w| w.to_string()).collect()
        }
        Self {
            city: words(&["עיר", "City"]),
            street: words(&["רחוב", "Street"]),
            house_number: words(&["בית", "House"]),
            quarter: words(&["רבעון", "Quarter"]),
        }
    }
}

impl RoleKeywords {
    pub fn get(&self, role: Role) -> &[String] {
        match role {
            Role::City => &self.city,
            Role::Street => &self.street,
            Role::HouseNumber => &self.house_number,
            Role::Quarter => &self.quarter,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for role in Role::ALL {
            if self.get(role).iter().all(|k| k.is_empty()) {
                bail!("no keywords configured for role {}", role);
            }
        }
        Ok(())
    }
}

/// A header that was picked for a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub index: usize,
    pub header: String,
}

/// Role → header mapping for one table. Roles without a matching header are absent.
#[derive(Debug, Clone, Default)]
pub struct SemanticColumnMap {
    columns: BTreeMap<Role, ResolvedColumn>,
    headers: Vec<String>,
}

/// Column positions of a table that can feed installed meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstalledColumns {
    pub city: usize,
    pub street: usize,
    pub house_number: usize,
}

/// Column positions of a table that can feed planned meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedColumns {
    pub city: usize,
    pub street: usize,
    pub house_number: usize,
    pub quarter: usize,
}

/// For each role, pick the first header (by position) containing any of the
/// role's keywords.
pub fn resolve<S: AsRef<str>>(headers: &[S], keywords: &RoleKeywords) -> SemanticColumnMap {
    let headers: Vec<&str> = headers.iter().map(|h| h.as_ref()).collect();
    let mut columns = BTreeMap::new();
    for role in Role::ALL {
        let candidates = keywords.get(role);
        let hit = headers.iter().position(|h| {
            candidates
                .iter()
                .any(|k| !k.is_empty() && h.contains(k.as_str()))
        });
        if let Some(index) = hit {
            columns.insert(
                role,
                ResolvedColumn {
                    index,
                    header: headers[index].to_string(),
                },
            );
        }
    }
    SemanticColumnMap {
        columns,
        headers: headers.iter().map(|h| h.to_string()).collect(),
    }
}

impl SemanticColumnMap {
    pub fn get(&self, role: Role) -> Option<&ResolvedColumn> {
        self.columns.get(&role)
    }

    pub fn header(&self, role: Role) -> Option<&str> {
        self.get(role).map(|c| c.header.as_str())
    }

    /// The header list this map was resolved against.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn require(&self, roles: &[Role]) -> Result<Vec<usize>, ResolveError> {
        let missing: Vec<Role> = roles
            .iter()
            .copied()
            .filter(|r| !self.columns.contains_key(r))
            .collect();
        if !missing.is_empty() {
            return Err(ResolveError::MissingRoles {
                missing,
                headers: self.headers.clone(),
            });
        }
        Ok(roles.iter().map(|r| self.columns[r].index).collect())
    }

    /// City, street and house number must all be present.
    pub fn installed(&self) -> Result<InstalledColumns, ResolveError> {
        let idx = self.require(&[Role::City, Role::Street, Role::HouseNumber])?;
        Ok(InstalledColumns {
            city: idx[0],
            street: idx[1],
            house_number: idx[2],
        })
    }

    /// All four roles must be present.
    pub fn planned(&self) -> Result<PlannedColumns, ResolveError> {
        let idx = self.require(&Role::ALL)?;
        Ok(PlannedColumns {
            city: idx[0],
            street: idx[1],
            house_number: idx[2],
            quarter: idx[3],
        })
    }
}
