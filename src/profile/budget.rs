//! Budget allocation balancer.
//!
//! Four percentages that must add up to exactly 100 before the budget section can be
//! saved. Edits never touch the other categories; only [`BudgetBalancer::auto_distribute`]
//! and [`BudgetBalancer::suggest_balanced`] fill in several at once.

use crate::validation::FieldErrors;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const OUT_OF_RANGE: &str = "Percentage must be between 0 and 100";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BudgetCategory {
    Accommodation,
    Activities,
    Dining,
    Transportation,
}

impl BudgetCategory {
    pub const ALL: [BudgetCategory; 4] = [
        BudgetCategory::Accommodation,
        BudgetCategory::Activities,
        BudgetCategory::Dining,
        BudgetCategory::Transportation,
    ];

    /// Field key used for errors and on the wire.
    pub fn key(&self) -> &'static str {
        match self {
            BudgetCategory::Accommodation => "accommodation",
            BudgetCategory::Activities => "activities",
            BudgetCategory::Dining => "dining",
            BudgetCategory::Transportation => "transportation",
        }
    }
}

impl fmt::Display for BudgetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Percent of the trip budget per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BudgetAllocation {
    pub accommodation: u8,
    pub activities: u8,
    pub dining: u8,
    pub transportation: u8,
}

impl BudgetAllocation {
    pub const BALANCED: BudgetAllocation = BudgetAllocation {
        accommodation: 40,
        activities: 25,
        dining: 25,
        transportation: 10,
    };

    pub fn get(&self, category: BudgetCategory) -> u8 {
        match category {
            BudgetCategory::Accommodation => self.accommodation,
            BudgetCategory::Activities => self.activities,
            BudgetCategory::Dining => self.dining,
            BudgetCategory::Transportation => self.transportation,
        }
    }

    fn slot(&mut self, category: BudgetCategory) -> &mut u8 {
        match category {
            BudgetCategory::Accommodation => &mut self.accommodation,
            BudgetCategory::Activities => &mut self.activities,
            BudgetCategory::Dining => &mut self.dining,
            BudgetCategory::Transportation => &mut self.transportation,
        }
    }

    pub fn total(&self) -> u32 {
        BudgetCategory::ALL
            .iter()
            .map(|&category| u32::from(self.get(category)))
            .sum()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BudgetError {
    #[error("Allocations must add up to 100% (currently {0}%)")]
    Unbalanced(u32),
    #[error("{0}")]
    Invalid(FieldErrors),
}

/// Editing state of the budget form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BudgetBalancer {
    values: BudgetAllocation,
    errors: FieldErrors,
}

impl BudgetBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a saved allocation. Stored values above 100 are clamped and flagged.
    pub fn from_allocation(allocation: BudgetAllocation) -> Self {
        let mut balancer = Self::new();
        for category in BudgetCategory::ALL {
            balancer.set(category, i64::from(allocation.get(category)));
        }
        balancer
    }

    pub fn get(&self, category: BudgetCategory) -> u8 {
        self.values.get(category)
    }

    pub fn values(&self) -> BudgetAllocation {
        self.values
    }

    pub fn total(&self) -> u32 {
        self.values.total()
    }

    /// Percentage points still to allocate. Negative when over-allocated.
    pub fn remaining(&self) -> i64 {
        100 - i64::from(self.total())
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Sets one category. Values outside 0..=100 are clamped and flagged on that field.
    pub fn set(&mut self, category: BudgetCategory, value: i64) {
        let clamped = value.clamp(0, 100);
        *self.values.slot(category) = clamped as u8;
        if clamped == value {
            self.errors.remove(category.key());
        } else {
            self.errors.insert(category.key(), OUT_OF_RANGE);
        }
    }

    /// Spreads what is left of 100 evenly over the categories still at zero, giving the
    /// remainder one point at a time to the first of them.
    pub fn auto_distribute(&mut self) {
        let remaining = self.remaining();
        if remaining <= 0 {
            return;
        }
        let empty: Vec<BudgetCategory> = BudgetCategory::ALL
            .into_iter()
            .filter(|&category| self.get(category) == 0)
            .collect();
        if empty.is_empty() {
            return;
        }

        let count = empty.len() as i64;
        let share = remaining / count;
        let extra = remaining % count;
        for (index, category) in empty.into_iter().enumerate() {
            let bonus = i64::from((index as i64) < extra);
            self.set(category, share + bonus);
        }
    }

    pub fn suggest_balanced(&mut self) {
        self.values = BudgetAllocation::BALANCED;
        self.errors = FieldErrors::new();
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn can_save(&self) -> bool {
        self.total() == 100 && self.errors.is_empty()
    }

    /// The allocation to save, if the form is in a savable state.
    pub fn allocation(&self) -> Result<BudgetAllocation, BudgetError> {
        if !self.errors.is_empty() {
            return Err(BudgetError::Invalid(self.errors.clone()));
        }
        match self.total() {
            100 => Ok(self.values),
            total => Err(BudgetError::Unbalanced(total)),
        }
    }
}
