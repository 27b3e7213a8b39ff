use super::{Condition, ViewerContext};
use crate::action::{ActionExecutor, ActionList};
use serde::{Deserialize, Serialize};

/// Outcome of checking a holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub passed: bool,
    /// Indices of the conditions that were evaluated and fulfilled.
    pub fulfilled: Vec<usize>,
}

/// Ordered list of conditions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionHolder {
    conditions: Vec<Condition>,
}

impl ConditionHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// True when every condition is fulfilled or not required.
    ///
    /// Not-met actions of each unfulfilled condition run here. A required
    /// unfulfilled condition stops the check; later conditions are not evaluated.
    /// Met actions are never run by the holder; see [`ConditionHolder::met_actions`].
    pub fn check(&self, ctx: &ViewerContext<'_>, actions: &dyn ActionExecutor) -> bool {
        self.evaluate(ctx, actions).passed
    }

    pub fn evaluate(&self, ctx: &ViewerContext<'_>, actions: &dyn ActionExecutor) -> Evaluation {
        let mut fulfilled = Vec::new();

        for (index, condition) in self.conditions.iter().enumerate() {
            if condition.is_fulfilled(ctx) {
                fulfilled.push(index);
                continue;
            }

            if !condition.not_met_actions.is_empty() {
                actions.execute(ctx.viewer, &condition.not_met_actions);
            }

            if condition.required {
                return Evaluation {
                    passed: false,
                    fulfilled,
                };
            }
        }

        Evaluation {
            passed: true,
            fulfilled,
        }
    }

    /// Met-action lists of the given conditions, for callers that act on success.
    pub fn met_actions<'a>(&'a self, indices: &'a [usize]) -> impl Iterator<Item = &'a ActionList> {
        indices
            .iter()
            .filter_map(|&i| self.conditions.get(i))
            .map(|c| &c.met_actions)
            .filter(|list| !list.is_empty())
    }

    pub fn add(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn remove(&mut self, index: usize) -> Option<Condition> {
        (index < self.conditions.len()).then(|| self.conditions.remove(index))
    }

    pub fn clear(&mut self) {
        self.conditions.clear();
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Copy without host-supplied predicates, which cannot be stored.
    pub fn persistable(&self) -> Self {
        Self {
            conditions: self
                .conditions
                .iter()
                .filter(|c| c.is_persistable())
                .cloned()
                .collect(),
        }
    }
}

impl From<Vec<Condition>> for ConditionHolder {
    fn from(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }
}
