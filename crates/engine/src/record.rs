//! The per-call resolved parameter record handed to the endpoint resolver.
//!
//! A record is never mutated field by field. Every source first produces an ordered list
//! of [`Assignment`]s, and [`ResolvedParameters::materialize`] folds that list over an
//! all-unset record once: a later assignment to the same parameter replaces the earlier
//! one. Precedence is therefore entirely a matter of the order in which the
//! assignments are produced.

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value};
use tracing::warn;
use waypoint_types::{ParameterValue, ServiceParameterSet};

/// Where an assignment came from. Order of declaration is the precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssignmentSource {
    BuiltIn,
    ClientContext,
    InputContext,
    StaticContext,
}

/// One write against the record. `value: None` explicitly clears the parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub parameter: String,
    pub value: Option<ParameterValue>,
    pub source: AssignmentSource,
}

impl Assignment {
    pub fn new(parameter: impl Into<String>, value: Option<ParameterValue>, source: AssignmentSource) -> Self {
        Self {
            parameter: parameter.into(),
            value,
            source,
        }
    }
}

/// Materialized parameter values for a single call, in catalog order.
///
/// Every catalog parameter has an entry; parameters no source touched stay unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedParameters {
    values: IndexMap<String, Option<ParameterValue>>,
}

impl ResolvedParameters {
    /// A record with every catalog parameter unset.
    pub fn unset(parameters: &ServiceParameterSet) -> Self {
        Self {
            values: parameters.iter().map(|parameter| (parameter.name.clone(), None)).collect(),
        }
    }

    /// Fold ordered assignments over an unset record; the last write per parameter wins.
    ///
    /// Assignments naming a parameter outside the catalog are dropped.
    pub fn materialize<I>(parameters: &ServiceParameterSet, assignments: I) -> Self
    where
        I: IntoIterator<Item = Assignment>,
    {
        assignments.into_iter().fold(Self::unset(parameters), |mut record, assignment| {
            match record.values.get_mut(&assignment.parameter) {
                Some(slot) => *slot = assignment.value,
                None => warn!(
                    parameter = %assignment.parameter,
                    source = ?assignment.source,
                    "dropping assignment to undeclared endpoint parameter"
                ),
            }
            record
        })
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name).and_then(Option::as_ref)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&ParameterValue>)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// JSON object view, with unset parameters rendered as `null`.
    pub fn to_json(&self) -> Value {
        let object: JsonMap<String, Value> = self
            .values
            .iter()
            .map(|(name, value)| (name.clone(), value.as_ref().map_or(Value::Null, ParameterValue::to_json)))
            .collect();
        Value::Object(object)
    }
}
