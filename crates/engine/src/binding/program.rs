use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;
use waypoint_types::{ParameterValue, ServiceParameterSet};

use crate::{
    config::ClientContextValues,
    error::{BindingSourceKind, EndpointError},
    input::OperationInput,
    record::{Assignment, AssignmentSource, ResolvedParameters},
};

/// One step of an operation's assignment program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentStep {
    /// Populate every built-in parameter from the built-in resolvers.
    BuiltIns,
    /// Assign the client's configured value.
    ClientContext { parameter: String },
    /// Assign from a member of the call input. An absent member clears the parameter.
    InputContext { member: String, parameter: String },
    /// Assign a literal fixed for the operation.
    StaticContext { parameter: String, value: ParameterValue },
}

impl AssignmentStep {
    pub fn source(&self) -> AssignmentSource {
        match self {
            AssignmentStep::BuiltIns => AssignmentSource::BuiltIn,
            AssignmentStep::ClientContext { .. } => AssignmentSource::ClientContext,
            AssignmentStep::InputContext { .. } => AssignmentSource::InputContext,
            AssignmentStep::StaticContext { .. } => AssignmentSource::StaticContext,
        }
    }
}

/// Immutable, ordered assignment program for one operation.
///
/// Steps are kept sorted by [`AssignmentSource`], so executing them front to back
/// applies built-ins first and static constants last.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentProgram {
    operation: String,
    parameters: Arc<ServiceParameterSet>,
    input_shape: Option<String>,
    steps: Vec<AssignmentStep>,
}

impl AssignmentProgram {
    pub(crate) fn new(
        operation: impl Into<String>,
        parameters: Arc<ServiceParameterSet>,
        input_shape: Option<String>,
        mut steps: Vec<AssignmentStep>,
    ) -> Self {
        steps.sort_by_key(AssignmentStep::source);
        Self {
            operation: operation.into(),
            parameters,
            input_shape,
            steps,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn parameters(&self) -> &ServiceParameterSet {
        &self.parameters
    }

    /// Input shape the call input must have, present only when the program reads input members.
    pub fn input_shape(&self) -> Option<&str> {
        self.input_shape.as_deref()
    }

    pub fn steps(&self) -> &[AssignmentStep] {
        &self.steps
    }

    pub fn has_builtins_step(&self) -> bool {
        self.steps.contains(&AssignmentStep::BuiltIns)
    }

    /// Expand the program into concrete assignments for one call.
    ///
    /// `builtins` holds the output of each built-in resolver in invocation order; it is
    /// consulted only when the program has a built-in step, and values naming
    /// parameters that are not built-in are dropped. Built-in and client-context values
    /// of the wrong type fail the call with [`EndpointError::MistypedValue`].
    pub fn assignments(
        &self,
        builtins: &[IndexMap<String, ParameterValue>],
        client_context: &ClientContextValues,
        input: &dyn OperationInput,
    ) -> Result<Vec<Assignment>, EndpointError> {
        let mut assignments = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            match step {
                AssignmentStep::BuiltIns => {
                    for (parameter, value) in builtins.iter().flatten() {
                        if !self.parameters.get(parameter).is_some_and(|declared| declared.is_built_in()) {
                            warn!(operation = %self.operation, parameter = %parameter, "ignoring built-in value for a parameter that is not built-in");
                            continue;
                        }
                        self.check_type(parameter, value, BindingSourceKind::BuiltIn)?;
                        assignments.push(Assignment::new(parameter.clone(), Some(value.clone()), AssignmentSource::BuiltIn));
                    }
                }
                AssignmentStep::ClientContext { parameter } => {
                    let value = client_context.get(parameter).cloned();
                    if let Some(value) = value.as_ref() {
                        self.check_type(parameter, value, BindingSourceKind::ClientContext)?;
                    }
                    assignments.push(Assignment::new(parameter.clone(), value, AssignmentSource::ClientContext));
                }
                AssignmentStep::InputContext { member, parameter } => {
                    let value = self.input_value(input, member, parameter)?;
                    assignments.push(Assignment::new(parameter.clone(), value, AssignmentSource::InputContext));
                }
                AssignmentStep::StaticContext { parameter, value } => {
                    assignments.push(Assignment::new(parameter.clone(), Some(value.clone()), AssignmentSource::StaticContext));
                }
            }
        }
        Ok(assignments)
    }

    /// Run the program and materialize the record handed to the resolver.
    pub fn resolve(
        &self,
        builtins: &[IndexMap<String, ParameterValue>],
        client_context: &ClientContextValues,
        input: &dyn OperationInput,
    ) -> Result<ResolvedParameters, EndpointError> {
        let assignments = self.assignments(builtins, client_context, input)?;
        Ok(ResolvedParameters::materialize(&self.parameters, assignments))
    }

    /// Reject a value whose variant disagrees with the declared parameter type.
    fn check_type(&self, parameter: &str, value: &ParameterValue, origin: BindingSourceKind) -> Result<(), EndpointError> {
        let Some(declared) = self.parameters.get(parameter) else {
            return Ok(());
        };
        if value.parameter_type() == declared.r#type {
            return Ok(());
        }
        Err(EndpointError::MistypedValue {
            parameter: parameter.to_string(),
            origin,
            expected: declared.r#type,
            found: value.parameter_type(),
        })
    }

    fn input_value(&self, input: &dyn OperationInput, member: &str, parameter: &str) -> Result<Option<ParameterValue>, EndpointError> {
        let raw = match input.member(member) {
            None | Some(Value::Null) => return Ok(None),
            Some(raw) => raw,
        };
        let Some(declared) = self.parameters.get(parameter) else {
            return Ok(None);
        };
        ParameterValue::from_json(declared.r#type, &raw)
            .map(Some)
            .map_err(|cause| EndpointError::InvalidInputMember {
                member: member.to_string(),
                parameter: parameter.to_string(),
                cause,
            })
    }
}
