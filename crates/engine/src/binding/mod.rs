//! Binding compiler.
//!
//! Turns a service's parameter catalog and source declarations into one immutable
//! [`AssignmentProgram`] per operation. Every declaration is validated up front; a
//! single invalid declaration rejects the whole service so that no operation ever runs
//! with a partially checked program.
//!
//! Precedence is fixed: built-ins, then client context, then input members, then static
//! constants. A later source overwrites an earlier one for the same parameter.

mod program;

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};
use waypoint_types::{OperationModel, ParameterValue, ServiceModel, ServiceParameterSet};

pub use program::{AssignmentProgram, AssignmentStep};

use crate::{
    error::{BindingError, BindingSourceKind},
    plugin::{Integration, builtin_handlers},
};

/// A parameter targeted by more than one declaration source for the same operation.
///
/// Overlaps are legal; the higher-precedence source wins. They are surfaced so model
/// validation tooling can decide whether the layering was intended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingOverlap {
    pub operation: String,
    pub parameter: String,
    /// Sources targeting the parameter, lowest precedence first.
    pub sources: Vec<BindingSourceKind>,
}

/// Compilation output for a service.
#[derive(Debug, Clone, Default)]
pub struct CompiledService {
    pub service: String,
    /// Programs keyed by operation name. Empty when the service has no endpoint rules.
    pub programs: IndexMap<String, Arc<AssignmentProgram>>,
    pub overlaps: Vec<BindingOverlap>,
}

impl CompiledService {
    pub fn program(&self, operation: &str) -> Option<&Arc<AssignmentProgram>> {
        self.programs.get(operation)
    }
}

/// Compile every operation of `service`.
pub fn compile_service(service: &ServiceModel, integrations: &[Arc<dyn Integration>]) -> Result<CompiledService, BindingError> {
    let mut compiled = CompiledService {
        service: service.name.clone(),
        ..CompiledService::default()
    };
    let Some(catalog) = service.parameters() else {
        debug!(service = %service.name, "service has no endpoint rules, skipping endpoint bindings");
        return Ok(compiled);
    };

    validate_catalog(&service.name, catalog)?;
    let client_context = client_context_parameters(service, catalog)?;

    if catalog.has_built_ins() && builtin_handlers(integrations).is_empty() {
        warn!(service = %service.name, "service declares built-in parameters but no integration supplies a built-in handler");
    }

    let parameters = Arc::new(catalog.clone());
    for operation in &service.operations {
        let (program, overlaps) = compile_operation(&service.name, operation, &parameters, &client_context)?;
        for overlap in &overlaps {
            warn!(
                operation = %overlap.operation,
                parameter = %overlap.parameter,
                sources = ?overlap.sources,
                "endpoint parameter is bound by more than one source"
            );
        }
        debug!(
            service = %service.name,
            operation = %operation.name,
            steps = program.steps().len(),
            "compiled endpoint assignment program"
        );
        compiled.overlaps.extend(overlaps);
        compiled.programs.insert(operation.name.clone(), Arc::new(program));
    }

    Ok(compiled)
}

fn validate_catalog(service: &str, catalog: &ServiceParameterSet) -> Result<(), BindingError> {
    let mut seen = HashSet::new();
    for parameter in catalog.iter() {
        if !parameter.has_valid_name() {
            return Err(BindingError::InvalidParameterName {
                service: service.to_string(),
                parameter: parameter.name.clone(),
            });
        }
        if !seen.insert(parameter.name.as_str()) {
            return Err(BindingError::DuplicateParameter {
                service: service.to_string(),
                parameter: parameter.name.clone(),
            });
        }
    }
    Ok(())
}

/// Client-context parameter names, checked against the catalog, in declaration order.
///
/// Names of built-in parameters are skipped: the built-in value owns those.
fn client_context_parameters(service: &ServiceModel, catalog: &ServiceParameterSet) -> Result<Vec<String>, BindingError> {
    let Some(params) = service.client_context_params.as_ref() else {
        return Ok(Vec::new());
    };
    let mut names = Vec::new();
    for name in params.names() {
        let Some(declared) = catalog.get(name) else {
            return Err(BindingError::UnknownParameter {
                scope: service.name.clone(),
                parameter: name.to_string(),
                source_kind: BindingSourceKind::ClientContext,
            });
        };
        if declared.is_built_in() {
            debug!(service = %service.name, parameter = %name, "client context parameter is built-in, skipping client context binding");
            continue;
        }
        let client_type = params.get(name).map_or(declared.r#type, |param| param.r#type);
        if client_type != declared.r#type {
            return Err(BindingError::ClientContextTypeMismatch {
                service: service.name.clone(),
                parameter: name.to_string(),
                declared: client_type,
                expected: declared.r#type,
            });
        }
        names.push(name.to_string());
    }
    Ok(names)
}

fn check_target(scope: &str, catalog: &ServiceParameterSet, parameter: &str, source_kind: BindingSourceKind) -> Result<(), BindingError> {
    match catalog.get(parameter) {
        None => Err(BindingError::UnknownParameter {
            scope: scope.to_string(),
            parameter: parameter.to_string(),
            source_kind,
        }),
        Some(declared) if declared.is_built_in() => Err(BindingError::BuiltInBinding {
            scope: scope.to_string(),
            parameter: parameter.to_string(),
            source_kind,
        }),
        Some(_) => Ok(()),
    }
}

fn compile_operation(
    service: &str,
    operation: &OperationModel,
    parameters: &Arc<ServiceParameterSet>,
    client_context: &[String],
) -> Result<(AssignmentProgram, Vec<BindingOverlap>), BindingError> {
    let scope = format!("{service}.{}", operation.name);
    let mut steps = Vec::new();
    let mut targets: IndexMap<&str, Vec<BindingSourceKind>> = IndexMap::new();

    if parameters.has_built_ins() {
        steps.push(AssignmentStep::BuiltIns);
    }

    for parameter in client_context {
        steps.push(AssignmentStep::ClientContext {
            parameter: parameter.clone(),
        });
        targets.entry(parameter.as_str()).or_default().push(BindingSourceKind::ClientContext);
    }

    for (member, parameter) in operation.context_bindings() {
        check_target(&scope, parameters, parameter, BindingSourceKind::InputContext)?;
        steps.push(AssignmentStep::InputContext {
            member: member.to_string(),
            parameter: parameter.to_string(),
        });
        targets.entry(parameter).or_default().push(BindingSourceKind::InputContext);
    }

    for parameter in operation.static_context_params.keys() {
        check_target(&scope, parameters, parameter, BindingSourceKind::StaticContext)?;
    }
    for declared in parameters.iter() {
        let Some(raw) = operation.static_context_params.get(&declared.name) else {
            continue;
        };
        let value = ParameterValue::from_json(declared.r#type, raw).map_err(|cause| BindingError::UnsupportedStaticType {
            operation: operation.name.clone(),
            parameter: declared.name.clone(),
            cause,
        })?;
        steps.push(AssignmentStep::StaticContext {
            parameter: declared.name.clone(),
            value,
        });
        targets.entry(declared.name.as_str()).or_default().push(BindingSourceKind::StaticContext);
    }

    let overlaps = targets
        .into_iter()
        .filter(|(_, sources)| sources.len() > 1)
        .map(|(parameter, sources)| BindingOverlap {
            operation: operation.name.clone(),
            parameter: parameter.to_string(),
            sources,
        })
        .collect();

    let input_shape = operation
        .input
        .as_ref()
        .filter(|_| operation.has_context_bindings())
        .map(|shape| shape.name.clone());

    Ok((AssignmentProgram::new(operation.name.clone(), Arc::clone(parameters), input_shape, steps), overlaps))
}
