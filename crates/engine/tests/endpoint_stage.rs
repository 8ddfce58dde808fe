use std::any::Any;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;
use url::Url;
use waypoint_engine::{
    BindingSourceKind, CallContext, ClientOptions, Endpoint, EndpointError, EndpointResolver, EndpointStageRegistrar, FailureKind, HookPhase, Integration,
    JsonInput, MiddlewareStack, Next, PipelineError, Position, ResolutionHook, ResolvedParameters, SerializeHandler, SerializeInput,
    SerializeMiddleware, SerializeOutput, StackError, TransportRequest, default_integrations, load_settings_from_path,
};
use waypoint_types::{ParameterType, ParameterValue, ServiceModel};

fn load_service() -> Arc<ServiceModel> {
    let yaml = include_str!("data/storage_service.yaml");
    Arc::new(serde_yaml::from_str(yaml).expect("load service fixture"))
}

fn client_options(service: &ServiceModel, resolver: Arc<dyn EndpointResolver>) -> ClientOptions {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/client.yaml");
    let settings = load_settings_from_path(&path).expect("load client settings");
    ClientOptions::from_settings(service, &settings)
        .expect("client options")
        .with_endpoint_resolver(resolver)
}

/// Resolver that records every parameter record it is handed.
#[derive(Default)]
struct RecordingResolver {
    seen: Mutex<Vec<ResolvedParameters>>,
    fail: bool,
}

impl RecordingResolver {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.seen.lock().expect("lock").len()
    }

    fn last(&self) -> ResolvedParameters {
        self.seen.lock().expect("lock").last().cloned().expect("resolver was called")
    }
}

#[async_trait]
impl EndpointResolver for RecordingResolver {
    async fn resolve_endpoint(&self, _context: &CallContext, parameters: &ResolvedParameters) -> anyhow::Result<Endpoint> {
        self.seen.lock().expect("lock").push(parameters.clone());
        if self.fail {
            return Err(anyhow!("no endpoint rule matched"));
        }
        let bucket = parameters.get("Bucket").and_then(ParameterValue::as_str).unwrap_or("shared");
        let region = parameters.get("Region").and_then(ParameterValue::as_str).unwrap_or("global");
        let endpoint = Endpoint::parse(&format!("https://{bucket}.storage.{region}.example.com/"))?
            .with_header(HeaderName::from_static("x-endpoint-region"), HeaderValue::from_str(region)?);
        Ok(endpoint)
    }
}

/// Stand-in for the pre-existing endpoint stage the new one is inserted after.
struct Named(&'static str);

#[async_trait]
impl SerializeMiddleware for Named {
    fn id(&self) -> &str {
        self.0
    }

    async fn handle_serialize(
        &self,
        context: &mut CallContext,
        input: SerializeInput,
        next: Next<'_>,
    ) -> Result<SerializeOutput, PipelineError> {
        next.run(context, input).await
    }
}

/// Terminal handler that hands the request back instead of sending it.
#[derive(Default)]
struct Capture {
    reached: AtomicUsize,
}

#[async_trait]
impl SerializeHandler for Capture {
    async fn handle(&self, _context: &mut CallContext, input: SerializeInput) -> Result<SerializeOutput, PipelineError> {
        self.reached.fetch_add(1, Ordering::SeqCst);
        let request: Box<dyn Any> = input.request;
        let request = request
            .downcast::<reqwest::Request>()
            .map_err(|_| PipelineError::Handler(anyhow!("expected an HTTP request")))?;
        Ok(SerializeOutput {
            result: Some(request),
            ..SerializeOutput::default()
        })
    }
}

fn stack_for(registrar: &EndpointStageRegistrar, operation: &str, options: &ClientOptions) -> MiddlewareStack {
    let mut stack = MiddlewareStack::new(operation);
    for id in ["OperationSerializer", "ResolveEndpoint", "ComputeContentLength"] {
        stack.serialize.add(Arc::new(Named(id)), Position::Last).expect("add placeholder stage");
    }
    assert!(registrar.register(operation, &mut stack, options).expect("register"));
    stack
}

fn request() -> reqwest::Request {
    let mut request = reqwest::Request::new(Method::PUT, Url::parse("https://placeholder.invalid/object").expect("url"));
    request.headers_mut().insert("x-endpoint-region", HeaderValue::from_static("stale"));
    request.headers_mut().insert(ACCEPT, HeaderValue::from_static("application/json"));
    request
}

fn sent_request(output: SerializeOutput) -> reqwest::Request {
    let result = output.result.expect("terminal handler result");
    *result.downcast::<reqwest::Request>().expect("http request")
}

#[tokio::test]
async fn scenario_a_binds_every_source_and_mutates_the_request() {
    let service = load_service();
    let resolver = Arc::new(RecordingResolver::default());
    let options = client_options(&service, resolver.clone());
    let registrar = EndpointStageRegistrar::new(service, default_integrations()).expect("registrar");
    let stack = stack_for(&registrar, "Op1", &options);
    let capture = Capture::default();

    let input = JsonInput::empty("Op1Input").with_member("BucketName", "my-bucket");
    let mut context = CallContext::new("Op1");
    let output = stack
        .handle(&mut context, SerializeInput::new(request(), input), &capture)
        .await
        .expect("call succeeds");

    let record = resolver.last();
    assert_eq!(record.get("Region"), Some(&ParameterValue::from("us-west-2")));
    assert_eq!(record.get("Bucket"), Some(&ParameterValue::from("my-bucket")));
    assert_eq!(record.get("UseFips"), Some(&ParameterValue::Boolean(true)));
    assert_eq!(record.len(), 3);

    let sent = sent_request(output);
    assert_eq!(sent.url().as_str(), "https://my-bucket.storage.us-west-2.example.com/");
    let regions: Vec<_> = sent.headers().get_all("x-endpoint-region").iter().collect();
    assert_eq!(regions, vec!["us-west-2"]);
    assert_eq!(sent.headers().get(ACCEPT).and_then(|value| value.to_str().ok()), Some("application/json"));
    assert_eq!(capture.reached.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn scenario_b_client_context_supplies_the_default() {
    let service = load_service();
    let resolver = Arc::new(RecordingResolver::default());
    let options = client_options(&service, resolver.clone());
    let registrar = EndpointStageRegistrar::new(service, default_integrations()).expect("registrar");
    let stack = stack_for(&registrar, "Op2", &options);

    let mut context = CallContext::new("Op2");
    stack
        .handle(&mut context, SerializeInput::new(request(), JsonInput::empty("Op2Input")), &Capture::default())
        .await
        .expect("call succeeds");

    let record = resolver.last();
    assert_eq!(record.get("UseFips"), Some(&ParameterValue::Boolean(false)));
    assert!(!record.is_set("Bucket"));
}

#[tokio::test]
async fn scenario_c_resolver_failure_stops_the_call() {
    let service = load_service();
    let resolver = Arc::new(RecordingResolver::failing());
    let options = client_options(&service, resolver.clone());
    let registrar = EndpointStageRegistrar::new(service, default_integrations()).expect("registrar");
    let stack = stack_for(&registrar, "Op1", &options);
    let capture = Capture::default();

    let mut context = CallContext::new("Op1");
    let error = stack
        .handle(&mut context, SerializeInput::new(request(), JsonInput::empty("Op1Input")), &capture)
        .await
        .unwrap_err();

    let endpoint_error = error.as_endpoint().expect("endpoint error");
    assert_eq!(endpoint_error.kind(), FailureKind::Resolution);
    assert_eq!(error.to_string(), "failed to resolve service endpoint, no endpoint rule matched");
    assert_eq!(capture.reached.load(Ordering::SeqCst), 0, "no later stage runs after a failure");
}

#[tokio::test]
async fn identical_calls_produce_identical_records() {
    let service = load_service();
    let resolver = Arc::new(RecordingResolver::default());
    let options = client_options(&service, resolver.clone());
    let registrar = EndpointStageRegistrar::new(service, default_integrations()).expect("registrar");
    let stack = stack_for(&registrar, "Op1", &options);

    for _ in 0..2 {
        let input = JsonInput::empty("Op1Input").with_member("BucketName", "same");
        let mut context = CallContext::new("Op1");
        stack
            .handle(&mut context, SerializeInput::new(request(), input), &Capture::default())
            .await
            .expect("call succeeds");
    }

    let seen = resolver.seen.lock().expect("lock");
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
}

struct GrpcFrame;
impl TransportRequest for GrpcFrame {}

#[tokio::test]
async fn wrong_transport_never_reaches_the_resolver() {
    let service = load_service();
    let resolver = Arc::new(RecordingResolver::default());
    let options = client_options(&service, resolver.clone());
    let registrar = EndpointStageRegistrar::new(service, default_integrations()).expect("registrar");
    let stack = stack_for(&registrar, "Op1", &options);

    let mut context = CallContext::new("Op1");
    let error = stack
        .handle(&mut context, SerializeInput::new(GrpcFrame, JsonInput::empty("Op1Input")), &Capture::default())
        .await
        .unwrap_err();

    assert!(matches!(error.as_endpoint(), Some(EndpointError::UnexpectedTransportType { observed }) if observed.ends_with("GrpcFrame")));
    assert!(error.to_string().starts_with("unknown transport type"));
    assert_eq!(resolver.calls(), 0);
}

#[tokio::test]
async fn missing_resolver_is_reported() {
    let service = load_service();
    let registrar = EndpointStageRegistrar::new(service, default_integrations()).expect("registrar");
    let stack = stack_for(&registrar, "Op2", &ClientOptions::new());

    let mut context = CallContext::new("Op2");
    let error = stack
        .handle(&mut context, SerializeInput::new(request(), JsonInput::empty("Op2Input")), &Capture::default())
        .await
        .unwrap_err();

    assert!(matches!(error.as_endpoint(), Some(EndpointError::MissingResolver)));
}

#[tokio::test]
async fn mistyped_client_options_fail_before_resolution() {
    let service = load_service();
    let resolver = Arc::new(RecordingResolver::default());
    let registrar = EndpointStageRegistrar::new(service, default_integrations()).expect("registrar");

    let options = ClientOptions::new()
        .with_client_context("UseFips", "yes")
        .with_builtin("SDK::Region", "us-west-2")
        .with_endpoint_resolver(resolver.clone());
    let stack = stack_for(&registrar, "Op2", &options);
    let mut context = CallContext::new("Op2");
    let error = stack
        .handle(&mut context, SerializeInput::new(request(), JsonInput::empty("Op2Input")), &Capture::default())
        .await
        .unwrap_err();
    assert!(matches!(
        error.as_endpoint(),
        Some(EndpointError::MistypedValue {
            parameter,
            origin: BindingSourceKind::ClientContext,
            expected: ParameterType::Boolean,
            found: ParameterType::String,
        }) if parameter == "UseFips"
    ));

    let options = ClientOptions::new()
        .with_builtin("SDK::Region", true)
        .with_endpoint_resolver(resolver.clone());
    let stack = stack_for(&registrar, "Op2", &options);
    let mut context = CallContext::new("Op2");
    let error = stack
        .handle(&mut context, SerializeInput::new(request(), JsonInput::empty("Op2Input")), &Capture::default())
        .await
        .unwrap_err();
    assert!(matches!(
        error.as_endpoint(),
        Some(EndpointError::MistypedValue {
            parameter,
            origin: BindingSourceKind::BuiltIn,
            ..
        }) if parameter == "Region"
    ));
    assert_eq!(error.as_endpoint().map(EndpointError::kind), Some(FailureKind::Configuration));
    assert_eq!(resolver.calls(), 0);
}

struct CancelDuringResolution {
    token: CancellationToken,
    calls: AtomicUsize,
}

#[async_trait]
impl EndpointResolver for CancelDuringResolution {
    async fn resolve_endpoint(&self, _context: &CallContext, _parameters: &ResolvedParameters) -> anyhow::Result<Endpoint> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
        std::future::pending::<()>().await;
        Ok(Endpoint::parse("https://never.example.com")?)
    }
}

#[tokio::test]
async fn cancellation_aborts_before_and_during_resolution() {
    let service = load_service();
    let token = CancellationToken::new();
    let resolver = Arc::new(CancelDuringResolution {
        token: token.clone(),
        calls: AtomicUsize::new(0),
    });
    let options = client_options(&service, resolver.clone());
    let registrar = EndpointStageRegistrar::new(service, default_integrations()).expect("registrar");
    let stack = stack_for(&registrar, "Op2", &options);
    let capture = Capture::default();

    let mut context = CallContext::with_cancellation("Op2", token);
    let error = stack
        .handle(&mut context, SerializeInput::new(request(), JsonInput::empty("Op2Input")), &capture)
        .await
        .unwrap_err();
    assert_eq!(error.as_endpoint().map(EndpointError::kind), Some(FailureKind::Canceled));
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);

    // The token is now canceled, so a second call stops before the resolver runs.
    let error = stack
        .handle(&mut context, SerializeInput::new(request(), JsonInput::empty("Op2Input")), &capture)
        .await
        .unwrap_err();
    assert!(matches!(error.as_endpoint(), Some(EndpointError::Canceled)));
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    assert_eq!(capture.reached.load(Ordering::SeqCst), 0);
}

struct Guard {
    phase: HookPhase,
    observed: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ResolutionHook for Guard {
    fn name(&self) -> &str {
        match self.phase {
            HookPhase::PreResolution => "tenant-guard",
            HookPhase::PostResolution => "endpoint-audit",
        }
    }

    async fn run(&self, context: &mut CallContext, request: &mut reqwest::Request) -> anyhow::Result<()> {
        self.observed.lock().expect("lock").push(format!("{}:{}", self.name(), request.url()));
        if context.metadata().get("deny").is_some() {
            return Err(anyhow!("tenant is suspended"));
        }
        Ok(())
    }
}

struct Auditing {
    observed: Arc<Mutex<Vec<String>>>,
}

impl Integration for Auditing {
    fn name(&self) -> &str {
        "auditing"
    }

    fn pre_resolution_hook(&self, _options: &ClientOptions, _service: &ServiceModel) -> Option<Arc<dyn ResolutionHook>> {
        Some(Arc::new(Guard {
            phase: HookPhase::PreResolution,
            observed: Arc::clone(&self.observed),
        }))
    }

    fn post_resolution_hook(
        &self,
        _options: &ClientOptions,
        _service: &ServiceModel,
        _operation: &waypoint_types::OperationModel,
    ) -> Option<Arc<dyn ResolutionHook>> {
        Some(Arc::new(Guard {
            phase: HookPhase::PostResolution,
            observed: Arc::clone(&self.observed),
        }))
    }
}

#[tokio::test]
async fn hooks_surround_resolution_and_failures_stop_the_call() {
    let service = load_service();
    let observed = Arc::new(Mutex::new(Vec::new()));
    let mut integrations = default_integrations();
    integrations.push(Arc::new(Auditing {
        observed: Arc::clone(&observed),
    }));
    let resolver = Arc::new(RecordingResolver::default());
    let options = client_options(&service, resolver.clone());
    let registrar = EndpointStageRegistrar::new(service, integrations).expect("registrar");
    let stack = stack_for(&registrar, "Op1", &options);

    let input = JsonInput::empty("Op1Input").with_member("BucketName", "logs");
    let mut context = CallContext::new("Op1");
    stack
        .handle(&mut context, SerializeInput::new(request(), input), &Capture::default())
        .await
        .expect("call succeeds");
    assert_eq!(
        *observed.lock().expect("lock"),
        vec![
            "tenant-guard:https://placeholder.invalid/object".to_string(),
            "endpoint-audit:https://logs.storage.us-west-2.example.com/".to_string(),
        ]
    );

    let mut denied = CallContext::new("Op1");
    denied.metadata_mut().set("deny", true);
    let error = stack
        .handle(&mut denied, SerializeInput::new(request(), JsonInput::empty("Op1Input")), &Capture::default())
        .await
        .unwrap_err();
    assert!(matches!(
        error.as_endpoint(),
        Some(EndpointError::HookFailure {
            phase: HookPhase::PreResolution,
            ..
        })
    ));
    assert_eq!(resolver.calls(), 1, "a failed pre-resolution hook prevents resolution");
}

#[test]
fn registrar_places_stage_after_the_legacy_endpoint_stage() {
    let service = load_service();
    let registrar = EndpointStageRegistrar::new(service, default_integrations()).expect("registrar");
    let options = ClientOptions::new();
    let mut stack = stack_for(&registrar, "Op1", &options);

    assert_eq!(
        stack.serialize.ids(),
        vec!["OperationSerializer", "ResolveEndpoint", "ResolveEndpointV2", "ComputeContentLength"]
    );
    assert_eq!(
        registrar.register("Op1", &mut stack, &options),
        Err(StackError::DuplicateStage("ResolveEndpointV2".into()))
    );
    assert_eq!(
        registrar.register("DeleteEverything", &mut stack, &options),
        Err(StackError::UnknownOperation {
            service: "Storage".into(),
            operation: "DeleteEverything".into(),
        })
    );
}

#[test]
fn services_without_rules_get_no_stage() {
    let mut service = (*load_service()).clone();
    service.endpoint_rules = None;
    let registrar = EndpointStageRegistrar::new(Arc::new(service), default_integrations()).expect("registrar");

    let mut stack = MiddlewareStack::new("Op1");
    assert_eq!(registrar.register("Op1", &mut stack, &ClientOptions::new()), Ok(false));
    assert!(stack.serialize.is_empty());
}
