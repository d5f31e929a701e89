#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use tether_core::address::RemoteAddress;
use tether_core::{ComponentRegistry, Result, RpcError};
use tether_runtime::chain::Stage;
use tether_runtime::config::ReferenceConfig;
use tether_runtime::invocation::RpcInvocation;
use tether_runtime::discovery::LocalServiceDiscoverer;
use tether_runtime::server::{InterfaceDescriptor, MethodDescriptor, Service, ServiceFactory};
use tether_runtime::services::EchoService;
use tether_runtime::{Node, Reference, Server};

const GREETER: &str = "demo.Greeter";

/// Client-side adapter for the Greeter interface.
#[async_trait]
trait Greeter {
    async fn hello(&self, name: &str) -> Result<String>;
    async fn slow(&self, millis: u64) -> Result<String>;
}

struct GreeterClient {
    reference: Reference,
    hello: MethodDescriptor,
    slow: MethodDescriptor,
}

impl GreeterClient {
    fn new(reference: Reference) -> Self {
        Self {
            reference,
            hello: MethodDescriptor::new("hello", &["string"]),
            slow: MethodDescriptor::new("slow", &["u64"]),
        }
    }
}

#[async_trait]
impl Greeter for GreeterClient {
    async fn hello(&self, name: &str) -> Result<String> {
        self.reference.call(&self.hello, vec![json!(name)]).await
    }

    async fn slow(&self, millis: u64) -> Result<String> {
        self.reference.call(&self.slow, vec![json!(millis)]).await
    }
}

struct GreeterImpl;

#[async_trait]
impl Service for GreeterImpl {
    async fn call(&self, method: &MethodDescriptor, args: Vec<Value>) -> Result<Value> {
        match method.name.as_str() {
            "hello" => {
                let name = args.first().and_then(Value::as_str).unwrap_or_default();
                Ok(json!(format!("hello {name}")))
            }
            "slow" => {
                let millis = args.first().and_then(Value::as_u64).unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok(json!("finally"))
            }
            "big" => {
                let len = args.first().and_then(Value::as_u64).unwrap_or(0);
                Ok(json!("x".repeat(len as usize)))
            }
            other => Err(RpcError::Invocation(format!("no method {other}"))),
        }
    }
}

fn greeter_descriptor() -> InterfaceDescriptor {
    InterfaceDescriptor::new(GREETER)
        .method("hello", &["string"])
        .method("slow", &["u64"])
        .method("big", &["u64"])
}

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

async fn serving_node() -> (Node, Server) {
    let node = Node::new(Arc::new(ComponentRegistry::with_defaults()));
    node.export(greeter_descriptor(), Arc::new(GreeterImpl))
        .await
        .unwrap();
    let server = node.serve(loopback()).await.unwrap();
    (node, server)
}

fn reference_to(server: &Server, interface: &str) -> ReferenceConfig {
    let addr = server.local_addr();
    ReferenceConfig::new(
        interface,
        vec![RemoteAddress::fixed(addr.ip().to_string(), addr.port())],
    )
}

#[tokio::test]
async fn hello_round_trip() {
    let (_server_node, server) = serving_node().await;
    let client_node = Node::new(Arc::new(ComponentRegistry::with_defaults()));
    let reference = client_node
        .refer(&reference_to(&server, GREETER))
        .unwrap();

    let greeter = GreeterClient::new(reference);
    assert_eq!(greeter.hello("rpc4j").await.unwrap(), "hello rpc4j");
    assert!(client_node.pending().is_empty());
}

#[tokio::test]
async fn gzip_and_round_robin_reference() {
    let (_server_node, server) = serving_node().await;
    let client_node = Node::new(Arc::new(ComponentRegistry::with_defaults()));
    let mut cfg = reference_to(&server, GREETER);
    cfg.compressor = "gzip".into();
    cfg.load_balancer = "round_robin".into();
    let greeter = GreeterClient::new(client_node.refer(&cfg).unwrap());

    let long = "x".repeat(10_000);
    assert_eq!(greeter.hello(&long).await.unwrap(), format!("hello {long}"));
}

#[tokio::test]
async fn missing_service_is_remote_error_not_timeout() {
    let (_server_node, server) = serving_node().await;
    let client_node = Node::new(Arc::new(ComponentRegistry::with_defaults()));
    let reference = client_node
        .refer(&reference_to(&server, "demo.Missing"))
        .unwrap();

    let err = reference
        .invoke(&MethodDescriptor::new("hello", &["string"]), vec![json!("x")])
        .await
        .unwrap_err();
    match err {
        RpcError::Remote(msg) => assert!(msg.contains("service not found"), "msg={msg}"),
        other => panic!("expected Remote, got {other:?}"),
    }
}

#[tokio::test]
async fn unexported_service_is_not_found() {
    let (server_node, server) = serving_node().await;
    let client_node = Node::new(Arc::new(ComponentRegistry::with_defaults()));
    let greeter = GreeterClient::new(
        client_node
            .refer(&reference_to(&server, GREETER))
            .unwrap(),
    );
    assert!(greeter.hello("a").await.is_ok());

    server_node.unexport(GREETER).await.unwrap();
    match greeter.hello("b").await {
        Err(RpcError::Remote(msg)) => assert!(msg.contains("service not found"), "msg={msg}"),
        other => panic!("expected Remote, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_method_is_remote_error() {
    let (_server_node, server) = serving_node().await;
    let client_node = Node::new(Arc::new(ComponentRegistry::with_defaults()));
    let reference = client_node
        .refer(&reference_to(&server, GREETER))
        .unwrap();

    // same name, different parameter list
    let err = reference
        .invoke(&MethodDescriptor::new("hello", &["u64"]), vec![json!(1)])
        .await
        .unwrap_err();
    match err {
        RpcError::Remote(msg) => assert!(msg.contains("method not found"), "msg={msg}"),
        other => panic!("expected Remote, got {other:?}"),
    }
}

#[tokio::test]
async fn timeout_then_late_response_is_discarded() {
    let (_server_node, server) = serving_node().await;
    let client_node = Node::new(Arc::new(ComponentRegistry::with_defaults()));
    let mut cfg = reference_to(&server, GREETER);
    cfg.timeout = 50;
    let greeter = GreeterClient::new(client_node.refer(&cfg).unwrap());

    let err = greeter.slow(300).await.unwrap_err();
    assert!(err.is_timeout(), "err={err:?}");
    assert!(client_node.pending().is_empty());

    // give the late response time to arrive (or the connection to close)
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(client_node.pending().is_empty());

    assert_eq!(greeter.hello("again").await.unwrap(), "hello again");
}

#[tokio::test]
async fn connect_failure_is_transport_error() {
    // bind then drop to get a port nobody listens on
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let node = Node::new(Arc::new(ComponentRegistry::with_defaults()));
    let greeter = GreeterClient::new(
        node.refer(&ReferenceConfig::new(
            GREETER,
            vec![RemoteAddress::fixed("127.0.0.1", port)],
        ))
        .unwrap(),
    );
    let err = greeter.hello("x").await.unwrap_err();
    assert!(matches!(err, RpcError::Connect { .. }), "err={err:?}");
    assert!(node.pending().is_empty());
}

#[tokio::test]
async fn lazy_factory_runs_once() {
    let node = Node::new(Arc::new(ComponentRegistry::with_defaults()));
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let factory: ServiceFactory = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(GreeterImpl) as Arc<dyn Service>)
    });
    node.declare(greeter_descriptor(), factory).await.unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 0);

    let server = node.serve(loopback()).await.unwrap();
    let greeter = GreeterClient::new(node.refer(&reference_to(&server, GREETER)).unwrap());

    let calls = (0..4).map(|i| {
        let g = &greeter;
        async move { g.hello(&format!("n{i}")).await }
    });
    for r in futures_util::future::join_all(calls).await {
        r.unwrap();
    }
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn discovery_routes_by_service_name() {
    let discoverer = Arc::new(LocalServiceDiscoverer::new());

    let server_node = Node::new(Arc::new(ComponentRegistry::with_defaults()))
        .with_discoverer(discoverer.clone());
    let server = server_node.serve(loopback()).await.unwrap();
    let server_node = server_node.with_advertise(server.local_addr().into());
    server_node
        .export(EchoService::descriptor(), Arc::new(EchoService))
        .await
        .unwrap();

    let client_node =
        Node::new(Arc::new(ComponentRegistry::with_defaults())).with_discoverer(discoverer);
    let echo = client_node
        .refer(&ReferenceConfig::new(
            EchoService::INTERFACE,
            vec![RemoteAddress::service(EchoService::INTERFACE)],
        ))
        .unwrap();

    let ping: String = echo
        .call(&MethodDescriptor::new("ping", &[]), vec![])
        .await
        .unwrap();
    assert_eq!(ping, "pong");

    server_node.unexport(EchoService::INTERFACE).await.unwrap();
    let err = echo
        .invoke(&MethodDescriptor::new("ping", &[]), vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::NoAvailableAddress(_)), "err={err:?}");
}

#[tokio::test]
async fn serve_and_shutdown_twice_fail() {
    let (node, server) = serving_node().await;
    assert!(node.serve(loopback()).await.is_err());
    server.shutdown().unwrap();
    assert!(server.shutdown().is_err());
    assert!(server.is_stopped());
}

#[tokio::test]
async fn reference_identity_is_local() {
    let node = Node::new(Arc::new(ComponentRegistry::with_defaults()));
    let cfg = ReferenceConfig::new(GREETER, vec![RemoteAddress::fixed("127.0.0.1", 1)]);
    let a = node.refer(&cfg).unwrap();
    let b = node.refer(&cfg).unwrap();
    let a2 = a.clone();

    assert_eq!(a, a2);
    assert_ne!(a, b);
    let mut set = std::collections::HashSet::new();
    set.insert(a.clone());
    set.insert(a2);
    set.insert(b);
    assert_eq!(set.len(), 2);
    assert!(a.to_string().starts_with("Reference<demo.Greeter>@"));
    assert!(node.pending().is_empty());
}

#[tokio::test]
async fn unknown_components_fail_refer() {
    let node = Node::new(Arc::new(ComponentRegistry::with_defaults()));
    let mut cfg = ReferenceConfig::new(GREETER, vec![RemoteAddress::fixed("127.0.0.1", 1)]);
    cfg.serializer = "xml".into();
    assert!(matches!(
        node.refer(&cfg),
        Err(RpcError::UnknownComponent { capability: "serializer", .. })
    ));
}

#[tokio::test]
async fn unencodable_result_becomes_remote_failure() {
    let (_server_node, server) = serving_node().await;
    let client_node = Node::new(Arc::new(ComponentRegistry::with_defaults()));
    let mut cfg = reference_to(&server, GREETER);
    cfg.timeout = 1500;
    let reference = client_node.refer(&cfg).unwrap();

    let big = MethodDescriptor::new("big", &["u64"]);
    let err = reference
        .invoke(&big, vec![json!(11 * 1024 * 1024)])
        .await
        .unwrap_err();
    match err {
        RpcError::Remote(msg) => assert!(msg.contains("frame too large"), "msg={msg}"),
        other => panic!("expected Remote, got {other:?}"),
    }
    assert!(client_node.pending().is_empty());

    // the connection survives the failed encode
    let greeter = GreeterClient::new(reference);
    assert_eq!(greeter.hello("after").await.unwrap(), "hello after");
}

struct CountCalls(Arc<AtomicUsize>);

#[async_trait]
impl Stage for CountCalls {
    fn name(&self) -> &'static str {
        "count_calls"
    }

    async fn before(&self, _inv: &mut RpcInvocation) -> Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct DenyMethod(&'static str);

#[async_trait]
impl Stage for DenyMethod {
    fn name(&self) -> &'static str {
        "deny_method"
    }

    async fn before(&self, inv: &mut RpcInvocation) -> Result<()> {
        if inv.method == self.0 {
            return Err(RpcError::Invocation(format!("{} is denied", self.0)));
        }
        Ok(())
    }
}

#[tokio::test]
async fn node_stages_run_on_both_sides() {
    let server_node = Node::new(Arc::new(ComponentRegistry::with_defaults()))
        .with_server_stage(Arc::new(DenyMethod("slow")));
    server_node
        .export(greeter_descriptor(), Arc::new(GreeterImpl))
        .await
        .unwrap();
    let server = server_node.serve(loopback()).await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let client_node = Node::new(Arc::new(ComponentRegistry::with_defaults()))
        .with_client_stage(Arc::new(CountCalls(calls.clone())));
    let greeter = GreeterClient::new(client_node.refer(&reference_to(&server, GREETER)).unwrap());

    assert_eq!(greeter.hello("a").await.unwrap(), "hello a");
    match greeter.slow(1).await {
        Err(RpcError::Remote(msg)) => assert!(msg.contains("slow is denied"), "msg={msg}"),
        other => panic!("expected Remote, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
