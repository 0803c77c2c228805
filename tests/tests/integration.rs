//! End-to-end scenarios: a real introspection server and a real gateway on
//! ephemeral ports, talking JSON-RPC over HTTP.

use relay_gateway::{Gateway, JsonCodec, RpcContext};
use relay_kernel::rpc;
use relay_kernel::schema::{Empty, ServiceList};
use relay_kernel::JSON_CONTENT_TYPE;
use relay_server::{RpcServer, ServiceBuilder};
use relay_testing::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn rpc_server() -> RpcServer {
    let mut server = RpcServer::new();
    server.register_codec("application/json", JsonCodec::new());
    server.register_service(test_endpoint());
    server
}

async fn gateway_for(backend_url: &str) -> Gateway {
    let gateway = Gateway::new().with_codec("application/json", JsonCodec::new());
    gateway.add_url(backend_url).await.expect("discovery");
    gateway
}

// ── Introspection ──────────────────────────────────────────────────────────

#[tokio::test]
async fn introspection_round_trip() {
    let url = spawn_rpc_server(rpc_server()).await;

    let list: ServiceList = call_ok(&url, "RPC.GetServices", &json!({})).await;
    assert_eq!(list.services.len(), 1);

    let svc = &list.services[0];
    assert_eq!(svc.name, "TestEndpoint");
    assert_eq!(
        svc.methods.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["Bar", "Foo", "FooAnon"]
    );

    let foo = &svc.methods["Foo"];
    assert_eq!(foo.name, "Foo");
    assert_eq!(foo.args, foo_args_type());
    assert_eq!(foo.returns, foo_res_type());
}

#[tokio::test]
async fn composite_schema_with_flattening() {
    let url = spawn_rpc_server(rpc_server()).await;
    let list: ServiceList = call_ok(&url, "RPC.GetServices", &json!({})).await;
    let svc = &list.services[0];

    // Array, nested object, dynamic map, and the flattened embedded field.
    assert_eq!(svc.methods["Bar"].args, bar_args_type());

    // The embedded reply flattens over its wire tag: FooAnon's schema is
    // FooArgs' fields directly, no "args" key.
    assert_eq!(svc.methods["FooAnon"].returns, foo_args_type());
}

// ── Forwarding ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn forwarding_round_trip() {
    let backend_url = spawn_rpc_server(rpc_server()).await;
    let (gateway_url, gateway) = spawn_gateway(gateway_for(&backend_url).await).await;

    assert_eq!(
        gateway.registry().service_names(),
        vec!["TestEndpoint".to_string()]
    );

    let args = FooArgs {
        a: 1,
        b: "one".into(),
    };
    let reply: FooRes = call_ok(&gateway_url, "TestEndpoint.Foo", &args).await;
    assert_eq!(reply.args, args);
}

#[tokio::test]
async fn forwarding_re_resolves_per_call() {
    let backend_url = spawn_rpc_server(rpc_server()).await;
    let authority = backend_url.trim_start_matches("http://").to_string();

    let resolver = Arc::new(StaticResolver::new().with_target("backend.internal", &authority));
    let gateway = {
        let gateway = Gateway::new()
            .with_codec("application/json", JsonCodec::new())
            .with_resolver(resolver.clone());
        gateway
            .add_url("backend.internal")
            .await
            .expect("discovery through resolver");
        gateway
    };
    let (gateway_url, gateway) = spawn_gateway(gateway).await;
    let hits_after_discovery = resolver.hits();

    let args = FooArgs {
        a: 2,
        b: "two".into(),
    };
    let _: FooRes = call_ok(&gateway_url, "TestEndpoint.Foo", &args).await;
    let _: FooRes = call_ok(&gateway_url, "TestEndpoint.Foo", &args).await;

    // Each forwarded call resolved the symbolic host again.
    assert_eq!(resolver.hits(), hits_after_discovery + 2);

    let target = gateway.registry().lookup("TestEndpoint.Foo").unwrap();
    assert!(target.entry.via_srv);
    // The registry keeps the symbolic URL, not the resolved one.
    assert_eq!(target.entry.url.host_str(), Some("backend.internal"));
}

// ── Hook interposition ─────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
struct SuccessRes {
    #[serde(default, rename = "Success")]
    success: bool,
}

#[tokio::test]
async fn hook_short_circuits_on_matching_args() {
    let bar_calls = Arc::new(AtomicUsize::new(0));

    let mut server = RpcServer::new();
    server.register_codec("application/json", JsonCodec::new());
    let counted = bar_calls.clone();
    server.register_service(
        ServiceBuilder::of::<TestEndpoint>()
            .unwrap()
            .method("Bar", move |_head, _args: BarArgs| {
                let counted = counted.clone();
                async move {
                    counted.fetch_add(1, Ordering::Relaxed);
                    Ok(Empty {})
                }
            })
            .unwrap(),
    );
    let backend_url = spawn_rpc_server(server).await;

    let hook = |ctx: &mut RpcContext| {
        if ctx.method() != "TestEndpoint.Bar" {
            return;
        }
        let args: BarArgs = match ctx.read_params() {
            Ok(args) => args,
            Err(_) => {
                ctx.write_error(400, rpc::ErrorObject::invalid_params("couldn't read args"));
                return;
            }
        };
        if args.a == 5 {
            let _ = ctx.write_response(&json!({"Success": true}));
        }
    };

    let gateway = gateway_for(&backend_url).await.with_hook(hook);
    let (gateway_url, _gateway) = spawn_gateway(gateway).await;

    // a == 0 passes through to the backend.
    let reply: SuccessRes =
        call_ok(&gateway_url, "TestEndpoint.Bar", &BarArgs::default()).await;
    assert!(!reply.success);
    assert_eq!(bar_calls.load(Ordering::Relaxed), 1);

    // a == 5 is answered by the hook; the backend is not contacted.
    let args = BarArgs {
        a: 5,
        ..BarArgs::default()
    };
    let reply: SuccessRes = call_ok(&gateway_url, "TestEndpoint.Bar", &args).await;
    assert!(reply.success);
    assert_eq!(bar_calls.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn hook_mutations_reach_the_backend() {
    let backend_url = spawn_rpc_server(rpc_server()).await;

    let hook = |ctx: &mut RpcContext| {
        if ctx.method() != "TestEndpoint.Foo" {
            return;
        }
        let mut args: FooArgs = ctx.read_params().expect("read args");
        args.a *= 2;
        ctx.update_request(None, Some(&args)).expect("update args");
    };

    let gateway = gateway_for(&backend_url).await.with_hook(hook);
    let (gateway_url, _gateway) = spawn_gateway(gateway).await;

    let reply: FooRes = call_ok(
        &gateway_url,
        "TestEndpoint.Foo",
        &FooArgs {
            a: 21,
            b: "x".into(),
        },
    )
    .await;
    assert_eq!(reply.args.a, 42);
}

// ── Backup handler / routing errors ────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
struct WatRes {
    #[serde(rename = "A")]
    a: i64,
}
relay_kernel::reflect_object!(WatRes {
    field "A": i64,
});

struct TestEndpoint2;

#[tokio::test]
async fn backup_handler_serves_unknown_services() {
    let backend_url = spawn_rpc_server(rpc_server()).await;

    let mut backup = RpcServer::new();
    backup.register_codec("application/json", JsonCodec::new());
    backup.register_service(
        ServiceBuilder::of::<TestEndpoint2>()
            .unwrap()
            .method("Wat", |_head, _args: Empty| async move {
                Ok(WatRes { a: 5 })
            })
            .unwrap(),
    );

    let gateway = gateway_for(&backend_url)
        .await
        .with_fallback(LocalBackup(Arc::new(backup)));
    let (gateway_url, _gateway) = spawn_gateway(gateway).await;

    let reply: WatRes = call_ok(&gateway_url, "TestEndpoint2.Wat", &json!({})).await;
    assert_eq!(reply.a, 5);
}

#[tokio::test]
async fn unknown_method_without_backup_is_a_framed_400() {
    let backend_url = spawn_rpc_server(rpc_server()).await;
    let (gateway_url, _gateway) = spawn_gateway(gateway_for(&backend_url).await).await;

    let err = call::<_, serde_json::Value>(&gateway_url, "Unknown.X", &json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.0, 400);
    assert_eq!(err.1.code, rpc::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn ill_formed_method_is_rejected() {
    let backend_url = spawn_rpc_server(rpc_server()).await;
    let (gateway_url, _gateway) = spawn_gateway(gateway_for(&backend_url).await).await;

    let (status, body) = call_raw(
        &gateway_url,
        json!({"jsonrpc":"2.0","method":"NoDotHere","params":{},"id":1}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], json!(rpc::INVALID_REQUEST));
}

// ── HTTP-level behavior ────────────────────────────────────────────────────

#[tokio::test]
async fn non_post_is_405_and_unknown_content_type_is_415() {
    let backend_url = spawn_rpc_server(rpc_server()).await;
    let (gateway_url, _gateway) = spawn_gateway(gateway_for(&backend_url).await).await;

    let client = reqwest::Client::new();
    let response = client.get(&gateway_url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 405);

    let response = client
        .post(&gateway_url)
        .header("content-type", "text/xml")
        .body("<x/>")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 415);
}

#[tokio::test]
async fn responses_carry_the_codec_content_type() {
    let backend_url = spawn_rpc_server(rpc_server()).await;
    let (gateway_url, _gateway) = spawn_gateway(gateway_for(&backend_url).await).await;

    let response = reqwest::Client::new()
        .post(&gateway_url)
        .header("content-type", "application/json")
        .body(
            json!({"jsonrpc":"2.0","method":"TestEndpoint.Foo","params":{"a":1,"b":"x"},"id":1})
                .to_string(),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some(JSON_CONTENT_TYPE)
    );
}

#[tokio::test]
async fn cors_preflight_and_headers() {
    let backend_url = spawn_rpc_server(rpc_server()).await;
    let gateway = gateway_for(&backend_url)
        .await
        .with_cors_origin(regex::Regex::new(r"^https://app\.example\.com$").unwrap());
    let (gateway_url, _gateway) = spawn_gateway(gateway).await;

    let client = reqwest::Client::new();

    // Preflight from a matching origin: 2xx, CORS headers, no body.
    let response = client
        .request(reqwest::Method::OPTIONS, &gateway_url)
        .header("origin", "https://app.example.com")
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("https://app.example.com")
    );
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-credentials")
            .and_then(|v| v.to_str().ok()),
        Some("true")
    );

    // Non-matching origin: no CORS headers.
    let response = client
        .request(reqwest::Method::OPTIONS, &gateway_url)
        .header("origin", "https://evil.test")
        .send()
        .await
        .unwrap();
    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_none());

    // CORS headers ride on normal responses too.
    let response = client
        .post(&gateway_url)
        .header("origin", "https://app.example.com")
        .header("content-type", "application/json")
        .body(
            json!({"jsonrpc":"2.0","method":"TestEndpoint.Foo","params":{"a":1,"b":"x"},"id":1})
                .to_string(),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("https://app.example.com")
    );
}

// ── Registry refresh ───────────────────────────────────────────────────────

#[tokio::test]
async fn refresh_picks_up_new_backend_methods() {
    // Two backends behind the same URL is awkward to stage; instead verify
    // that re-running discovery overwrites the entry, which is what the
    // periodic refresh does.
    let backend_url = spawn_rpc_server(rpc_server()).await;
    let gateway = gateway_for(&backend_url).await;

    let before = gateway.registry().lookup("TestEndpoint.Foo").unwrap();
    gateway.add_url(&backend_url).await.expect("refresh");
    let after = gateway.registry().lookup("TestEndpoint.Foo").unwrap();

    assert_eq!(before.entry.original_url, after.entry.original_url);
    assert_eq!(before.method, after.method);
    assert_eq!(gateway.registry().len(), 1);
}
