//! Ingress and egress through the session adapter against scripted native mocks.

use bytes::Bytes;
use futures_util::{stream, StreamExt};
use std::time::Duration;

use gateway_bridge::buffer::BufferHandle;
use gateway_bridge::config::GatewayConfig;
use gateway_bridge::error::AdapterError;
use gateway_bridge::message::{HeaderName, Headers, NeutralResponse};
use gateway_bridge::net::{AddressPreference, ConnectionAddresses, SocketAddress};
use gateway_bridge::session::SessionAdapter;
use gateway_bridge::stream::{BoxError, Phase, StreamError, Subscriber};

mod common;

use common::{inet, MockRequest, Recorder, RecordingWriter, WriterCall};

#[tokio::test]
async fn get_request_is_translated() {
    let adapter = SessionAdapter::default();
    let mut native = MockRequest::new("GET", "/x?a=1&a=2")
        .header("Host", "h")
        .query_param("a", &["1", "2"]);

    let request = adapter.ingress(&mut native);
    native.complete();

    assert_eq!(request.method(), "get");
    assert_eq!(request.protocol(), "HTTP/1.1");
    assert_eq!(request.uri(), "/x?a=1&a=2");
    assert_eq!(request.path(), "/x");
    assert_eq!(request.query().get_all("a"), vec!["1", "2"]);
    assert_eq!(request.headers().first("host"), Some("h"));
    assert_eq!(request.scheme(), "http");
    assert_eq!(request.port(), 8080);
    assert_eq!(request.server_name(), "10.0.0.1");
    assert_eq!(request.client_ip(), "10.0.0.1");
    assert_eq!(native.subscriptions(), 1);

    let body = request.body_stream().unwrap().into_bytes().await.unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn late_consumer_sees_every_chunk() {
    let adapter = SessionAdapter::default();
    let mut native = MockRequest::new("POST", "/upload");
    let request = adapter.ingress(&mut native);

    native.push("he").unwrap();
    native.push("llo").unwrap();
    native.complete();

    let mut body = request.body_stream().unwrap();
    let mut chunks = Vec::new();
    while let Some(chunk) = body.next().await {
        chunks.push(chunk.unwrap().to_bytes());
    }
    assert_eq!(chunks, vec![Bytes::from("he"), Bytes::from("llo")]);

    drop(body);
    drop(request);
    assert_eq!(native.ledger.retains(), native.ledger.releases());
    assert_eq!(native.ledger.freed(), 2);
}

#[tokio::test]
async fn consumer_attached_before_first_push() {
    let adapter = SessionAdapter::default();
    let mut native = MockRequest::new("POST", "/upload");
    let request = adapter.ingress(&mut native);

    let (recorder, record) = Recorder::new();
    let _subscription = request.body().attach(recorder).unwrap();
    native.push("a").unwrap();
    native.push("b").unwrap();
    native.complete();

    let record = record.lock().unwrap();
    assert_eq!(record.items, vec![Bytes::from("a"), Bytes::from("b")]);
    assert!(record.completed);
    assert_eq!(native.ledger.outstanding(), 0);
}

#[tokio::test]
async fn completed_stream_attached_afterwards() {
    let adapter = SessionAdapter::default();
    let mut native = MockRequest::new("PUT", "/doc");
    let request = adapter.ingress(&mut native);

    native.push("one").unwrap();
    native.push("two").unwrap();
    native.push("three").unwrap();
    native.complete();
    assert_eq!(request.body().phase(), Phase::Completed);
    assert_eq!(native.ledger.outstanding(), 3);

    let (recorder, record) = Recorder::new();
    let _subscription = request.body().attach(recorder).unwrap();

    let record = record.lock().unwrap();
    assert_eq!(record.items.len(), 3);
    assert!(record.completed);
    assert_eq!(native.ledger.outstanding(), 0);
}

#[tokio::test]
async fn cancel_stops_delivery_and_releases_later_pushes() {
    let adapter = SessionAdapter::default();
    let mut native = MockRequest::new("POST", "/upload");
    let request = adapter.ingress(&mut native);

    let (recorder, record) = Recorder::new();
    let subscription = request.body().attach(recorder).unwrap();
    native.push("first").unwrap();
    subscription.cancel();
    assert!(!subscription.is_active());

    native.push("second").unwrap();
    native.push("third").unwrap();

    let record = record.lock().unwrap();
    assert_eq!(record.items, vec![Bytes::from("first")]);
    assert!(!record.completed);
    assert_eq!(native.ledger.retains(), native.ledger.releases());
    assert_eq!(native.ledger.freed(), 3);
}

#[tokio::test]
async fn dropping_pull_consumer_releases_cached_chunks() {
    let adapter = SessionAdapter::default();
    let mut native = MockRequest::new("POST", "/upload");
    let request = adapter.ingress(&mut native);

    native.push("k1").unwrap();
    native.push("k2").unwrap();
    native.push("k3").unwrap();

    let mut body = request.body_stream().unwrap();
    let first = body.next().await.unwrap().unwrap();
    assert_eq!(first.bytes(), &Bytes::from("k1"));
    drop(first);
    drop(body);

    assert_eq!(request.body().cached_len(), 0);
    assert_eq!(native.ledger.outstanding(), 0);

    native.push("k4").unwrap();
    native.complete();
    assert_eq!(native.ledger.outstanding(), 0);
}

#[tokio::test]
async fn producer_failure_reaches_consumer() {
    let adapter = SessionAdapter::default();
    let mut native = MockRequest::new("POST", "/upload");
    let request = adapter.ingress(&mut native);

    let (recorder, record) = Recorder::new();
    let _subscription = request.body().attach(recorder).unwrap();
    native.push("x").unwrap();
    native.push("y").unwrap();
    native.fail("connection reset");

    let record = record.lock().unwrap();
    assert_eq!(record.items.len(), 2);
    assert!(!record.completed);
    assert!(record.error.as_deref().unwrap().contains("connection reset"));
    assert_eq!(native.ledger.outstanding(), 0);
}

#[tokio::test]
async fn failing_consumer_stops_the_network_push() {
    struct Refusing;
    impl Subscriber<BufferHandle> for Refusing {
        fn on_next(&mut self, _item: BufferHandle) -> Result<(), BoxError> {
            Err("filter rejected body".into())
        }
        fn on_complete(&mut self) {}
        fn on_error(&mut self, _error: StreamError) {}
    }

    let adapter = SessionAdapter::default();
    let mut native = MockRequest::new("POST", "/upload");
    let request = adapter.ingress(&mut native);
    let subscription = request.body().attach(Refusing).unwrap();

    native.push("first").unwrap();
    assert_eq!(request.body().phase(), Phase::Failed);
    assert!(!subscription.is_active());
    assert!(matches!(native.push("second"), Err(StreamError::Rejected)));
    native.complete();
    assert_eq!(native.ledger.outstanding(), 0);
}

#[tokio::test]
async fn disposing_the_body_notifies_its_consumer() {
    let adapter = SessionAdapter::default();
    let mut native = MockRequest::new("POST", "/upload");
    let request = adapter.ingress(&mut native);

    let (recorder, record) = Recorder::new();
    let _subscription = request.body().attach(recorder).unwrap();
    native.push("a").unwrap();
    request.body().dispose();

    let record = record.lock().unwrap();
    assert_eq!(record.items, vec![Bytes::from("a")]);
    assert!(!record.completed);
    assert!(record.error.as_deref().unwrap().contains("disposed"));
    assert_eq!(native.ledger.outstanding(), 0);
}

#[tokio::test]
async fn second_consumer_is_rejected() {
    let adapter = SessionAdapter::default();
    let mut native = MockRequest::new("POST", "/upload");
    let request = adapter.ingress(&mut native);

    let (recorder, record) = Recorder::new();
    let _subscription = request.body().attach(recorder).unwrap();
    assert!(matches!(
        request.body_stream(),
        Err(StreamError::AlreadyAttached)
    ));

    native.push("still delivered").unwrap();
    native.complete();
    let record = record.lock().unwrap();
    assert_eq!(record.items, vec![Bytes::from("still delivered")]);
    assert!(record.completed);
}

#[tokio::test]
async fn duplicate_headers_and_query_values_survive() {
    let adapter = SessionAdapter::default();
    let mut native = MockRequest::new("GET", "/search?a=1&a=2&b=3")
        .header("X", "1")
        .header("X", "2")
        .query_param("a", &["1", "2"])
        .query_param("b", &["3"]);

    let request = adapter.ingress(&mut native);
    assert_eq!(request.headers().get_all("x"), vec!["1", "2"]);
    assert_eq!(
        request.query().iter().collect::<Vec<_>>(),
        vec![("a", "1"), ("a", "2"), ("b", "3")]
    );

    let inbound = request.inbound().unwrap();
    assert_eq!(inbound.headers, *request.headers());

    let mut writer = RecordingWriter::new();
    let response = NeutralResponse::new(200).with_headers(request.headers().clone());
    adapter.egress(response, &mut writer).await.unwrap();
    assert_eq!(
        writer.calls,
        vec![
            WriterCall::Status(200),
            WriterCall::Header("X".to_string(), "1".to_string()),
            WriterCall::Header("X".to_string(), "2".to_string()),
            WriterCall::Close,
        ]
    );
}

#[tokio::test]
async fn inbound_snapshot_is_unaffected_by_rewrites() {
    let adapter = SessionAdapter::default();
    let mut native = MockRequest::new("GET", "/").header("Cookie", "a=b");
    let mut request = adapter.ingress(&mut native);

    request.headers_mut().remove("cookie");
    request.query_mut().add("added", "1");

    let inbound = request.inbound().unwrap();
    assert_eq!(inbound.headers.first(HeaderName::COOKIE), Some("a=b"));
    assert!(inbound.query.is_empty());
    assert!(!request.headers().contains("cookie"));
}

#[tokio::test]
async fn client_ip_falls_back_to_remote() {
    let adapter = SessionAdapter::default();
    let channel = ConnectionAddresses {
        local: None,
        remote: Some(inet("192.168.1.5:50000")),
    };
    let mut native = MockRequest::new("GET", "/").channel(Some(channel));
    let request = adapter.ingress(&mut native);

    assert_eq!(request.client_ip(), "192.168.1.5");
    assert_eq!(request.port(), 0);
    // No local address: the body carries the translation failure.
    assert_eq!(native.subscriptions(), 0);
    let err = request.body_stream().unwrap().into_bytes().await.unwrap_err();
    assert!(err.to_string().contains("local socket address"));
}

#[tokio::test]
async fn client_ip_is_empty_without_inet_addresses() {
    let adapter = SessionAdapter::default();
    let unix = ConnectionAddresses {
        local: Some(SocketAddress::Unix("/run/gw.sock".into())),
        remote: Some(SocketAddress::Unix("/run/peer.sock".into())),
    };
    let mut native = MockRequest::new("GET", "/").channel(Some(unix));
    assert_eq!(adapter.ingress(&mut native).client_ip(), "");

    let mut native = MockRequest::new("GET", "/").channel(None);
    let request = adapter.ingress(&mut native);
    assert_eq!(request.client_ip(), "");
    assert_eq!(request.server_name(), "");
}

#[tokio::test]
async fn configured_scheme_and_preference_apply() {
    let mut config = GatewayConfig::default();
    config.listener.scheme = "https".to_string();
    config.session.client_ip_preference = AddressPreference::RemoteFirst;
    let adapter = SessionAdapter::new(&config);

    let mut native = MockRequest::new("GET", "/");
    let request = adapter.ingress(&mut native);
    assert_eq!(request.scheme(), "https");
    assert_eq!(request.client_ip(), "192.168.1.5");
}

#[tokio::test]
async fn oversized_body_fails_with_overflow() {
    let mut config = GatewayConfig::default();
    config.session.max_cached_body_bytes = Some(4);
    let adapter = SessionAdapter::new(&config);

    let mut native = MockRequest::new("POST", "/upload");
    let request = adapter.ingress(&mut native);
    native.push("abc").unwrap();
    assert!(matches!(native.push("def"), Err(StreamError::Overflow { limit: 4 })));

    let err = request.body_stream().unwrap().into_bytes().await.unwrap_err();
    assert!(matches!(err, StreamError::Overflow { limit: 4 }));
    assert_eq!(native.ledger.outstanding(), 0);
}

#[tokio::test]
async fn response_is_written_in_order() {
    let adapter = SessionAdapter::default();
    let mut headers = Headers::new();
    headers.add(HeaderName::CONTENT_TYPE, "text/plain");
    let response = NeutralResponse::new(200)
        .with_headers(headers)
        .with_bytes("ok");

    let mut writer = RecordingWriter::new();
    let written = adapter.egress(response, &mut writer).await.unwrap();

    assert_eq!(written.status(), 200);
    assert!(!written.has_body());
    assert_eq!(
        writer.calls,
        vec![
            WriterCall::Status(200),
            WriterCall::Header("Content-Type".to_string(), "text/plain".to_string()),
            WriterCall::Write(Bytes::from("ok")),
            WriterCall::Close,
        ]
    );
}

#[tokio::test]
async fn empty_response_closes_without_writes() {
    let adapter = SessionAdapter::default();
    let mut writer = RecordingWriter::new();
    adapter
        .egress(NeutralResponse::new(204), &mut writer)
        .await
        .unwrap();

    assert_eq!(writer.calls, vec![WriterCall::Status(204), WriterCall::Close]);
}

#[tokio::test]
async fn streamed_request_body_is_echoed() {
    let adapter = SessionAdapter::default();
    let mut native = MockRequest::new("POST", "/echo");
    let request = adapter.ingress(&mut native);
    native.push("ab").unwrap();
    native.push("cd").unwrap();
    native.complete();

    let response = NeutralResponse::new(200).with_body(request.body_stream().unwrap());
    let mut writer = RecordingWriter::new();
    adapter.egress(response, &mut writer).await.unwrap();

    assert_eq!(writer.writes(), vec![Bytes::from("ab"), Bytes::from("cd")]);
    assert_eq!(writer.closes(), 1);
    drop(request);
    assert_eq!(native.ledger.outstanding(), 0);
}

#[tokio::test]
async fn peer_close_is_reported_and_writer_closed() {
    let adapter = SessionAdapter::default();
    let chunks = vec![
        Ok(BufferHandle::new("one")),
        Ok(BufferHandle::new("two")),
        Ok(BufferHandle::new("three")),
    ];
    let response = NeutralResponse::new(200).with_body(stream::iter(chunks));

    let mut writer = RecordingWriter::failing_after(1);
    let err = adapter.egress(response, &mut writer).await.unwrap_err();

    assert!(matches!(err, AdapterError::WriterClosed));
    assert_eq!(writer.writes(), vec![Bytes::from("one")]);
    assert_eq!(writer.calls.last(), Some(&WriterCall::Close));
    assert_eq!(writer.closes(), 1);
}

#[tokio::test]
async fn body_failure_is_reported_and_writer_closed() {
    let adapter = SessionAdapter::default();
    let chunks = vec![Ok(BufferHandle::new("partial")), Err(StreamError::Aborted)];
    let response = NeutralResponse::new(200).with_body(stream::iter(chunks));

    let mut writer = RecordingWriter::new();
    let err = adapter.egress(response, &mut writer).await.unwrap_err();

    assert!(matches!(err, AdapterError::Body(StreamError::Aborted)));
    assert_eq!(writer.writes(), vec![Bytes::from("partial")]);
    assert_eq!(writer.closes(), 1);
}

#[tokio::test]
async fn cancelled_egress_still_closes_writer() {
    let adapter = SessionAdapter::default();
    let response = NeutralResponse::new(200).with_bytes("never flushed");

    let mut writer = RecordingWriter::stalling();
    let outcome =
        tokio::time::timeout(Duration::from_millis(20), adapter.egress(response, &mut writer)).await;

    assert!(outcome.is_err());
    assert_eq!(writer.closes(), 1);
    assert!(writer.writes().is_empty());
}
