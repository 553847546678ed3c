use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use fapi_trader::audit::AuditKind;
use fapi_trader::sign::REDACTED;
use fapi_trader::{
    BinanceClient, ClientConfig, Credentials, ExchangeError, MemoryAuditSink, NetworkPhase,
    OrderService, OrderType, PlacementStatus, Side, TimeInForce,
};
use httpmock::prelude::*;
use rust_decimal_macros::dec;
use serde_json::json;

const API_KEY: &str = "test-api-key";
const API_SECRET: &str = "test-api-secret";

fn client_for(base_url: &str, timeout: Duration) -> (BinanceClient, MemoryAuditSink) {
    let audit = MemoryAuditSink::new();
    let client = BinanceClient::with_audit_sink(
        Credentials::new(API_KEY, API_SECRET),
        ClientConfig::new(base_url).with_timeout(timeout),
        Arc::new(audit.clone()),
    )
    .unwrap();
    (client, audit)
}

fn filled_market_order() -> serde_json::Value {
    json!({
        "orderId": 123,
        "symbol": "BTCUSDT",
        "status": "FILLED",
        "clientOrderId": "x-abc",
        "price": "0",
        "avgPrice": "64000.10",
        "origQty": "0.001",
        "executedQty": "0.001",
        "type": "MARKET",
        "side": "BUY",
        "updateTime": 1700000000000i64
    })
}

#[test]
fn test_connectivity_ok() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/fapi/v1/time");
        then.status(200).json_body(json!({"serverTime": 1700000000123i64}));
    });

    let (client, audit) = client_for(&server.base_url(), Duration::from_secs(5));
    assert!(client.test_connectivity().unwrap());
    assert_eq!(client.server_time().unwrap(), 1700000000123);

    let entries = audit.entries();
    assert_eq!(entries[0].kind, AuditKind::Request);
    assert_eq!(entries[1].status, Some(200));
}

#[test]
fn test_connectivity_non_200_is_network_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/fapi/v1/time");
        then.status(503).body("Service Unavailable");
    });

    let (client, _) = client_for(&server.base_url(), Duration::from_secs(5));
    let err = client.test_connectivity().unwrap_err();
    match err {
        ExchangeError::Network(e) => assert!(e.message.contains("HTTP 503")),
        other => panic!("expected network error, got {:?}", other),
    }
}

#[test]
fn test_connectivity_unreadable_body_is_network_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/fapi/v1/time");
        then.status(200).body("<html>maintenance</html>");
    });

    let (client, _) = client_for(&server.base_url(), Duration::from_secs(5));
    assert!(matches!(
        client.test_connectivity(),
        Err(ExchangeError::Network(_))
    ));
}

#[test]
fn test_market_order_is_signed_and_parsed() {
    let server = MockServer::start();
    let order = server.mock(|when, then| {
        when.method(POST)
            .path("/fapi/v1/order")
            .header("x-mbx-apikey", API_KEY)
            .query_param("symbol", "BTCUSDT")
            .query_param("side", "BUY")
            .query_param("type", "MARKET")
            .query_param("quantity", "0.001")
            .query_param("recvWindow", "5000")
            .query_param_exists("timestamp")
            .query_param_exists("signature");
        then.status(200).json_body(filled_market_order());
    });

    let (client, audit) = client_for(&server.base_url(), Duration::from_secs(5));
    let response = client
        .place_order("BTCUSDT", Side::Buy, OrderType::Market, dec!(0.001), None, None)
        .unwrap();
    order.assert();

    assert_eq!(response.order_id, 123);
    assert_eq!(response.status, "FILLED");
    assert_eq!(response.quantity, "0.001");
    assert_eq!(response.avg_price.as_deref(), Some("64000.10"));

    let entries = audit.entries();
    assert_eq!(entries.len(), 2);
    let keys: Vec<&str> = entries[0].params.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(
        keys,
        ["symbol", "side", "type", "quantity", "timestamp", "recvWindow", "signature"]
    );
    assert_eq!(entries[0].params[6].1, REDACTED);
}

#[test]
fn test_limit_order_sends_price_and_tif() {
    let server = MockServer::start();
    let order = server.mock(|when, then| {
        when.method(POST)
            .path("/fapi/v1/order")
            .query_param("type", "LIMIT")
            .query_param("price", "3500.5")
            .query_param("timeInForce", "IOC")
            .query_param("quantity", "0.01");
        then.status(200).json_body(json!({
            "orderId": 9,
            "symbol": "ETHUSDT",
            "status": "NEW",
            "side": "SELL",
            "type": "LIMIT",
            "origQty": "0.010",
            "executedQty": "0.000",
            "price": "3500.50"
        }));
    });

    let (client, _) = client_for(&server.base_url(), Duration::from_secs(5));
    let response = client
        .place_order(
            "ETHUSDT",
            Side::Sell,
            OrderType::Limit,
            dec!(0.0100),
            Some(dec!(3500.50)),
            Some(TimeInForce::Ioc),
        )
        .unwrap();
    order.assert();

    assert_eq!(response.price.as_deref(), Some("3500.50"));
    assert_eq!(response.quantity, "0.010");
}

#[test]
fn test_rejection_maps_to_client_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/fapi/v1/order");
        then.status(400)
            .json_body(json!({"code": -1013, "msg": "Invalid quantity"}));
    });

    let (client, audit) = client_for(&server.base_url(), Duration::from_secs(5));
    let err = client
        .place_order("BTCUSDT", Side::Buy, OrderType::Market, dec!(0.001), None, None)
        .unwrap_err();

    let api = err.api_error().expect("client error");
    assert_eq!(api.code, -1013);
    assert_eq!(api.msg, "Invalid quantity");
    assert_eq!(err.placement_status(), PlacementStatus::NotPlaced);

    let entries = audit.entries();
    assert_eq!(entries[1].status, Some(400));
    assert!(entries[1].body.as_deref().unwrap().contains("-1013"));
}

#[test]
fn test_rejection_without_fields_uses_defaults() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/fapi/v1/order");
        then.status(401).json_body(json!({}));
    });

    let (client, _) = client_for(&server.base_url(), Duration::from_secs(5));
    let err = client
        .place_order("BTCUSDT", Side::Buy, OrderType::Market, dec!(1), None, None)
        .unwrap_err();
    let api = err.api_error().expect("client error");
    assert_eq!(api.code, -1);
    assert_eq!(api.msg, "Unknown error");
}

#[test]
fn test_timeout_after_send_is_in_flight() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/fapi/v1/order");
        then.status(200)
            .delay(Duration::from_secs(3))
            .json_body(filled_market_order());
    });

    let (client, audit) = client_for(&server.base_url(), Duration::from_millis(300));
    let err = client
        .place_order("BTCUSDT", Side::Buy, OrderType::Market, dec!(0.001), None, None)
        .unwrap_err();

    match &err {
        ExchangeError::Network(e) => {
            assert_eq!(e.phase, NetworkPhase::InFlight);
            assert!(e.message.contains("may or may not have been placed"));
        }
        other => panic!("expected network error, got {:?}", other),
    }
    assert_eq!(err.placement_status(), PlacementStatus::Unknown);
    assert_eq!(audit.entries().last().unwrap().kind, AuditKind::TransportFailure);
}

#[test]
fn test_refused_connection_is_pre_send() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let (client, _) = client_for(&format!("http://{}", addr), Duration::from_secs(2));
    let err = client
        .place_order("BTCUSDT", Side::Buy, OrderType::Market, dec!(0.001), None, None)
        .unwrap_err();

    match &err {
        ExchangeError::Network(e) => {
            assert_eq!(e.phase, NetworkPhase::PreSend);
            assert!(!e.message.contains("may or may not"));
        }
        other => panic!("expected network error, got {:?}", other),
    }
    assert_eq!(err.placement_status(), PlacementStatus::NotPlaced);

    assert!(matches!(
        client.test_connectivity(),
        Err(ExchangeError::Network(ref e)) if e.phase == NetworkPhase::PreSend
    ));
}

#[test]
fn test_secret_and_signature_never_audited() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/fapi/v1/order");
        then.status(400)
            .json_body(json!({"code": -2019, "msg": "Margin is insufficient."}));
    });

    let (client, audit) = client_for(&server.base_url(), Duration::from_secs(5));
    let _ = client.place_order("BTCUSDT", Side::Buy, OrderType::Market, dec!(5), None, None);

    let dump = format!("{:?}", audit.entries());
    assert!(!dump.contains(API_SECRET));
    for entry in audit.entries() {
        for (key, value) in &entry.params {
            if key == "signature" {
                assert_eq!(value, REDACTED);
            }
        }
    }
}

#[test]
fn test_service_end_to_end() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/fapi/v1/order")
            .query_param("symbol", "BTCUSDT");
        then.status(200).json_body(filled_market_order());
    });

    let (client, _) = client_for(&server.base_url(), Duration::from_secs(5));
    let service = OrderService::default();
    let request = service
        .create_order_request("btcusdt", "buy", "market", "0.001", Some("99999"))
        .unwrap();
    let response = service.place_validated_order(&client, &request).unwrap();
    assert_eq!(response.order_id, 123);
    client.close();
}

#[test]
fn test_service_wraps_rejection() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/fapi/v1/order");
        then.status(400)
            .json_body(json!({"code": -1121, "msg": "Invalid symbol."}));
    });

    let (client, _) = client_for(&server.base_url(), Duration::from_secs(5));
    let service = OrderService::default();
    let request = service
        .create_order_request("FAKEUSDT", "SELL", "LIMIT", "1", Some("1.5"))
        .unwrap();
    let err = service
        .place_validated_order(&client, &request)
        .unwrap_err();

    assert_eq!(err.cause.api_error().map(|e| e.code), Some(-1121));
    assert_eq!(
        err.to_string(),
        "Order placement failed: API Error -1121: Invalid symbol."
    );
}
