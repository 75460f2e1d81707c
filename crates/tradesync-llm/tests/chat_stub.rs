use axum::{http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tradesync_core::{TradeRecord, TradeSide};
use tradesync_llm::{AnalysisKind, Error, LlmClient, LlmConfig};

fn chat_reply(content: &str) -> Value {
    json!({
        "choices": [{"message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 120, "completion_tokens": 48, "total_tokens": 168}
    })
}

async fn spawn_stub(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr) -> LlmClient {
    let config = LlmConfig::new("sk-test")
        .with_base_url(format!("http://{}/v1", addr))
        .with_timeouts(Duration::from_millis(300), Duration::from_millis(300));
    LlmClient::new(config).unwrap()
}

#[tokio::test]
async fn parses_fenced_trades_and_reports_usage() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["response_format"]["type"], "json_object");
            assert_eq!(body["messages"][1]["content"], "Bought 10 AAPL @ 189.50");
            Json(chat_reply(
                "```json\n{\"trades\":[{\"symbol\":\"AAPL\",\"side\":\"buy\",\"quantity\":10,\"price\":189.5}]}\n```",
            ))
        }),
    );
    let client = client_for(spawn_stub(router).await);

    let completion = client.parse_trades("Bought 10 AAPL @ 189.50").await.unwrap();
    assert_eq!(completion.value.len(), 1);
    assert_eq!(completion.value[0].side, TradeSide::Buy);
    assert_eq!(completion.usage.prompt_tokens, 120);
    assert_eq!(completion.usage.completion_tokens, 48);
}

#[tokio::test]
async fn surfaces_model_rejection() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            Json(chat_reply(
                r#"{"error":"NOT_TRADE_DATA","message":"No trades found"}"#,
            ))
        }),
    );
    let client = client_for(spawn_stub(router).await);

    let err = client.parse_trades("hello there").await.unwrap_err();
    assert_eq!(err.code(), "NOT_TRADE_DATA");
}

#[tokio::test]
async fn maps_api_errors() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::TOO_MANY_REQUESTS, "Rate limit reached") }),
    );
    let client = client_for(spawn_stub(router).await);

    match client.parse_trades("Bought 1 MSFT").await {
        Err(Error::Api { status, .. }) => assert_eq!(status, 429),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn slow_provider_times_out() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(chat_reply("{}"))
        }),
    );
    let client = client_for(spawn_stub(router).await);

    let trades = vec![TradeRecord {
        symbol: "NVDA".to_string(),
        side: TradeSide::Sell,
        quantity: 2.0,
        price: 131.0,
        executed_at: None,
        fees: None,
        pnl: Some(40.0),
        currency: None,
        notes: None,
        notion_page_id: None,
    }];

    let err = client
        .analyze(&trades, AnalysisKind::Session)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(300)));
}

#[tokio::test]
async fn decodes_analysis() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|Json(body): Json<Value>| async move {
            let user: Value =
                serde_json::from_str(body["messages"][1]["content"].as_str().unwrap()).unwrap();
            assert_eq!(user["analysisKind"], "risk");
            Json(chat_reply(
                r#"{"summary":"Consistent sizing","insights":["Stops respected"],"suggestions":[],"score":78}"#,
            ))
        }),
    );
    let client = client_for(spawn_stub(router).await);

    let completion = client.analyze(&[], AnalysisKind::Risk).await.unwrap();
    assert_eq!(completion.value.summary, "Consistent sizing");
    assert_eq!(completion.value.score, Some(78.0));
}
