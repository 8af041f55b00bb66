mod support;

use serde_json::json;
use std::time::Duration;

async fn status(base_url: &str) -> serde_json::Value {
    reqwest::get(format!("{base_url}/status"))
        .await
        .expect("request should succeed")
        .json()
        .await
        .expect("json body")
}

// Single test in this binary: it owns the one match its server runs.
#[tokio::test]
async fn when_seated_user_starts_and_stops_then_clients_follow_the_match() {
    let base_url = support::ensure_server();
    let (mut ada, _hello) = support::join(base_url, "ada").await;
    let (mut bob, hello) = support::join(base_url, "bob").await;

    support::send_json(&mut ada, json!({"type": "pickSeat", "data": {"index": 0}})).await;
    let seats = support::next_of_type(&mut bob, "pickPlayer").await;
    assert_eq!(seats["data"], json!(["ada", null]));

    support::send_json(&mut ada, json!({"type": "start"})).await;
    support::next_of_type(&mut bob, "matchStart").await;

    // Ball plus one seated player: [ballX, ballY, x, y, shoot, seat].
    let positions = support::next_of_type(&mut bob, "positions").await;
    let flat = positions["data"].as_array().expect("flat positions");
    assert_eq!(flat.len(), 6);
    assert_eq!(flat[5], 0);

    let body = status(base_url).await;
    assert_eq!(body["running"], true);
    assert_eq!(body["players"], 1);

    // Options sent mid-match wait for the stop.
    let mut options = hello["data"]["options"].clone();
    options["maxGoal"] = json!(5);
    support::send_json(&mut bob, json!({"type": "options", "data": options})).await;
    support::send_json(&mut bob, json!({"type": "stop"})).await;
    support::next_of_type(&mut ada, "matchStop").await;
    let applied = support::next_of_type(&mut ada, "options").await;
    assert_eq!(applied["data"]["options"]["maxGoal"], 5);
    assert_eq!(applied["data"]["ground"]["borders"].as_array().map(Vec::len), Some(6));

    let mut running = true;
    for _ in 0..50 {
        running = status(base_url).await["running"] == true;
        if !running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!running);
}
