//! Integration tests for the JSON-RPC client

use extractor::{BlockchainClient, RpcClient};
use mockito::{Matcher, Server};
use primitives::Chain;
use serde_json::json;
use url::Url;

fn rpc_result(result: serde_json::Value) -> String {
    json!({ "jsonrpc": "2.0", "id": 0, "result": result }).to_string()
}

fn block_ref(number: u64, l1_number: u64) -> serde_json::Value {
    json!({
        "hash": format!("0x{number:064x}"),
        "number": number,
        "timestamp": 1_700_000_000 + number,
        "l1origin": { "hash": format!("0x{l1_number:064x}"), "number": l1_number }
    })
}

#[tokio::test]
async fn sync_status_is_served_by_the_rollup_node() {
    let mut rpc = Server::new_async().await;
    let mut node = Server::new_async().await;
    let height = rpc
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({ "method": "eth_blockNumber" })))
        .with_status(200)
        .with_body(rpc_result(json!("0x2a")))
        .create_async()
        .await;
    let status = node
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({ "method": "optimism_syncStatus" })))
        .with_status(200)
        .with_body(rpc_result(json!({
            "safe_l2": block_ref(40, 900),
            "finalized_l2": block_ref(30, 880),
        })))
        .create_async()
        .await;

    let client = RpcClient::new(Chain::Optimism, Url::parse(&rpc.url()).unwrap())
        .unwrap()
        .with_rollup_node(Url::parse(&node.url()).unwrap());

    assert_eq!(client.current_height().await.unwrap(), 42);
    let sync = client.sync_status().await.unwrap();
    assert_eq!(sync.safe_l2.number, 40);
    assert_eq!(sync.safe_l2.l1origin.number, 900);
    assert_eq!(sync.finalized_l2.number, 30);

    height.assert_async().await;
    status.assert_async().await;
}

#[tokio::test]
async fn rpc_errors_are_reported() {
    let mut rpc = Server::new_async().await;
    let _mock = rpc
        .mock("POST", "/")
        .with_status(200)
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 0,
                "error": { "code": -32601, "message": "method not found" }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = RpcClient::new(Chain::PolygonZkEvm, Url::parse(&rpc.url()).unwrap()).unwrap();
    let err = client.batch_by_number(7).await.unwrap_err();
    assert!(format!("{err:#}").contains("zkevm_getBatchByNumber"));
}
