//! Invocation flows across operations, including concurrent callers.

use std::sync::Arc;
use std::thread;

use sacc_batch::BatchConfig;
use sacc_chaincode::{Chaincode, ChaincodeConfig, Invocation, Response};
use sacc_store::InMemoryWorldState;
use serde_json::{json, Value};

fn setup(threshold: u64) -> (Arc<InMemoryWorldState>, Arc<Chaincode>) {
    let store = Arc::new(InMemoryWorldState::new());
    let config = ChaincodeConfig {
        batch: BatchConfig::count_only(threshold),
        ..Default::default()
    };
    let cc = Arc::new(Chaincode::with_default_handlers(store.clone(), config));
    (store, cc)
}

fn ok(r: Response) -> Value {
    assert!(r.is_ok(), "{} {:?}", r.status, r.message);
    r.payload.unwrap_or(Value::Null)
}

#[test]
fn concurrent_batch_records_add_up() {
    let (store, cc) = setup(5);
    for i in 0..10 {
        ok(cc.call("init", [format!("asset{i}"), "0".to_string()]));
    }

    let workers: Vec<_> = (0..4)
        .map(|w| {
            let cc = Arc::clone(&cc);
            thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("asset{}", (w * 3 + i) % 10);
                    let r = cc.call("batchRecord", [key, "1".to_string()]);
                    assert!(r.is_ok());
                }
            })
        })
        .collect();
    for w in workers {
        w.join().expect("worker panicked");
    }

    let total: i64 = (0..10)
        .map(|i| ok(cc.call("read", [format!("asset{i}")]))["value"].as_i64().unwrap())
        .sum();
    assert_eq!(total, 400);

    ok(cc.call("batchFlush", Vec::<String>::new()));
    let rows = ok(cc.call("rangeQuery", ["asset", "asset~"]));
    let stored: i64 = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["Record"]["value"].as_i64().unwrap())
        .sum();
    assert_eq!(stored, 400);
    assert!(cc.buffer().flush_count() > 1);
    assert_eq!(store.open_iterators(), 0);
}

#[test]
fn scripted_session_from_json() {
    let (_, cc) = setup(25);
    let script = [
        r#"{"function":"init","args":["x","1"]}"#,
        r#"{"function":"batchRecord","args":["x","4"]}"#,
        r#"{"function":"batchRecord","args":["y","-2"]}"#,
        r#"{"function":"batchStatus"}"#,
    ];
    let responses: Vec<Response> = script
        .iter()
        .map(|line| {
            let inv: Invocation = serde_json::from_str(line).unwrap();
            cc.invoke(&inv)
        })
        .collect();
    assert!(responses.iter().all(Response::is_ok));

    let status = responses[3].payload.clone().unwrap();
    assert_eq!(
        status["Pending"],
        json!([{"Key": "x", "Delta": 4}, {"Key": "y", "Delta": -2}])
    );
    assert_eq!(status["PendingOps"], 2);

    ok(cc.call("batchFlush", Vec::<String>::new()));
    assert_eq!(ok(cc.call("read", ["x"]))["value"], 5);
    assert_eq!(ok(cc.call("read", ["y"]))["value"], -2);
    let history = ok(cc.call("history", ["x"]));
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[test]
fn range_pagination_walks_all_keys() {
    let (_, cc) = setup(25);
    for k in ["a", "b", "c", "d", "e"] {
        ok(cc.call("init", [k, "1"]));
    }
    let first = ok(cc.call("rangeQueryPaginated", ["", "", "3", ""]));
    assert_eq!(first["ResponseMetadata"]["RecordsCount"], 3);
    let bookmark = first["ResponseMetadata"]["Bookmark"].as_str().unwrap().to_string();
    let second = ok(cc.call("rangeQueryPaginated", ["", "", "3", bookmark.as_str()]));
    assert_eq!(second["ResponseMetadata"]["RecordsCount"], 2);
    assert_eq!(second["Results"][0]["Key"], "d");

    let bookmark = second["ResponseMetadata"]["Bookmark"].as_str().unwrap().to_string();
    let empty = ok(cc.call("rangeQueryPaginated", ["", "", "3", bookmark.as_str()]));
    assert_eq!(empty["ResponseMetadata"]["RecordsCount"], 0);
    assert_eq!(empty["ResponseMetadata"]["Bookmark"], bookmark.as_str());
}
