//! End-to-end message processing against an in-memory DuckDB store

#![cfg(feature = "duckdb-backend")]

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use coin_ingest::database::RecordStore;
use coin_ingest::schema::{COIN_CRYPTOS_V1, COIN_RANKING_V1};
use coin_ingest::storage::StorageBackend;
use coin_ingest::{
    ArchiveWriter, Disposition, DuckDBStore, FieldSpec, MappingError, MemoryStorageBackend,
    NamePolicy, PersistError, PersistenceWriter, Pipeline, PipelineError, RawPayload,
    SchemaError, SchemaRegistry, TableSchema, WriteResult, map,
};
use serde_json::json;

fn price_schema() -> TableSchema {
    TableSchema::builder("prices.v1", "prices")
        .field(FieldSpec::integer("id"))
        .field(FieldSpec::string("name"))
        .field(FieldSpec::string("symbol"))
        .field(FieldSpec::decimal("price").path("quote.USD.price"))
        .primary_key(["id"])
        .build()
        .unwrap()
}

fn registry() -> Arc<SchemaRegistry> {
    let builtin = SchemaRegistry::builtin().unwrap();
    let mut builder = SchemaRegistry::builder().register(price_schema()).unwrap();
    for id in builtin.ids() {
        builder = builder
            .register(builtin.get(id).unwrap().as_ref().clone())
            .unwrap();
    }
    Arc::new(builder.build())
}

fn pipeline() -> Pipeline {
    Pipeline::new(
        registry(),
        PersistenceWriter::new(Duration::from_secs(5)),
        ArchiveWriter::new(NamePolicy::default(), Duration::from_secs(5)),
    )
}

const EXAMPLE: &str = r#"{"id":1,"name":"Bitcoin","symbol":"BTC","quote":{"USD":{"price":63611.48}}}"#;

#[tokio::test]
async fn test_example_write_then_duplicate_rejected() {
    let store = DuckDBStore::in_memory().unwrap();
    let writer = PersistenceWriter::default();
    let schema = price_schema();
    let record = map(&RawPayload::parse(EXAMPLE).unwrap(), &schema).unwrap();

    let first = writer.write(&record, &schema, &store).await;
    assert_eq!(first, WriteResult::Written { rows_affected: 1 });

    let second = writer.write(&record, &schema, &store).await;
    assert!(second.is_rejected(), "got {second:?}");

    let result = store.execute_query("SELECT count(*) AS n FROM prices").await.unwrap();
    assert_eq!(result.rows[0]["n"], json!(1));
}

#[tokio::test]
async fn test_redelivered_message_is_acked_without_second_row() {
    let store = DuckDBStore::in_memory().unwrap();
    let storage = MemoryStorageBackend::new();
    let pipeline = pipeline();

    let first = pipeline.process(EXAMPLE, "prices.v1", &store, &storage).await.unwrap();
    assert_eq!(first.written(), 1);
    assert_eq!(first.disposition(), Disposition::Ack);

    let again = pipeline.process(EXAMPLE, "prices.v1", &store, &storage).await.unwrap();
    assert_eq!(again.written(), 0);
    assert_eq!(again.rejected(), 1);
    assert_eq!(again.disposition(), Disposition::Ack);
    assert!(again.archive.is_written());
}

#[tokio::test]
async fn test_string_and_native_decimal_store_identically() {
    let store = DuckDBStore::in_memory().unwrap();
    let storage = MemoryStorageBackend::new();
    let pipeline = pipeline();

    let native = r#"{"id":1,"name":"Bitcoin","symbol":"BTC","quote":{"USD":{"price":61161.70}}}"#;
    let string = r#"{"id":2,"name":"Bitcoin","symbol":"BTC","quote":{"USD":{"price":"61161.70"}}}"#;
    pipeline.process(native, "prices.v1", &store, &storage).await.unwrap();
    pipeline.process(string, "prices.v1", &store, &storage).await.unwrap();

    let result = store
        .execute_query("SELECT price FROM prices ORDER BY id")
        .await
        .unwrap();
    assert_eq!(result.rows[0]["price"], result.rows[1]["price"]);
    assert_eq!(result.rows[0]["price"], json!(61161.7));
}

#[tokio::test]
async fn test_archive_succeeds_when_mapping_fails() {
    let store = DuckDBStore::in_memory().unwrap();
    let storage = MemoryStorageBackend::new();

    let missing_symbol = r#"{"id":1,"name":"Bitcoin","quote":{"USD":{"price":1.0}}}"#;
    let outcome = pipeline()
        .process(missing_symbol, "prices.v1", &store, &storage)
        .await
        .unwrap();

    assert_eq!(
        outcome.records,
        Err(PersistError::Mapping(MappingError::MissingRequiredField("symbol".to_string())))
    );
    assert!(outcome.archive.is_written());
    assert_eq!(storage.len().await, 1);
    assert_eq!(outcome.disposition(), Disposition::Ack);
}

#[tokio::test]
async fn test_unknown_schema_is_terminal_but_archived() {
    let store = DuckDBStore::in_memory().unwrap();
    let storage = MemoryStorageBackend::new();

    let outcome = pipeline()
        .process(EXAMPLE, "prices.v2", &store, &storage)
        .await
        .unwrap();
    assert_eq!(
        outcome.records,
        Err(PersistError::Schema(SchemaError::UnknownSchema("prices.v2".to_string())))
    );
    assert_eq!(outcome.disposition(), Disposition::Ack);
    assert!(outcome.archive.is_written());

    let keys = storage.list_files("Minute").await.unwrap();
    assert_eq!(keys.len(), 1);
    let archived: serde_json::Value =
        serde_json::from_slice(&storage.read_file(&keys[0]).await.unwrap()).unwrap();
    assert_eq!(archived["symbol"], json!("BTC"));
    assert!(store.execute_query("SELECT * FROM prices").await.is_err());
}

#[tokio::test]
async fn test_malformed_json_is_never_repaired() {
    let store = DuckDBStore::in_memory().unwrap();
    let storage = MemoryStorageBackend::new();

    let near_json = "{'id': 1, 'name': 'Bitcoin', 'active': True}";
    let err = pipeline()
        .process(near_json, "prices.v1", &store, &storage)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Payload(_)));
}

#[tokio::test]
async fn test_coin_listing_response() {
    let store = DuckDBStore::in_memory().unwrap();
    let storage = MemoryStorageBackend::new();

    let listing = json!({
        "status": {"timestamp": "2024-10-07T08:07:44.594Z", "error_code": 0},
        "data": [
            {
                "id": 1, "name": "Bitcoin", "symbol": "BTC", "slug": "bitcoin",
                "num_market_pairs": 11843, "date_added": "2010-07-13T00:00:00.000Z",
                "tags": ["mineable", "pow"], "max_supply": 21000000,
                "circulating_supply": 19762806, "total_supply": 19762806,
                "infinite_supply": false, "platform": null, "cmc_rank": 1,
                "last_updated": "2024-10-07T08:06:00.000Z",
                "quote": {"USD": {"price": 63611.48, "volume_24h": "27315406731.02", "market_cap": 1257141811340.5}}
            },
            {
                "id": 1027, "name": "Ethereum", "symbol": "ETH", "slug": "ethereum",
                "tags": [], "infinite_supply": true, "cmc_rank": 2,
                "quote": {"USD": {"price": "2466.91"}}
            }
        ]
    })
    .to_string();

    let outcome = pipeline()
        .process(&listing, COIN_CRYPTOS_V1, &store, &storage)
        .await
        .unwrap();
    assert_eq!(outcome.written(), 2);
    assert!(storage.file_exists("Minute/2024-10-07T08-07-44.json").await.unwrap());

    let result = store
        .execute_query("SELECT id, status, price, infinite_supply, tags FROM coin_cryptos ORDER BY id")
        .await
        .unwrap();
    assert_eq!(result.row_count(), 2);
    assert_eq!(result.rows[0]["status"], json!("2024-10-07T08:07:44.594Z"));
    assert_eq!(result.rows[0]["tags"], json!(r#"["mineable","pow"]"#));
    assert_eq!(result.rows[1]["price"], json!(2466.91));
    assert_eq!(result.rows[1]["infinite_supply"], json!(true));
}

#[tokio::test]
async fn test_coin_ranking_single_coin_and_full_response() {
    let store = DuckDBStore::in_memory().unwrap();
    let storage = MemoryStorageBackend::new();
    let pipeline = pipeline();

    let coin = json!({
        "uuid": "Qwsogvtv82FCd", "symbol": "BTC", "name": "Bitcoin",
        "color": "#f7931A", "iconUrl": "https://cdn.coinranking.com/bOabBYkcX/bitcoin_btc.svg",
        "marketCap": "1257141811340", "price": "63611.48", "listedAt": 1330214400,
        "tier": 1, "change": "-0.61", "rank": 1,
        "sparkline": ["63980.12", null, "63611.48"], "lowVolume": false,
        "coinrankingUrl": "https://coinranking.com/coin/Qwsogvtv82FCd+bitcoin-btc",
        "24hVolume": "27315406731", "btcPrice": "1", "contractAddresses": []
    });

    let single = pipeline
        .process(&coin.to_string(), COIN_RANKING_V1, &store, &storage)
        .await
        .unwrap();
    assert_eq!(single.written(), 1);

    // The same snapshot inside the full response hashes to the same key
    let full = json!({"status": "success", "data": {"stats": {"total": 1}, "coins": [coin]}});
    let again = pipeline
        .process(&full.to_string(), COIN_RANKING_V1, &store, &storage)
        .await
        .unwrap();
    assert_eq!(again.rejected(), 1);

    let result = store
        .execute_query("SELECT volume_24h, listed_at, length(record_hash) AS len FROM coin_ranking")
        .await
        .unwrap();
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.rows[0]["volume_24h"], json!(27315406731.0));
    assert_eq!(result.rows[0]["listed_at"], json!("2012-02-26T00:00:00Z"));
    assert_eq!(result.rows[0]["len"], json!(64));
}

#[tokio::test]
async fn test_push_envelope() {
    let store = DuckDBStore::in_memory().unwrap();
    let storage = MemoryStorageBackend::new();

    let body = json!({
        "message": {"data": STANDARD.encode(EXAMPLE), "messageId": "42"},
        "subscription": "projects/p/subscriptions/coins"
    })
    .to_string();

    let outcome = pipeline()
        .process_push(&body, "prices.v1", &store, &storage)
        .await
        .unwrap();
    assert_eq!(outcome.written(), 1);
}

#[tokio::test]
async fn test_schema_drift_is_reported_not_nulled() {
    let store = DuckDBStore::in_memory().unwrap();
    let storage = MemoryStorageBackend::new();

    let drifted = r#"{"id":1,"name":"Bitcoin","symbol":"BTC","quote":{"USD":{"price":"n/a"}}}"#;
    let outcome = pipeline()
        .process(drifted, "prices.v1", &store, &storage)
        .await
        .unwrap();

    match outcome.records {
        Err(PersistError::Mapping(MappingError::TypeMismatch { field, expected, .. })) => {
            assert_eq!(field, "price");
            assert_eq!(expected, "decimal");
        }
        other => panic!("expected type mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_extreme_decimals_are_stored_unchanged() {
    let store = DuckDBStore::in_memory().unwrap();
    let storage = MemoryStorageBackend::new();
    let pipeline = pipeline();

    let tiny = r#"{"id":1,"name":"Dust","symbol":"DST","quote":{"USD":{"price":"0.00000000001"}}}"#;
    let huge = r#"{"id":2,"name":"Inflated","symbol":"INF","quote":{"USD":{"price":1e30}}}"#;
    for text in [tiny, huge] {
        let outcome = pipeline.process(text, "prices.v1", &store, &storage).await.unwrap();
        assert_eq!(outcome.written(), 1, "got {outcome:?}");
    }

    let result = store
        .execute_query("SELECT price FROM prices ORDER BY id")
        .await
        .unwrap();
    assert_eq!(result.rows[0]["price"], json!(1e-11));
    assert_eq!(result.rows[1]["price"], json!(1e30));
}

#[tokio::test]
async fn test_concurrent_first_use_of_a_schema() {
    let store = DuckDBStore::in_memory().unwrap();
    let storage = MemoryStorageBackend::new();
    let (a, b) = (pipeline(), pipeline());

    let eth = r#"{"id":1027,"name":"Ethereum","symbol":"ETH","quote":{"USD":{"price":2466.91}}}"#;
    let (first, second) = tokio::join!(
        a.process(EXAMPLE, "prices.v1", &store, &storage),
        b.process(eth, "prices.v1", &store, &storage)
    );
    assert_eq!(first.unwrap().written(), 1);
    assert_eq!(second.unwrap().written(), 1);

    let result = store.execute_query("SELECT count(*) AS n FROM prices").await.unwrap();
    assert_eq!(result.rows[0]["n"], json!(2));
}
