//! Built-in schemas for the two upstream response shapes
//!
//! - `coin_cryptos.v1`: the coin-listing response
//!   (`{"status": {"timestamp": ..}, "data": [ {..}, .. ]}`), one row per
//!   listed coin per pull.
//! - `coin_ranking.v1`: the coin-ranking record, delivered either as a single
//!   coin object or as the full `{"data": {"coins": [..]}}` response.

use super::field::FieldSpec;
use super::table::TableSchema;
use super::SchemaResult;
use crate::mapping::MappedValue;

/// Id of the coin-listing schema
pub const COIN_CRYPTOS_V1: &str = "coin_cryptos.v1";

/// Id of the coin-ranking schema
pub const COIN_RANKING_V1: &str = "coin_ranking.v1";

const USD_QUOTE_COLUMNS: &[&str] = &[
    "volume_24h",
    "volume_change_24h",
    "percent_change_1h",
    "percent_change_24h",
    "percent_change_7d",
    "percent_change_30d",
    "percent_change_60d",
    "percent_change_90d",
    "market_cap",
    "market_cap_dominance",
    "fully_diluted_market_cap",
    "tvl",
];

fn empty_json_array() -> MappedValue {
    MappedValue::Json("[]".to_string())
}

pub fn coin_cryptos_v1() -> SchemaResult<TableSchema> {
    let quote = USD_QUOTE_COLUMNS
        .iter()
        .map(|column| FieldSpec::decimal(*column).path(format!("quote.USD.{column}")).nullable());

    TableSchema::builder(COIN_CRYPTOS_V1, "coin_cryptos")
        .records_at("data")
        .field(FieldSpec::timestamp("status").from_envelope("status.timestamp"))
        .field(FieldSpec::integer("id"))
        .field(FieldSpec::string("name"))
        .field(FieldSpec::string("symbol"))
        .field(FieldSpec::string("slug"))
        .field(FieldSpec::integer("num_market_pairs").nullable())
        .field(FieldSpec::timestamp("date_added").nullable())
        .field(FieldSpec::json("tags").default_value(empty_json_array()))
        .field(FieldSpec::decimal("max_supply").nullable())
        .field(FieldSpec::decimal("circulating_supply").nullable())
        .field(FieldSpec::decimal("total_supply").nullable())
        .field(FieldSpec::boolean("infinite_supply").default_value(MappedValue::Boolean(false)))
        .field(FieldSpec::json("platform").nullable())
        .field(FieldSpec::integer("cmc_rank").nullable())
        .field(FieldSpec::decimal("self_reported_circulating_supply").nullable())
        .field(FieldSpec::decimal("self_reported_market_cap").nullable())
        .field(FieldSpec::decimal("tvl_ratio").nullable())
        .field(FieldSpec::timestamp("last_updated").nullable())
        .field(FieldSpec::decimal("price").path("quote.USD.price"))
        .fields(quote)
        .primary_key(["id", "status"])
        .build()
}

pub fn coin_ranking_v1() -> SchemaResult<TableSchema> {
    TableSchema::builder(COIN_RANKING_V1, "coin_ranking")
        .records_at("data.coins")
        .field(FieldSpec::string("record_hash").content_hash())
        .field(FieldSpec::string("uuid"))
        .field(FieldSpec::string("symbol"))
        .field(FieldSpec::string("name"))
        .field(FieldSpec::string("color").nullable())
        .field(FieldSpec::string("icon_url").path("iconUrl").nullable())
        .field(FieldSpec::decimal("market_cap").path("marketCap").nullable())
        .field(FieldSpec::decimal("price"))
        .field(FieldSpec::timestamp("listed_at").path("listedAt").nullable())
        .field(FieldSpec::integer("tier").nullable())
        .field(FieldSpec::decimal("change").nullable())
        .field(FieldSpec::integer("rank").nullable())
        .field(FieldSpec::json("sparkline").default_value(empty_json_array()))
        .field(FieldSpec::boolean("low_volume").path("lowVolume").default_value(MappedValue::Boolean(false)))
        .field(FieldSpec::string("coinranking_url").path("coinrankingUrl").nullable())
        .field(FieldSpec::decimal("volume_24h").nullable())
        .field(FieldSpec::decimal("btc_price").path("btcPrice").nullable())
        .field(
            FieldSpec::json("contract_addresses")
                .path("contractAddresses")
                .default_value(empty_json_array()),
        )
        .rename("24hVolume", "volume_24h")
        .primary_key(["record_hash"])
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SemanticType;

    #[test]
    fn test_coin_cryptos_columns() {
        let schema = coin_cryptos_v1().unwrap();
        assert_eq!(schema.table(), "coin_cryptos");
        assert_eq!(schema.records_at(), Some("data"));
        assert_eq!(schema.fields().len(), 31);
        assert_eq!(
            schema.field("price").unwrap().source_path(),
            Some("quote.USD.price")
        );
        assert_eq!(
            schema.field("tvl").unwrap().source_path(),
            Some("quote.USD.tvl")
        );
    }

    #[test]
    fn test_coin_ranking_volume_alias() {
        let schema = coin_ranking_v1().unwrap();
        let volume = schema.field("volume_24h").unwrap();
        assert_eq!(volume.semantic_type, SemanticType::Decimal);
        let candidates: Vec<&str> = volume.source.candidates().collect();
        assert_eq!(candidates, vec!["volume_24h", "24hVolume"]);
    }

    #[test]
    fn test_coin_ranking_keyed_by_content() {
        let schema = coin_ranking_v1().unwrap();
        assert_eq!(schema.primary_key(), ["record_hash".to_string()]);
    }
}
