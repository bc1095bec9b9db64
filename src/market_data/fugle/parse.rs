// =============================================================================
// Response parsing — Fugle Market Data v1.0 JSON payloads
// =============================================================================
//
// Numbers arrive as JSON numbers, occasionally as numeric strings; missing
// prices default to 0 so that `Quote::current_price` and friends can fall
// back in a single place.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use tracing::warn;

use crate::market_data::candle::sort_chronological;
use crate::market_data::{
    BookLevel, Candle, OrderBookSnapshot, PriceVolume, Quote, SnapshotRow, TickHint, TradePrint,
};

/// Parse a JSON value that may be either a number or a numeric string.
fn num(val: &Value) -> Option<f64> {
    match val {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn num_or_zero(val: &Value) -> f64 {
    num(val).filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Lots / sizes: non-negative integers, rounded when the feed sends floats.
fn lots(val: &Value) -> u64 {
    match num(val) {
        Some(v) if v.is_finite() && v > 0.0 => v.round() as u64,
        _ => 0,
    }
}

/// Epoch milliseconds from either an RFC 3339 timestamp or a bare date.
fn parse_date_ms(raw: &str) -> Result<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.timestamp_millis());
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("unrecognised date '{raw}'"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .context("invalid midnight for date")?;
    Ok(midnight.and_utc().timestamp_millis())
}

fn levels(val: &Value) -> Vec<BookLevel> {
    val.as_array()
        .map(|arr| {
            arr.iter()
                .map(|l| BookLevel::new(num_or_zero(&l["price"]), lots(&l["size"])))
                .collect()
        })
        .unwrap_or_default()
}

/// GET /intraday/quote/{symbol}
pub fn parse_quote(body: &Value) -> Result<Quote> {
    let symbol = body["symbol"]
        .as_str()
        .context("missing field symbol")?
        .to_string();

    let last_price = num_or_zero(&body["lastPrice"]);
    let close_price = num_or_zero(&body["closePrice"]);

    let mut book = OrderBookSnapshot::new(
        levels(&body["bids"]),
        levels(&body["asks"]),
        if last_price > 0.0 { last_price } else { close_price },
    );
    book.normalize();

    Ok(Quote {
        symbol,
        name: body["name"].as_str().unwrap_or_default().to_string(),
        open_price: num_or_zero(&body["openPrice"]),
        high_price: num_or_zero(&body["highPrice"]),
        low_price: num_or_zero(&body["lowPrice"]),
        close_price,
        last_price,
        avg_price: num_or_zero(&body["avgPrice"]),
        previous_close: num_or_zero(&body["previousClose"]),
        reference_price: num_or_zero(&body["referencePrice"]),
        change: num_or_zero(&body["change"]),
        change_percent: num_or_zero(&body["changePercent"]),
        trade_volume: lots(&body["total"]["tradeVolume"]),
        book,
    })
}

/// GET /historical/candles/{symbol} and /intraday/candles/{symbol}.
///
/// The historical endpoint lists newest first; the result is always sorted
/// oldest first.
pub fn parse_candles(body: &Value) -> Result<Vec<Candle>> {
    let raw = body["data"]
        .as_array()
        .context("candles response has no data array")?;

    let mut candles = Vec::with_capacity(raw.len());
    for entry in raw {
        let Some(date) = entry["date"].as_str() else {
            warn!("skipping candle without a date");
            continue;
        };
        let timestamp = match parse_date_ms(date) {
            Ok(ts) => ts,
            Err(e) => {
                warn!(error = %e, "skipping candle with bad date");
                continue;
            }
        };
        candles.push(Candle::new(
            timestamp,
            num_or_zero(&entry["open"]),
            num_or_zero(&entry["high"]),
            num_or_zero(&entry["low"]),
            num_or_zero(&entry["close"]),
            lots(&entry["volume"]),
        ));
    }

    sort_chronological(&mut candles);
    Ok(candles)
}

/// GET /intraday/trades/{symbol}
pub fn parse_trades(body: &Value) -> Result<Vec<TradePrint>> {
    let raw = body["data"]
        .as_array()
        .context("trades response has no data array")?;

    Ok(raw
        .iter()
        .map(|t| TradePrint {
            time: t["time"].as_i64().unwrap_or(0),
            price: num_or_zero(&t["price"]),
            size: lots(&t["size"]),
            tick: TickHint::parse(&t["tick"]),
            bid: num(&t["bid"]).filter(|p| *p > 0.0),
            ask: num(&t["ask"]).filter(|p| *p > 0.0),
        })
        .collect())
}

/// GET /snapshot/quotes/{market}
pub fn parse_snapshot(body: &Value) -> Result<Vec<SnapshotRow>> {
    let raw = body["data"]
        .as_array()
        .context("snapshot response has no data array")?;

    Ok(raw
        .iter()
        .filter_map(|row| {
            let symbol = row["symbol"].as_str()?.to_string();
            Some(SnapshotRow {
                symbol,
                name: row["name"].as_str().unwrap_or_default().to_string(),
                close_price: num_or_zero(&row["closePrice"]),
                change_percent: num_or_zero(&row["changePercent"]),
                trade_volume: lots(&row["tradeVolume"]),
            })
        })
        .collect())
}

/// GET /intraday/volumes/{symbol}
pub fn parse_volumes(body: &Value) -> Result<Vec<PriceVolume>> {
    let raw = body["data"]
        .as_array()
        .context("volumes response has no data array")?;

    Ok(raw
        .iter()
        .map(|row| PriceVolume {
            price: num_or_zero(&row["price"]),
            volume: lots(&row["volume"]),
            volume_at_bid: lots(&row["volumeAtBid"]),
            volume_at_ask: lots(&row["volumeAtAsk"]),
        })
        .collect())
}

/// GET /intraday/tickers.  Only symbol and name are present; prices and
/// volume stay 0.
pub fn parse_tickers(body: &Value) -> Result<Vec<SnapshotRow>> {
    let raw = body["data"]
        .as_array()
        .context("tickers response has no data array")?;

    Ok(raw
        .iter()
        .filter_map(|row| {
            Some(SnapshotRow {
                symbol: row["symbol"].as_str()?.to_string(),
                name: row["name"].as_str().unwrap_or_default().to_string(),
                ..Default::default()
            })
        })
        .collect())
}

/// GET /intraday/ticker/{symbol}
pub fn parse_ticker_name(body: &Value) -> Result<String> {
    body["name"]
        .as_str()
        .map(str::to_string)
        .context("ticker response has no name")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_quote_ok() {
        let body = json!({
            "date": "2024-03-01",
            "symbol": "2330",
            "name": "台積電",
            "referencePrice": 690,
            "previousClose": 690,
            "openPrice": 692,
            "highPrice": 700,
            "lowPrice": 689,
            "closePrice": 698,
            "lastPrice": 698,
            "avgPrice": 695.12,
            "change": 8,
            "changePercent": 1.16,
            "bids": [
                {"price": 697, "size": 120},
                {"price": 698, "size": 80}
            ],
            "asks": [
                {"price": 699, "size": 50},
                {"price": 700, "size": 300}
            ],
            "total": {"tradeValue": 1.0e10, "tradeVolume": 25123}
        });
        let q = parse_quote(&body).unwrap();
        assert_eq!(q.symbol, "2330");
        assert_eq!(q.name, "台積電");
        assert_eq!(q.trade_volume, 25123);
        assert_eq!(q.current_price(), Some(698.0));
        // Bids re-sorted best first.
        assert_eq!(q.book.bids[0].price, 698.0);
        assert_eq!(q.book.asks[0].size, 50);
        assert_eq!(q.book.last_price, 698.0);
    }

    #[test]
    fn parse_quote_requires_symbol() {
        assert!(parse_quote(&json!({"name": "x"})).is_err());
    }

    #[test]
    fn parse_historical_candles_sorted_oldest_first() {
        let body = json!({
            "symbol": "2330",
            "data": [
                {"date": "2024-03-04", "open": 700, "high": 705, "low": 698, "close": 703, "volume": 30000},
                {"date": "2024-03-01", "open": 692, "high": 700, "low": 689, "close": 698, "volume": "25123"}
            ]
        });
        let candles = parse_candles(&body).unwrap();
        assert_eq!(candles.len(), 2);
        assert!(candles[0].timestamp < candles[1].timestamp);
        assert_eq!(candles[0].close, 698.0);
        assert_eq!(candles[0].volume, 25123);
    }

    #[test]
    fn parse_intraday_candles_rfc3339() {
        let body = json!({
            "data": [
                {"date": "2024-03-01T09:00:00.000+08:00", "open": 692, "high": 693, "low": 691, "close": 692.5, "volume": 812},
                {"date": "not-a-date", "open": 1, "high": 1, "low": 1, "close": 1, "volume": 1}
            ]
        });
        let candles = parse_candles(&body).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].timestamp, 1_709_254_800_000);
    }

    #[test]
    fn parse_trades_with_optional_fields() {
        let body = json!({
            "data": [
                {"bid": 697, "ask": 698, "price": 698, "size": 60, "time": 1709258400000000i64},
                {"price": 697, "size": 5, "tick": "down"}
            ]
        });
        let trades = parse_trades(&body).unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].bid, Some(697.0));
        assert_eq!(trades[0].tick, None);
        assert_eq!(trades[1].tick, Some(TickHint::Down));
        assert_eq!(trades[1].ask, None);
    }

    #[test]
    fn parse_snapshot_skips_rows_without_symbol() {
        let body = json!({
            "data": [
                {"symbol": "2330", "name": "台積電", "closePrice": 698, "changePercent": 1.16, "tradeVolume": 25123},
                {"name": "orphan"}
            ]
        });
        let rows = parse_snapshot(&body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].trade_volume, 25123);
    }

    #[test]
    fn parse_ticker_name_ok() {
        assert_eq!(parse_ticker_name(&json!({"name": "聯發科"})).unwrap(), "聯發科");
        assert!(parse_ticker_name(&json!({})).is_err());
    }

    #[test]
    fn parse_volumes_keeps_bid_and_ask_split() {
        let body = json!({
            "symbol": "2330",
            "data": [
                {"price": 699, "volume": 1200, "volumeAtBid": 500, "volumeAtAsk": 700},
                {"price": "698.5", "volume": 80}
            ]
        });
        let rows = parse_volumes(&body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].volume_at_ask, 700);
        assert_eq!(rows[1].price, 698.5);
        assert_eq!(rows[1].volume_at_bid, 0);
        assert!(parse_volumes(&json!({})).is_err());
    }

    #[test]
    fn parse_tickers_symbol_and_name_only() {
        let body = json!({
            "type": "EQUITY",
            "exchange": "TWSE",
            "data": [
                {"symbol": "1101", "name": "台泥"},
                {"name": "no code"}
            ]
        });
        let rows = parse_tickers(&body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "1101");
        assert_eq!(rows[0].trade_volume, 0);
    }
}
