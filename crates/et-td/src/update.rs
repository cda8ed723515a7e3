//! Order and route subscription payloads.
//!
//! The order and route subscriptions deliver wide rows; only a fixed
//! projection is reported. A row whose `EVENT_STATUS` is the heartbeat code
//! carries no payload and is not projected at all.

use std::fmt;

use et_core::event::names;
use et_core::json_util::{f64_field, i64_field, str_field};
use serde_json::{Map, Value};

/// Which subscription a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Order,
    Route,
}

impl UpdateKind {
    /// `MSG_SUB_TYPE` is `O` for orders and `R` for routes.
    fn from_sub_type(sub_type: &str) -> Option<Self> {
        match sub_type {
            "O" => Some(Self::Order),
            "R" => Some(Self::Route),
            _ => None,
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Order => write!(f, "ORDER"),
            Self::Route => write!(f, "ROUTE"),
        }
    }
}

/// `true` when the row is a keep-alive with no payload.
#[inline]
pub fn is_heartbeat(fields: &Map<String, Value>) -> bool {
    i64_field(fields, names::EVENT_STATUS) == Some(names::HEARTBEAT_STATUS)
}

/// The reported projection of one order or route row.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRouteUpdate {
    pub kind: UpdateKind,
    pub event_status: Option<i64>,
    pub sequence: Option<i64>,
    pub route_id: Option<i64>,
    pub status: Option<String>,
    pub ticker: Option<String>,
    pub amount: Option<i64>,
    pub working: Option<i64>,
    pub filled: Option<i64>,
    pub avg_price: Option<f64>,
}

impl OrderRouteUpdate {
    /// Project a row. `kind_hint` (from the subscription token) is used when
    /// the row does not say which kind it is.
    pub fn from_fields(kind_hint: UpdateKind, fields: &Map<String, Value>) -> Self {
        let kind = str_field(fields, names::MSG_SUB_TYPE)
            .and_then(|s| UpdateKind::from_sub_type(&s))
            .unwrap_or(kind_hint);
        Self {
            kind,
            event_status: i64_field(fields, names::EVENT_STATUS),
            sequence: i64_field(fields, names::EMSX_SEQUENCE),
            route_id: i64_field(fields, names::EMSX_ROUTE_ID),
            status: str_field(fields, names::EMSX_STATUS),
            ticker: str_field(fields, names::EMSX_TICKER),
            amount: i64_field(fields, names::EMSX_AMOUNT),
            working: i64_field(fields, names::EMSX_WORKING),
            filled: i64_field(fields, names::EMSX_FILLED),
            avg_price: f64_field(fields, names::EMSX_AVG_PRICE),
        }
    }
}

impl fmt::Display for OrderRouteUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} EVENT_STATUS={} EMSX_SEQUENCE={}", self.kind, opt(&self.event_status), opt(&self.sequence))?;
        if self.kind == UpdateKind::Route {
            write!(f, " EMSX_ROUTE_ID={}", opt(&self.route_id))?;
        }
        write!(
            f,
            " EMSX_STATUS={} EMSX_TICKER={} EMSX_AMOUNT={} EMSX_WORKING={} EMSX_FILLED={} EMSX_AVG_PRICE={}",
            self.status.as_deref().unwrap_or("-"),
            self.ticker.as_deref().unwrap_or("-"),
            opt(&self.amount),
            opt(&self.working),
            opt(&self.filled),
            self.avg_price.map_or_else(|| "-".to_string(), |p| format!("{p:.4}")),
        )
    }
}

fn opt(v: &Option<i64>) -> String {
    v.map_or_else(|| "-".to_string(), |n| n.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn heartbeat_detection() {
        assert!(is_heartbeat(&fields(json!({"EVENT_STATUS": 1}))));
        assert!(is_heartbeat(&fields(json!({"EVENT_STATUS": "1"}))));
        assert!(!is_heartbeat(&fields(json!({"EVENT_STATUS": 6}))));
        assert!(!is_heartbeat(&fields(json!({}))));
    }

    #[test]
    fn order_projection() {
        let row = fields(json!({
            "EVENT_STATUS": 6, "MSG_SUB_TYPE": "O", "EMSX_SEQUENCE": 4711,
            "EMSX_STATUS": "WORKING", "EMSX_TICKER": "IBM US Equity",
            "EMSX_AMOUNT": 1000, "EMSX_WORKING": 400, "EMSX_FILLED": "600",
            "EMSX_AVG_PRICE": 100.02, "EMSX_BROKER": "BB"
        }));
        let u = OrderRouteUpdate::from_fields(UpdateKind::Route, &row);
        assert_eq!(u.kind, UpdateKind::Order);
        assert_eq!(u.sequence, Some(4711));
        assert_eq!(u.filled, Some(600));
        assert_eq!(
            u.to_string(),
            "ORDER EVENT_STATUS=6 EMSX_SEQUENCE=4711 EMSX_STATUS=WORKING EMSX_TICKER=IBM US Equity \
             EMSX_AMOUNT=1000 EMSX_WORKING=400 EMSX_FILLED=600 EMSX_AVG_PRICE=100.0200"
        );
    }

    #[test]
    fn route_kind_from_hint() {
        let row = fields(json!({"EVENT_STATUS": 7, "EMSX_SEQUENCE": 1, "EMSX_ROUTE_ID": 2}));
        let u = OrderRouteUpdate::from_fields(UpdateKind::Route, &row);
        assert_eq!(u.kind, UpdateKind::Route);
        assert!(u.to_string().contains("EMSX_ROUTE_ID=2"));
        assert!(u.to_string().contains("EMSX_STATUS=-"));
    }
}
