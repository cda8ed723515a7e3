//! Outbound operations: subscriptions and requests sent to the gateway.

use serde::{Deserialize, Serialize};

use crate::token::CorrelationToken;
use crate::types::OrderRequest;

/// A long-lived subscription. Its token tags every event it produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub topic: String,
    pub correlation_id: CorrelationToken,
}

impl Subscription {
    /// Order-gateway topic: `{service}/{kind}?fields=F1,F2,...`.
    pub fn gateway_topic(service: &str, kind: &str, fields: &[String], token: CorrelationToken) -> Self {
        Self { topic: format!("{service}/{kind}?fields={}", fields.join(",")), correlation_id: token }
    }

    /// Market-data topic: `{service}/ticker/{ticker}?fields=F1,F2`.
    pub fn market_data_topic(service: &str, ticker: &str, fields: &[String], token: CorrelationToken) -> Self {
        Self { topic: format!("{service}/ticker/{ticker}?fields={}", fields.join(",")), correlation_id: token }
    }
}

/// A one-shot request whose response arrives later as a `RESPONSE` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "requestType")]
pub enum OutboundRequest {
    /// Static lookup on the reference-data service.
    #[serde(rename = "ReferenceDataRequest")]
    ReferenceData {
        service: String,
        securities: Vec<String>,
        fields: Vec<String>,
    },
    /// Create an order and route it (order-gateway service).
    #[serde(rename = "CreateOrderAndRoute")]
    CreateOrderAndRoute {
        service: String,
        order: OrderRequest,
    },
}

impl OutboundRequest {
    pub fn service(&self) -> &str {
        match self {
            Self::ReferenceData { service, .. } | Self::CreateOrderAndRoute { service, .. } => service,
        }
    }

    pub fn order(&self) -> Option<&OrderRequest> {
        match self {
            Self::CreateOrderAndRoute { order, .. } => Some(order),
            Self::ReferenceData { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_topic_format() {
        let fields = vec!["EMSX_SEQUENCE".to_string(), "EMSX_STATUS".to_string()];
        let sub = Subscription::gateway_topic("//blp/emapisvc_beta", "order", &fields, CorrelationToken(5));
        assert_eq!(sub.topic, "//blp/emapisvc_beta/order?fields=EMSX_SEQUENCE,EMSX_STATUS");
        assert_eq!(sub.correlation_id, CorrelationToken(5));
    }

    #[test]
    fn market_data_topic_format() {
        let fields = vec!["BID".to_string(), "ASK".to_string()];
        let sub = Subscription::market_data_topic("//blp/mktdata", "IBM US Equity", &fields, CorrelationToken(9));
        assert_eq!(sub.topic, "//blp/mktdata/ticker/IBM US Equity?fields=BID,ASK");
    }

    #[test]
    fn reference_request_is_tagged() {
        let req = OutboundRequest::ReferenceData {
            service: "//blp/refdata".into(),
            securities: vec!["IBM US Equity".into()],
            fields: vec!["PARSEKYABLE_DES_SOURCE".into()],
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["requestType"], "ReferenceDataRequest");
        assert_eq!(v["securities"][0], "IBM US Equity");
        assert!(req.order().is_none());
    }
}
