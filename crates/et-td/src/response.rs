//! Responses to `CreateOrderAndRoute` requests.

use std::fmt;

use et_core::event::{Message, names};
use et_core::json_util::{i64_field, str_field};

/// How the gateway answered one order request.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Order created and routed; identifiers are informational.
    Acked {
        sequence: Option<i64>,
        route_id: Option<i64>,
        message: Option<String>,
    },
    /// The gateway refused the request.
    Rejected {
        code: Option<i64>,
        message: Option<String>,
    },
}

impl Resolution {
    /// Interpret a response message.
    ///
    /// `ErrorInfo` is a rejection; `CreateOrderAndRoute` an acknowledgement
    /// with identifiers. Any other message type still answers the request and
    /// is treated as a bare acknowledgement.
    pub fn from_message(msg: &Message) -> Self {
        if msg.is(names::ERROR_INFO) {
            Self::Rejected {
                code: i64_field(&msg.fields, names::ERROR_CODE),
                message: str_field(&msg.fields, names::ERROR_MESSAGE),
            }
        } else if msg.is(names::CREATE_ORDER_AND_ROUTE) {
            Self::Acked {
                sequence: i64_field(&msg.fields, names::EMSX_SEQUENCE),
                route_id: i64_field(&msg.fields, names::EMSX_ROUTE_ID),
                message: str_field(&msg.fields, names::MESSAGE),
            }
        } else {
            Self::Acked { sequence: None, route_id: None, message: None }
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acked { sequence, route_id, message } => write!(
                f,
                "ACK EMSX_SEQUENCE={} EMSX_ROUTE_ID={} MESSAGE={}",
                opt(sequence),
                opt(route_id),
                message.as_deref().unwrap_or("-"),
            ),
            Self::Rejected { code, message } => write!(
                f,
                "REJECT ERROR_CODE={} ERROR_MESSAGE={}",
                opt(code),
                message.as_deref().unwrap_or("-"),
            ),
        }
    }
}

fn opt<T: fmt::Display>(v: &Option<T>) -> String {
    v.as_ref().map_or_else(|| "-".to_string(), T::to_string)
}
