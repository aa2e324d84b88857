//! Echo API payloads.

use serde::{Deserialize, Serialize};

/// Body of `POST /echo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoRequest {
    pub message: String,
}

/// Response of `POST /echo`: the request message, unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoResponse {
    pub message: String,
}

impl From<EchoRequest> for EchoResponse {
    fn from(request: EchoRequest) -> Self {
        Self {
            message: request.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn request_requires_message_field() {
        assert!(serde_json::from_str::<EchoRequest>("{}").is_err());
        assert!(serde_json::from_str::<EchoRequest>(r#"{"message": null}"#).is_err());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let req: EchoRequest = serde_json::from_str(r#"{"message":"hi","extra":true}"#).unwrap();
        assert_eq!(req.message, "hi");
    }

    proptest! {
        #[test]
        fn response_carries_the_request_message(message in any::<String>()) {
            let request: EchoRequest =
                serde_json::from_value(serde_json::json!({ "message": message.clone() })).unwrap();
            let body = serde_json::to_value(EchoResponse::from(request)).unwrap();
            prop_assert_eq!(body, serde_json::json!({ "message": message }));
        }
    }
}
