use crate::domain::ports::NumberSource;
use crate::domain::round::SlotNumber;
use crate::error::{RaffleError, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::time::Duration;
use tracing::info;

/// Payload fields that may carry the drawn numbers, in preference order.
/// Only the first field lists them in draw order; the others are sorted
/// lists whose last element is used as a documented best effort.
const NUMBER_FIELDS: [&str; 3] = ["dezenasSorteadasOrdemSorteio", "listaDezenas", "dezenas"];

/// Fetches the most recent officially drawn Lotomania number.
pub struct LotomaniaSource {
    client: reqwest::Client,
    endpoint: String,
}

impl LotomaniaSource {
    pub fn new(endpoint: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl NumberSource for LotomaniaSource {
    async fn fetch(&self) -> Result<SlotNumber> {
        let response = self
            .client
            .get(&self.endpoint)
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;
        let payload: Value = response.json().await?;
        let number = last_drawn_number(&payload)?;
        info!(number = %number, "official number fetched");
        Ok(number)
    }
}

/// Extracts the last drawn number from the lottery payload.
fn last_drawn_number(payload: &Value) -> Result<SlotNumber> {
    for field in NUMBER_FIELDS {
        if let Some(list) = payload.get(field).and_then(Value::as_array)
            && let Some(last) = list.last()
        {
            let text = match last {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return SlotNumber::parse(&text);
        }
    }
    Err(RaffleError::Upstream(
        "no drawn numbers in lottery payload".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prefers_draw_order_field() {
        let payload = json!({
            "listaDezenas": ["01", "02", "99"],
            "dezenasSorteadasOrdemSorteio": ["55", "03", "07"],
        });
        assert_eq!(last_drawn_number(&payload).unwrap().value(), 7);
    }

    #[test]
    fn test_falls_back_to_sorted_list() {
        let payload = json!({ "listaDezenas": ["01", "02", "42"] });
        assert_eq!(last_drawn_number(&payload).unwrap().value(), 42);

        let payload = json!({ "dezenas": ["00", "13"] });
        assert_eq!(last_drawn_number(&payload).unwrap().value(), 13);
    }

    #[test]
    fn test_numeric_elements_are_accepted() {
        let payload = json!({ "listaDezenas": [1, 2, 9] });
        assert_eq!(last_drawn_number(&payload).unwrap().value(), 9);
    }

    #[test]
    fn test_empty_or_missing_lists_are_fatal() {
        assert!(last_drawn_number(&json!({})).is_err());
        assert!(last_drawn_number(&json!({ "listaDezenas": [] })).is_err());
        assert!(last_drawn_number(&json!({ "listaDezenas": "07" })).is_err());
    }

    #[test]
    fn test_out_of_range_number_is_rejected() {
        let payload = json!({ "listaDezenas": ["123"] });
        assert!(last_drawn_number(&payload).is_err());
    }
}
