use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::FetchError;
use crate::lottery::LotteryType;
use crate::types::{DrawNoticeResponse, RawDraw};

/// The remote authority for draw results.
#[async_trait]
pub trait DrawSource: Send + Sync {
    /// The most recent `period_count` draws, newest first.
    async fn fetch_draws(
        &self,
        lottery_type: LotteryType,
        period_count: usize,
    ) -> Result<Vec<RawDraw>, FetchError>;
}

/// Client for the China Welfare Lottery draw-notice endpoint.
#[derive(Clone)]
pub struct CwlClient {
    http: Client,
    base_url: String,
}

impl CwlClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DrawSource for CwlClient {
    async fn fetch_draws(
        &self,
        lottery_type: LotteryType,
        period_count: usize,
    ) -> Result<Vec<RawDraw>, FetchError> {
        debug!("GET {} name={} pageSize={}", self.base_url, lottery_type.code(), period_count);

        let page_size = period_count.to_string();
        let response: DrawNoticeResponse = self
            .http
            .get(&self.base_url)
            .header("Referer", "https://www.cwl.gov.cn/")
            .header("Accept", "application/json, text/plain, */*")
            .query(&[
                ("name", lottery_type.code()),
                ("pageNo", "1"),
                ("pageSize", page_size.as_str()),
                ("systemType", "PC"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_notice(response)
    }
}

fn parse_notice(response: DrawNoticeResponse) -> Result<Vec<RawDraw>, FetchError> {
    if response.state != 0 {
        return Err(FetchError::Remote {
            state: response.state,
            message: response.message.unwrap_or_default(),
        });
    }
    if response.result.is_empty() {
        return Err(FetchError::Empty);
    }
    Ok(response.result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_notice_payload() {
        let body = r#"{
            "state": 0,
            "message": "查询成功",
            "result": [
                {"name": "双色球", "code": "2025081", "date": "2025-07-17(四)",
                 "red": "02,05,11,19,28,30", "blue": "09",
                 "poolmoney": "2516540916", "sales": "377362438"},
                {"code": "2025080", "date": "2025-07-15(二)",
                 "red": "01,04,12,15,26,33", "blue": "16"}
            ]
        }"#;
        let response: DrawNoticeResponse = serde_json::from_str(body).unwrap();
        let draws = parse_notice(response).unwrap();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].code, "2025081");
        assert_eq!(draws[0].blue.as_deref(), Some("09"));
        assert_eq!(draws[1].poolmoney, None);
    }

    #[test]
    fn test_remote_error_state() {
        let response: DrawNoticeResponse =
            serde_json::from_str(r#"{"state": 1, "message": "busy"}"#).unwrap();
        match parse_notice(response) {
            Err(FetchError::Remote { state, message }) => {
                assert_eq!(state, 1);
                assert_eq!(message, "busy");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_result_is_an_error() {
        let response: DrawNoticeResponse =
            serde_json::from_str(r#"{"state": 0, "result": []}"#).unwrap();
        assert!(matches!(parse_notice(response), Err(FetchError::Empty)));
    }
}
