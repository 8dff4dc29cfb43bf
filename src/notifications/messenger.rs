//! Messenger push channel (spec §4.12 channel 1). Sends a "memo to self"
//! through the user's already-issued messenger access token; this module
//! never performs the OAuth exchange that issues or refreshes that token
//! (SPEC_FULL.md §B — out of scope here).

use async_trait::async_trait;
use serde_json::json;

use crate::http_client;
use crate::models::format_won;

const MEMO_ENDPOINT: &str = "https://kapi.kakao.com/v2/api/talk/memo/default/send";

#[async_trait]
pub trait MessengerChannel: Send + Sync {
    async fn send_price_alert(
        &self,
        access_token: &str,
        product_name: &str,
        current_price: i64,
        lowest_price: i64,
        product_link: &str,
    ) -> bool;
}

pub struct HttpMessengerChannel {
    client: reqwest::Client,
}

impl HttpMessengerChannel {
    pub fn new() -> Self {
        HttpMessengerChannel {
            client: http_client::gateway_client(),
        }
    }
}

impl Default for HttpMessengerChannel {
    fn default() -> Self {
        Self::new()
    }
}

fn build_template(product_name: &str, current_price: i64, lowest_price: i64, product_link: &str) -> String {
    let template = json!({
        "object_type": "text",
        "text": format!(
            "[가격 알림]\n{product_name}\n현재가: {}\n90일 최저가: {}",
            format_won(current_price),
            format_won(lowest_price),
        ),
        "link": {
            "web_url": product_link,
            "mobile_web_url": product_link,
        },
        "button_title": "상품 보기",
    });
    template.to_string()
}

#[async_trait]
impl MessengerChannel for HttpMessengerChannel {
    async fn send_price_alert(
        &self,
        access_token: &str,
        product_name: &str,
        current_price: i64,
        lowest_price: i64,
        product_link: &str,
    ) -> bool {
        let template = build_template(product_name, current_price, lowest_price, product_link);
        let response = self
            .client
            .post(MEMO_ENDPOINT)
            .bearer_auth(access_token)
            .form(&[("template_object", template.as_str())])
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => true,
            Ok(r) => {
                tracing::warn!(status = %r.status(), "messenger push rejected");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "messenger push failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_embeds_price_lines_in_won() {
        let template = build_template("노트북", 950_000, 899_000, "https://example.com");
        assert!(template.contains("950,000원"));
        assert!(template.contains("899,000원"));
    }
}
