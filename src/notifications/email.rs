//! Email fallback channel (spec §4.12 channel 2), built on `lettre` the way
//! the teacher's outer services reach for a typed client over a protocol
//! rather than shelling out or hand-rolling SMTP.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::Settings;
use crate::models::format_won;

#[async_trait]
pub trait EmailChannel: Send + Sync {
    async fn send_price_alert(
        &self,
        to_email: &str,
        product_name: &str,
        current_price: i64,
        lowest_price: i64,
        product_link: &str,
        product_image: Option<&str>,
    ) -> bool;
}

pub struct SmtpEmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
}

impl SmtpEmailChannel {
    pub fn new(settings: &Settings) -> Option<Self> {
        let from_email = settings.smtp_from_email.clone()?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host).ok()?;
        if let (Some(user), Some(password)) = (&settings.smtp_user, &settings.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }
        builder = builder.port(settings.smtp_port);
        Some(SmtpEmailChannel {
            transport: builder.build(),
            from_email,
        })
    }
}

fn build_body(product_name: &str, current_price: i64, lowest_price: i64, product_link: &str, product_image: Option<&str>) -> String {
    let image_tag = product_image
        .map(|img| format!("<img src=\"{img}\" alt=\"{product_name}\" style=\"max-width:200px\"/><br/>"))
        .unwrap_or_default();
    format!(
        "<h2>가격 알림</h2>\
         {image_tag}\
         <p><strong>{product_name}</strong></p>\
         <p>현재가: {}</p>\
         <p>90일 최저가: {}</p>\
         <p><a href=\"{product_link}\">상품 보러가기</a></p>",
        format_won(current_price),
        format_won(lowest_price),
    )
}

#[async_trait]
impl EmailChannel for SmtpEmailChannel {
    async fn send_price_alert(
        &self,
        to_email: &str,
        product_name: &str,
        current_price: i64,
        lowest_price: i64,
        product_link: &str,
        product_image: Option<&str>,
    ) -> bool {
        let body = build_body(product_name, current_price, lowest_price, product_link, product_image);

        let message = Message::builder()
            .from(match self.from_email.parse() {
                Ok(addr) => addr,
                Err(e) => {
                    tracing::error!(error = %e, "invalid SMTP_FROM_EMAIL");
                    return false;
                }
            })
            .to(match to_email.parse() {
                Ok(addr) => addr,
                Err(e) => {
                    tracing::error!(error = %e, "invalid recipient address");
                    return false;
                }
            })
            .subject(format!("[가격 알림] {product_name}"))
            .header(ContentType::TEXT_HTML)
            .body(body);

        let message = match message {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, "failed to build email message");
                return false;
            }
        };

        match self.transport.send(message).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(error = %e, "email send failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_includes_image_tag_only_when_present() {
        let with_image = build_body("노트북", 900_000, 850_000, "https://x", Some("https://img"));
        assert!(with_image.contains("<img"));
        let without_image = build_body("노트북", 900_000, 850_000, "https://x", None);
        assert!(!without_image.contains("<img"));
    }
}
