use crate::config::Config;
use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

const AUTHORIZATION_HEADER: &str = "Authorization";

pub fn build_request(config: &Config) -> tokio_tungstenite::tungstenite::Result<Request> {
    let mut request = format!(
        "{}/realtime/widget?assistant_id={}",
        config.server_origin(),
        config.assistant_id()
    )
    .into_client_request()?;
    let token = config.auth_token().expose_secret();
    if !token.is_empty() {
        request.headers_mut().insert(
            AUTHORIZATION_HEADER,
            format!("Bearer {}", token).as_str().parse()?,
        );
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn request_addresses_the_assistant() {
        let config = Config::builder("asst_A1")
            .with_server_origin("wss://voice.example.com")
            .with_auth_token("tok_secret")
            .build();
        let request = build_request(&config).unwrap();
        assert_eq!(
            request.uri().to_string(),
            "wss://voice.example.com/realtime/widget?assistant_id=asst_A1"
        );
        assert_eq!(
            request.headers().get(AUTHORIZATION_HEADER).unwrap(),
            "Bearer tok_secret"
        );
    }

    #[test]
    fn empty_token_sends_no_auth_header() {
        let config = Config::builder("asst_A1")
            .with_server_origin("wss://voice.example.com")
            .with_auth_token("")
            .build();
        let request = build_request(&config).unwrap();
        assert!(request.headers().get(AUTHORIZATION_HEADER).is_none());
    }
}
