use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub gateway_timeout_secs: u64,
    pub esewa: EsewaConfig,
    pub khalti: KhaltiConfig,
}

/// eSewa epay v2 credentials. Sandbox endpoints are the defaults so a fresh
/// checkout works without a merchant account.
#[derive(Debug, Clone)]
pub struct EsewaConfig {
    pub secret_key: String,
    pub product_code: String,
    pub payment_url: String,
    pub status_url: String,
    pub success_url: String,
    pub failure_url: String,
}

#[derive(Debug, Clone)]
pub struct KhaltiConfig {
    pub secret_key: String,
    pub base_url: String,
    pub return_url: String,
    pub website_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let gateway_timeout_secs = env::var("GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse::<u64>().ok())
            .unwrap_or(10);

        let esewa = EsewaConfig {
            secret_key: env::var("ESEWA_SECRET_KEY").unwrap_or_default(),
            product_code: env::var("ESEWA_PRODUCT_CODE").unwrap_or_else(|_| "EPAYTEST".into()),
            payment_url: env::var("ESEWA_PAYMENT_URL")
                .unwrap_or_else(|_| "https://rc-epay.esewa.com.np/api/epay/main/v2/form".into()),
            status_url: env::var("ESEWA_STATUS_URL")
                .unwrap_or_else(|_| "https://rc.esewa.com.np/api/epay/transaction/status/".into()),
            success_url: env::var("ESEWA_SUCCESS_URL")
                .unwrap_or_else(|_| "http://localhost:3000/payment/success".into()),
            failure_url: env::var("ESEWA_FAILURE_URL")
                .unwrap_or_else(|_| "http://localhost:3000/payment/failure".into()),
        };

        let khalti = KhaltiConfig {
            secret_key: env::var("KHALTI_SECRET_KEY").unwrap_or_default(),
            base_url: env::var("KHALTI_BASE_URL")
                .unwrap_or_else(|_| "https://a.khalti.com/api/v2".into()),
            return_url: env::var("KHALTI_RETURN_URL")
                .unwrap_or_else(|_| "http://localhost:3000/payment/success".into()),
            website_url: env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".into()),
        };

        Ok(Self {
            database_url,
            host,
            port,
            gateway_timeout_secs,
            esewa,
            khalti,
        })
    }
}
