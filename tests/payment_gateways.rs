use rust_decimal::Decimal;
use uuid::Uuid;

use axum_marketplace_api::config::{AppConfig, EsewaConfig, KhaltiConfig};
use axum_marketplace_api::payment::cod::CodGateway;
use axum_marketplace_api::payment::esewa::EsewaGateway;
use axum_marketplace_api::payment::khalti::to_paisa;
use axum_marketplace_api::payment::{
    GatewayError, GatewayKind, GatewayRegistry, InitiateContext, InitiateOutcome, PaymentGateway,
    ProviderReference, VerifyContext,
};

fn esewa_config() -> EsewaConfig {
    EsewaConfig {
        secret_key: "8gBm/:&EnhH.1/q".into(),
        product_code: "EPAYTEST".into(),
        payment_url: "https://rc-epay.esewa.com.np/api/epay/main/v2/form".into(),
        status_url: "https://rc.esewa.com.np/api/epay/transaction/status/".into(),
        success_url: "http://localhost:3000/payment/success".into(),
        failure_url: "http://localhost:3000/payment/failure".into(),
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        host: "127.0.0.1".into(),
        port: 3000,
        gateway_timeout_secs: 5,
        esewa: esewa_config(),
        khalti: KhaltiConfig {
            secret_key: "test-key".into(),
            base_url: "https://a.khalti.com/api/v2".into(),
            return_url: "http://localhost:3000/payment/success".into(),
            website_url: "http://localhost:3000".into(),
        },
    }
}

fn initiate_ctx(amount: &str) -> InitiateContext {
    InitiateContext {
        order_id: Uuid::new_v4(),
        amount: amount.parse().unwrap(),
        product_label: "Order".into(),
        customer_name: "Sita Sharma".into(),
        customer_email: "sita@example.com".into(),
        customer_phone: Some("9800000001".into()),
    }
}

// Fixed vector computed with the sandbox secret key.
#[test]
fn esewa_signature_matches_known_vector() {
    let gateway = EsewaGateway::new(esewa_config(), reqwest::Client::new());

    let message = gateway.signature_message("100", "11-201-13");
    assert_eq!(
        message,
        "total_amount=100,transaction_uuid=11-201-13,product_code=EPAYTEST"
    );
    assert_eq!(
        gateway.sign(&message),
        "5DZywcrTKD0gia/rsSMcrRHmJl+4Tbol6S+lWgdJ94E="
    );
}

#[test]
fn esewa_signature_is_deterministic() {
    let gateway = EsewaGateway::new(esewa_config(), reqwest::Client::new());
    let message = gateway.signature_message("450.00", "abc-123");
    assert_eq!(gateway.sign(&message), gateway.sign(&message));
    assert_ne!(
        gateway.sign(&message),
        gateway.sign(&gateway.signature_message("450.01", "abc-123"))
    );
}

#[test]
fn esewa_form_renders_amounts_with_two_decimals() {
    let gateway = EsewaGateway::new(esewa_config(), reqwest::Client::new());

    let form = gateway.build_form(&initiate_ctx("450"));
    assert_eq!(form.total_amount, "450.00");
    assert_eq!(form.amount, "450.00");

    let form = gateway.build_form(&initiate_ctx("99.999"));
    assert_eq!(form.total_amount, "100.00");
}

#[test]
fn esewa_form_is_internally_consistent() {
    let gateway = EsewaGateway::new(esewa_config(), reqwest::Client::new());
    let ctx = initiate_ctx("1250.50");
    let form = gateway.build_form(&ctx);

    assert_eq!(form.transaction_uuid, ctx.order_id.to_string());
    assert_eq!(form.product_code, "EPAYTEST");
    assert_eq!(
        form.signed_field_names,
        "total_amount,transaction_uuid,product_code"
    );
    assert_eq!(
        form.signature,
        gateway.sign(&gateway.signature_message(&form.total_amount, &form.transaction_uuid))
    );
    assert!(form.success_url.ends_with(&format!("?oid={}", ctx.order_id)));
    assert!(form.failure_url.ends_with(&format!("?oid={}", ctx.order_id)));
    assert_eq!(form.tax_amount, "0");
}

#[tokio::test]
async fn esewa_initiate_needs_no_network() {
    let gateway = EsewaGateway::new(esewa_config(), reqwest::Client::new());
    let outcome = gateway.initiate(&initiate_ctx("450.00")).await.unwrap();

    match outcome {
        InitiateOutcome::FormRedirect { payment_url, fields } => {
            assert_eq!(payment_url, esewa_config().payment_url);
            assert_eq!(fields.total_amount, "450.00");
        }
        other => panic!("expected form redirect, got {other:?}"),
    }
}

#[tokio::test]
async fn esewa_verify_rejects_wrong_reference_kind() {
    let gateway = EsewaGateway::new(esewa_config(), reqwest::Client::new());
    let ctx = VerifyContext {
        order_id: Uuid::new_v4(),
        amount: Decimal::new(45000, 2),
        reference: ProviderReference::Pidx("abc".into()),
    };
    assert!(matches!(
        gateway.verify(&ctx).await,
        Err(GatewayError::MissingReference("refId"))
    ));

    let ctx = VerifyContext {
        reference: ProviderReference::RefId(String::new()),
        ..ctx
    };
    assert!(matches!(
        gateway.verify(&ctx).await,
        Err(GatewayError::MissingReference("refId"))
    ));
}

#[test]
fn khalti_amounts_convert_to_paisa() {
    assert_eq!(to_paisa(Decimal::new(10000, 2)), 10_000); // 100.00
    assert_eq!(to_paisa("450.50".parse().unwrap()), 45_050);
    assert_eq!(to_paisa("0.01".parse().unwrap()), 1);
    assert_eq!(to_paisa("99.999".parse().unwrap()), 10_000);
}

#[tokio::test]
async fn cod_initiate_has_no_redirect() {
    let outcome = CodGateway.initiate(&initiate_ctx("450.00")).await.unwrap();
    assert!(matches!(outcome, InitiateOutcome::NoRedirect));
}

#[tokio::test]
async fn cod_cannot_be_verified_online() {
    let ctx = VerifyContext {
        order_id: Uuid::new_v4(),
        amount: Decimal::new(45000, 2),
        reference: ProviderReference::RefId("r".into()),
    };
    assert!(matches!(
        CodGateway.verify(&ctx).await,
        Err(GatewayError::Unsupported)
    ));
}

#[test]
fn gateway_kind_parsing() {
    assert_eq!(GatewayKind::parse("esewa").unwrap(), GatewayKind::Esewa);
    assert_eq!(GatewayKind::parse("khalti").unwrap(), GatewayKind::Khalti);
    assert_eq!(GatewayKind::parse("cod").unwrap(), GatewayKind::Cod);
    assert!(GatewayKind::parse("paypal").is_err());
    assert!(GatewayKind::parse("Esewa").is_err());
}

#[test]
fn registry_holds_all_configured_gateways() {
    let registry = GatewayRegistry::from_config(&test_config()).unwrap();
    for kind in [GatewayKind::Esewa, GatewayKind::Khalti, GatewayKind::Cod] {
        assert_eq!(registry.get(kind).unwrap().kind(), kind);
    }
}
