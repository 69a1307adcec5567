use std::env;

use airstage::{AirstageClient, AuthState, TemperatureScale};

fn credentials() -> (String, String, String) {
    let email = env::var("AIRSTAGE_EMAIL").expect("AIRSTAGE_EMAIL not set");
    let password = env::var("AIRSTAGE_PASSWORD").expect("AIRSTAGE_PASSWORD not set");
    let region = env::var("AIRSTAGE_REGION").unwrap_or_else(|_| "us".to_string());
    (email, password, region)
}

/// Run with: cargo test --test integration -- --ignored
/// Requires AIRSTAGE_EMAIL and AIRSTAGE_PASSWORD (and optionally
/// AIRSTAGE_REGION, default `us`) for a real account.
#[tokio::test]
#[ignore]
async fn sign_in_and_read_devices() {
    let (email, password, region) = credentials();
    let mut client = AirstageClient::builder(region, "United States", "en")
        .build()
        .expect("client should build");

    client
        .authenticate(&email, &password)
        .await
        .expect("sign-in failed");
    assert_eq!(client.auth_state(), AuthState::Authenticated);

    let scale = client
        .get_temperature_scale()
        .await
        .expect("users/me failed")
        .unwrap_or(TemperatureScale::Celsius);

    let devices = client.get_devices().await.expect("device list failed");
    for device in &devices {
        let id = device.device_id.clone();
        let power = client.get_power_state(&id).await.expect("power read failed");
        let indoor = client
            .get_indoor_temperature(&id, scale)
            .await
            .expect("temperature read failed");
        println!("{id} {:?}: power={power:?} indoor={indoor:?}", device.name);
    }
}

#[tokio::test]
#[ignore]
async fn refresh_session() {
    let (email, password, region) = credentials();
    let mut client = AirstageClient::builder(region, "United States", "en")
        .build()
        .expect("client should build");

    client.authenticate(&email, &password).await.expect("sign-in failed");
    let first = client.session().access_token.clone();
    client
        .refresh_token_or_authenticate(&email, &password)
        .await
        .expect("refresh failed");
    assert!(client.session().access_token.is_some());
    println!("token rotated: {}", client.session().access_token != first);
}
