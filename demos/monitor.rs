use std::env;
use std::time::Duration;

use airstage::{AirstageClient, TemperatureScale};

const TOKEN_REFRESH_INTERVAL: Duration = Duration::from_secs(58 * 60);
const CACHE_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[tokio::main]
async fn main() -> airstage::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let email = args.get(1).expect("usage: monitor <email> <password> [region]");
    let password = args.get(2).expect("usage: monitor <email> <password> [region]");
    let region = args.get(3).map(String::as_str).unwrap_or("us");

    let mut client = AirstageClient::builder(region, "United States", "en")
        .on_event(|event| {
            println!("{event:?}");
        })
        .build()?;

    println!("Signing in ({region})...");
    client.authenticate(email, password).await?;

    let scale = client
        .get_temperature_scale()
        .await?
        .unwrap_or(TemperatureScale::Celsius);
    let unit = scale.as_vendor_str();

    let mut token_tick = tokio::time::interval(TOKEN_REFRESH_INTERVAL);
    let mut cache_tick = tokio::time::interval(CACHE_REFRESH_INTERVAL);
    token_tick.tick().await;

    loop {
        tokio::select! {
            _ = token_tick.tick() => {
                if let Err(e) = client.refresh_token_or_authenticate(email, password).await {
                    eprintln!("Token refresh failed: {e}");
                }
            }
            _ = cache_tick.tick() => {
                if let Err(e) = client.refresh_devices().await {
                    eprintln!("Device refresh failed: {e}");
                    continue;
                }
                for id in client.cached_device_ids() {
                    let name = client.get_name(&id).await?.unwrap_or_default();
                    let power = client.get_power_state(&id).await?;
                    let mode = client.get_operation_mode(&id).await?;
                    let indoor = client.get_indoor_temperature(&id, scale).await?;
                    let target = client.get_target_temperature(&id, scale).await?;
                    println!(
                        "[{name}] power: {power:?} | mode: {mode:?} | indoor: {indoor:?}\u{00b0}{unit} | target: {target:?}\u{00b0}{unit}",
                    );
                }
            }
        }
    }
}
