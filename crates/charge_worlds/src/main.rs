#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    lib_charge_worlds::init().await
}
