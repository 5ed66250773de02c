use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    clinical_risk_worker::run().await
}
