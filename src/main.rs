use std::process::ExitCode;

use pingbox::config::app_config::{AppConfig, load_config};
use pingbox::config::probe_config::OutputFormat;
use pingbox::probe::prelude::*;
use pingbox::report;

fn to_fixed_width(input: &str, width: usize) -> String {
    use unicode_truncate::UnicodeTruncateStr;

    let (truncated, _) = input.unicode_truncate(width);
    format!("{:<width$}", truncated, width = width)
}

fn format_result(result: &ProbeResult, width: usize) -> String {
    let host = to_fixed_width(result.host(), width);
    let received = format!("{}/{}", result.packets_received(), result.packets_sent());
    let loss = result
        .packet_loss_percent()
        .map(|l| format!("{l:.1}%"))
        .unwrap_or_else(|| "N/A".to_string());
    let rtt = result
        .response_time_ms()
        .map(|ms| format!("{ms:.2}ms"))
        .unwrap_or_else(|| "N/A".to_string());

    if result.success() {
        format!("[{host}] ✅ Reachable, Time: {rtt}, Loss: {loss}, Received: {received}")
    } else {
        let reason = result.error_message().unwrap_or("No reply");
        format!("[{host}] ❌ {reason}, Time: {rtt}, Loss: {loss}, Received: {received}")
    }
}

fn print_result(result: &ProbeResult, app: &AppConfig) {
    match app.output {
        OutputFormat::Text => println!("{}", format_result(result, app.max_host_width)),
        OutputFormat::Json => match serde_json::to_string(result) {
            Ok(line) => println!("{line}"),
            Err(e) => log::error!("Cannot serialize result for {}: {e}", result.host()),
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app = match load_config() {
        Ok(app) => app,
        Err(e) => {
            log::error!("{}", report(&e));
            return ExitCode::FAILURE;
        }
    };

    let executor = app.executor();
    let pool = app.pool();
    log::info!(
        "Probing {} targets with {} workers using {:?}",
        app.targets.len(),
        pool.size(),
        app.ping_command
    );

    let mut handles = vec![];
    for target in &app.targets {
        let service =
            ProbeService::with_parts(target.config.clone(), executor.clone(), pool.clone());
        handles.push(service.spawn(target.method));
    }

    let mut reachable = 0;
    for handle in handles {
        let result = handle.join().await;
        if result.success() {
            reachable += 1;
        }
        print_result(&result, &app);
    }

    log::info!("{reachable}/{} targets reachable", app.targets.len());
    ExitCode::SUCCESS
}
