//! Capture from the default input device and report throughput.
//!
//! Run with: `cargo run --example record`

use std::time::Instant;

use audiopipe::{AudioPipe, PipeOptions, StopMode, StreamOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    for device in audiopipe::list_devices()? {
        println!(
            "{} ({}): in={} out={} rate={}",
            device.name,
            device.host_name,
            device.max_input_channels,
            device.max_output_channels,
            device.default_sample_rate
        );
    }

    let options = StreamOptions {
        max_queue: 8,
        ..Default::default()
    };
    println!("starting capture: {options}");

    let mut pipe = AudioPipe::new(PipeOptions::input(options))?;
    pipe.start()?;

    let started = Instant::now();
    let mut total = 0usize;
    while started.elapsed().as_secs() < 5 {
        let chunk = pipe.read(8192).await?;
        total += chunk.bytes.len();
        if chunk.finished {
            break;
        }
        println!(
            "read {} bytes (ts {:?}, total {total})",
            chunk.bytes.len(),
            chunk.timestamp
        );
    }

    pipe.quit(StopMode::Abort).await?;
    println!(
        "captured {total} bytes in {:?}, {} overflows",
        started.elapsed(),
        pipe.capture_overflows()
    );
    Ok(())
}
