//! Play a short tone through the default output device.
//!
//! Run with: `cargo run --example playback`

use audiopipe::{AudioPipe, PipeOptions, SampleFormat, StopMode, StreamOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let options = StreamOptions {
        sample_rate: 44100,
        channels: 1,
        sample_format: SampleFormat::Int16,
        max_queue: 4,
        ..Default::default()
    };
    println!("starting playback: {options}");

    let mut pipe = AudioPipe::new(PipeOptions::output(options))?;
    pipe.start()?;

    // Two seconds of a 440Hz sine, written in 100ms chunks so the bounded
    // queue exercises backpressure.
    let chunk_frames = 4410;
    for chunk_index in 0..20 {
        let bytes: Vec<u8> = (0..chunk_frames)
            .flat_map(|i| {
                let t = (chunk_index * chunk_frames + i) as f64 / 44100.0;
                let value = (2.0 * std::f64::consts::PI * 440.0 * t).sin();
                ((value * 16000.0) as i16).to_ne_bytes()
            })
            .collect();
        pipe.write(&bytes).await?;
    }

    // Wait until the last queued chunk has actually reached the device.
    pipe.quit(StopMode::Wait).await?;
    println!("done");
    Ok(())
}
