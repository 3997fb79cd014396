use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use rubato::Resampler;
use tracing_subscriber::fmt::time::ChronoLocal;

use voicelink::utils::audio::ENDPOINT_PCM16_SAMPLE_RATE;
use voicelink::{AudioIo, Config, DeviceProfile, Engine, EngineNotification, OutputCommand};

const INPUT_CHUNK_SIZE: usize = 1024;
const OUTPUT_CHUNK_SIZE: usize = 1024;
const OUTPUT_LATENCY_MS: usize = 1000;

#[derive(Parser)]
struct Cli {
    /// Assistant to talk to
    assistant_id: String,
    /// Voice endpoint origin
    #[arg(long, default_value = "wss://api.voicelink.dev")]
    server: String,
    /// Use the mobile tuning profile
    #[arg(long)]
    mobile: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv_override().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let args = Cli::parse();

    // Microphone stream, acquired once for the process lifetime.
    let input = voicelink::utils::device::get_or_default_input(None)
        .context("failed to get input device")?;
    let input_config = input.default_input_config()?;
    let input_config = StreamConfig {
        channels: input_config.channels(),
        sample_rate: input_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(INPUT_CHUNK_SIZE as u32)),
    };
    let input_channels = input_config.channels as usize;
    let input_sample_rate = input_config.sample_rate.0 as f64;
    tracing::info!("input: device={:?}, config={:?}", input.name()?, &input_config);

    let (raw_tx, mut raw_rx) = tokio::sync::mpsc::channel::<Vec<f32>>(64);
    let input_stream = input.build_input_stream(
        &input_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            // fold to mono before shipping to the resampler task
            let mono: Vec<f32> = data
                .chunks(input_channels)
                .map(|frame| frame.iter().sum::<f32>() / input_channels as f32)
                .collect();
            if let Err(e) = raw_tx.try_send(mono) {
                tracing::warn!("dropping input frame: {}", e);
            }
        },
        move |err| tracing::error!("input stream error: {}", err),
        None,
    )?;
    input_stream.play()?;

    // Resample mic audio to the endpoint rate and feed the engine.
    let (frame_tx, frame_rx) = tokio::sync::mpsc::channel::<Vec<f32>>(64);
    let mut in_resampler = voicelink::utils::audio::create_resampler(
        input_sample_rate,
        ENDPOINT_PCM16_SAMPLE_RATE,
        INPUT_CHUNK_SIZE,
    )
    .context("failed to create input resampler")?;
    tokio::spawn(async move {
        let mut buffer: VecDeque<f32> = VecDeque::with_capacity(INPUT_CHUNK_SIZE * 2);
        while let Some(samples) = raw_rx.recv().await {
            buffer.extend(samples);
            while buffer.len() >= INPUT_CHUNK_SIZE {
                let chunk: Vec<f32> = buffer.drain(..INPUT_CHUNK_SIZE).collect();
                if let Ok(resampled) = in_resampler.process(&[chunk.as_slice()], None) {
                    if let Some(resampled) = resampled.first() {
                        if frame_tx.send(resampled.clone()).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    });

    // Output device fed from a ring buffer; a clear flag lets an
    // interruption flush everything queued for rendering.
    let output = voicelink::utils::device::get_or_default_output(None)
        .context("failed to get output device")?;
    let output_config = output.default_output_config()?;
    let output_config = StreamConfig {
        channels: output_config.channels(),
        sample_rate: output_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(OUTPUT_CHUNK_SIZE as u32)),
    };
    let output_channels = output_config.channels as usize;
    let output_sample_rate = output_config.sample_rate.0 as f64;
    tracing::info!("output: device={:?}, config={:?}", output.name()?, &output_config);

    let ring = voicelink::utils::audio::shared_buffer(
        output_sample_rate as usize * OUTPUT_LATENCY_MS / 1000,
    );
    let (mut ring_tx, mut ring_rx) = ring.split();
    let flush_flag = Arc::new(AtomicBool::new(false));

    let callback_flush = flush_flag.clone();
    let output_stream = output.build_output_stream(
        &output_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            if callback_flush.swap(false, Ordering::AcqRel) {
                while ring_rx.try_pop().is_some() {}
            }
            for frame in data.chunks_mut(output_channels) {
                let sample = ring_rx.try_pop().unwrap_or(0.0);
                for out in frame.iter_mut() {
                    *out = sample;
                }
            }
        },
        move |err| tracing::error!("output stream error: {}", err),
        None,
    )?;
    output_stream.play()?;

    let (out_tx, mut out_rx) = tokio::sync::mpsc::channel::<OutputCommand>(64);
    let mut out_resampler = voicelink::utils::audio::create_resampler(
        ENDPOINT_PCM16_SAMPLE_RATE,
        output_sample_rate,
        256,
    )
    .context("failed to create output resampler")?;
    let task_flush = flush_flag.clone();
    tokio::spawn(async move {
        while let Some(command) = out_rx.recv().await {
            match command {
                OutputCommand::Chunk(chunk) => {
                    let frames = out_resampler.input_frames_next();
                    for piece in voicelink::utils::audio::split_for_chunks(&chunk.samples, frames) {
                        if let Ok(resampled) = out_resampler.process(&[piece.as_slice()], None) {
                            if let Some(resampled) = resampled.first() {
                                for sample in resampled {
                                    if ring_tx.try_push(*sample).is_err() {
                                        tracing::warn!("output ring full, dropping sample");
                                    }
                                }
                            }
                        }
                    }
                }
                OutputCommand::Clear => {
                    task_flush.store(true, Ordering::Release);
                }
            }
        }
    });

    // Engine wiring.
    let profile = if args.mobile {
        DeviceProfile::Mobile
    } else {
        DeviceProfile::Desktop
    };
    let token = std::env::var("VOICELINK_TOKEN").unwrap_or_default();
    let config = Config::builder(&args.assistant_id)
        .with_server_origin(&args.server)
        .with_auth_token(&token)
        .with_profile(profile)
        .build();

    let handle = Engine::start(
        config,
        AudioIo {
            frames: frame_rx,
            output: out_tx,
        },
    );

    let mut status = handle.status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            tracing::info!("status: {:?}", *status.borrow());
        }
    });

    let mut notifications = handle.notifications();
    tokio::spawn(async move {
        while let Ok(notification) = notifications.recv().await {
            match notification {
                EngineNotification::TextDelta(_, text) => print!("{}", text),
                EngineNotification::TextDone(_) => println!(),
                EngineNotification::Notice(message) => tracing::warn!("{}", message),
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    handle.close().await;
    Ok(())
}
