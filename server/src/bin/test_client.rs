//! Headless test client for smoke-testing a running server.
//!
//! Connects, prints the assigned player id and a line per received state
//! frame, and drives a trivial follow-the-ball bot so a match can play
//! itself out without a rendering client.

use clap::Parser;
use shared::{Command, FrameDecoder, StateFrame, PADDLE_HEIGHT};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8082")]
    server: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let stream = TcpStream::connect(&args.server).await?;
    println!("Connected to {}", args.server);
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    // The greeting is the assigned player id, newline-terminated.
    let mut greeting = String::new();
    reader.read_line(&mut greeting).await?;
    let my_id: usize = greeting.trim().parse()?;
    println!("Playing as player {}", my_id);

    let mut decoder = FrameDecoder::new();
    let mut chunk = [0u8; 1024];

    loop {
        let len = reader.read(&mut chunk).await?;
        if len == 0 {
            println!("Server closed the connection");
            return Ok(());
        }

        decoder.push(&chunk[..len]);
        while let Some(frame) = decoder.next_frame() {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    eprintln!("Skipping malformed frame: {}", e);
                    continue;
                }
            };

            print_frame(&frame);

            if let Some(winner) = frame.winner {
                println!(
                    "Game over: {}",
                    if winner == my_id { "you win!" } else { "you lose" }
                );
                continue;
            }

            if frame.countdown > 0 {
                continue;
            }

            if let Some(cmd) = chase_ball(&frame, my_id) {
                writer.write_all(cmd.token().as_bytes()).await?;
            }
        }
    }
}

/// Moves toward the ball whenever it is outside the paddle's middle third.
fn chase_ball(frame: &StateFrame, my_id: usize) -> Option<Command> {
    let paddle = frame.paddle(my_id)?;
    let center = paddle + PADDLE_HEIGHT / 2;
    if frame.ball.y < center - PADDLE_HEIGHT / 3 {
        Some(Command::Up)
    } else if frame.ball.y > center + PADDLE_HEIGHT / 3 {
        Some(Command::Down)
    } else {
        None
    }
}

fn print_frame(frame: &StateFrame) {
    println!(
        "countdown={} ball=({}, {}) paddles=({:?}, {:?}) scores={:?} sound={:?}",
        frame.countdown,
        frame.ball.x,
        frame.ball.y,
        frame.paddle(0),
        frame.paddle(1),
        frame.scores,
        frame.sound_event,
    );
}
